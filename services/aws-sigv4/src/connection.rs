// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Authorize a connection to a tenant's AWS role and verify the result.

use std::fmt::{Debug, Formatter};

use bytes::Bytes;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use stsbroker_core::time::DateTime;
use stsbroker_core::utils::Redact;
use stsbroker_core::{Context, Error, Result, SignRequest};

use crate::config::Config;
use crate::constants::{EMPTY_STRING_SHA256, STS_API_VERSION, X_AMZ_CONTENT_SHA_256};
use crate::credential::{generate_external_id, AssumeRoleInput, Credential, TemporaryCredentials};
use crate::fetch::{fetch_temporary_credentials_with_config, resolve_region};
use crate::provide_credential::sts_endpoint;
use crate::provide_credential::utils::sts_response_error;
use crate::settings::IntegrationSettings;
use crate::sign_request::RequestSigner;

/// Credential record type stored on a SigV4 connection.
pub const CONNECTION_CREDENTIALS_TYPE: &str = "AWS_SIGV4";

/// An end user's request to connect, or reconnect, to their role.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AuthorizeRequest {
    /// ARN of the role to assume.
    pub role_arn: String,
    /// Region picked by the user.
    pub region: Option<String>,
    /// Region stored on the existing connection.
    pub connection_region: Option<String>,
    /// External id stored on the existing connection.
    pub external_id: Option<String>,
}

/// Credentials stored on a connection after a successful authorization.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionCredentials {
    #[serde(rename = "type")]
    pub kind: String,
    pub role_arn: String,
    pub region: String,
    pub service: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub expires_at: DateTime,
    pub external_id: String,
}

impl Debug for ConnectionCredentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionCredentials")
            .field("kind", &self.kind)
            .field("role_arn", &self.role_arn)
            .field("region", &self.region)
            .field("service", &self.service)
            .field("access_key_id", &Redact::from(&self.access_key_id))
            .field("secret_access_key", &Redact::from(&self.secret_access_key))
            .field("session_token", &Redact::from(&self.session_token))
            .field("expires_at", &self.expires_at)
            .field("external_id", &self.external_id)
            .finish()
    }
}

/// Obtain and verify credentials for `request.role_arn`.
///
/// The region is the first of `request.region`, `request.connection_region`
/// and the integration's default region. A new external id is generated
/// unless the connection already has one.
pub async fn authorize_connection(
    ctx: &Context,
    settings: &IntegrationSettings,
    request: &AuthorizeRequest,
) -> Result<ConnectionCredentials> {
    if request.role_arn.trim().is_empty() {
        return Err(Error::request_invalid("role_arn is required"));
    }

    let config = Config::default().from_env(ctx);
    let region = resolve_region(
        &[
            request.region.as_deref(),
            request.connection_region.as_deref(),
        ],
        settings,
    )?;
    let external_id = request
        .external_id
        .clone()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(generate_external_id);

    let input = AssumeRoleInput::new(&request.role_arn, &external_id).with_region(&region);
    let creds = fetch_temporary_credentials_with_config(ctx, &config, settings, &input).await?;
    verify_temporary_credentials(ctx, &config, &creds, &region).await?;

    Ok(ConnectionCredentials {
        kind: CONNECTION_CREDENTIALS_TYPE.to_string(),
        role_arn: request.role_arn.clone(),
        region,
        service: settings.service.clone(),
        access_key_id: creds.access_key_id,
        secret_access_key: creds.secret_access_key,
        session_token: creds.session_token,
        expires_at: creds.expires_at,
        external_id,
    })
}

/// Check that `creds` work by calling STS `GetCallerIdentity` with them.
pub async fn verify_temporary_credentials(
    ctx: &Context,
    config: &Config,
    creds: &TemporaryCredentials,
    region: &str,
) -> Result<()> {
    let endpoint = sts_endpoint(config, region);
    let url = format!("{endpoint}?Action=GetCallerIdentity&Version={STS_API_VERSION}");

    let req = http::Request::builder()
        .method(http::Method::GET)
        .uri(&url)
        .header(X_AMZ_CONTENT_SHA_256, EMPTY_STRING_SHA256)
        .body(Bytes::new())
        .map_err(|e| {
            Error::request_invalid("failed to build STS GetCallerIdentity request")
                .with_source(e)
                .with_context(format!("endpoint: {endpoint}"))
        })?;
    let (mut parts, body) = req.into_parts();
    RequestSigner::new("sts", region).sign_request(&mut parts, &Credential::from(creds))?;
    let req = http::Request::from_parts(parts, body);

    let resp = ctx.http_send_as_string(req).await.map_err(|e| {
        warn!("STS GetCallerIdentity request failed: {e}");
        Error::sts_request_failed(format!("STS GetCallerIdentity request failed: {e}"))
            .with_source(e)
            .with_context(format!("region: {region}"))
    })?;

    let status = resp.status();
    if !status.is_success() {
        return Err(sts_response_error("GetCallerIdentity", status, resp.body())
            .with_context(format!("region: {region}")));
    }

    debug!("temporary credentials verified in {region}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_connection_credentials_serde() {
        let creds = ConnectionCredentials {
            kind: CONNECTION_CREDENTIALS_TYPE.to_string(),
            role_arn: "arn:aws:iam::123456789012:role/demo".to_string(),
            region: "eu-west-1".to_string(),
            service: "s3".to_string(),
            access_key_id: "ASIAEXAMPLE".to_string(),
            secret_access_key: "secret".to_string(),
            session_token: "token".to_string(),
            expires_at: Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap(),
            external_id: "ext".to_string(),
        };

        let value = serde_json::to_value(&creds).expect("must serialize");
        assert_eq!(
            value,
            serde_json::json!({
                "type": "AWS_SIGV4",
                "role_arn": "arn:aws:iam::123456789012:role/demo",
                "region": "eu-west-1",
                "service": "s3",
                "access_key_id": "ASIAEXAMPLE",
                "secret_access_key": "secret",
                "session_token": "token",
                "expires_at": "2030-01-01T00:00:00Z",
                "external_id": "ext"
            })
        );
        assert!(!format!("{creds:?}").contains("secret\""));
    }

    #[test]
    fn test_authorize_request_deserialize() {
        let req: AuthorizeRequest =
            serde_json::from_str(r#"{"role_arn":"arn:aws:iam::1:role/r","region":"us-east-1"}"#)
                .expect("must deserialize");
        assert_eq!(req.region.as_deref(), Some("us-east-1"));
        assert_eq!(req.external_id, None);
    }

    #[tokio::test]
    async fn test_authorize_requires_role_arn() {
        let settings = IntegrationSettings {
            service: "s3".to_string(),
            default_region: Some("us-east-1".to_string()),
            source: crate::settings::StsSource::Custom(crate::settings::StsEndpoint {
                url: "https://sts.example.com".to_string(),
                auth: None,
            }),
            instructions: None,
            templates: vec![],
        };

        let err = authorize_connection(&Context::new(), &settings, &AuthorizeRequest::default())
            .await
            .expect_err("must fail");
        assert_eq!(err.kind(), stsbroker_core::ErrorKind::RequestInvalid);
    }
}
