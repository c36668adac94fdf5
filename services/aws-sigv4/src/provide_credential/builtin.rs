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

use async_trait::async_trait;
use bytes::Bytes;
use http::header::CONTENT_TYPE;
use log::{debug, warn};
use stsbroker_core::hash::hex_sha256;
use stsbroker_core::time::now;
use stsbroker_core::{Context, Error, ProvideCredential, Result, SignRequest};

use super::utils::{check_region, sts_endpoint, sts_response_error};
use crate::config::Config;
use crate::constants::{ASSUME_ROLE_DURATION_SECONDS, STS_API_VERSION, X_AMZ_CONTENT_SHA_256};
use crate::credential::{BuiltinCredentials, Credential, TemporaryCredentials};
use crate::parse::{AssumeRoleResponseParser, ParseCredentials};
use crate::sign_request::RequestSigner;

/// BuiltinStsCredentialProvider calls AWS STS `AssumeRole` with the
/// platform's own key to obtain credentials for a tenant's role.
#[derive(Debug)]
pub struct BuiltinStsCredentialProvider {
    config: Config,
    credentials: BuiltinCredentials,

    role_arn: String,
    external_id: String,
    region: String,

    parser: Box<dyn ParseCredentials>,
}

impl BuiltinStsCredentialProvider {
    /// Create a provider assuming `role_arn` in `region`.
    pub fn new(
        config: Config,
        credentials: BuiltinCredentials,
        role_arn: &str,
        external_id: &str,
        region: &str,
    ) -> Self {
        Self {
            config,
            credentials,
            role_arn: role_arn.to_string(),
            external_id: external_id.to_string(),
            region: region.to_string(),
            parser: Box::new(AssumeRoleResponseParser),
        }
    }

    /// Replace the response parser.
    pub fn with_parser(mut self, parser: impl ParseCredentials) -> Self {
        self.parser = Box::new(parser);
        self
    }

    fn build_request(&self, endpoint: &str) -> Result<http::Request<Bytes>> {
        let session_name = format!(
            "{}-{}",
            self.config.role_session_name_prefix,
            now().timestamp_millis()
        );
        let body = form_urlencoded::Serializer::new(String::new())
            .append_pair("Action", "AssumeRole")
            .append_pair("RoleArn", &self.role_arn)
            .append_pair("ExternalId", &self.external_id)
            .append_pair("RoleSessionName", &session_name)
            .append_pair("DurationSeconds", &ASSUME_ROLE_DURATION_SECONDS.to_string())
            .append_pair("Version", STS_API_VERSION)
            .finish();

        let req = http::Request::builder()
            .method(http::Method::POST)
            .uri(endpoint)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(X_AMZ_CONTENT_SHA_256, hex_sha256(body.as_bytes()))
            .body(Bytes::from(body))
            .map_err(|e| {
                Error::request_invalid("failed to build STS AssumeRole request")
                    .with_source(e)
                    .with_context(format!("endpoint: {endpoint}"))
            })?;

        let (mut parts, body) = req.into_parts();
        RequestSigner::new("sts", &self.region)
            .sign_request(&mut parts, &Credential::from(&self.credentials))?;
        Ok(http::Request::from_parts(parts, body))
    }
}

#[async_trait]
impl ProvideCredential for BuiltinStsCredentialProvider {
    type Credential = TemporaryCredentials;

    async fn provide_credential(&self, ctx: &Context) -> Result<Self::Credential> {
        if self.credentials.access_key_id.is_empty()
            || self.credentials.secret_access_key.is_empty()
        {
            return Err(Error::builtin_credentials_missing());
        }

        check_region(&self.region)?;
        let endpoint = sts_endpoint(&self.config, &self.region);
        let req = self.build_request(&endpoint).map_err(|e| {
            warn!("STS AssumeRole request to {endpoint} could not be built: {e}");
            Error::sts_request_failed(format!("STS AssumeRole request failed: {e}"))
                .with_source(e)
                .with_context(format!("role_arn: {}", self.role_arn))
                .with_context(format!("region: {}", self.region))
        })?;
        debug!("assuming role {} via {endpoint}", self.role_arn);

        let resp = ctx.http_send_as_string(req).await.map_err(|e| {
            warn!("STS AssumeRole request for {} failed: {e}", self.role_arn);
            Error::sts_request_failed(format!("STS AssumeRole request failed: {e}"))
                .with_source(e)
                .with_context(format!("role_arn: {}", self.role_arn))
                .with_context(format!("region: {}", self.region))
        })?;

        let status = resp.status();
        let body = resp.into_body();
        if !status.is_success() {
            return Err(sts_response_error("AssumeRole", status, &body)
                .with_context(format!("role_arn: {}", self.role_arn))
                .with_context(format!("region: {}", self.region)));
        }

        self.parser.parse(&body).ok_or_else(|| {
            warn!(
                "STS AssumeRole response for {} could not be parsed, length {}",
                self.role_arn,
                body.len()
            );
            Error::sts_request_failed("STS response received but credentials could not be parsed")
                .with_context(format!("response_length: {}", body.len()))
                .with_context(format!("role_arn: {}", self.role_arn))
                .with_context(format!("region: {}", self.region))
        })
    }
}
