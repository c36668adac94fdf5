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
use http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use http::{HeaderMap, HeaderName, HeaderValue};
use log::{debug, warn};
use stsbroker_core::hash::base64_encode;
use stsbroker_core::{Context, Error, ProvideCredential, Result};

use crate::credential::TemporaryCredentials;
use crate::parse::{JsonCredentialsParser, ParseCredentials};
use crate::secrets::StsAuth;
use crate::settings::StsEndpoint;

/// CustomStsCredentialProvider asks a tenant operated endpoint for
/// temporary credentials.
///
/// The endpoint receives `{role_arn, external_id, region, service}` as JSON
/// and answers with the credentials as JSON.
#[derive(Debug)]
pub struct CustomStsCredentialProvider {
    endpoint: StsEndpoint,

    role_arn: String,
    external_id: String,
    region: String,
    service: String,

    parser: Box<dyn ParseCredentials>,
}

impl CustomStsCredentialProvider {
    /// Create a provider requesting credentials for `role_arn`.
    pub fn new(
        endpoint: StsEndpoint,
        role_arn: &str,
        external_id: &str,
        region: &str,
        service: &str,
    ) -> Self {
        Self {
            endpoint,
            role_arn: role_arn.to_string(),
            external_id: external_id.to_string(),
            region: region.to_string(),
            service: service.to_string(),
            parser: Box::new(JsonCredentialsParser),
        }
    }

    /// Replace the response parser.
    pub fn with_parser(mut self, parser: impl ParseCredentials) -> Self {
        self.parser = Box::new(parser);
        self
    }

    fn build_request(&self) -> Result<http::Request<Bytes>> {
        let body = serde_json::json!({
            "role_arn": self.role_arn,
            "external_id": self.external_id,
            "region": self.region,
            "service": self.service,
        });

        let mut req = http::Request::builder()
            .method(http::Method::POST)
            .uri(&self.endpoint.url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .body(Bytes::from(body.to_string()))
            .map_err(|e| {
                Error::request_invalid("failed to build custom STS request")
                    .with_source(e)
                    .with_context(format!("endpoint: {}", self.endpoint.url))
            })?;
        req.headers_mut()
            .extend(auth_headers(self.endpoint.auth.as_ref())?);
        Ok(req)
    }
}

/// Headers authenticating the broker to a custom STS endpoint.
///
/// - `api_key`: the configured header set to the key.
/// - `basic`: `authorization: Basic base64(username:password)`.
/// - no auth: no headers.
pub fn auth_headers(auth: Option<&StsAuth>) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();

    match auth {
        Some(StsAuth::ApiKey { header, value }) => {
            let name = HeaderName::from_bytes(header.as_bytes()).map_err(|e| {
                Error::request_invalid(format!("invalid api key header name: {header}"))
                    .with_source(e)
            })?;
            let mut value = HeaderValue::from_str(value)
                .map_err(|e| Error::request_invalid("invalid api key value").with_source(e))?;
            value.set_sensitive(true);
            headers.insert(name, value);
        }
        Some(StsAuth::Basic { username, password }) => {
            let token = base64_encode(format!("{username}:{password}").as_bytes());
            let mut value = HeaderValue::from_str(&format!("Basic {token}"))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }
        None => {}
    }

    Ok(headers)
}

#[async_trait]
impl ProvideCredential for CustomStsCredentialProvider {
    type Credential = TemporaryCredentials;

    async fn provide_credential(&self, ctx: &Context) -> Result<Self::Credential> {
        if self.endpoint.url.trim().is_empty() {
            return Err(Error::sts_endpoint_missing());
        }

        let req = self.build_request().map_err(|e| {
            warn!("custom STS request to {} could not be built: {e}", self.endpoint.url);
            Error::sts_request_failed(format!("custom STS request failed: {e}"))
                .with_source(e)
                .with_context(format!("endpoint: {}", self.endpoint.url))
                .with_context(format!("role_arn: {}", self.role_arn))
        })?;
        debug!(
            "requesting credentials for {} from {}",
            self.role_arn, self.endpoint.url
        );

        let resp = ctx.http_send_as_string(req).await.map_err(|e| {
            warn!("custom STS request to {} failed: {e}", self.endpoint.url);
            Error::sts_request_failed(format!("custom STS request failed: {e}"))
                .with_source(e)
                .with_context(format!("endpoint: {}", self.endpoint.url))
                .with_context(format!("role_arn: {}", self.role_arn))
        })?;

        let status = resp.status();
        let body = resp.into_body();
        if !status.is_success() {
            warn!(
                "custom STS endpoint {} responded with status {status}",
                self.endpoint.url
            );
            return Err(Error::sts_request_failed(format!(
                "custom STS request failed with status {}",
                status.as_u16()
            ))
            .with_context(format!("endpoint: {}", self.endpoint.url))
            .with_context(format!("role_arn: {}", self.role_arn)));
        }

        self.parser.parse(&body).ok_or_else(|| {
            warn!(
                "custom STS response from {} could not be parsed, length {}",
                self.endpoint.url,
                body.len()
            );
            Error::sts_request_failed(
                "custom STS response received but credentials could not be parsed",
            )
            .with_context(format!("response_length: {}", body.len()))
            .with_context(format!("endpoint: {}", self.endpoint.url))
            .with_context(format!("role_arn: {}", self.role_arn))
        })
    }
}
