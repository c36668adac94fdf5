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

//! [`HttpSend`] implementation backed by [`reqwest`].
//!
//! The body is collected as raw bytes without content decoding, so STS
//! responses reach the broker's parsers exactly as the server sent them.

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::BodyExt;
use reqwest::{Client, Request};
use stsbroker_core::{Error, HttpSend, Result};

/// ReqwestHttpSend sends requests with a shared [`reqwest::Client`].
///
/// Timeouts, proxies and TLS settings are whatever the client was built with;
/// the broker imposes none of its own.
#[derive(Debug, Default, Clone)]
pub struct ReqwestHttpSend {
    client: Client,
}

impl ReqwestHttpSend {
    /// Create a new ReqwestHttpSend with a reqwest::Client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpSend for ReqwestHttpSend {
    async fn http_send(&self, req: http::Request<Bytes>) -> Result<http::Response<Bytes>> {
        let req = Request::try_from(req)
            .map_err(|e| Error::request_invalid("failed to convert http request").with_source(e))?;
        let url = req.url().to_string();

        let resp = self.client.execute(req).await.map_err(|e| {
            Error::unexpected(format!("http request failed: {e}"))
                .with_source(e)
                .with_context(format!("url: {url}"))
        })?;
        let resp: http::Response<_> = resp.into();

        let (parts, body) = resp.into_parts();
        let bs = BodyExt::collect(body)
            .await
            .map(|buf| buf.to_bytes())
            .map_err(|e| {
                Error::unexpected(format!("failed to read response body: {e}"))
                    .with_source(e)
                    .with_context(format!("url: {url}"))
            })?;
        Ok(http::Response::from_parts(parts, bs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stsbroker_core::{Context, ErrorKind};
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_http_send_returns_raw_body() {
        let server = MockServer::start().await;
        let xml = "<AssumeRoleResponse><AccessKeyId>AKIA</AccessKeyId></AssumeRoleResponse>";
        Mock::given(method("POST"))
            .and(path("/"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string("Action=AssumeRole"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(xml, "text/xml"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let ctx = Context::new().with_http_send(ReqwestHttpSend::default());
        let req = http::Request::builder()
            .method("POST")
            .uri(format!("{}/", server.uri()))
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Bytes::from_static(b"Action=AssumeRole"))
            .expect("request must be valid");

        let resp = ctx.http_send_as_string(req).await.expect("send must succeed");
        assert_eq!(resp.status(), http::StatusCode::OK);
        assert_eq!(resp.body(), xml);
    }

    #[tokio::test]
    async fn test_http_send_keeps_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("denied"))
            .mount(&server)
            .await;

        let ctx = Context::new().with_http_send(ReqwestHttpSend::default());
        let req = http::Request::builder()
            .method("POST")
            .uri(server.uri())
            .body(Bytes::new())
            .expect("request must be valid");

        let resp = ctx.http_send_as_string(req).await.expect("send must succeed");
        assert_eq!(resp.status(), http::StatusCode::FORBIDDEN);
        assert_eq!(resp.body(), "denied");
    }

    #[tokio::test]
    async fn test_http_send_transport_error() {
        let ctx = Context::new().with_http_send(ReqwestHttpSend::default());
        // Port 9 (discard) is never served in test environments.
        let req = http::Request::builder()
            .method("POST")
            .uri("http://127.0.0.1:9/")
            .body(Bytes::new())
            .expect("request must be valid");

        let err = ctx.http_send(req).await.expect_err("send must fail");
        assert_eq!(err.kind(), ErrorKind::Unexpected);
        assert!(err.context()[0].starts_with("url: http://127.0.0.1:9/"));
    }
}
