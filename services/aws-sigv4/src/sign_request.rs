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

use std::fmt::Write;

use http::request::Parts;
use http::{header, HeaderValue};
use log::debug;
use percent_encoding::{percent_decode_str, utf8_percent_encode};
use stsbroker_core::hash::{hex_hmac_sha256, hex_sha256, hmac_sha256};
use stsbroker_core::time::{format_date, format_iso8601, now, DateTime};
use stsbroker_core::{Error, Result, SignRequest, SigningRequest};

use crate::constants::{
    AWS_QUERY_ENCODE_SET, AWS_URI_ENCODE_SET, X_AMZ_CONTENT_SHA_256, X_AMZ_DATE,
    X_AMZ_SECURITY_TOKEN,
};
use crate::credential::Credential;

/// RequestSigner signs requests with AWS SigV4 in the `Authorization` header.
///
/// - [Signature Version 4 signing process](https://docs.aws.amazon.com/general/latest/gr/signature-version-4.html)
#[derive(Debug)]
pub struct RequestSigner {
    service: String,
    region: String,

    time: Option<DateTime>,
}

impl RequestSigner {
    /// Create a signer for the given service and region.
    pub fn new(service: &str, region: &str) -> Self {
        Self {
            service: service.into(),
            region: region.into(),

            time: None,
        }
    }

    /// Specify the signing time.
    ///
    /// # Note
    ///
    /// We should always take current time to sign requests.
    /// Only use this function for testing.
    #[cfg(test)]
    pub fn with_time(mut self, time: DateTime) -> Self {
        self.time = Some(time);
        self
    }
}

impl SignRequest for RequestSigner {
    type Credential = Credential;

    fn sign_request(&self, req: &mut Parts, cred: &Self::Credential) -> Result<()> {
        let now = self.time.unwrap_or_else(now);
        let mut signed_req = SigningRequest::build(req)?;

        canonicalize_header(&mut signed_req, cred, now)?;
        canonicalize_query(&mut signed_req);

        let creq = canonical_request_string(&signed_req)?;
        let encoded_req = hex_sha256(creq.as_bytes());

        // Scope: "20220313/<region>/<service>/aws4_request"
        let scope = format!(
            "{}/{}/{}/aws4_request",
            format_date(now),
            self.region,
            self.service
        );
        debug!("calculated scope: {scope}");

        // StringToSign:
        //
        // AWS4-HMAC-SHA256
        // 20220313T072004Z
        // 20220313/<region>/<service>/aws4_request
        // <hashed_canonical_request>
        let string_to_sign = format!(
            "AWS4-HMAC-SHA256\n{}\n{scope}\n{encoded_req}",
            format_iso8601(now)
        );
        debug!("calculated string to sign: {string_to_sign}");

        let signing_key =
            generate_signing_key(&cred.secret_access_key, now, &self.region, &self.service);
        let signature = hex_hmac_sha256(&signing_key, string_to_sign.as_bytes());

        let mut authorization = HeaderValue::from_str(&format!(
            "AWS4-HMAC-SHA256 Credential={}/{}, SignedHeaders={}, Signature={}",
            cred.access_key_id,
            scope,
            signed_req.header_name_to_vec_sorted().join(";"),
            signature
        ))
        .map_err(|e| {
            Error::request_invalid("failed to create authorization header").with_source(e)
        })?;
        authorization.set_sensitive(true);
        signed_req
            .headers
            .insert(header::AUTHORIZATION, authorization);

        signed_req.apply(req)
    }
}

fn canonical_request_string(ctx: &SigningRequest) -> Result<String> {
    // 256 is specially chosen to avoid reallocation for most requests.
    let mut f = String::with_capacity(256);

    writeln!(f, "{}", ctx.method)?;
    let path = percent_decode_str(&ctx.path)
        .decode_utf8()
        .map_err(|e| Error::request_invalid("request path is not valid utf-8").with_source(e))?;
    writeln!(f, "{}", utf8_percent_encode(&path, &AWS_URI_ENCODE_SET))?;
    writeln!(
        f,
        "{}",
        ctx.query
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&")
    )?;

    let signed_headers = ctx.header_name_to_vec_sorted();
    for name in signed_headers.iter() {
        let value = ctx.headers[*name].to_str().map_err(|e| {
            Error::request_invalid(format!("header {name} is not visible ascii")).with_source(e)
        })?;
        writeln!(f, "{name}:{value}")?;
    }
    writeln!(f)?;
    writeln!(f, "{}", signed_headers.join(";"))?;

    // canonicalize_header always sets the payload hash.
    let payload = ctx.headers[X_AMZ_CONTENT_SHA_256]
        .to_str()
        .map_err(|e| Error::request_invalid("invalid payload hash header").with_source(e))?;
    write!(f, "{payload}")?;

    Ok(f)
}

fn canonicalize_header(ctx: &mut SigningRequest, cred: &Credential, now: DateTime) -> Result<()> {
    // Header names and values need to be normalized according to Step 4 of https://docs.aws.amazon.com/general/latest/gr/sigv4-create-canonical-request.html
    for (_, value) in ctx.headers.iter_mut() {
        SigningRequest::header_value_normalize(value)
    }

    if ctx.headers.get(header::HOST).is_none() {
        let host = HeaderValue::from_str(ctx.authority.as_str())
            .map_err(|e| Error::request_invalid("invalid request authority").with_source(e))?;
        ctx.headers.insert(header::HOST, host);
    }

    if ctx.headers.get(X_AMZ_DATE).is_none() {
        let date = HeaderValue::try_from(format_iso8601(now))?;
        ctx.headers.insert(X_AMZ_DATE, date);
    }

    if ctx.headers.get(X_AMZ_CONTENT_SHA_256).is_none() {
        ctx.headers.insert(
            X_AMZ_CONTENT_SHA_256,
            HeaderValue::from_static("UNSIGNED-PAYLOAD"),
        );
    }

    if let Some(token) = &cred.session_token {
        let mut value = HeaderValue::from_str(token).map_err(|e| {
            Error::request_invalid("session token is not a valid header value").with_source(e)
        })?;
        value.set_sensitive(true);

        ctx.headers.insert(X_AMZ_SECURITY_TOKEN, value);
    }

    Ok(())
}

fn canonicalize_query(ctx: &mut SigningRequest) {
    if ctx.query.is_empty() {
        return;
    }

    ctx.query.sort();
    ctx.query = ctx
        .query
        .iter()
        .map(|(k, v)| {
            (
                utf8_percent_encode(k, &AWS_QUERY_ENCODE_SET).to_string(),
                utf8_percent_encode(v, &AWS_QUERY_ENCODE_SET).to_string(),
            )
        })
        .collect();
}

fn generate_signing_key(secret: &str, time: DateTime, region: &str, service: &str) -> Vec<u8> {
    let secret = format!("AWS4{secret}");
    let sign_date = hmac_sha256(secret.as_bytes(), format_date(time).as_bytes());
    let sign_region = hmac_sha256(sign_date.as_slice(), region.as_bytes());
    let sign_service = hmac_sha256(sign_region.as_slice(), service.as_bytes());
    hmac_sha256(sign_service.as_slice(), "aws4_request".as_bytes())
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;
    use aws_credential_types::Credentials;
    use aws_sigv4::http_request::{
        PayloadChecksumKind, PercentEncodingMode, SignableBody, SignableRequest, SigningSettings,
    };
    use aws_sigv4::sign::v4;
    use http::Request;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn get_caller_identity() -> Request<&'static str> {
        Request::get("https://sts.us-east-1.amazonaws.com/?Action=GetCallerIdentity&Version=2011-06-15")
            .header(X_AMZ_CONTENT_SHA_256, crate::constants::EMPTY_STRING_SHA256)
            .body("")
            .expect("request must be valid")
    }

    fn assume_role() -> Request<&'static str> {
        let body = "Action=AssumeRole&RoleArn=arn%3Aaws%3Aiam%3A%3A123456789012%3Arole%2Fdemo&ExternalId=ext&RoleSessionName=stsbroker-1700000000000&DurationSeconds=3600&Version=2011-06-15";
        Request::post("https://sts.eu-west-1.amazonaws.com/")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(X_AMZ_CONTENT_SHA_256, hex_sha256(body.as_bytes()))
            .body(body)
            .expect("request must be valid")
    }

    fn unsigned_payload_with_query() -> Request<&'static str> {
        Request::get("http://127.0.0.1:9000/bucket/key?prefix=CI/&list-type=2")
            .header("x-amz-meta-owner", "broker")
            .body("")
            .expect("request must be valid")
    }

    fn sorted_headers(req: &Request<&str>) -> Vec<String> {
        let mut hs = req
            .headers()
            .iter()
            .map(|(k, v)| format!("{}:{}", k, v.to_str().expect("must be valid")))
            .collect::<Vec<_>>();
        let host = format!(
            "host:{}",
            req.uri().authority().expect("authority must exist")
        );
        if !hs.contains(&host) {
            hs.push(host)
        }
        hs.sort();
        hs
    }

    fn sorted_query(req: &Request<&str>) -> Vec<String> {
        let query = req.uri().query().unwrap_or_default();
        let mut query = form_urlencoded::parse(query.as_bytes())
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>();
        query.sort();
        query
    }

    #[test_case(get_caller_identity, "sts", "us-east-1", None; "get caller identity")]
    #[test_case(get_caller_identity, "sts", "us-east-1", Some("session-token"); "get caller identity with token")]
    #[test_case(assume_role, "sts", "eu-west-1", None; "assume role")]
    #[test_case(unsigned_payload_with_query, "s3", "test", Some("session-token"); "unsigned payload with query")]
    fn test_matches_aws_sigv4(
        req_fn: fn() -> Request<&'static str>,
        service: &str,
        region: &str,
        token: Option<&str>,
    ) {
        let _ = env_logger::builder().is_test(true).try_init();
        let now = now();

        let mut ss = SigningSettings::default();
        ss.percent_encoding_mode = PercentEncodingMode::Double;
        ss.payload_checksum_kind = PayloadChecksumKind::XAmzSha256;
        let id = Credentials::new(
            "access_key_id",
            "secret_access_key",
            token.map(str::to_string),
            None,
            "hardcoded-credentials",
        )
        .into();
        let sp = v4::SigningParams::builder()
            .identity(&id)
            .region(region)
            .name(service)
            .time(SystemTime::from(now))
            .settings(ss)
            .build()
            .expect("signing params must be valid");

        let mut expected = req_fn();
        let body = if expected.headers().get(X_AMZ_CONTENT_SHA_256).is_some() {
            SignableBody::Bytes(expected.body().as_bytes())
        } else {
            SignableBody::UnsignedPayload
        };
        let output = aws_sigv4::http_request::sign(
            SignableRequest::new(
                expected.method().as_str(),
                expected.uri().to_string(),
                expected
                    .headers()
                    .iter()
                    .map(|(k, v)| (k.as_str(), v.to_str().expect("must be valid"))),
                body,
            )
            .expect("request must be signable"),
            &sp.into(),
        )
        .expect("reference signing must succeed");
        let (aws_sig, _) = output.into_parts();
        aws_sig.apply_to_request_http1x(&mut expected);

        let (mut parts, body) = req_fn().into_parts();
        let cred = Credential {
            access_key_id: "access_key_id".to_string(),
            secret_access_key: "secret_access_key".to_string(),
            session_token: token.map(str::to_string),
        };
        RequestSigner::new(service, region)
            .with_time(now)
            .sign_request(&mut parts, &cred)
            .expect("signing must succeed");
        let actual = Request::from_parts(parts, body);

        assert_eq!(sorted_headers(&expected), sorted_headers(&actual));
        assert_eq!(sorted_query(&expected), sorted_query(&actual));
    }

    #[test]
    fn test_sign_marks_secrets_sensitive() {
        let (mut parts, _) = get_caller_identity().into_parts();
        let cred = Credential {
            access_key_id: "access_key_id".to_string(),
            secret_access_key: "secret_access_key".to_string(),
            session_token: Some("session-token".to_string()),
        };

        RequestSigner::new("sts", "us-east-1")
            .sign_request(&mut parts, &cred)
            .expect("signing must succeed");

        let auth = &parts.headers[header::AUTHORIZATION];
        assert!(auth.is_sensitive());
        assert!(auth
            .to_str()
            .expect("must be valid")
            .contains("/us-east-1/sts/aws4_request, SignedHeaders=host;x-amz-content-sha256;x-amz-date;x-amz-security-token, Signature="));
        assert!(parts.headers[X_AMZ_SECURITY_TOKEN].is_sensitive());
    }

    #[test]
    fn test_sign_defaults_unsigned_payload() {
        let (mut parts, _) = Request::get("http://127.0.0.1:9000/bucket/key")
            .header("x-amz-meta-owner", "  broker ")
            .body(())
            .expect("request must be valid")
            .into_parts();
        let cred = Credential {
            access_key_id: "access_key_id".to_string(),
            secret_access_key: "secret_access_key".to_string(),
            session_token: None,
        };

        RequestSigner::new("s3", "test")
            .sign_request(&mut parts, &cred)
            .expect("signing must succeed");
        assert_eq!(parts.headers[X_AMZ_CONTENT_SHA_256], "UNSIGNED-PAYLOAD");
        assert!(parts.headers.get(X_AMZ_SECURITY_TOKEN).is_none());
        assert_eq!(parts.headers["x-amz-meta-owner"], "broker");
    }
}
