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

//! Turn upstream STS responses into [`TemporaryCredentials`].

use std::fmt::Debug;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use stsbroker_core::time::{from_epoch_millis, from_epoch_seconds, parse_loose, DateTime};

use crate::constants::EPOCH_MILLIS_THRESHOLD;
use crate::credential::TemporaryCredentials;

/// ParseCredentials turns a raw response body into credentials.
///
/// Returns `None` when the body doesn't carry all three secrets.
pub trait ParseCredentials: Debug + Send + Sync + 'static {
    /// Parse the body.
    fn parse(&self, body: &str) -> Option<TemporaryCredentials>;
}

/// Parser for AWS STS `AssumeRole` responses, JSON or XML.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeRoleResponseParser;

impl ParseCredentials for AssumeRoleResponseParser {
    fn parse(&self, body: &str) -> Option<TemporaryCredentials> {
        parse_assume_role_response(body)
    }
}

/// Parser for custom endpoint JSON responses.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCredentialsParser;

impl ParseCredentials for JsonCredentialsParser {
    fn parse(&self, body: &str) -> Option<TemporaryCredentials> {
        let value: Value = serde_json::from_str(body).ok()?;
        normalize_credentials(&value)
    }
}

/// Parse an AWS STS `AssumeRole` response.
///
/// JSON is tried first, reading
/// `AssumeRoleResponse.AssumeRoleResult.Credentials`. Only when the body is
/// not JSON at all does it fall back to plain `<Tag>value</Tag>` extraction,
/// which is enough for the XML STS actually returns.
pub fn parse_assume_role_response(body: &str) -> Option<TemporaryCredentials> {
    match serde_json::from_str::<Value>(body) {
        Ok(value) => {
            let creds = value
                .get("AssumeRoleResponse")?
                .get("AssumeRoleResult")?
                .get("Credentials")?;
            Some(TemporaryCredentials {
                access_key_id: json_str(creds, "AccessKeyId")?,
                secret_access_key: json_str(creds, "SecretAccessKey")?,
                session_token: json_str(creds, "SessionToken")?,
                expires_at: expiration(creds.get("Expiration")),
            })
        }
        Err(_) => Some(TemporaryCredentials {
            access_key_id: extract_tag(body, "AccessKeyId")?,
            secret_access_key: extract_tag(body, "SecretAccessKey")?,
            session_token: extract_tag(body, "SessionToken")?,
            expires_at: extract_tag(body, "Expiration")
                .and_then(|v| parse_expiration_str(&v))
                .unwrap_or_else(TemporaryCredentials::default_expiry),
        }),
    }
}

/// Normalize a custom endpoint's JSON credentials.
///
/// Accepts the credentials at the top level or nested under `credentials`,
/// with camelCase or snake_case field names; camelCase wins when both are
/// present. The expiration is read from `expiresAt`, `expires_at` or
/// `expiration`, in that order.
pub fn normalize_credentials(value: &Value) -> Option<TemporaryCredentials> {
    let obj = match value.get("credentials") {
        Some(v) if v.is_object() => v,
        _ => value,
    };
    let field = |camel: &str, snake: &str| json_str(obj, camel).or_else(|| json_str(obj, snake));

    let expires_at = ["expiresAt", "expires_at", "expiration"]
        .iter()
        .find_map(|k| obj.get(*k).filter(|v| !v.is_null()));

    Some(TemporaryCredentials {
        access_key_id: field("accessKeyId", "access_key_id")?,
        secret_access_key: field("secretAccessKey", "secret_access_key")?,
        session_token: field("sessionToken", "session_token")?,
        expires_at: expiration(expires_at),
    })
}

/// Error details reported by AWS STS on a failed call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StsErrorDetails {
    /// AWS error code, like `AccessDenied`.
    pub code: Option<String>,
    /// Human readable error message.
    pub message: Option<String>,
}

/// Pull `Code` and `Message` out of an STS error body, JSON or XML.
pub fn parse_sts_error(body: &str) -> StsErrorDetails {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        let err = value
            .get("ErrorResponse")
            .unwrap_or(&value)
            .get("Error")
            .unwrap_or(&Value::Null);
        return StsErrorDetails {
            code: json_str(err, "Code"),
            message: json_str(err, "Message"),
        };
    }

    StsErrorDetails {
        code: extract_tag(body, "Code"),
        message: extract_tag(body, "Message"),
    }
}

static TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<([A-Za-z][A-Za-z0-9]*)>([^<]*)</([A-Za-z][A-Za-z0-9]*)>")
        .expect("tag pattern must be valid")
});

/// Value of the first `<tag>value</tag>` in `body`, trimmed, if non-empty.
///
/// No namespaces, entities or nesting: this is not an XML parser.
fn extract_tag(body: &str, tag: &str) -> Option<String> {
    TAG.captures_iter(body)
        .find(|c| &c[1] == tag && &c[3] == tag)
        .map(|c| c[2].trim().to_string())
        .filter(|v| !v.is_empty())
}

fn json_str(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)?
        .as_str()
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn expiration(value: Option<&Value>) -> DateTime {
    let parsed = match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|v| v as i64))
            .and_then(from_epoch),
        Some(Value::String(s)) => parse_expiration_str(s),
        _ => None,
    };
    parsed.unwrap_or_else(TemporaryCredentials::default_expiry)
}

fn parse_expiration_str(s: &str) -> Option<DateTime> {
    match s.trim().parse::<i64>() {
        Ok(n) => from_epoch(n),
        Err(_) => parse_loose(s),
    }
}

fn from_epoch(n: i64) -> Option<DateTime> {
    if n > EPOCH_MILLIS_THRESHOLD {
        from_epoch_millis(n)
    } else {
        from_epoch_seconds(n)
    }
}
