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

//! Secret material of the SigV4 integration and how it moves between the
//! operator-submitted blob and the encrypted side-table.

use std::collections::HashMap;
use std::fmt::{Debug, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use stsbroker_core::utils::Redact;
use stsbroker_core::{Error, Result};

use crate::constants::{AWS_SIGV4_CONFIG_KEY, DEFAULT_API_KEY_HEADER, REDACTED_SENTINEL};
use crate::credential::BuiltinCredentials;
use crate::settings::{resolve_settings, ProviderConfig};

/// How the broker authenticates to a custom STS endpoint.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StsAuth {
    /// Send `value` in the `header` request header.
    ApiKey { header: String, value: String },
    /// Send `authorization: Basic base64(username:password)`.
    Basic { username: String, password: String },
}

impl Debug for StsAuth {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StsAuth::ApiKey { header, value } => f
                .debug_struct("ApiKey")
                .field("header", header)
                .field("value", &Redact::from(value))
                .finish(),
            StsAuth::Basic { username, password } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &Redact::from(password))
                .finish(),
        }
    }
}

impl StsAuth {
    /// Replace a redaction sentinel echoed back by an editor with the secret
    /// already stored in `previous`.
    pub fn merge_redacted(self, previous: Option<&StsAuth>) -> StsAuth {
        match (self, previous) {
            (StsAuth::ApiKey { header, value }, Some(StsAuth::ApiKey { value: old, .. }))
                if value == REDACTED_SENTINEL =>
            {
                StsAuth::ApiKey {
                    header,
                    value: old.clone(),
                }
            }
            (StsAuth::Basic { username, password }, Some(StsAuth::Basic { password: old, .. }))
                if password == REDACTED_SENTINEL =>
            {
                StsAuth::Basic {
                    username,
                    password: old.clone(),
                }
            }
            (v, _) => v,
        }
    }
}

/// An auth block as it appears in stored data, before normalization.
///
/// Every field is optional so that malformed entries can be read and then
/// rejected by [`RawStsAuth::normalize`] instead of failing the whole record.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawStsAuth {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl Debug for RawStsAuth {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawStsAuth")
            .field("kind", &self.kind)
            .field("header", &self.header)
            .field("value", &Redact::from(&self.value))
            .field("username", &self.username)
            .field("password", &Redact::from(&self.password))
            .finish()
    }
}

impl RawStsAuth {
    /// Turn the raw block into a usable [`StsAuth`].
    ///
    /// - `api_key` needs a non-empty `value`; `header` defaults to `x-api-key`.
    /// - `basic` needs a non-empty `password`; `username` defaults to empty.
    /// - anything else yields `None`.
    pub fn normalize(&self) -> Option<StsAuth> {
        match self.kind.as_deref() {
            Some("api_key") => {
                let value = self.value.clone().filter(|v| !v.is_empty())?;
                let header = self
                    .header
                    .clone()
                    .filter(|v| !v.is_empty())
                    .unwrap_or_else(|| DEFAULT_API_KEY_HEADER.to_string());
                Some(StsAuth::ApiKey { header, value })
            }
            Some("basic") => {
                let password = self.password.clone().filter(|v| !v.is_empty())?;
                Some(StsAuth::Basic {
                    username: self.username.clone().unwrap_or_default(),
                    password,
                })
            }
            _ => None,
        }
    }

    /// Normalize an arbitrary JSON value; non-objects and mistyped fields
    /// yield `None`.
    pub fn from_value(value: &Value) -> Option<StsAuth> {
        serde_json::from_value::<RawStsAuth>(value.clone())
            .ok()?
            .normalize()
    }
}

impl From<StsAuth> for RawStsAuth {
    fn from(v: StsAuth) -> Self {
        match v {
            StsAuth::ApiKey { header, value } => RawStsAuth {
                kind: Some("api_key".to_string()),
                header: Some(header),
                value: Some(value),
                ..Default::default()
            },
            StsAuth::Basic { username, password } => RawStsAuth {
                kind: Some("basic".to_string()),
                username: Some(username),
                password: Some(password),
                ..Default::default()
            },
        }
    }
}

/// The platform key as stored in the side-table.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoredBuiltinCredentials {
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
}

impl Debug for StoredBuiltinCredentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredBuiltinCredentials")
            .field("aws_access_key_id", &Redact::from(&self.aws_access_key_id))
            .field(
                "aws_secret_access_key",
                &Redact::from(&self.aws_secret_access_key),
            )
            .finish()
    }
}

impl StoredBuiltinCredentials {
    /// Both halves of the key, or `None` if either is empty.
    pub fn to_builtin(&self) -> Option<BuiltinCredentials> {
        if self.aws_access_key_id.is_empty() || self.aws_secret_access_key.is_empty() {
            return None;
        }
        Some(BuiltinCredentials {
            access_key_id: self.aws_access_key_id.clone(),
            secret_access_key: self.aws_secret_access_key.clone(),
        })
    }

    /// Replace a redacted secret key with the one already stored in `previous`.
    pub fn merge_redacted(mut self, previous: Option<&StoredBuiltinCredentials>) -> Self {
        if self.aws_secret_access_key == REDACTED_SENTINEL {
            if let Some(prev) = previous {
                self.aws_secret_access_key = prev.aws_secret_access_key.clone();
            }
        }
        self
    }
}

/// Encrypted side-table entries owned by the SigV4 integration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AwsSigV4Secrets {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sts_credentials: Option<StoredBuiltinCredentials>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sts_auth: Option<RawStsAuth>,
}

impl AwsSigV4Secrets {
    /// Copy with every secret value replaced by the redaction sentinel, for
    /// display to operators.
    pub fn redacted(&self) -> Self {
        let redact = |v: &mut String| {
            if !v.is_empty() {
                *v = REDACTED_SENTINEL.to_string();
            }
        };

        let mut out = self.clone();
        if let Some(cred) = out.sts_credentials.as_mut() {
            redact(&mut cred.aws_secret_access_key);
        }
        if let Some(auth) = out.sts_auth.as_mut() {
            if let Some(v) = auth.value.as_mut() {
                redact(v);
            }
            if let Some(v) = auth.password.as_mut() {
                redact(v);
            }
        }
        out
    }
}

/// The secrets side-table of a provider configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegrationSecrets {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aws_sigv4: Option<AwsSigV4Secrets>,
}

/// Result of [`extract_secrets`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractedSecrets {
    /// The blob with every secret field removed.
    pub cleaned_json: String,
    /// Normalized custom endpoint auth, if the blob carried a usable one.
    pub sts_auth: Option<StsAuth>,
    /// Platform key, if the blob carried both halves in builtin mode.
    pub builtin_credentials: Option<StoredBuiltinCredentials>,
}

impl ExtractedSecrets {
    fn unchanged(raw: &str) -> Self {
        Self {
            cleaned_json: raw.to_string(),
            sts_auth: None,
            builtin_credentials: None,
        }
    }
}

/// Result of [`extract_sts_auth_from_config`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractedStsAuth {
    pub cleaned_json: String,
    pub sts_auth: Option<StsAuth>,
}

fn non_empty_str(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(Value::as_str)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Split secret fields out of an operator-submitted `aws_sigv4_config` blob.
///
/// - In builtin mode with both `awsAccessKeyId` and `awsSecretAccessKey`
///   non-empty, both are removed and returned.
/// - `stsEndpoint.auth` is always removed when present, and returned only
///   when it normalizes to a usable [`StsAuth`].
///
/// Input that isn't a JSON object is returned unchanged with nothing
/// extracted. Applying this to its own `cleaned_json` extracts nothing more.
pub fn extract_secrets(raw: &str) -> ExtractedSecrets {
    let Ok(Value::Object(mut obj)) = serde_json::from_str::<Value>(raw) else {
        return ExtractedSecrets::unchanged(raw);
    };

    let mut builtin_credentials = None;
    if obj.get("stsMode").and_then(Value::as_str) == Some("builtin") {
        if let (Some(ak), Some(sk)) = (
            non_empty_str(&obj, "awsAccessKeyId"),
            non_empty_str(&obj, "awsSecretAccessKey"),
        ) {
            obj.remove("awsAccessKeyId");
            obj.remove("awsSecretAccessKey");
            builtin_credentials = Some(StoredBuiltinCredentials {
                aws_access_key_id: ak,
                aws_secret_access_key: sk,
            });
        }
    }

    let mut sts_auth = None;
    if let Some(Value::Object(endpoint)) = obj.get_mut("stsEndpoint") {
        if let Some(auth) = endpoint.remove("auth") {
            sts_auth = RawStsAuth::from_value(&auth);
        }
    }

    ExtractedSecrets {
        cleaned_json: Value::Object(obj).to_string(),
        sts_auth,
        builtin_credentials,
    }
}

/// Legacy form of [`extract_secrets`] that only reports the endpoint auth.
#[deprecated(note = "use extract_secrets, which also extracts builtin credentials")]
pub fn extract_sts_auth_from_config(raw: &str) -> ExtractedStsAuth {
    let extracted = extract_secrets(raw);
    ExtractedStsAuth {
        cleaned_json: extracted.cleaned_json,
        sts_auth: extracted.sts_auth,
    }
}

/// Validate an operator's replacement `aws_sigv4_config` against `config`.
///
/// Rejects input that isn't JSON, then extracts its secrets, merges them
/// over the stored ones (resolving redaction sentinels) and checks the
/// result with [`resolve_settings`]. On success returns what should be
/// persisted: the cleaned blob and the merged secrets.
pub fn validate_config_update(config: &ProviderConfig, raw: &str) -> Result<ExtractedSecrets> {
    serde_json::from_str::<Value>(raw).map_err(|e| {
        Error::config_invalid("aws_sigv4_config must be valid JSON")
            .with_source(e)
            .with_context(format!("integration: {}", config.unique_key))
    })?;

    let mut extracted = extract_secrets(raw);
    let mut secrets = config
        .integration_secrets
        .as_ref()
        .and_then(|v| v.aws_sigv4.clone())
        .unwrap_or_default();

    if let Some(auth) = extracted.sts_auth.take() {
        let previous = secrets.sts_auth.as_ref().and_then(RawStsAuth::normalize);
        let auth = auth.merge_redacted(previous.as_ref());
        secrets.sts_auth = Some(auth.clone().into());
        extracted.sts_auth = Some(auth);
    }
    if let Some(cred) = extracted.builtin_credentials.take() {
        let cred = cred.merge_redacted(secrets.sts_credentials.as_ref());
        secrets.sts_credentials = Some(cred.clone());
        extracted.builtin_credentials = Some(cred);
    }

    let mut custom = config.custom.clone().unwrap_or_else(HashMap::new);
    custom.insert(
        AWS_SIGV4_CONFIG_KEY.to_string(),
        extracted.cleaned_json.clone(),
    );
    let simulated = ProviderConfig {
        custom: Some(custom),
        integration_secrets: Some(IntegrationSecrets {
            aws_sigv4: Some(secrets),
        }),
        ..config.clone()
    };
    resolve_settings(&simulated)?;

    Ok(extracted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::StsMode;
    use pretty_assertions::assert_eq;
    use stsbroker_core::ErrorKind;
    use test_case::test_case;

    fn json(raw: &str) -> Value {
        serde_json::from_str(raw).expect("must be json")
    }

    #[test]
    fn test_extract_builtin_credentials() {
        let raw = r#"{"service":"s3","stsMode":"builtin","awsAccessKeyId":"AKIATEST","awsSecretAccessKey":"testSecret"}"#;

        let out = extract_secrets(raw);
        assert_eq!(
            out.builtin_credentials,
            Some(StoredBuiltinCredentials {
                aws_access_key_id: "AKIATEST".to_string(),
                aws_secret_access_key: "testSecret".to_string(),
            })
        );
        assert_eq!(out.sts_auth, None);
        assert_eq!(
            json(&out.cleaned_json),
            json(r#"{"service":"s3","stsMode":"builtin"}"#)
        );
    }

    #[test_case(r#"{"service":"s3","stsMode":"builtin","awsAccessKeyId":"AKIATEST"}"#; "secret key missing")]
    #[test_case(r#"{"service":"s3","stsMode":"builtin","awsAccessKeyId":"AKIATEST","awsSecretAccessKey":""}"#; "secret key empty")]
    #[test_case(r#"{"service":"s3","stsMode":"custom","awsAccessKeyId":"AKIATEST","awsSecretAccessKey":"testSecret"}"#; "custom mode")]
    fn test_extract_keeps_partial_or_custom_keys(raw: &str) {
        let out = extract_secrets(raw);
        assert_eq!(out.builtin_credentials, None);
        assert_eq!(json(&out.cleaned_json), json(raw));
    }

    #[test]
    fn test_extract_sts_auth() {
        let raw = r#"{"service":"execute-api","stsEndpoint":{"url":"https://sts.example.com","auth":{"type":"api_key","header":"x-token","value":"k3y"}}}"#;

        let out = extract_secrets(raw);
        assert_eq!(
            out.sts_auth,
            Some(StsAuth::ApiKey {
                header: "x-token".to_string(),
                value: "k3y".to_string(),
            })
        );
        assert_eq!(
            json(&out.cleaned_json),
            json(r#"{"service":"execute-api","stsEndpoint":{"url":"https://sts.example.com"}}"#)
        );
    }

    #[test]
    fn test_extract_drops_unrecognized_auth() {
        let raw = r#"{"service":"s3","stsEndpoint":{"url":"https://sts.example.com","auth":{"type":"oauth","token":"t"}}}"#;

        let out = extract_secrets(raw);
        assert_eq!(out.sts_auth, None);
        assert_eq!(
            json(&out.cleaned_json),
            json(r#"{"service":"s3","stsEndpoint":{"url":"https://sts.example.com"}}"#)
        );
    }

    #[test_case("not json"; "invalid json")]
    #[test_case("[1,2,3]"; "array")]
    #[test_case(r#""string""#; "string")]
    fn test_extract_fails_open(raw: &str) {
        assert_eq!(extract_secrets(raw), ExtractedSecrets::unchanged(raw));
    }

    #[test]
    fn test_extract_is_idempotent() {
        let raw = r#"{"service":"s3","stsMode":"builtin","awsAccessKeyId":"AKIATEST","awsSecretAccessKey":"testSecret","stsEndpoint":{"url":"u","auth":{"type":"basic","password":"p"}}}"#;

        let first = extract_secrets(raw);
        let second = extract_secrets(&first.cleaned_json);
        assert_eq!(second.cleaned_json, first.cleaned_json);
        assert_eq!(second.sts_auth, None);
        assert_eq!(second.builtin_credentials, None);
    }

    #[test]
    #[allow(deprecated)]
    fn test_legacy_extract_sts_auth() {
        let raw = r#"{"service":"s3","stsMode":"builtin","awsAccessKeyId":"AKIATEST","awsSecretAccessKey":"testSecret","stsEndpoint":{"auth":{"type":"basic","username":"u","password":"p"}}}"#;

        let out = extract_sts_auth_from_config(raw);
        assert_eq!(
            out.sts_auth,
            Some(StsAuth::Basic {
                username: "u".to_string(),
                password: "p".to_string(),
            })
        );
        assert!(!out.cleaned_json.contains("testSecret"));
    }

    #[test_case(r#"{"type":"api_key","value":"v"}"#, Some(StsAuth::ApiKey { header: "x-api-key".to_string(), value: "v".to_string() }); "api key default header")]
    #[test_case(r#"{"type":"api_key","header":"","value":"v"}"#, Some(StsAuth::ApiKey { header: "x-api-key".to_string(), value: "v".to_string() }); "api key empty header")]
    #[test_case(r#"{"type":"api_key","header":"x-token"}"#, None; "api key without value")]
    #[test_case(r#"{"type":"basic","password":"p"}"#, Some(StsAuth::Basic { username: String::new(), password: "p".to_string() }); "basic without username")]
    #[test_case(r#"{"type":"basic","username":"u","password":""}"#, None; "basic empty password")]
    #[test_case(r#"{"header":"x","value":"v"}"#, None; "no type")]
    #[test_case(r#"{"type":"api_key","value":42}"#, None; "mistyped value")]
    #[test_case(r#""api_key""#, None; "not an object")]
    fn test_normalize_auth(raw: &str, expected: Option<StsAuth>) {
        assert_eq!(RawStsAuth::from_value(&json(raw)), expected);
    }

    #[test]
    fn test_sts_auth_serde() {
        let auth = StsAuth::ApiKey {
            header: "x-api-key".to_string(),
            value: "v".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&auth).expect("must serialize"),
            json(r#"{"type":"api_key","header":"x-api-key","value":"v"}"#)
        );
        assert_eq!(RawStsAuth::from(auth.clone()).normalize(), Some(auth));
    }

    #[test]
    fn test_redacted_and_merge() {
        let stored = AwsSigV4Secrets {
            sts_credentials: Some(StoredBuiltinCredentials {
                aws_access_key_id: "AKIATEST".to_string(),
                aws_secret_access_key: "testSecret".to_string(),
            }),
            sts_auth: Some(RawStsAuth::from(StsAuth::Basic {
                username: "u".to_string(),
                password: "p".to_string(),
            })),
        };

        let shown = stored.redacted();
        let shown_cred = shown.sts_credentials.clone().expect("must exist");
        assert_eq!(shown_cred.aws_access_key_id, "AKIATEST");
        assert_eq!(shown_cred.aws_secret_access_key, REDACTED_SENTINEL);
        let shown_auth = shown.sts_auth.as_ref().and_then(RawStsAuth::normalize);
        assert_eq!(
            shown_auth,
            Some(StsAuth::Basic {
                username: "u".to_string(),
                password: REDACTED_SENTINEL.to_string(),
            })
        );

        // Submitting the redacted view back keeps the stored secrets.
        let merged_cred = shown_cred.merge_redacted(stored.sts_credentials.as_ref());
        assert_eq!(Some(merged_cred), stored.sts_credentials);
        let previous = stored.sts_auth.as_ref().and_then(RawStsAuth::normalize);
        let merged_auth = shown_auth.map(|v| v.merge_redacted(previous.as_ref()));
        assert_eq!(merged_auth, previous);
    }

    fn provider(secrets: Option<AwsSigV4Secrets>) -> ProviderConfig {
        ProviderConfig {
            unique_key: "aws".to_string(),
            provider: "aws-sigv4".to_string(),
            custom: None,
            integration_secrets: secrets.map(|v| IntegrationSecrets { aws_sigv4: Some(v) }),
        }
    }

    #[test]
    fn test_validate_update_rejects_invalid_json() {
        let err = validate_config_update(&provider(None), "{not json").expect_err("must fail");
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
        assert_eq!(err.message(), "aws_sigv4_config must be valid JSON");
    }

    #[test]
    fn test_validate_update_with_inline_builtin_credentials() {
        let raw = r#"{"service":"s3","stsMode":"builtin","awsAccessKeyId":"AKIATEST","awsSecretAccessKey":"testSecret"}"#;

        let out = validate_config_update(&provider(None), raw).expect("must validate");
        assert!(!out.cleaned_json.contains("testSecret"));
        assert_eq!(
            out.builtin_credentials.map(|v| v.aws_secret_access_key),
            Some("testSecret".to_string())
        );
    }

    #[test]
    fn test_validate_update_resolves_redacted_secret() {
        let stored = AwsSigV4Secrets {
            sts_credentials: Some(StoredBuiltinCredentials {
                aws_access_key_id: "AKIATEST".to_string(),
                aws_secret_access_key: "testSecret".to_string(),
            }),
            sts_auth: None,
        };
        let raw = r#"{"service":"s3","stsMode":"builtin","awsAccessKeyId":"AKIATEST","awsSecretAccessKey":"***"}"#;

        let out = validate_config_update(&provider(Some(stored)), raw).expect("must validate");
        assert_eq!(
            out.builtin_credentials.map(|v| v.aws_secret_access_key),
            Some("testSecret".to_string())
        );
    }

    #[test]
    fn test_validate_update_reports_settings_errors() {
        let err = validate_config_update(&provider(None), r#"{"service":"s3","stsMode":"builtin"}"#)
            .expect_err("must fail");
        assert_eq!(err.kind(), ErrorKind::BuiltinCredentialsMissing);

        let out = validate_config_update(
            &provider(None),
            r#"{"service":"s3","stsEndpoint":{"url":"https://sts.example.com"}}"#,
        )
        .expect("custom without auth is valid");
        assert_eq!(out.sts_auth, None);

        let mut cfg = provider(None);
        cfg.custom = Some(HashMap::from([(
            AWS_SIGV4_CONFIG_KEY.to_string(),
            out.cleaned_json,
        )]));
        assert_eq!(
            resolve_settings(&cfg).map(|v| v.sts_mode()).ok(),
            Some(StsMode::Custom)
        );
    }
}
