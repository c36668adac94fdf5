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

//! Resolve an integration's SigV4 settings from its provider configuration.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::fmt::{Debug, Formatter};

use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use stsbroker_core::{Error, Result};

use crate::constants::AWS_SIGV4_CONFIG_KEY;
use crate::credential::BuiltinCredentials;
use crate::secrets::{IntegrationSecrets, RawStsAuth, StsAuth};

/// Which trust model issues temporary credentials.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StsMode {
    /// The platform calls AWS STS with its own long-lived key.
    Builtin,
    /// The tenant operates its own token endpoint.
    Custom,
}

/// A tenant operated STS-like endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StsEndpoint {
    /// Url receiving the JSON credential request.
    pub url: String,
    /// How to authenticate to the endpoint, if at all.
    pub auth: Option<StsAuth>,
}

/// Where temporary credentials come from; the variant is the `stsMode`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StsSource {
    /// Call AWS STS AssumeRole signed with the platform key.
    Builtin(BuiltinCredentials),
    /// Call the tenant's endpoint.
    Custom(StsEndpoint),
}

/// Display metadata shown to end users, passed through untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instructions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Infrastructure template end users deploy to create the trusted role.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateSummary {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<BTreeMap<String, String>>,
}

/// The non-secret part of the settings an integration listing may expose.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PublicSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<Instructions>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub templates: Vec<TemplateSummary>,
}

/// Validated SigV4 settings of one integration.
///
/// Always derived from a [`ProviderConfig`] by [`resolve_settings`]; never
/// stored or cached.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntegrationSettings {
    /// AWS service name requests are signed for, e.g. `s3`.
    pub service: String,
    /// Region used when the caller doesn't pass one.
    pub default_region: Option<String>,
    /// Trust model and its material.
    pub source: StsSource,
    pub instructions: Option<Instructions>,
    pub templates: Vec<TemplateSummary>,
}

impl IntegrationSettings {
    /// The `stsMode` these settings were resolved with.
    pub fn sts_mode(&self) -> StsMode {
        match self.source {
            StsSource::Builtin(_) => StsMode::Builtin,
            StsSource::Custom(_) => StsMode::Custom,
        }
    }

    /// Platform key, present only in builtin mode.
    pub fn builtin_credentials(&self) -> Option<&BuiltinCredentials> {
        match &self.source {
            StsSource::Builtin(v) => Some(v),
            StsSource::Custom(_) => None,
        }
    }

    /// Tenant endpoint, present only in custom mode.
    pub fn sts_endpoint(&self) -> Option<&StsEndpoint> {
        match &self.source {
            StsSource::Custom(v) => Some(v),
            StsSource::Builtin(_) => None,
        }
    }

    /// Non-secret display data.
    pub fn public_summary(&self) -> PublicSummary {
        PublicSummary {
            instructions: self.instructions.clone(),
            templates: self.templates.clone(),
        }
    }
}

/// The provider configuration record, as read from the config store.
///
/// `integration_secrets` is expected to be decrypted already.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Integration id chosen by the operator.
    pub unique_key: String,
    /// Provider template name.
    pub provider: String,
    /// Free-form, unencrypted custom fields.
    pub custom: Option<HashMap<String, String>>,
    /// Decrypted secrets side-table.
    pub integration_secrets: Option<IntegrationSecrets>,
}

impl Debug for ProviderConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("unique_key", &self.unique_key)
            .field("provider", &self.provider)
            .field("custom", &self.custom)
            .field(
                "integration_secrets",
                &self.integration_secrets.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

impl ProviderConfig {
    /// The raw `aws_sigv4_config` blob, if any.
    pub fn aws_sigv4_config(&self) -> Option<&str> {
        self.custom
            .as_ref()?
            .get(AWS_SIGV4_CONFIG_KEY)
            .map(String::as_str)
    }
}

fn string_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(str::to_string)
}

fn instructions_from_value(value: &Value) -> Option<Instructions> {
    let obj = value.as_object()?;
    Some(Instructions {
        label: string_field(obj, "label"),
        url: string_field(obj, "url"),
        description: string_field(obj, "description"),
    })
}

// Entries without a string `id` are skipped; scalar parameters are kept as text.
fn template_from_value(value: &Value) -> Option<TemplateSummary> {
    let obj = value.as_object()?;
    let parameters = obj.get("parameters").and_then(Value::as_object).map(|params| {
        params
            .iter()
            .filter_map(|(k, v)| {
                let v = match v {
                    Value::String(v) => v.clone(),
                    Value::Number(v) => v.to_string(),
                    Value::Bool(v) => v.to_string(),
                    _ => return None,
                };
                Some((k.clone(), v))
            })
            .collect()
    });

    Some(TemplateSummary {
        id: string_field(obj, "id")?,
        label: string_field(obj, "label"),
        description: string_field(obj, "description"),
        stack_name: string_field(obj, "stack_name"),
        template_url: string_field(obj, "template_url"),
        template_body: string_field(obj, "template_body"),
        parameters,
    })
}

/// Resolve and validate the SigV4 settings of an integration.
///
/// Checks run in order and stop at the first failure:
///
/// 1. the `aws_sigv4_config` blob exists, else `missing_aws_sigv4_config`
/// 2. it is a JSON object, else `invalid_aws_sigv4_config`
/// 3. `service` is a non-empty string, else `missing_aws_sigv4_service`
/// 4. `stsMode` is builtin only when it is literally `"builtin"`
/// 5. builtin: the platform key is in the secrets side-table, else
///    `missing_aws_sigv4_builtin_credentials`
/// 6. custom: `stsEndpoint.url` is a non-empty string, else
///    `missing_aws_sigv4_sts_endpoint`
///
/// Every other field is read loosely: a mistyped `defaultRegion`,
/// `instructions` or template is treated as absent.
///
/// Custom endpoint auth comes from the side-table when it holds a usable
/// entry, then from the legacy blob, else there is none.
pub fn resolve_settings(config: &ProviderConfig) -> Result<IntegrationSettings> {
    let Some(raw) = config.aws_sigv4_config().filter(|v| !v.trim().is_empty()) else {
        return Err(Error::config_missing());
    };

    let invalid = |reason: &str| {
        warn!(
            "failed to parse aws_sigv4_config of integration {}: {reason}",
            config.unique_key
        );
        Error::config_invalid("AWS SigV4 integration configuration is not valid JSON.")
            .with_context(format!("integration: {}", config.unique_key))
    };
    let parsed: Value =
        serde_json::from_str(raw).map_err(|e| invalid(&e.to_string()).with_source(e))?;
    let Some(parsed) = parsed.as_object() else {
        return Err(invalid("not a JSON object"));
    };

    let service = string_field(parsed, "service")
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(Error::service_missing)?;

    let is_builtin = parsed.get("stsMode").and_then(Value::as_str) == Some("builtin");
    let secrets = config
        .integration_secrets
        .as_ref()
        .and_then(|v| v.aws_sigv4.as_ref());

    let source = if is_builtin {
        let cred = secrets
            .and_then(|v| v.sts_credentials.as_ref())
            .and_then(|v| v.to_builtin())
            .ok_or_else(Error::builtin_credentials_missing)?;
        StsSource::Builtin(cred)
    } else {
        let endpoint = parsed.get("stsEndpoint").and_then(Value::as_object);
        let url = endpoint
            .and_then(|v| string_field(v, "url"))
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(Error::sts_endpoint_missing)?;
        // The blob's inline auth is the legacy location, superseded by the side-table.
        let auth = secrets
            .and_then(|v| v.sts_auth.as_ref())
            .and_then(RawStsAuth::normalize)
            .or_else(|| {
                endpoint
                    .and_then(|v| v.get("auth"))
                    .and_then(RawStsAuth::from_value)
            });
        StsSource::Custom(StsEndpoint { url, auth })
    };

    Ok(IntegrationSettings {
        service,
        default_region: string_field(parsed, "defaultRegion").filter(|v| !v.is_empty()),
        source,
        instructions: parsed.get("instructions").and_then(instructions_from_value),
        templates: parsed
            .get("templates")
            .and_then(Value::as_array)
            .map(|v| v.iter().filter_map(template_from_value).collect())
            .unwrap_or_default(),
    })
}
