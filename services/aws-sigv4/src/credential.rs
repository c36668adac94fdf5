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

use crate::constants::DEFAULT_CREDENTIAL_LIFETIME;
use stsbroker_core::time::{now, DateTime};
use stsbroker_core::utils::Redact;
use stsbroker_core::SigningCredential;
use std::fmt::{Debug, Formatter};

/// Credential handed to [`crate::RequestSigner`].
#[derive(Default, Clone)]
pub struct Credential {
    /// Access key id for aws services.
    pub access_key_id: String,
    /// Secret access key for aws services.
    pub secret_access_key: String,
    /// Session token for aws services.
    pub session_token: Option<String>,
}

impl Debug for Credential {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("access_key_id", &Redact::from(&self.access_key_id))
            .field("secret_access_key", &Redact::from(&self.secret_access_key))
            .field("session_token", &Redact::from(&self.session_token))
            .finish()
    }
}

impl From<&BuiltinCredentials> for Credential {
    fn from(v: &BuiltinCredentials) -> Self {
        Self {
            access_key_id: v.access_key_id.clone(),
            secret_access_key: v.secret_access_key.clone(),
            session_token: None,
        }
    }
}

impl From<&TemporaryCredentials> for Credential {
    fn from(v: &TemporaryCredentials) -> Self {
        Self {
            access_key_id: v.access_key_id.clone(),
            secret_access_key: v.secret_access_key.clone(),
            session_token: Some(v.session_token.clone()),
        }
    }
}

/// The platform's own long-lived AWS key, used to call AssumeRole on a
/// tenant's behalf in builtin mode.
#[derive(Clone, PartialEq, Eq)]
pub struct BuiltinCredentials {
    /// Access key id of the platform key.
    pub access_key_id: String,
    /// Secret access key of the platform key.
    pub secret_access_key: String,
}

impl Debug for BuiltinCredentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuiltinCredentials")
            .field("access_key_id", &Redact::from(&self.access_key_id))
            .field("secret_access_key", &Redact::from(&self.secret_access_key))
            .finish()
    }
}

/// Which role to assume. Never contains secrets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssumeRoleInput {
    /// ARN of the customer role.
    pub role_arn: String,
    /// External id the customer role's trust policy expects.
    pub external_id: String,
    /// Region override; falls back to the integration's default region.
    pub region: Option<String>,
}

impl AssumeRoleInput {
    /// Create a new input without region override.
    pub fn new(role_arn: impl Into<String>, external_id: impl Into<String>) -> Self {
        Self {
            role_arn: role_arn.into(),
            external_id: external_id.into(),
            region: None,
        }
    }

    /// Set the region.
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }
}

/// Generate a fresh external id for a new connection.
pub fn generate_external_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Short-lived credentials returned by STS or a custom token endpoint.
///
/// Created fresh by every fetch and never persisted by the broker.
#[derive(Clone, PartialEq, Eq)]
pub struct TemporaryCredentials {
    /// Temporary access key id.
    pub access_key_id: String,
    /// Temporary secret access key.
    pub secret_access_key: String,
    /// Session token bound to the key pair.
    pub session_token: String,
    /// When the credentials stop working.
    pub expires_at: DateTime,
}

impl TemporaryCredentials {
    /// Expiration used when the upstream response doesn't report one.
    pub fn default_expiry() -> DateTime {
        now() + chrono::Duration::seconds(DEFAULT_CREDENTIAL_LIFETIME.as_secs() as i64)
    }
}

impl Debug for TemporaryCredentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemporaryCredentials")
            .field("access_key_id", &Redact::from(&self.access_key_id))
            .field("secret_access_key", &Redact::from(&self.secret_access_key))
            .field("session_token", &Redact::from(&self.session_token))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl SigningCredential for TemporaryCredentials {
    fn is_valid(&self) -> bool {
        if self.access_key_id.is_empty()
            || self.secret_access_key.is_empty()
            || self.session_token.is_empty()
        {
            return false;
        }

        // Take 120s as buffer to avoid edge cases.
        self.expires_at > now() + chrono::Duration::minutes(2)
    }
}
