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

use crate::constants::*;
use serde::Deserialize;
use stsbroker_core::Context;

/// Config carries the platform wide knobs of the broker.
///
/// Per-integration data lives in [`crate::IntegrationSettings`] instead; this
/// only holds what is the same for every tenant.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Prefix of the generated `RoleSessionName`, `<prefix>-<unix millis>`.
    ///
    /// Loaded from env `STSBROKER_ROLE_SESSION_NAME_PREFIX`.
    pub role_session_name_prefix: String,
    /// Base url used instead of `https://sts.<region>.amazonaws.com/` for
    /// builtin AssumeRole and verification calls.
    ///
    /// Loaded from env `STSBROKER_STS_ENDPOINT`.
    pub sts_endpoint: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            role_session_name_prefix: DEFAULT_ROLE_SESSION_NAME_PREFIX.to_string(),
            sts_endpoint: None,
        }
    }
}

impl Config {
    /// Overlay values found in the context's environment.
    pub fn from_env(mut self, ctx: &Context) -> Self {
        if let Some(v) = ctx
            .env_var(STSBROKER_ROLE_SESSION_NAME_PREFIX)
            .filter(|v| !v.is_empty())
        {
            self.role_session_name_prefix = v;
        }
        if let Some(v) = ctx.env_var(STSBROKER_STS_ENDPOINT).filter(|v| !v.is_empty()) {
            self.sts_endpoint = Some(v);
        }

        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use stsbroker_core::StaticEnv;

    #[test]
    fn test_config_from_env() {
        let ctx = Context::new().with_env(StaticEnv {
            envs: HashMap::from([
                (
                    STSBROKER_ROLE_SESSION_NAME_PREFIX.to_string(),
                    "acme".to_string(),
                ),
                (
                    STSBROKER_STS_ENDPOINT.to_string(),
                    "http://127.0.0.1:4566".to_string(),
                ),
            ]),
        });

        let cfg = Config::default().from_env(&ctx);
        assert_eq!(cfg.role_session_name_prefix, "acme");
        assert_eq!(cfg.sts_endpoint.as_deref(), Some("http://127.0.0.1:4566"));
    }

    #[test]
    fn test_config_defaults() {
        let cfg = Config::default().from_env(&Context::new());
        assert_eq!(cfg.role_session_name_prefix, "stsbroker");
        assert!(cfg.sts_endpoint.is_none());

        let cfg: Config = serde_json::from_str(r#"{"sts_endpoint":"http://localhost"}"#)
            .expect("config must deserialize");
        assert_eq!(cfg.role_session_name_prefix, "stsbroker");
        assert_eq!(cfg.sts_endpoint.as_deref(), Some("http://localhost"));
    }
}
