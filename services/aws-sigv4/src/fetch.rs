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

use stsbroker_core::{Context, Error, ProvideCredential, Result};

use crate::config::Config;
use crate::credential::{AssumeRoleInput, TemporaryCredentials};
use crate::provide_credential::utils::check_region;
use crate::provide_credential::{BuiltinStsCredentialProvider, CustomStsCredentialProvider};
use crate::settings::{IntegrationSettings, StsSource};

/// Fetch temporary credentials for `input` using the integration's trust
/// model, with [`Config`] loaded from the context's environment.
///
/// Every call performs exactly one upstream request and nothing is cached.
pub async fn fetch_temporary_credentials(
    ctx: &Context,
    settings: &IntegrationSettings,
    input: &AssumeRoleInput,
) -> Result<TemporaryCredentials> {
    let config = Config::default().from_env(ctx);
    fetch_temporary_credentials_with_config(ctx, &config, settings, input).await
}

/// Same as [`fetch_temporary_credentials`] with an explicit [`Config`].
pub async fn fetch_temporary_credentials_with_config(
    ctx: &Context,
    config: &Config,
    settings: &IntegrationSettings,
    input: &AssumeRoleInput,
) -> Result<TemporaryCredentials> {
    let region = resolve_region(&[input.region.as_deref()], settings)?;

    match &settings.source {
        StsSource::Builtin(cred) => {
            BuiltinStsCredentialProvider::new(
                config.clone(),
                cred.clone(),
                &input.role_arn,
                &input.external_id,
                &region,
            )
            .provide_credential(ctx)
            .await
        }
        StsSource::Custom(endpoint) => {
            CustomStsCredentialProvider::new(
                endpoint.clone(),
                &input.role_arn,
                &input.external_id,
                &region,
                &settings.service,
            )
            .provide_credential(ctx)
            .await
        }
    }
}

/// First non-empty candidate, then the integration's default region.
///
/// The chosen region must look like an AWS region, else `invalid_request`.
pub(crate) fn resolve_region(
    candidates: &[Option<&str>],
    settings: &IntegrationSettings,
) -> Result<String> {
    let region = candidates
        .iter()
        .copied()
        .chain([settings.default_region.as_deref()])
        .flatten()
        .find(|v| !v.is_empty())
        .ok_or_else(Error::region_missing)?;
    check_region(region)?;
    Ok(region.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::BuiltinCredentials;
    use stsbroker_core::ErrorKind;
    use test_case::test_case;

    fn settings(default_region: Option<&str>) -> IntegrationSettings {
        IntegrationSettings {
            service: "s3".to_string(),
            default_region: default_region.map(str::to_string),
            source: StsSource::Builtin(BuiltinCredentials {
                access_key_id: "AKIATEST".to_string(),
                secret_access_key: "testSecret".to_string(),
            }),
            instructions: None,
            templates: vec![],
        }
    }

    #[test_case(&[Some("us-west-2")], Some("eu-west-1"), "us-west-2"; "input wins")]
    #[test_case(&[None], Some("eu-west-1"), "eu-west-1"; "default region")]
    #[test_case(&[Some("")], Some("eu-west-1"), "eu-west-1"; "empty input ignored")]
    #[test_case(&[None, Some("ap-south-1")], None, "ap-south-1"; "second candidate")]
    fn test_resolve_region(candidates: &[Option<&str>], default: Option<&str>, expected: &str) {
        assert_eq!(
            resolve_region(candidates, &settings(default)).ok().as_deref(),
            Some(expected)
        );
    }

    #[test_case(&[Some("attacker.example/")], Some("eu-west-1"); "host injection")]
    #[test_case(&[None], Some("eu west 1"); "bad default")]
    fn test_resolve_region_rejects_invalid(candidates: &[Option<&str>], default: Option<&str>) {
        let err = resolve_region(candidates, &settings(default)).expect_err("must fail");
        assert_eq!(err.kind(), ErrorKind::RequestInvalid);
    }

    #[tokio::test]
    async fn test_missing_region() {
        let input = AssumeRoleInput::new("arn:aws:iam::123456789012:role/demo", "ext");

        let err = fetch_temporary_credentials(&Context::new(), &settings(None), &input)
            .await
            .expect_err("must fail");
        assert_eq!(err.kind(), ErrorKind::RegionMissing);
        assert_eq!(err.code(), "missing_aws_sigv4_region");
    }
}
