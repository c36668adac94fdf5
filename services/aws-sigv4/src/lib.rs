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

//! AWS SigV4 credential broker.
//!
//! Negotiates short-lived AWS credentials for a tenant's integration, either
//! by calling AWS STS `AssumeRole` with the platform's own key (builtin mode)
//! or by asking a tenant operated token endpoint (custom mode).
//!
//! ```no_run
//! use stsbroker_aws_sigv4::{fetch_temporary_credentials, resolve_settings, AssumeRoleInput, ProviderConfig};
//! use stsbroker_core::Context;
//!
//! # async fn example(config: ProviderConfig, ctx: Context) -> stsbroker_core::Result<()> {
//! let settings = resolve_settings(&config)?;
//! let input = AssumeRoleInput::new("arn:aws:iam::123456789012:role/demo", "external-id")
//!     .with_region("eu-west-1");
//! let creds = fetch_temporary_credentials(&ctx, &settings, &input).await?;
//! println!("expires at {}", creds.expires_at);
//! # Ok(())
//! # }
//! ```

mod constants;
pub use constants::{AWS_SIGV4_CONFIG_KEY, EMPTY_STRING_SHA256, REDACTED_SENTINEL};

mod config;
pub use config::Config;

mod credential;
pub use credential::{
    generate_external_id, AssumeRoleInput, BuiltinCredentials, Credential, TemporaryCredentials,
};

mod settings;
pub use settings::{
    resolve_settings, Instructions, IntegrationSettings, ProviderConfig, PublicSummary,
    StsEndpoint, StsMode, StsSource, TemplateSummary,
};

mod secrets;
#[allow(deprecated)]
pub use secrets::extract_sts_auth_from_config;
pub use secrets::{
    extract_secrets, validate_config_update, AwsSigV4Secrets, ExtractedSecrets, ExtractedStsAuth,
    IntegrationSecrets, RawStsAuth, StoredBuiltinCredentials, StsAuth,
};

mod parse;
pub use parse::{
    normalize_credentials, parse_assume_role_response, parse_sts_error, AssumeRoleResponseParser,
    JsonCredentialsParser, ParseCredentials, StsErrorDetails,
};

mod sign_request;
pub use sign_request::RequestSigner;

mod provide_credential;
pub use provide_credential::{
    auth_headers, sts_endpoint, BuiltinStsCredentialProvider, CustomStsCredentialProvider,
};

mod fetch;
pub use fetch::{fetch_temporary_credentials, fetch_temporary_credentials_with_config};

mod connection;
pub use connection::{
    authorize_connection, verify_temporary_credentials, AuthorizeRequest, ConnectionCredentials,
    CONNECTION_CREDENTIALS_TYPE,
};
