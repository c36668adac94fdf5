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

use std::fmt;
use thiserror::Error;

/// The error type for stsbroker operations
#[derive(Error, Debug)]
#[error("{message}")]
pub struct Error {
    kind: ErrorKind,
    message: String,
    context: Vec<String>,
    #[source]
    source: Option<anyhow::Error>,
}

/// The kind of error that occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The integration has no SigV4 configuration blob at all.
    ConfigMissing,

    /// The configuration blob exists but can't be decoded.
    ConfigInvalid,

    /// The configuration doesn't name the AWS service to sign for.
    ServiceMissing,

    /// Builtin mode is selected but the platform key is not stored.
    BuiltinCredentialsMissing,

    /// Custom mode is selected but no STS endpoint url is configured.
    StsEndpointMissing,

    /// Neither the caller nor the integration supplied a region.
    RegionMissing,

    /// The STS call failed or returned no usable credentials.
    StsRequestFailed,

    /// Request cannot be built or signed (invalid header, uri, etc.)
    RequestInvalid,

    /// Unexpected errors (network, I/O, etc.)
    Unexpected,
}

impl ErrorKind {
    /// Stable code reported to callers for this kind.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::ConfigMissing => "missing_aws_sigv4_config",
            ErrorKind::ConfigInvalid => "invalid_aws_sigv4_config",
            ErrorKind::ServiceMissing => "missing_aws_sigv4_service",
            ErrorKind::BuiltinCredentialsMissing => "missing_aws_sigv4_builtin_credentials",
            ErrorKind::StsEndpointMissing => "missing_aws_sigv4_sts_endpoint",
            ErrorKind::RegionMissing => "missing_aws_sigv4_region",
            ErrorKind::StsRequestFailed => "aws_sigv4_sts_request_failed",
            ErrorKind::RequestInvalid => "invalid_request",
            ErrorKind::Unexpected => "unexpected",
        }
    }
}

impl Error {
    /// Create a new error with the given kind and message
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            context: Vec::new(),
            source: None,
        }
    }

    /// Add a source error
    pub fn with_source(mut self, source: impl Into<anyhow::Error>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Attach a line of diagnostic context, e.g. `role_arn: ...`.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context.push(context.into());
        self
    }

    /// Get the error kind
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Shortcut for `self.kind().code()`.
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// Get the human readable message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the attached context lines.
    pub fn context(&self) -> &[String] {
        &self.context
    }

    /// Check if this error comes from the integration's own configuration,
    /// as opposed to the upstream STS service.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::ConfigMissing
                | ErrorKind::ConfigInvalid
                | ErrorKind::ServiceMissing
                | ErrorKind::BuiltinCredentialsMissing
                | ErrorKind::StsEndpointMissing
        )
    }
}

// Convenience constructors
impl Error {
    /// Create a config missing error
    pub fn config_missing() -> Self {
        Self::new(
            ErrorKind::ConfigMissing,
            "AWS SigV4 integration is missing its configuration.",
        )
    }

    /// Create a config invalid error
    pub fn config_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConfigInvalid, message)
    }

    /// Create a service missing error
    pub fn service_missing() -> Self {
        Self::new(
            ErrorKind::ServiceMissing,
            "AWS SigV4 integration is missing the AWS service name.",
        )
    }

    /// Create a builtin credentials missing error
    pub fn builtin_credentials_missing() -> Self {
        Self::new(
            ErrorKind::BuiltinCredentialsMissing,
            "AWS SigV4 integration is missing the built-in AWS credentials.",
        )
    }

    /// Create a STS endpoint missing error
    pub fn sts_endpoint_missing() -> Self {
        Self::new(
            ErrorKind::StsEndpointMissing,
            "AWS SigV4 integration is missing the STS endpoint configuration.",
        )
    }

    /// Create a region missing error
    pub fn region_missing() -> Self {
        Self::new(
            ErrorKind::RegionMissing,
            "An AWS region is required to request temporary credentials.",
        )
    }

    /// Create a STS request failed error
    pub fn sts_request_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::StsRequestFailed, message)
    }

    /// Create a request invalid error
    pub fn request_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RequestInvalid, message)
    }

    /// Create an unexpected error
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unexpected, message)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Convenience type alias for Results
pub type Result<T> = std::result::Result<T, Error>;

// Common From implementations
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::unexpected(err.to_string()).with_source(err)
    }
}

impl From<std::fmt::Error> for Error {
    fn from(err: std::fmt::Error) -> Self {
        Self::unexpected(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<http::Error> for Error {
    fn from(err: http::Error) -> Self {
        Self::request_invalid(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<http::header::InvalidHeaderValue> for Error {
    fn from(err: http::header::InvalidHeaderValue) -> Self {
        Self::request_invalid(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<http::header::InvalidHeaderName> for Error {
    fn from(err: http::header::InvalidHeaderName) -> Self {
        Self::request_invalid(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<http::header::ToStrError> for Error {
    fn from(err: http::header::ToStrError) -> Self {
        Self::request_invalid(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<http::uri::InvalidUri> for Error {
    fn from(err: http::uri::InvalidUri) -> Self {
        Self::request_invalid(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<http::uri::InvalidUriParts> for Error {
    fn from(err: http::uri::InvalidUriParts) -> Self {
        Self::request_invalid(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::unexpected(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::unexpected(err.to_string()).with_source(anyhow::Error::from(err))
    }
}
