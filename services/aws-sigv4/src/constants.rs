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

use std::time::Duration;

use percent_encoding::AsciiSet;
use percent_encoding::NON_ALPHANUMERIC;

// Headers used in aws services.
pub const X_AMZ_CONTENT_SHA_256: &str = "x-amz-content-sha256";
pub const X_AMZ_DATE: &str = "x-amz-date";
pub const X_AMZ_SECURITY_TOKEN: &str = "x-amz-security-token";

/// Hex encoded SHA256 of an empty payload.
pub const EMPTY_STRING_SHA256: &str =
    "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

// Env values used to configure the broker.
pub const STSBROKER_ROLE_SESSION_NAME_PREFIX: &str = "STSBROKER_ROLE_SESSION_NAME_PREFIX";
pub const STSBROKER_STS_ENDPOINT: &str = "STSBROKER_STS_ENDPOINT";

// Keys of the persisted provider configuration.
pub const AWS_SIGV4_CONFIG_KEY: &str = "aws_sigv4_config";

/// Value shown in place of a stored secret on read paths meant for display.
pub const REDACTED_SENTINEL: &str = "***";

/// Header used by `api_key` STS auth when none is configured.
pub const DEFAULT_API_KEY_HEADER: &str = "x-api-key";

// AWS STS AssumeRole parameters.
pub const STS_API_VERSION: &str = "2011-06-15";
pub const ASSUME_ROLE_DURATION_SECONDS: u32 = 3600;
pub const DEFAULT_ROLE_SESSION_NAME_PREFIX: &str = "stsbroker";

/// Lifetime assumed for temporary credentials whose response carries no
/// usable expiration.
pub const DEFAULT_CREDENTIAL_LIFETIME: Duration = Duration::from_secs(3600);

/// Numeric expirations above this are read as epoch milliseconds instead of seconds.
pub const EPOCH_MILLIS_THRESHOLD: i64 = 100_000_000_000;

/// AsciiSet for [AWS UriEncode](https://docs.aws.amazon.com/AmazonS3/latest/API/sig-v4-header-based-auth.html)
///
/// - URI encode every byte except the unreserved characters: 'A'-'Z', 'a'-'z', '0'-'9', '-', '.', '_', and '~'.
pub static AWS_URI_ENCODE_SET: AsciiSet = NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// AsciiSet for [AWS UriEncode](https://docs.aws.amazon.com/AmazonS3/latest/API/sig-v4-header-based-auth.html)
///
/// But used in query.
pub static AWS_QUERY_ENCODE_SET: AsciiSet = NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');
