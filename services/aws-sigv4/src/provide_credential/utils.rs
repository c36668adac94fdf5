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

use http::StatusCode;
use log::warn;
use stsbroker_core::{Error, Result};

use crate::config::Config;
use crate::parse::parse_sts_error;

/// Get the base url of the regional AWS STS endpoint, like
/// `https://sts.us-east-1.amazonaws.com/`.
///
/// Regions of the AWS China partition (`cn-*`) live under `amazonaws.com.cn`.
/// [`Config::sts_endpoint`] replaces the computed url when set.
pub fn sts_endpoint(config: &Config, region: &str) -> String {
    if let Some(endpoint) = &config.sts_endpoint {
        return format!("{}/", endpoint.trim_end_matches('/'));
    }

    if region.starts_with("cn-") {
        format!("https://sts.{region}.amazonaws.com.cn/")
    } else {
        format!("https://sts.{region}.amazonaws.com/")
    }
}

/// Reject regions that can't be a single DNS label, like `us-east-1`.
/// The region becomes part of the STS host.
pub(crate) fn check_region(region: &str) -> Result<()> {
    let valid = !region.is_empty()
        && region
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-');
    if valid {
        Ok(())
    } else {
        warn!("rejected AWS region {region:?}");
        Err(Error::request_invalid(format!("invalid AWS region: {region}")))
    }
}

/// Build the error for a non-2xx AWS STS response, carrying the AWS error
/// code and message when the body has them.
pub(crate) fn sts_response_error(action: &str, status: StatusCode, body: &str) -> Error {
    let details = parse_sts_error(body);

    let mut message = format!("STS {action} request failed with status {}", status.as_u16());
    match (&details.code, &details.message) {
        (Some(code), Some(msg)) => message.push_str(&format!(": {code}: {msg}")),
        (Some(code), None) => message.push_str(&format!(": {code}")),
        (None, Some(msg)) => message.push_str(&format!(": {msg}")),
        (None, None) => {}
    }
    warn!("{message}");

    let mut err = Error::sts_request_failed(message).with_context(format!("status: {status}"));
    if let Some(code) = details.code {
        err = err.with_context(format!("aws_error_code: {code}"));
    }
    err
}
