// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The `Status` type defines a logical error model suitable for different
/// programming environments, including REST APIs and RPC APIs. Each `Status`
/// message contains three pieces of data: error code, error message, and
/// error details.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct Status {
    /// The status code.
    pub code: Code,

    /// A developer-facing error message, which should be in English.
    pub message: String,

    /// A list of messages that carry the error details. Entries with a
    /// recognized `@type` are decoded, anything else is preserved as opaque
    /// JSON.
    pub details: Vec<StatusDetails>,
}

impl Status {
    /// Sets the status code.
    pub fn set_code<V: Into<Code>>(mut self, v: V) -> Self {
        self.code = v.into();
        self
    }

    /// Sets the error message.
    pub fn set_message<V: Into<String>>(mut self, v: V) -> Self {
        self.message = v.into();
        self
    }

    /// Sets the error details.
    pub fn set_details<I, V>(mut self, v: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<StatusDetails>,
    {
        self.details = v.into_iter().map(|d| d.into()).collect();
        self
    }
}

/// The canonical error codes for APIs.
///
/// Sometimes multiple error codes may apply. Services should return the most
/// specific error code that applies. For example, prefer `OutOfRange` over
/// `FailedPrecondition` if both codes apply.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[non_exhaustive]
pub enum Code {
    /// Not an error; returned on success.
    Ok = 0,

    /// The operation was cancelled, typically by the caller.
    Canceled = 1,

    /// Unknown error. Errors raised by APIs that do not return enough error
    /// information may be converted to this error.
    Unknown = 2,

    /// The client specified an invalid argument, regardless of the state of
    /// the system.
    InvalidArgument = 3,

    /// The deadline expired before the operation could complete.
    DeadlineExceeded = 4,

    /// Some requested entity (e.g., file or directory) was not found.
    NotFound = 5,

    /// The entity that a client attempted to create already exists.
    AlreadyExists = 6,

    /// The caller does not have permission to execute the specified
    /// operation.
    PermissionDenied = 7,

    /// Some resource has been exhausted, perhaps a per-user quota.
    ResourceExhausted = 8,

    /// The operation was rejected because the system is not in a state
    /// required for the operation's execution.
    FailedPrecondition = 9,

    /// The operation was aborted, typically due to a concurrency issue.
    Aborted = 10,

    /// The operation was attempted past the valid range.
    OutOfRange = 11,

    /// The operation is not implemented or is not supported/enabled.
    Unimplemented = 12,

    /// Internal errors. Some invariants expected by the underlying system
    /// have been broken.
    Internal = 13,

    /// The service is currently unavailable. This is most likely a transient
    /// condition, which can be corrected by retrying with a backoff.
    Unavailable = 14,

    /// Unrecoverable data loss or corruption.
    DataLoss = 15,

    /// The request does not have valid authentication credentials for the
    /// operation.
    Unauthenticated = 16,
}

impl Default for Code {
    fn default() -> Self {
        Self::Unknown
    }
}

impl Code {
    /// The name of the code, as it appears in client configuration files.
    pub fn name(&self) -> &'static str {
        match self {
            Code::Ok => "OK",
            Code::Canceled => "CANCELLED",
            Code::Unknown => "UNKNOWN",
            Code::InvalidArgument => "INVALID_ARGUMENT",
            Code::DeadlineExceeded => "DEADLINE_EXCEEDED",
            Code::NotFound => "NOT_FOUND",
            Code::AlreadyExists => "ALREADY_EXISTS",
            Code::PermissionDenied => "PERMISSION_DENIED",
            Code::ResourceExhausted => "RESOURCE_EXHAUSTED",
            Code::FailedPrecondition => "FAILED_PRECONDITION",
            Code::Aborted => "ABORTED",
            Code::OutOfRange => "OUT_OF_RANGE",
            Code::Unimplemented => "UNIMPLEMENTED",
            Code::Internal => "INTERNAL",
            Code::Unavailable => "UNAVAILABLE",
            Code::DataLoss => "DATA_LOSS",
            Code::Unauthenticated => "UNAUTHENTICATED",
        }
    }
}

impl std::convert::From<i32> for Code {
    fn from(value: i32) -> Self {
        match value {
            0 => Code::Ok,
            1 => Code::Canceled,
            2 => Code::Unknown,
            3 => Code::InvalidArgument,
            4 => Code::DeadlineExceeded,
            5 => Code::NotFound,
            6 => Code::AlreadyExists,
            7 => Code::PermissionDenied,
            8 => Code::ResourceExhausted,
            9 => Code::FailedPrecondition,
            10 => Code::Aborted,
            11 => Code::OutOfRange,
            12 => Code::Unimplemented,
            13 => Code::Internal,
            14 => Code::Unavailable,
            15 => Code::DataLoss,
            16 => Code::Unauthenticated,
            _ => Code::default(),
        }
    }
}

impl std::convert::TryFrom<&str> for Code {
    type Error = String;
    fn try_from(value: &str) -> std::result::Result<Code, Self::Error> {
        match value {
            "OK" => Ok(Code::Ok),
            // Both spellings appear in the wild.
            "CANCELLED" | "CANCELED" => Ok(Code::Canceled),
            "UNKNOWN" => Ok(Code::Unknown),
            "INVALID_ARGUMENT" => Ok(Code::InvalidArgument),
            "DEADLINE_EXCEEDED" => Ok(Code::DeadlineExceeded),
            "NOT_FOUND" => Ok(Code::NotFound),
            "ALREADY_EXISTS" => Ok(Code::AlreadyExists),
            "PERMISSION_DENIED" => Ok(Code::PermissionDenied),
            "RESOURCE_EXHAUSTED" => Ok(Code::ResourceExhausted),
            "FAILED_PRECONDITION" => Ok(Code::FailedPrecondition),
            "ABORTED" => Ok(Code::Aborted),
            "OUT_OF_RANGE" => Ok(Code::OutOfRange),
            "UNIMPLEMENTED" => Ok(Code::Unimplemented),
            "INTERNAL" => Ok(Code::Internal),
            "UNAVAILABLE" => Ok(Code::Unavailable),
            "DATA_LOSS" => Ok(Code::DataLoss),
            "UNAUTHENTICATED" => Ok(Code::Unauthenticated),
            _ => Err(format!("unknown status code value {value}")),
        }
    }
}

impl std::fmt::Display for Code {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for Code {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_i32(*self as i32)
    }
}

impl<'de> Deserialize<'de> for Code {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        i32::deserialize(deserializer).map(Code::from)
    }
}

/// The type of details associated with [Status].
///
/// Services often return a detailed error description. The details can be
/// used to better understand the root cause of the problem.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
#[serde(tag = "@type")]
pub enum StatusDetails {
    #[serde(rename = "google.rpc.ErrorInfo")]
    ErrorInfo(ErrorInfo),
    #[serde(rename = "google.rpc.DebugInfo")]
    DebugInfo(DebugInfo),
    #[serde(rename = "google.rpc.LocalizedMessage")]
    LocalizedMessage(LocalizedMessage),
    #[serde(rename = "google.rpc.RetryInfo")]
    RetryInfo(RetryInfo),
    #[serde(untagged)]
    Other(serde_json::Value),
}

/// Describes the cause of the error with structured details.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct ErrorInfo {
    /// The reason of the error, a constant value that identifies the
    /// proximate cause.
    pub reason: String,

    /// The logical grouping to which the "reason" belongs.
    pub domain: String,

    /// Additional structured details about this error.
    pub metadata: HashMap<String, String>,
}

impl ErrorInfo {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_reason<V: Into<String>>(mut self, v: V) -> Self {
        self.reason = v.into();
        self
    }
    pub fn set_domain<V: Into<String>>(mut self, v: V) -> Self {
        self.domain = v.into();
        self
    }
}

/// Describes additional debugging info.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct DebugInfo {
    /// The stack trace entries indicating where the error occurred.
    pub stack_entries: Vec<String>,

    /// Additional debugging information provided by the server.
    pub detail: String,
}

impl DebugInfo {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_detail<V: Into<String>>(mut self, v: V) -> Self {
        self.detail = v.into();
        self
    }
}

/// A message localized to the user's locale.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct LocalizedMessage {
    /// The locale used, following the specification defined in BCP 47.
    pub locale: String,

    /// The localized error message.
    pub message: String,
}

impl LocalizedMessage {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_locale<V: Into<String>>(mut self, v: V) -> Self {
        self.locale = v.into();
        self
    }
    pub fn set_message<V: Into<String>>(mut self, v: V) -> Self {
        self.message = v.into();
        self
    }
}

/// Describes when clients can retry a failed request.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct RetryInfo {
    /// The recommended delay before retrying, e.g. `"1.5s"`.
    pub retry_delay: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;

    #[test]
    fn status_serialization_roundtrip() {
        let status = Status::default()
            .set_code(Code::Unimplemented)
            .set_message("test")
            .set_details([
                StatusDetails::ErrorInfo(
                    ErrorInfo::new().set_reason("reason").set_domain("domain"),
                ),
                StatusDetails::LocalizedMessage(
                    LocalizedMessage::new()
                        .set_locale("en-US")
                        .set_message("message"),
                ),
            ]);
        let got = serde_json::to_value(&status).unwrap();
        let want = json!({
            "code": 12,
            "message": "test",
            "details": [
                {"@type": "google.rpc.ErrorInfo", "reason": "reason", "domain": "domain", "metadata": {}},
                {"@type": "google.rpc.LocalizedMessage", "locale": "en-US", "message": "message"},
            ]
        });
        assert_eq!(got, want);

        let back: Status = serde_json::from_value(got).unwrap();
        assert_eq!(back, status);
    }

    #[test]
    fn unknown_details_are_opaque() {
        let json = json!({
            "code": 3,
            "message": "bad",
            "details": [
                {"@type": "google.rpc.SomethingNew", "payload": "abc"},
            ]
        });
        let got: Status = serde_json::from_value(json).unwrap();
        assert_eq!(got.code, Code::InvalidArgument);
        assert!(
            matches!(&got.details[0], StatusDetails::Other(v) if v["payload"] == "abc"),
            "{got:?}"
        );
    }

    #[test_case(0, Code::Ok)]
    #[test_case(4, Code::DeadlineExceeded)]
    #[test_case(14, Code::Unavailable)]
    #[test_case(16, Code::Unauthenticated)]
    #[test_case(-7, Code::Unknown)]
    fn code_from_i32(value: i32, want: Code) {
        assert_eq!(Code::from(value), want);
    }

    #[test_case("UNAVAILABLE", Code::Unavailable)]
    #[test_case("CANCELLED", Code::Canceled)]
    #[test_case("CANCELED", Code::Canceled)]
    #[test_case("DEADLINE_EXCEEDED", Code::DeadlineExceeded)]
    fn code_from_name(name: &str, want: Code) {
        assert_eq!(Code::try_from(name).unwrap(), want);
    }

    #[test]
    fn code_from_bad_name() {
        let got = Code::try_from("NOT_A_CODE");
        assert!(got.is_err(), "{got:?}");
    }

    #[test]
    fn code_name_roundtrip() {
        for i in 0..=16 {
            let code = Code::from(i);
            assert_eq!(Code::try_from(code.name()), Ok(code));
        }
    }
}
