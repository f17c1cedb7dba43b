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

use super::rpc::{Code, Status};
use std::error::Error as StdError;

type BoxError = Box<dyn StdError + Send + Sync>;

/// The core error returned by the call pipeline.
///
/// Errors come from multiple sources. The service may return an error, the
/// transport may be unable to complete the request, the retry policy may be
/// exhausted, or the library may be unable to build the request due to
/// invalid or missing application inputs.
///
/// Most applications just return or log the error. Applications that need to
/// interrogate the failure can use the predicates to determine the error
/// kind, and [status()][Error::status] to access the service-provided
/// details. Deeper information is available through
/// [source][std::error::Error::source].
///
/// # Example
/// ```
/// use rpc_gax::error::Error;
/// use rpc_gax::error::rpc::{Code, Status};
/// let error = Error::service(Status::default().set_code(Code::NotFound));
/// assert_eq!(error.status().map(|s| s.code), Some(Code::NotFound));
/// ```
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    source: Option<BoxError>,
}

impl Error {
    /// Creates an error with the status information returned by a service.
    pub fn service(status: Status) -> Self {
        Self {
            kind: ErrorKind::Service(Box::new(status)),
            source: None,
        }
    }

    /// The [Status] payload associated with this error, if any.
    ///
    /// Only service errors carry a status. Client-side errors, such as
    /// timeouts or validation problems, return `None`.
    pub fn status(&self) -> Option<&Status> {
        match &self.kind {
            ErrorKind::Service(status) => Some(status.as_ref()),
            _ => None,
        }
    }

    /// The status [Code] of a service error, if any.
    pub fn code(&self) -> Option<Code> {
        self.status().map(|s| s.code)
    }

    /// Creates an error representing a timeout.
    pub fn timeout<T: Into<BoxError>>(source: T) -> Self {
        Self {
            kind: ErrorKind::Timeout,
            source: Some(source.into()),
        }
    }

    /// The request could not be completed before its deadline.
    ///
    /// This is always a client-side generated error. The request may or may
    /// not have started, and it may or may not complete in the service.
    pub fn is_timeout(&self) -> bool {
        matches!(self.kind, ErrorKind::Timeout)
    }

    /// Creates an error representing an exhausted retry budget.
    pub fn exhausted<T: Into<BoxError>>(source: T) -> Self {
        Self {
            kind: ErrorKind::Exhausted,
            source: Some(source.into()),
        }
    }

    /// The request could not complete before the retry deadline expired.
    ///
    /// This is always a client-side generated error, but it may be the
    /// result of multiple errors received from the service. The last error
    /// observed by the retry loop is available through
    /// [source][std::error::Error::source].
    pub fn is_exhausted(&self) -> bool {
        matches!(self.kind, ErrorKind::Exhausted)
    }

    /// Creates an error representing an invalid configuration or an API
    /// usage sequence error.
    pub fn validation<T: Into<BoxError>>(source: T) -> Self {
        Self {
            kind: ErrorKind::Validation,
            source: Some(source.into()),
        }
    }

    /// The request was never attempted because the configuration is invalid
    /// or the calling sequence is incorrect, e.g. reloading a deleted
    /// operation, or combining a streaming descriptor with retry settings.
    ///
    /// These errors are never retried.
    pub fn is_validation(&self) -> bool {
        matches!(self.kind, ErrorKind::Validation)
    }

    /// Creates an error representing a failure to bind a request to an HTTP
    /// route.
    pub fn binding<T: Into<BoxError>>(source: T) -> Self {
        Self {
            kind: ErrorKind::Binding,
            source: Some(source.into()),
        }
    }

    /// The request was missing required parameters or the parameters did
    /// not match any of the expected URI formats.
    pub fn is_binding(&self) -> bool {
        matches!(self.kind, ErrorKind::Binding)
    }

    /// Creates an error representing a serialization problem.
    pub fn ser<T: Into<BoxError>>(source: T) -> Self {
        Self {
            kind: ErrorKind::Serialization,
            source: Some(source.into()),
        }
    }

    /// The request could not be serialized.
    pub fn is_serialization(&self) -> bool {
        matches!(self.kind, ErrorKind::Serialization)
    }

    /// Creates an error representing a deserialization problem.
    pub fn deser<T: Into<BoxError>>(source: T) -> Self {
        Self {
            kind: ErrorKind::Deserialization,
            source: Some(source.into()),
        }
    }

    /// The response could not be deserialized.
    pub fn is_deserialization(&self) -> bool {
        matches!(self.kind, ErrorKind::Deserialization)
    }

    /// Creates an error representing a failure to produce authentication
    /// headers.
    pub fn authentication<T: Into<BoxError>>(source: T) -> Self {
        Self {
            kind: ErrorKind::Authentication,
            source: Some(source.into()),
        }
    }

    /// Could not create the authentication headers before sending the
    /// request. The operation never left the client.
    pub fn is_authentication(&self) -> bool {
        matches!(self.kind, ErrorKind::Authentication)
    }

    /// Creates an error representing an I/O problem in the transport.
    pub fn io<T: Into<BoxError>>(source: T) -> Self {
        Self {
            kind: ErrorKind::Io,
            source: Some(source.into()),
        }
    }

    /// The request could not be sent, or the response could not be received.
    pub fn is_io(&self) -> bool {
        matches!(self.kind, ErrorKind::Io)
    }

    /// Creates an error not otherwise categorized.
    pub fn other<T: Into<BoxError>>(source: T) -> Self {
        Self {
            kind: ErrorKind::Other,
            source: Some(source.into()),
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            ErrorKind::Service(status) => {
                write!(f, "the service reports an error with code {}", status.code)?;
                if !status.message.is_empty() {
                    write!(f, " described as: {}", status.message)?;
                }
                Ok(())
            }
            ErrorKind::Timeout => write!(f, "the request exceeded its deadline"),
            ErrorKind::Exhausted => write!(f, "the retry policy was exhausted"),
            ErrorKind::Validation => {
                write!(f, "the request was not attempted due to a validation error")
            }
            ErrorKind::Binding => write!(f, "cannot find a matching binding to send the request"),
            ErrorKind::Serialization => write!(f, "cannot serialize the request"),
            ErrorKind::Deserialization => write!(f, "cannot deserialize the response"),
            ErrorKind::Authentication => write!(f, "cannot create the authentication headers"),
            ErrorKind::Io => write!(f, "the transport reports an error"),
            ErrorKind::Other => write!(f, "the request failed"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

#[derive(Debug)]
enum ErrorKind {
    Service(Box<Status>),
    Timeout,
    Exhausted,
    Validation,
    Binding,
    Serialization,
    Deserialization,
    Authentication,
    Io,
    Other,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn service() {
        let status = Status::default()
            .set_code(Code::NotFound)
            .set_message("NOT FOUND");
        let error = Error::service(status.clone());
        assert_eq!(error.status(), Some(&status));
        assert_eq!(error.code(), Some(Code::NotFound));
        assert!(!error.is_timeout(), "{error:?}");
        let msg = format!("{error}");
        assert!(msg.contains("NOT_FOUND"), "{msg}");
        assert!(msg.contains("NOT FOUND"), "{msg}");
    }

    #[test]
    fn timeout() {
        let error = Error::timeout("simulated timeout");
        assert!(error.is_timeout(), "{error:?}");
        assert!(error.status().is_none(), "{error:?}");
        assert!(error.source().is_some(), "{error:?}");
    }

    #[test]
    fn exhausted_keeps_last_error() {
        let last = Error::service(Status::default().set_code(Code::Unavailable));
        let error = Error::exhausted(last);
        assert!(error.is_exhausted(), "{error:?}");
        let got = error
            .source()
            .and_then(|e| e.downcast_ref::<Error>())
            .and_then(|e| e.code());
        assert_eq!(got, Some(Code::Unavailable));
    }

    #[test]
    fn validation() {
        let error = Error::validation("reload after delete");
        assert!(error.is_validation(), "{error:?}");
        assert!(!error.is_binding(), "{error:?}");
        assert!(format!("{error}").contains("validation"), "{error}");
    }

    #[test]
    fn predicates_are_disjoint() {
        let all = [
            Error::timeout("t"),
            Error::exhausted("e"),
            Error::validation("v"),
            Error::binding("b"),
            Error::ser("s"),
            Error::deser("d"),
            Error::authentication("a"),
            Error::io("i"),
            Error::other("o"),
        ];
        let count = |e: &Error| {
            [
                e.is_timeout(),
                e.is_exhausted(),
                e.is_validation(),
                e.is_binding(),
                e.is_serialization(),
                e.is_deserialization(),
                e.is_authentication(),
                e.is_io(),
            ]
            .iter()
            .filter(|p| **p)
            .count()
        };
        for e in &all[..8] {
            assert_eq!(count(e), 1, "{e:?}");
        }
        assert_eq!(count(&all[8]), 0, "{:?}", &all[8]);
    }
}
