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

//! Client-side support for generated RPC clients.
//!
//! This crate contains the runtime a code generator targets: resource name
//! templates, retry and backoff, the call construction pipeline, pagination,
//! long-running operations, and the declarative configuration that ties them
//! to individual methods. It does not implement a network transport;
//! transports and authentication flows are collaborators behind the traits
//! in [transport] and [credentials].

/// An alias of [std::result::Result] where the error is always [crate::error::Error].
///
/// This is the result type used by all functions wrapping RPCs.
pub type Result<T> = std::result::Result<T, crate::error::Error>;

/// The core error types used by generated clients.
pub mod error;

/// Parsing, matching, and rendering resource name templates.
pub mod path_template;

/// The backoff policy trait used by the retry loop.
pub mod backoff_policy;

/// A truncated exponential backoff policy.
pub mod exponential_backoff;

/// Per-method retry settings: retryable codes, timeouts, and backoff.
pub mod retry_settings;

/// The retry loop driving individual attempts.
pub mod retry_loop;

/// The client identification header.
pub mod api_header;

/// Per-call options and method descriptors.
pub mod options;

/// One logical RPC invocation.
pub mod call;

/// The transport boundary.
pub mod transport;

/// The call construction pipeline.
pub mod middleware;

/// Defines some types and traits to convert and use List RPCs as a Stream.
pub mod paginator;

/// Long-running operations.
pub mod operation;

/// Declarative per-method call configuration.
pub mod client_config;

/// Transcoding request messages into REST calls.
pub mod rest_descriptor;

/// The credentials boundary.
pub mod credentials;
