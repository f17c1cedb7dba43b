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

//! The error types used by the call pipeline and its collaborators.
//!
//! The library distinguishes between errors detected before a request is
//! sent (configuration and validation problems), errors returned by the
//! service itself, and errors synthesized by the client, such as timeouts
//! or an exhausted retry budget.

mod core_error;
pub use core_error::*;

/// The canonical status model shared by gRPC and REST transports.
pub mod rpc;
