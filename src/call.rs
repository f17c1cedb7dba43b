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

//! One logical RPC invocation.

use http::HeaderMap;

/// A single RPC invocation: the method name, the request message, and the
/// metadata to send with it.
///
/// Calls are immutable for their callers. Middleware derives successor calls
/// with [with_metadata][Call::with_metadata] instead of mutating in place,
/// so a retry loop can replay the original call unchanged.
#[derive(Clone, Debug)]
pub struct Call<Req> {
    method: String,
    request: Req,
    metadata: HeaderMap,
}

impl<Req> Call<Req> {
    /// Creates a call with empty metadata.
    pub fn new<M: Into<String>>(method: M, request: Req) -> Self {
        Self {
            method: method.into(),
            request,
            metadata: HeaderMap::new(),
        }
    }

    /// The fully qualified method name, e.g. `google.storage.v2.Storage/GetObject`.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// The request message.
    pub fn request(&self) -> &Req {
        &self.request
    }

    /// Consumes the call, returning the request message.
    pub fn into_request(self) -> Req {
        self.request
    }

    /// The metadata sent with the request.
    pub fn metadata(&self) -> &HeaderMap {
        &self.metadata
    }

    /// Returns a successor call with the given metadata.
    pub fn with_metadata(mut self, metadata: HeaderMap) -> Self {
        self.metadata = metadata;
        self
    }
}
