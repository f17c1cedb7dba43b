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

//! Per-call options.
//!
//! [CallOptions] bundles everything the call pipeline needs besides the
//! request itself: retry settings, timeouts, user headers, the agent header,
//! and the descriptors that select paging, long-running, or streaming
//! treatment for the call.
//!
//! The type is copy-on-write in spirit: the `with_*` methods consume and
//! return a new value, and [merge][CallOptions::merge] layers overrides over
//! a base without mutating either. Generated clients build one `CallOptions`
//! per method from static configuration and merge per-invocation overrides
//! on top.

use crate::api_header::AgentHeader;
use crate::error::Error;
use crate::retry_settings::RetrySettings;
use http::HeaderMap;
use std::time::Duration;

/// The gRPC streaming arity of a method.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamingType {
    ClientStreaming,
    ServerStreaming,
    BidiStreaming,
}

/// A set of options configuring a single call.
#[derive(Clone, Debug, Default)]
pub struct CallOptions {
    retry_settings: Option<RetrySettings>,
    attempt_timeout: Option<Duration>,
    user_headers: HeaderMap,
    agent_header: Option<AgentHeader>,
    page_streaming: bool,
    long_running: bool,
    streaming: Option<StreamingType>,
}

impl CallOptions {
    /// Creates options with no retry, timeout, or descriptors.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the retry settings for this call.
    pub fn with_retry_settings(mut self, v: RetrySettings) -> Self {
        self.retry_settings = Some(v);
        self
    }

    /// Sets a flat per-attempt timeout.
    ///
    /// With retries enabled the per-attempt timeout comes from the retry
    /// settings; this value applies when retries are not configured.
    pub fn with_attempt_timeout<V: Into<Duration>>(mut self, v: V) -> Self {
        self.attempt_timeout = Some(v.into());
        self
    }

    /// Adds user-supplied headers.
    ///
    /// User headers never override the reserved client-identification
    /// header.
    pub fn with_user_headers(mut self, v: HeaderMap) -> Self {
        self.user_headers = v;
        self
    }

    /// Sets the precomputed agent header for this call.
    pub fn with_agent_header(mut self, v: AgentHeader) -> Self {
        self.agent_header = Some(v);
        self
    }

    /// Marks the call as page-streaming.
    pub fn with_page_streaming(mut self) -> Self {
        self.page_streaming = true;
        self
    }

    /// Marks the call as long-running.
    pub fn with_long_running(mut self) -> Self {
        self.long_running = true;
        self
    }

    /// Marks the call as gRPC-streaming.
    pub fn with_streaming(mut self, v: StreamingType) -> Self {
        self.streaming = Some(v);
        self
    }

    /// The retry settings, if any.
    pub fn retry_settings(&self) -> Option<&RetrySettings> {
        self.retry_settings.as_ref()
    }

    /// The flat per-attempt timeout, if any.
    pub fn attempt_timeout(&self) -> Option<Duration> {
        self.attempt_timeout
    }

    /// The user-supplied headers.
    pub fn user_headers(&self) -> &HeaderMap {
        &self.user_headers
    }

    /// The agent header, if any.
    pub fn agent_header(&self) -> Option<&AgentHeader> {
        self.agent_header.as_ref()
    }

    /// True if the call is page-streaming.
    pub fn is_page_streaming(&self) -> bool {
        self.page_streaming
    }

    /// True if the call is long-running.
    pub fn is_long_running(&self) -> bool {
        self.long_running
    }

    /// The streaming arity, if the call is gRPC-streaming.
    pub fn streaming(&self) -> Option<StreamingType> {
        self.streaming
    }

    /// Layers `overrides` over these options, returning the result.
    ///
    /// Set fields in `overrides` win. Headers merge by key, with the
    /// override's value winning on conflicts. Neither input is modified.
    pub fn merge(&self, overrides: &CallOptions) -> CallOptions {
        let mut merged = self.clone();
        if let Some(v) = &overrides.retry_settings {
            merged.retry_settings = Some(v.clone());
        }
        if let Some(v) = overrides.attempt_timeout {
            merged.attempt_timeout = Some(v);
        }
        for (key, value) in overrides.user_headers.iter() {
            merged.user_headers.insert(key, value.clone());
        }
        if let Some(v) = &overrides.agent_header {
            merged.agent_header = Some(v.clone());
        }
        merged.page_streaming |= overrides.page_streaming;
        merged.long_running |= overrides.long_running;
        if let Some(v) = overrides.streaming {
            merged.streaming = Some(v);
        }
        merged
    }

    /// Verifies the descriptor combination before any call is attempted.
    ///
    /// A streaming call cannot carry retry settings, a paging descriptor, or
    /// a long-running descriptor, and a call cannot be both paging and
    /// long-running.
    pub fn validate(&self) -> crate::Result<()> {
        if self.streaming.is_some() {
            if self.retry_settings.is_some() {
                return Err(Error::validation(
                    "streaming calls cannot be combined with retry settings",
                ));
            }
            if self.page_streaming {
                return Err(Error::validation(
                    "streaming calls cannot be combined with page streaming",
                ));
            }
            if self.long_running {
                return Err(Error::validation(
                    "streaming calls cannot be combined with long-running operations",
                ));
            }
        }
        if self.page_streaming && self.long_running {
            return Err(Error::validation(
                "a call cannot be both page-streaming and long-running",
            ));
        }
        Ok(())
    }
}
