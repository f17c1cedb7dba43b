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

//! The transport boundary.
//!
//! The library does not implement a network transport. Transports are
//! collaborators behind these traits: a unary call returns a discriminated
//! [Result] (a service error is an `Err` carrying a [Status], never a
//! panic), and streaming calls expose write/read/close primitives.
//!
//! [Status]: crate::error::rpc::Status

use crate::Result;
use crate::call::Call;
use crate::error::Error;
use crate::error::rpc::Status;
use crate::options::StreamingType;
use std::time::Duration;

/// The boundary for unary request/response transports.
#[async_trait::async_trait]
pub trait UnaryTransport<Req, Resp>: Send + Sync {
    /// Sends `call` and awaits the response.
    ///
    /// Expected failures, including non-OK service status, surface as `Err`.
    /// `timeout` bounds this single attempt; the transport must enforce it.
    async fn call(&self, call: Call<Req>, timeout: Option<Duration>) -> Result<Resp>;
}

/// The boundary for streaming transports.
///
/// One trait covers all three arities. A client-streaming call reads exactly
/// one response; a server-streaming call never writes.
#[async_trait::async_trait]
pub trait StreamingTransport<Req, Resp>: Send {
    /// Sends one message on the stream.
    async fn write(&mut self, message: Req) -> Result<()>;

    /// Receives the next message, or `None` at the end of the stream.
    async fn read(&mut self) -> Result<Option<Resp>>;

    /// Half-closes the stream; no further writes are possible.
    async fn close_write(&mut self) -> Result<()>;

    /// The final status of the call, available once the stream completes.
    async fn final_status(&mut self) -> Result<Status>;
}

/// A streaming call handle guarding the underlying stream against misuse.
///
/// Out-of-sequence operations (writing after [close_write]
/// [StreamingCall::close_write], reading past the end of the stream, writing
/// on a server-streaming call) are validation errors raised locally, before
/// reaching the transport.
pub struct StreamingCall<Req, Resp> {
    inner: Box<dyn StreamingTransport<Req, Resp>>,
    streaming_type: StreamingType,
    write_closed: bool,
    read_complete: bool,
}

impl<Req, Resp> StreamingCall<Req, Resp> {
    pub fn new(streaming_type: StreamingType, inner: Box<dyn StreamingTransport<Req, Resp>>) -> Self {
        Self {
            inner,
            streaming_type,
            write_closed: false,
            read_complete: false,
        }
    }

    /// The arity of this call.
    pub fn streaming_type(&self) -> StreamingType {
        self.streaming_type
    }

    /// Sends one message on the stream.
    pub async fn write(&mut self, message: Req) -> Result<()> {
        if self.streaming_type == StreamingType::ServerStreaming {
            return Err(Error::validation(
                "server-streaming calls cannot write messages",
            ));
        }
        if self.write_closed {
            return Err(Error::validation("the write side of the stream is closed"));
        }
        self.inner.write(message).await
    }

    /// Half-closes the stream.
    pub async fn close_write(&mut self) -> Result<()> {
        if self.streaming_type == StreamingType::ServerStreaming {
            return Err(Error::validation(
                "server-streaming calls have no write side to close",
            ));
        }
        if self.write_closed {
            return Err(Error::validation(
                "the write side of the stream is already closed",
            ));
        }
        self.write_closed = true;
        self.inner.close_write().await
    }

    /// Receives the next message, or `None` at the end of the stream.
    pub async fn read(&mut self) -> Result<Option<Resp>> {
        if self.read_complete {
            return Err(Error::validation("the stream already completed"));
        }
        let message = self.inner.read().await?;
        if message.is_none() {
            self.read_complete = true;
        }
        Ok(message)
    }

    /// The final status of the call.
    pub async fn final_status(&mut self) -> Result<Status> {
        self.inner.final_status().await
    }
}
