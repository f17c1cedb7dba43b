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

//! The call construction pipeline.
//!
//! A [Pipeline] composes [CallMiddleware] layers around a
//! [UnaryTransport] in a fixed, order-sensitive sequence. The standard
//! stack is:
//!
//! 1. header injection (outermost),
//! 2. retry and timeout,
//! 3. the transport.
//!
//! Middleware is type-preserving: each layer sees the same request and
//! response types. Paging and long-running treatments change the result
//! type, so they wrap the composed pipeline from the outside (see
//! [paginator][crate::paginator] and [operation][crate::operation]).

use crate::Result;
use crate::api_header::API_CLIENT_HEADER;
use crate::call::Call;
use crate::options::CallOptions;
use crate::retry_loop::retry_loop;
use crate::transport::UnaryTransport;
use futures::FutureExt;
use http::HeaderName;
use std::sync::Arc;
use std::time::Duration;

/// One layer of the call pipeline.
///
/// Implementations decorate the call or its outcome and delegate to `next`.
/// A layer may invoke `next` zero, one, or many times; `next` is `Copy` so a
/// retry layer can replay the remainder of the stack per attempt.
#[async_trait::async_trait]
pub trait CallMiddleware<Req, Resp>: Send + Sync {
    async fn invoke(
        &self,
        call: Call<Req>,
        options: &CallOptions,
        timeout: Option<Duration>,
        next: Next<'_, Req, Resp>,
    ) -> Result<Resp>;
}

/// The remainder of the pipeline after the current middleware.
pub struct Next<'a, Req, Resp> {
    stack: &'a [Arc<dyn CallMiddleware<Req, Resp>>],
    transport: &'a dyn UnaryTransport<Req, Resp>,
}

impl<Req, Resp> Clone for Next<'_, Req, Resp> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<Req, Resp> Copy for Next<'_, Req, Resp> {}

impl<Req, Resp> Next<'_, Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    /// Runs the rest of the stack, ending at the transport.
    pub async fn run(
        self,
        call: Call<Req>,
        options: &CallOptions,
        timeout: Option<Duration>,
    ) -> Result<Resp> {
        match self.stack.split_first() {
            Some((middleware, rest)) => {
                let next = Next {
                    stack: rest,
                    transport: self.transport,
                };
                middleware.invoke(call, options, timeout, next).await
            }
            None => self.transport.call(call, timeout).await,
        }
    }
}

/// Injects user and agent headers into the call metadata.
///
/// The merge order is: original call metadata, then user headers, then the
/// agent header. The reserved client-identification key is always owned by
/// the agent header; user headers may add arbitrary other keys.
#[derive(Debug, Default)]
pub struct HeaderInjection;

#[async_trait::async_trait]
impl<Req, Resp> CallMiddleware<Req, Resp> for HeaderInjection
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    async fn invoke(
        &self,
        call: Call<Req>,
        options: &CallOptions,
        timeout: Option<Duration>,
        next: Next<'_, Req, Resp>,
    ) -> Result<Resp> {
        let mut metadata = call.metadata().clone();
        for (key, value) in options.user_headers().iter() {
            metadata.insert(key, value.clone());
        }
        if let Some(agent) = options.agent_header() {
            metadata.insert(
                HeaderName::from_static(API_CLIENT_HEADER),
                agent.header_value(),
            );
        }
        let call = call.with_metadata(metadata);
        next.run(call, options, timeout).await
    }
}

/// Applies the retry loop, or a flat timeout when retries are not
/// configured.
#[derive(Debug, Default)]
pub struct Retry;

#[async_trait::async_trait]
impl<Req, Resp> CallMiddleware<Req, Resp> for Retry
where
    Req: Clone + Send + Sync + 'static,
    Resp: Send + 'static,
{
    async fn invoke(
        &self,
        call: Call<Req>,
        options: &CallOptions,
        _timeout: Option<Duration>,
        next: Next<'_, Req, Resp>,
    ) -> Result<Resp> {
        match options.retry_settings() {
            Some(settings) => {
                let inner = move |timeout| next.run(call.clone(), options, timeout).boxed();
                let sleep = |d| tokio::time::sleep(d).boxed();
                retry_loop(inner, sleep, std::time::Instant::now, settings).await
            }
            None => next.run(call, options, options.attempt_timeout()).await,
        }
    }
}

/// A composed middleware stack over a transport.
pub struct Pipeline<Req, Resp> {
    stack: Vec<Arc<dyn CallMiddleware<Req, Resp>>>,
    transport: Arc<dyn UnaryTransport<Req, Resp>>,
}

impl<Req, Resp> Pipeline<Req, Resp>
where
    Req: Clone + Send + Sync + 'static,
    Resp: Send + 'static,
{
    /// Creates a pipeline with an empty stack: calls go straight to the
    /// transport.
    pub fn new(transport: Arc<dyn UnaryTransport<Req, Resp>>) -> Self {
        Self {
            stack: Vec::new(),
            transport,
        }
    }

    /// Creates the standard stack: header injection, then retry/timeout,
    /// then the transport.
    pub fn standard(transport: Arc<dyn UnaryTransport<Req, Resp>>) -> Self {
        Self {
            stack: vec![Arc::new(HeaderInjection), Arc::new(Retry)],
            transport,
        }
    }

    /// Appends a middleware to the inner end of the stack.
    pub fn with_middleware(mut self, middleware: Arc<dyn CallMiddleware<Req, Resp>>) -> Self {
        self.stack.push(middleware);
        self
    }

    /// Runs `call` through the stack.
    ///
    /// The descriptor combination in `options` is validated first; conflicts
    /// fail before any middleware or transport work.
    pub async fn execute(&self, call: Call<Req>, options: &CallOptions) -> Result<Resp> {
        options.validate()?;
        let next = Next {
            stack: &self.stack,
            transport: self.transport.as_ref(),
        };
        next.run(call, options, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::error::rpc::{Code, Status};
    use crate::exponential_backoff::ExponentialBackoffBuilder;
    use crate::options::StreamingType;
    use crate::retry_settings::RetrySettingsBuilder;
    use http::{HeaderMap, HeaderValue};
    use std::sync::Mutex;

    mockall::mock! {
        Transport {}
        #[async_trait::async_trait]
        impl UnaryTransport<String, String> for Transport {
            async fn call(&self, call: Call<String>, timeout: Option<Duration>) -> Result<String>;
        }
    }

    fn transient() -> Error {
        Error::service(Status::default().set_code(Code::Unavailable))
    }

    #[tokio::test]
    async fn standard_stack_injects_headers() -> anyhow::Result<()> {
        let mut transport = MockTransport::new();
        transport.expect_call().once().returning(|call, _| {
            let agent = call.metadata().get(API_CLIENT_HEADER);
            assert_eq!(
                agent.and_then(|v| v.to_str().ok()),
                Some("gl-rust/1.85.0 gax/0.1.0")
            );
            assert_eq!(
                call.metadata().get("x-custom"),
                Some(&HeaderValue::from_static("user-value"))
            );
            Ok("response".to_string())
        });
        let pipeline = Pipeline::standard(Arc::new(transport));

        let agent = crate::api_header::AgentHeaderBuilder::new()
            .with_language_version("1.85.0")
            .with_gax_version("0.1.0")
            .build()?;
        let mut user = HeaderMap::new();
        user.insert("x-custom", HeaderValue::from_static("user-value"));
        // The user cannot override the reserved key.
        user.insert(API_CLIENT_HEADER, HeaderValue::from_static("forged"));
        let options = CallOptions::new()
            .with_agent_header(agent)
            .with_user_headers(user);

        let response = pipeline
            .execute(Call::new("svc/Method", "req".to_string()), &options)
            .await?;
        assert_eq!(response, "response");
        Ok(())
    }

    #[tokio::test]
    async fn standard_stack_retries() -> anyhow::Result<()> {
        let mut seq = mockall::Sequence::new();
        let mut transport = MockTransport::new();
        for _ in 0..2 {
            transport
                .expect_call()
                .once()
                .in_sequence(&mut seq)
                .returning(|_, _| Err(transient()));
        }
        transport
            .expect_call()
            .once()
            .in_sequence(&mut seq)
            .returning(|call, timeout| {
                assert!(timeout.is_some());
                Ok(format!("response to {}", call.request()))
            });
        let pipeline = Pipeline::standard(Arc::new(transport));

        let settings = RetrySettingsBuilder::new()
            .with_retryable_codes([Code::Unavailable])
            .with_backoff_policy(
                ExponentialBackoffBuilder::new()
                    .with_initial_delay(Duration::from_millis(1))
                    .with_maximum_delay(Duration::from_millis(1))
                    .build()?,
            )
            .build()?;
        let options = CallOptions::new().with_retry_settings(settings);

        let response = pipeline
            .execute(Call::new("svc/Method", "req".to_string()), &options)
            .await?;
        assert_eq!(response, "response to req");
        Ok(())
    }

    #[tokio::test]
    async fn flat_timeout_without_retry() -> anyhow::Result<()> {
        let mut transport = MockTransport::new();
        transport
            .expect_call()
            .once()
            .withf(|_, timeout| timeout == &Some(Duration::from_secs(12)))
            .returning(|_, _| Ok("response".to_string()));
        let pipeline = Pipeline::standard(Arc::new(transport));
        let options = CallOptions::new().with_attempt_timeout(Duration::from_secs(12));
        pipeline
            .execute(Call::new("svc/Method", "req".to_string()), &options)
            .await?;
        Ok(())
    }

    #[tokio::test]
    async fn descriptor_conflicts_fail_before_dispatch() -> anyhow::Result<()> {
        // The transport expects no calls.
        let transport = MockTransport::new();
        let pipeline = Pipeline::standard(Arc::new(transport));
        let options = CallOptions::new()
            .with_streaming(StreamingType::BidiStreaming)
            .with_retry_settings(RetrySettingsBuilder::new().build()?);
        let err = pipeline
            .execute(Call::new("svc/Method", "req".to_string()), &options)
            .await
            .expect_err("conflicting descriptors fail validation");
        assert!(err.is_validation(), "{err:?}");
        Ok(())
    }

    #[tokio::test]
    async fn middleware_order_is_fixed() -> anyhow::Result<()> {
        // Record the order in which layers run.
        struct Recorder(&'static str, Arc<Mutex<Vec<&'static str>>>);
        #[async_trait::async_trait]
        impl CallMiddleware<String, String> for Recorder {
            async fn invoke(
                &self,
                call: Call<String>,
                options: &CallOptions,
                timeout: Option<Duration>,
                next: Next<'_, String, String>,
            ) -> Result<String> {
                self.1.lock().unwrap().push(self.0);
                next.run(call, options, timeout).await
            }
        }

        let mut transport = MockTransport::new();
        transport
            .expect_call()
            .once()
            .returning(|_, _| Ok("response".to_string()));
        let order = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::new(Arc::new(transport))
            .with_middleware(Arc::new(Recorder("outer", order.clone())))
            .with_middleware(Arc::new(Recorder("inner", order.clone())));
        pipeline
            .execute(Call::new("svc/Method", "req".to_string()), &CallOptions::new())
            .await?;
        assert_eq!(*order.lock().unwrap(), vec!["outer", "inner"]);
        Ok(())
    }
}
