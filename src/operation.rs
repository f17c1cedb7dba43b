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

//! Long-running operations.
//!
//! A method returning a long-running operation responds immediately with an
//! [Operation] envelope naming the server-side operation. [OperationResponse]
//! wraps the envelope with typed accessors and drives it to completion by
//! polling through an [OperationsClient].
//!
//! The wrapper is a small state machine. While the operation is pending the
//! result accessors return `None`; once the envelope reports done, exactly
//! one of [result][OperationResponse::result] or
//! [error][OperationResponse::error] is populated. After
//! [delete][OperationResponse::delete] the wrapper refuses further RPCs.

use crate::Result;
use crate::error::Error;
use crate::error::rpc::Status;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

/// The wire envelope of a long-running operation.
///
/// At most one of `response` and `error` is set, and only once `done` is
/// true.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    /// The server-assigned operation name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// True once the operation reached a terminal state.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub done: bool,

    /// Service-specific progress metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,

    /// The response message of a successful operation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,

    /// The failure status of a failed operation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Status>,
}

impl Operation {
    pub fn set_name<V: Into<String>>(mut self, v: V) -> Self {
        self.name = v.into();
        self
    }
    pub fn set_done(mut self, v: bool) -> Self {
        self.done = v;
        self
    }
    pub fn set_metadata(mut self, v: Value) -> Self {
        self.metadata = Some(v);
        self
    }
    pub fn set_response(mut self, v: Value) -> Self {
        self.response = Some(v);
        self
    }
    pub fn set_error(mut self, v: Status) -> Self {
        self.error = Some(v);
        self
    }
}

/// The boundary for the operations service.
///
/// A transport-backed implementation issues the corresponding RPCs of the
/// service's operations interface.
#[async_trait::async_trait]
pub trait OperationsClient: Send + Sync {
    /// Fetches the latest state of the named operation.
    async fn get(&self, name: &str) -> Result<Operation>;

    /// Requests cancellation of the named operation. Best-effort; the
    /// operation may still complete.
    async fn cancel(&self, name: &str) -> Result<()>;

    /// Deletes the server-side record of the named operation.
    async fn delete(&self, name: &str) -> Result<()>;
}

/// Settings for [poll_until_complete][OperationResponse::poll_until_complete].
#[derive(Clone, Debug)]
pub struct PollingSettings {
    interval: Duration,
    max_duration: Option<Duration>,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_duration: None,
        }
    }
}

impl PollingSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the delay between polls.
    pub fn with_interval(mut self, v: Duration) -> Self {
        self.interval = v;
        self
    }

    /// Bounds the total time spent polling. Unset polls until the operation
    /// completes.
    pub fn with_max_duration(mut self, v: Duration) -> Self {
        self.max_duration = Some(v);
        self
    }
}

/// A long-running operation with typed response and metadata.
///
/// # Parameters
/// * `R` - the response type when the operation completes successfully.
/// * `M` - the metadata type reported while the operation is in progress.
pub struct OperationResponse<R, M> {
    client: Arc<dyn OperationsClient>,
    operation: Operation,
    deleted: bool,
    response: PhantomData<R>,
    metadata: PhantomData<M>,
}

impl<R, M> OperationResponse<R, M>
where
    R: serde::de::DeserializeOwned,
    M: serde::de::DeserializeOwned,
{
    /// Wraps the envelope returned by the initiating RPC.
    pub fn new(client: Arc<dyn OperationsClient>, operation: Operation) -> Self {
        Self {
            client,
            operation,
            deleted: false,
            response: PhantomData,
            metadata: PhantomData,
        }
    }

    /// The server-assigned operation name.
    pub fn name(&self) -> &str {
        &self.operation.name
    }

    /// The last-seen envelope.
    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    /// True once the operation reached a terminal state.
    pub fn is_done(&self) -> bool {
        self.operation.done
    }

    /// True if the operation completed successfully.
    pub fn succeeded(&self) -> bool {
        self.operation.done && self.operation.response.is_some()
    }

    /// True if the operation completed with an error.
    pub fn failed(&self) -> bool {
        self.operation.done && self.operation.error.is_some()
    }

    /// The typed response, or `None` while the operation has not completed
    /// successfully. A malformed response payload is a deserialization
    /// error.
    pub fn result(&self) -> Result<Option<R>> {
        if !self.operation.done {
            return Ok(None);
        }
        match &self.operation.response {
            Some(value) => {
                let response = serde_json::from_value(value.clone()).map_err(Error::deser)?;
                Ok(Some(response))
            }
            None => Ok(None),
        }
    }

    /// The failure status, or `None` while the operation has not completed
    /// with an error.
    pub fn error(&self) -> Option<&Status> {
        if !self.operation.done {
            return None;
        }
        self.operation.error.as_ref()
    }

    /// The typed progress metadata, if the service reported any.
    pub fn metadata(&self) -> Result<Option<M>> {
        match &self.operation.metadata {
            None => Ok(None),
            Some(value) => {
                let metadata = serde_json::from_value(value.clone()).map_err(Error::deser)?;
                Ok(Some(metadata))
            }
        }
    }

    /// Replaces the envelope with the latest server-side state.
    pub async fn reload(&mut self) -> Result<()> {
        self.check_not_deleted()?;
        self.operation = self.client.get(&self.operation.name).await?;
        Ok(())
    }

    /// Requests cancellation.
    ///
    /// Cancellation is best-effort and asynchronous; the local state does
    /// not change. Callers observe the outcome through later reloads, where
    /// a cancelled operation completes with a `Cancelled` error.
    pub async fn cancel(&self) -> Result<()> {
        self.check_not_deleted()?;
        self.client.cancel(&self.operation.name).await
    }

    /// Deletes the server-side record of the operation.
    ///
    /// The service stops tracking the operation; it does not stop running
    /// it. After deletion any further RPC through this wrapper is a
    /// validation error.
    pub async fn delete(&mut self) -> Result<()> {
        self.check_not_deleted()?;
        self.client.delete(&self.operation.name).await?;
        self.deleted = true;
        Ok(())
    }

    /// Polls until the operation completes or the time bound expires.
    ///
    /// Returns `true` if the operation reached a terminal state, `false` if
    /// the bound in `settings` expired first. The wait before the last poll
    /// is clamped so the loop never blocks past the bound. Poll errors
    /// propagate.
    pub async fn poll_until_complete(&mut self, settings: PollingSettings) -> Result<bool> {
        self.check_not_deleted()?;
        let deadline = settings
            .max_duration
            .map(|d| tokio::time::Instant::now() + d);
        loop {
            if self.operation.done {
                return Ok(true);
            }
            let delay = match deadline {
                None => settings.interval,
                Some(deadline) => {
                    let remaining =
                        deadline.saturating_duration_since(tokio::time::Instant::now());
                    if remaining.is_zero() {
                        return Ok(false);
                    }
                    std::cmp::min(settings.interval, remaining)
                }
            };
            tracing::debug!(name = %self.operation.name, ?delay, "polling the operation");
            tokio::time::sleep(delay).await;
            self.reload().await?;
        }
    }

    fn check_not_deleted(&self) -> Result<()> {
        if self.deleted {
            return Err(Error::validation("the operation has been deleted"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::rpc::Code;
    use serde_json::json;

    mockall::mock! {
        Operations {}
        #[async_trait::async_trait]
        impl OperationsClient for Operations {
            async fn get(&self, name: &str) -> Result<Operation>;
            async fn cancel(&self, name: &str) -> Result<()>;
            async fn delete(&self, name: &str) -> Result<()>;
        }
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct TestResponse {
        output: String,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct TestMetadata {
        percent: i32,
    }

    type TestOperation = OperationResponse<TestResponse, TestMetadata>;

    fn pending(percent: i32) -> Operation {
        Operation::default()
            .set_name("op/123")
            .set_metadata(json!({"percent": percent}))
    }

    fn success() -> Operation {
        Operation::default()
            .set_name("op/123")
            .set_done(true)
            .set_response(json!({"output": "gs://x"}))
    }

    fn failure() -> Operation {
        Operation::default().set_name("op/123").set_done(true).set_error(
            Status::default()
                .set_code(Code::FailedPrecondition)
                .set_message("precondition"),
        )
    }

    #[test]
    fn envelope_serde() -> anyhow::Result<()> {
        let op: Operation = serde_json::from_value(json!({
            "name": "op/123",
            "done": true,
            "metadata": {"percent": 100},
            "response": {"output": "gs://x"},
        }))?;
        assert_eq!(op.name, "op/123");
        assert!(op.done);
        assert_eq!(op.response, Some(json!({"output": "gs://x"})));
        assert_eq!(op.error, None);

        let op: Operation = serde_json::from_value(json!({
            "name": "op/123",
            "done": true,
            "error": {"code": 9, "message": "precondition"},
        }))?;
        assert!(
            matches!(op.error, Some(ref s) if s.code == Code::FailedPrecondition),
            "{op:?}"
        );

        let pending: Operation = serde_json::from_value(json!({"name": "op/123"}))?;
        assert!(!pending.done);
        assert_eq!(pending.response, None);
        assert_eq!(pending.error, None);
        Ok(())
    }

    #[test]
    fn accessors_before_completion() -> anyhow::Result<()> {
        let op = TestOperation::new(Arc::new(MockOperations::new()), pending(25));
        assert!(!op.is_done());
        assert!(!op.succeeded());
        assert!(!op.failed());
        assert_eq!(op.result()?, None);
        assert_eq!(op.error(), None);
        assert_eq!(op.metadata()?, Some(TestMetadata { percent: 25 }));
        Ok(())
    }

    #[test]
    fn accessors_after_success() -> anyhow::Result<()> {
        let op = TestOperation::new(Arc::new(MockOperations::new()), success());
        assert!(op.is_done());
        assert!(op.succeeded());
        assert!(!op.failed());
        assert_eq!(
            op.result()?,
            Some(TestResponse {
                output: "gs://x".into()
            })
        );
        assert_eq!(op.error(), None);
        Ok(())
    }

    #[test]
    fn accessors_after_failure() -> anyhow::Result<()> {
        let op = TestOperation::new(Arc::new(MockOperations::new()), failure());
        assert!(op.is_done());
        assert!(!op.succeeded());
        assert!(op.failed());
        assert_eq!(op.result()?, None);
        assert_eq!(op.error().map(|s| s.code), Some(Code::FailedPrecondition));
        Ok(())
    }

    #[test]
    fn malformed_response_is_a_deser_error() {
        let op = Operation::default()
            .set_name("op/123")
            .set_done(true)
            .set_response(json!({"output": 42}));
        let op = TestOperation::new(Arc::new(MockOperations::new()), op);
        let err = op.result().expect_err("a mistyped payload fails");
        assert!(err.is_deserialization(), "{err:?}");
    }

    #[tokio::test]
    async fn reload_replaces_the_envelope() -> anyhow::Result<()> {
        let mut client = MockOperations::new();
        client
            .expect_get()
            .once()
            .withf(|name| name == "op/123")
            .returning(|_| Ok(success()));
        let mut op = TestOperation::new(Arc::new(client), pending(10));
        assert!(!op.is_done());
        op.reload().await?;
        assert!(op.succeeded());
        Ok(())
    }

    #[tokio::test]
    async fn cancel_is_best_effort() -> anyhow::Result<()> {
        let mut client = MockOperations::new();
        client
            .expect_cancel()
            .once()
            .withf(|name| name == "op/123")
            .returning(|_| Ok(()));
        let op = TestOperation::new(Arc::new(client), pending(10));
        op.cancel().await?;
        // The local state is unchanged until a reload observes the outcome.
        assert!(!op.is_done());
        Ok(())
    }

    #[tokio::test]
    async fn delete_blocks_further_rpcs() -> anyhow::Result<()> {
        let mut client = MockOperations::new();
        client.expect_delete().once().returning(|_| Ok(()));
        let mut op = TestOperation::new(Arc::new(client), pending(10));
        op.delete().await?;
        let err = op.reload().await.expect_err("reload after delete fails");
        assert!(err.is_validation(), "{err:?}");
        let err = op.cancel().await.expect_err("cancel after delete fails");
        assert!(err.is_validation(), "{err:?}");
        let err = op.delete().await.expect_err("a second delete fails");
        assert!(err.is_validation(), "{err:?}");
        // Local accessors still serve the last-seen envelope.
        assert_eq!(op.name(), "op/123");
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn poll_until_complete_returns_on_done() -> anyhow::Result<()> {
        let mut seq = mockall::Sequence::new();
        let mut client = MockOperations::new();
        client
            .expect_get()
            .once()
            .in_sequence(&mut seq)
            .returning(|_| Ok(pending(50)));
        client
            .expect_get()
            .once()
            .in_sequence(&mut seq)
            .returning(|_| Ok(success()));
        let mut op = TestOperation::new(Arc::new(client), pending(10));
        let settings = PollingSettings::new().with_interval(Duration::from_secs(10));
        let completed = op.poll_until_complete(settings).await?;
        assert!(completed);
        assert!(op.succeeded());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn poll_until_complete_respects_the_bound() -> anyhow::Result<()> {
        // The second wait is clamped to the 5s left of the bound, so the
        // loop returns at exactly t=15s after two polls.
        let mut client = MockOperations::new();
        client.expect_get().times(2).returning(|_| Ok(pending(50)));
        let mut op = TestOperation::new(Arc::new(client), pending(10));
        let start = tokio::time::Instant::now();
        let settings = PollingSettings::new()
            .with_interval(Duration::from_secs(10))
            .with_max_duration(Duration::from_secs(15));
        let completed = op.poll_until_complete(settings).await?;
        assert!(!completed);
        assert!(!op.is_done());
        assert_eq!(start.elapsed(), Duration::from_secs(15));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn poll_errors_propagate() -> anyhow::Result<()> {
        let mut client = MockOperations::new();
        client.expect_get().once().returning(|_| {
            Err(Error::service(
                Status::default().set_code(Code::NotFound),
            ))
        });
        let mut op = TestOperation::new(Arc::new(client), pending(10));
        let settings = PollingSettings::new().with_interval(Duration::from_secs(1));
        let err = op
            .poll_until_complete(settings)
            .await
            .expect_err("poll errors propagate");
        assert_eq!(err.code(), Some(Code::NotFound));
        Ok(())
    }
}
