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

//! The retry loop used by the call pipeline.

use crate::Result;
use crate::error::Error;
use crate::error::rpc::Code;
use crate::retry_settings::RetrySettings;
use futures::future::BoxFuture;
use std::time::{Duration, Instant};

/// Runs the retry loop for a given function.
///
/// This function calls `inner` as long as (1) the total time budget in
/// `settings` has not expired, (2) the inner function has not returned a
/// successful response, and (3) the last error carries a retryable status
/// code.
///
/// Each attempt receives a timeout: the per-attempt timeout from `settings`,
/// grown by the configured scaling factor after each failure, and clamped to
/// the time remaining in the total budget.
///
/// In between attempts the loop waits the amount of time prescribed by the
/// backoff policy, using `sleep` to implement the wait. The one exception is
/// a failure with [Code::DeadlineExceeded]: the attempt already consumed its
/// share of the budget, so the next attempt starts immediately.
///
/// When the budget expires the loop returns an [exhausted][Error::is_exhausted]
/// error wrapping the last attempt's error. A non-retryable error is returned
/// unmodified.
///
/// `now` is the clock. Production code passes a thin wrapper over
/// [Instant::now]; tests inject a fake clock advanced by their fake `sleep`.
///
/// `inner` and `sleep` return boxed futures so the loop can run inside the
/// boxed futures of the call pipeline's middleware stack.
pub async fn retry_loop<'a, F, S, N, Response>(
    mut inner: F,
    sleep: S,
    now: N,
    settings: &RetrySettings,
) -> Result<Response>
where
    F: FnMut(Option<Duration>) -> BoxFuture<'a, Result<Response>> + Send,
    S: Fn(Duration) -> BoxFuture<'a, ()> + Send,
    N: Fn() -> Instant + Send,
{
    if !settings.retries_enabled() {
        return inner(settings.no_retries_timeout()).await;
    }
    let loop_start = now();
    let deadline = loop_start + settings.total_timeout();
    let backoff = settings.backoff_policy();
    let mut attempt_count = 0_u32;
    loop {
        attempt_count += 1;
        let remaining = deadline.saturating_duration_since(now());
        let timeout = std::cmp::min(settings.attempt_timeout(attempt_count), remaining);
        let error = match inner(Some(timeout)).await {
            Ok(response) => return Ok(response),
            Err(e) => e,
        };
        let code = error.code();
        if !code.is_some_and(|c| settings.retryable(c)) {
            return Err(error);
        }
        if now() >= deadline {
            return Err(Error::exhausted(error));
        }
        if code == Some(Code::DeadlineExceeded) {
            // The attempt consumed its full timeout. Waiting again would
            // only burn more of the budget.
            tracing::debug!(attempt_count, "retrying immediately after attempt deadline");
            continue;
        }
        let delay = backoff.on_failure(loop_start, attempt_count);
        tracing::debug!(attempt_count, ?delay, "retrying after transient error");
        sleep(delay).await;
        if now() >= deadline {
            return Err(Error::exhausted(error));
        }
    }
}
