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

//! The configuration for retryable calls.
//!
//! [RetrySettings] bundles everything the retry loop needs to decide whether
//! and how to retry a failed attempt: the set of retryable status codes, the
//! overall deadline, the per-attempt timeout schedule, and the backoff policy
//! applied between attempts.

use crate::backoff_policy::{BackoffPolicy, BackoffPolicyArg};
use crate::error::rpc::Code;
use crate::exponential_backoff::ExponentialBackoff;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

/// The error type for retry settings creation.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("the attempt timeout scaling value ({0}) should be >= 1.0")]
    InvalidTimeoutScaling(f64),
    #[error(
        "the maximum attempt timeout ({maximum:?}) should be greater than or equal to the initial attempt timeout ({initial:?})"
    )]
    EmptyTimeoutRange {
        maximum: Duration,
        initial: Duration,
    },
    #[error("the total timeout ({0:?}) should be greater than zero when retries are enabled")]
    InvalidTotalTimeout(Duration),
}

/// Creates [RetrySettings] with validated parameters.
#[derive(Clone, Debug)]
pub struct RetrySettingsBuilder {
    retryable_codes: BTreeSet<Code>,
    total_timeout: Duration,
    initial_attempt_timeout: Duration,
    attempt_timeout_scaling: f64,
    maximum_attempt_timeout: Duration,
    backoff_policy: Option<Arc<dyn BackoffPolicy>>,
    retries_enabled: bool,
    no_retries_timeout: Option<Duration>,
}

impl RetrySettingsBuilder {
    /// Creates a builder with the default parameters.
    ///
    /// # Example
    /// ```
    /// # use rpc_gax::retry_settings::{Error, RetrySettingsBuilder};
    /// # use rpc_gax::error::rpc::Code;
    /// use std::time::Duration;
    ///
    /// let settings = RetrySettingsBuilder::new()
    ///     .with_retryable_codes([Code::Unavailable, Code::DeadlineExceeded])
    ///     .with_total_timeout(Duration::from_secs(300))
    ///     .build()?;
    /// # Ok::<(), Error>(())
    /// ```
    pub fn new() -> Self {
        Self {
            retryable_codes: BTreeSet::new(),
            total_timeout: Duration::from_secs(300),
            initial_attempt_timeout: Duration::from_secs(30),
            attempt_timeout_scaling: 1.0,
            maximum_attempt_timeout: Duration::from_secs(30),
            backoff_policy: None,
            retries_enabled: true,
            no_retries_timeout: None,
        }
    }

    /// Change the set of status codes considered retryable.
    pub fn with_retryable_codes<I: IntoIterator<Item = Code>>(mut self, v: I) -> Self {
        self.retryable_codes = v.into_iter().collect();
        self
    }

    /// Change the total time budget for the retry loop.
    pub fn with_total_timeout<V: Into<Duration>>(mut self, v: V) -> Self {
        self.total_timeout = v.into();
        self
    }

    /// Change the timeout for the first attempt.
    pub fn with_initial_attempt_timeout<V: Into<Duration>>(mut self, v: V) -> Self {
        self.initial_attempt_timeout = v.into();
        self
    }

    /// Change the scaling factor applied to the attempt timeout after each
    /// failure.
    pub fn with_attempt_timeout_scaling<V: Into<f64>>(mut self, v: V) -> Self {
        self.attempt_timeout_scaling = v.into();
        self
    }

    /// Change the upper bound on the attempt timeout.
    pub fn with_maximum_attempt_timeout<V: Into<Duration>>(mut self, v: V) -> Self {
        self.maximum_attempt_timeout = v.into();
        self
    }

    /// Change the backoff policy applied between attempts.
    pub fn with_backoff_policy<V: Into<BackoffPolicyArg>>(mut self, v: V) -> Self {
        self.backoff_policy = Some(v.into().0);
        self
    }

    /// Disable retries. The call makes a single attempt.
    pub fn without_retries(mut self) -> Self {
        self.retries_enabled = false;
        self
    }

    /// Change the timeout used when retries are disabled.
    pub fn with_no_retries_timeout<V: Into<Duration>>(mut self, v: V) -> Self {
        self.no_retries_timeout = Some(v.into());
        self
    }

    /// Creates new retry settings.
    pub fn build(self) -> Result<RetrySettings, Error> {
        if self.attempt_timeout_scaling < 1.0 {
            return Err(Error::InvalidTimeoutScaling(self.attempt_timeout_scaling));
        }
        if self.maximum_attempt_timeout < self.initial_attempt_timeout {
            return Err(Error::EmptyTimeoutRange {
                maximum: self.maximum_attempt_timeout,
                initial: self.initial_attempt_timeout,
            });
        }
        if self.retries_enabled && self.total_timeout.is_zero() {
            return Err(Error::InvalidTotalTimeout(self.total_timeout));
        }
        Ok(RetrySettings {
            retryable_codes: self.retryable_codes,
            total_timeout: self.total_timeout,
            initial_attempt_timeout: self.initial_attempt_timeout,
            attempt_timeout_scaling: self.attempt_timeout_scaling,
            maximum_attempt_timeout: self.maximum_attempt_timeout,
            backoff_policy: self
                .backoff_policy
                .unwrap_or_else(|| Arc::new(ExponentialBackoff::default())),
            retries_enabled: self.retries_enabled,
            no_retries_timeout: self.no_retries_timeout,
        })
    }
}

impl Default for RetrySettingsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The configuration for a retryable call.
#[derive(Clone, Debug)]
pub struct RetrySettings {
    retryable_codes: BTreeSet<Code>,
    total_timeout: Duration,
    initial_attempt_timeout: Duration,
    attempt_timeout_scaling: f64,
    maximum_attempt_timeout: Duration,
    backoff_policy: Arc<dyn BackoffPolicy>,
    retries_enabled: bool,
    no_retries_timeout: Option<Duration>,
}

impl RetrySettings {
    /// Returns a builder seeded with the current values.
    pub fn into_builder(self) -> RetrySettingsBuilder {
        RetrySettingsBuilder {
            retryable_codes: self.retryable_codes,
            total_timeout: self.total_timeout,
            initial_attempt_timeout: self.initial_attempt_timeout,
            attempt_timeout_scaling: self.attempt_timeout_scaling,
            maximum_attempt_timeout: self.maximum_attempt_timeout,
            backoff_policy: Some(self.backoff_policy),
            retries_enabled: self.retries_enabled,
            no_retries_timeout: self.no_retries_timeout,
        }
    }

    /// Returns true if `code` should be retried.
    pub fn retryable(&self, code: Code) -> bool {
        self.retryable_codes.contains(&code)
    }

    /// The set of retryable status codes.
    pub fn retryable_codes(&self) -> &BTreeSet<Code> {
        &self.retryable_codes
    }

    /// The total time budget for the retry loop.
    pub fn total_timeout(&self) -> Duration {
        self.total_timeout
    }

    /// Returns false when the call should make a single attempt.
    pub fn retries_enabled(&self) -> bool {
        self.retries_enabled
    }

    /// The timeout for a call with retries disabled, if any.
    pub fn no_retries_timeout(&self) -> Option<Duration> {
        self.no_retries_timeout
    }

    /// The backoff policy applied between attempts.
    pub fn backoff_policy(&self) -> Arc<dyn BackoffPolicy> {
        self.backoff_policy.clone()
    }

    /// The timeout for attempt number `attempt_count` (1-based), before
    /// clamping to the remaining time budget.
    ///
    /// The timeout grows by the scaling factor after each attempt, truncated
    /// at the maximum attempt timeout.
    pub fn attempt_timeout(&self, attempt_count: u32) -> Duration {
        let exp = std::cmp::min(i32::MAX as u32, attempt_count) as i32;
        let exp = exp.saturating_sub(1);
        let scaling = self.attempt_timeout_scaling.powi(exp);
        if scaling
            >= self
                .maximum_attempt_timeout
                .div_duration_f64(self.initial_attempt_timeout)
        {
            self.maximum_attempt_timeout
        } else {
            self.initial_attempt_timeout.mul_f64(scaling)
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            retryable_codes: BTreeSet::new(),
            total_timeout: Duration::from_secs(300),
            initial_attempt_timeout: Duration::from_secs(30),
            attempt_timeout_scaling: 1.0,
            maximum_attempt_timeout: Duration::from_secs(30),
            backoff_policy: Arc::new(ExponentialBackoff::default()),
            retries_enabled: true,
            no_retries_timeout: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_errors() {
        let b = RetrySettingsBuilder::new()
            .with_attempt_timeout_scaling(0.5)
            .build();
        assert!(matches!(b, Err(Error::InvalidTimeoutScaling(_))), "{b:?}");

        let b = RetrySettingsBuilder::new()
            .with_initial_attempt_timeout(Duration::from_secs(60))
            .with_maximum_attempt_timeout(Duration::from_secs(30))
            .build();
        assert!(matches!(b, Err(Error::EmptyTimeoutRange { .. })), "{b:?}");

        let b = RetrySettingsBuilder::new()
            .with_total_timeout(Duration::ZERO)
            .build();
        assert!(matches!(b, Err(Error::InvalidTotalTimeout(_))), "{b:?}");
    }

    #[test]
    fn zero_total_timeout_allowed_without_retries() {
        let b = RetrySettingsBuilder::new()
            .with_total_timeout(Duration::ZERO)
            .without_retries()
            .build();
        assert!(b.is_ok(), "{b:?}");
    }

    #[test]
    fn retryable_codes() -> anyhow::Result<()> {
        let settings = RetrySettingsBuilder::new()
            .with_retryable_codes([Code::Unavailable, Code::DeadlineExceeded])
            .build()?;
        assert!(settings.retryable(Code::Unavailable));
        assert!(settings.retryable(Code::DeadlineExceeded));
        assert!(!settings.retryable(Code::PermissionDenied));
        Ok(())
    }

    #[test]
    fn attempt_timeout_scaling() -> anyhow::Result<()> {
        let settings = RetrySettingsBuilder::new()
            .with_initial_attempt_timeout(Duration::from_secs(10))
            .with_attempt_timeout_scaling(2.0)
            .with_maximum_attempt_timeout(Duration::from_secs(30))
            .build()?;
        assert_eq!(settings.attempt_timeout(1), Duration::from_secs(10));
        assert_eq!(settings.attempt_timeout(2), Duration::from_secs(20));
        assert_eq!(settings.attempt_timeout(3), Duration::from_secs(30));
        assert_eq!(settings.attempt_timeout(4), Duration::from_secs(30));
        Ok(())
    }

    #[test]
    fn attempt_timeout_fixed_when_scaling_is_one() -> anyhow::Result<()> {
        let settings = RetrySettingsBuilder::new()
            .with_initial_attempt_timeout(Duration::from_secs(10))
            .with_maximum_attempt_timeout(Duration::from_secs(10))
            .build()?;
        assert_eq!(settings.attempt_timeout(1), Duration::from_secs(10));
        assert_eq!(settings.attempt_timeout(5), Duration::from_secs(10));
        Ok(())
    }

    #[test]
    fn builder_roundtrip() -> anyhow::Result<()> {
        let settings = RetrySettingsBuilder::new()
            .with_retryable_codes([Code::Unavailable])
            .with_total_timeout(Duration::from_secs(60))
            .build()?;
        let settings = settings
            .into_builder()
            .with_total_timeout(Duration::from_secs(120))
            .build()?;
        assert_eq!(settings.total_timeout(), Duration::from_secs(120));
        assert!(settings.retryable(Code::Unavailable));
        Ok(())
    }
}
