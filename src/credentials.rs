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

//! The credentials boundary.
//!
//! The library does not implement any authentication flow. Token acquisition
//! lives behind the [TokenProvider] trait; [BearerTokenSource] turns a
//! provider into `Authorization` header values, caching each token until it
//! expires and refreshing on demand.
//!
//! Provider failures surface as authentication errors through the usual
//! [Error][crate::error::Error] taxonomy.

use crate::Result;
use crate::error::Error;
use http::HeaderValue;
use std::sync::Arc;
use std::time::Instant;

/// A time-limited access token.
#[derive(Clone, Debug, PartialEq)]
pub struct AccessToken {
    /// The token string, used verbatim in the `Authorization` header.
    pub token: String,

    /// The instant at which the token expires, or `None` for tokens that do
    /// not expire.
    pub expires_at: Option<Instant>,
}

impl AccessToken {
    fn expired(&self, now: Instant) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at <= now,
            None => false,
        }
    }
}

/// The boundary for token acquisition.
///
/// Implementations exchange some credential for an [AccessToken]. They may
/// be backed by a key file, a local metadata service, or a test fixture.
#[async_trait::async_trait]
pub trait TokenProvider: Send + Sync + std::fmt::Debug {
    /// Fetches a fresh token.
    async fn fetch_token(&self) -> Result<AccessToken>;

    /// A key identifying the credential, for caches shared across clients.
    fn cache_key(&self) -> Option<String> {
        None
    }
}

/// Produces `Authorization: Bearer ...` header values from a
/// [TokenProvider], caching the token until it expires.
#[derive(Clone, Debug)]
pub struct BearerTokenSource {
    provider: Arc<dyn TokenProvider>,
    cached: Arc<tokio::sync::Mutex<Option<AccessToken>>>,
}

impl BearerTokenSource {
    pub fn new(provider: Arc<dyn TokenProvider>) -> Self {
        Self {
            provider,
            cached: Arc::new(tokio::sync::Mutex::new(None)),
        }
    }

    /// The current token, fetching or refreshing as needed.
    pub async fn token(&self) -> Result<AccessToken> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if !token.expired(Instant::now()) {
                return Ok(token.clone());
            }
        }
        let token = self.provider.fetch_token().await?;
        *cached = Some(token.clone());
        Ok(token)
    }

    /// The `Authorization` header value for the current token.
    ///
    /// The value is marked sensitive so it is elided from debug output.
    pub async fn header_value(&self) -> Result<HeaderValue> {
        let token = self.token().await?;
        let mut value = HeaderValue::from_str(&format!("Bearer {}", token.token))
            .map_err(Error::authentication)?;
        value.set_sensitive(true);
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Debug)]
    struct FakeProvider {
        tokens: Mutex<std::collections::VecDeque<Result<AccessToken>>>,
        calls: Mutex<u32>,
    }

    impl FakeProvider {
        fn new(tokens: Vec<Result<AccessToken>>) -> Arc<Self> {
            Arc::new(Self {
                tokens: Mutex::new(tokens.into()),
                calls: Mutex::new(0),
            })
        }
        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait::async_trait]
    impl TokenProvider for FakeProvider {
        async fn fetch_token(&self) -> Result<AccessToken> {
            *self.calls.lock().unwrap() += 1;
            self.tokens
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(Error::authentication("fixture exhausted")))
        }
    }

    fn token(value: &str, ttl: Option<Duration>) -> AccessToken {
        AccessToken {
            token: value.to_string(),
            expires_at: ttl.map(|d| Instant::now() + d),
        }
    }

    #[tokio::test]
    async fn caches_until_expiry() -> anyhow::Result<()> {
        let provider = FakeProvider::new(vec![Ok(token("t1", Some(Duration::from_secs(3600))))]);
        let source = BearerTokenSource::new(provider.clone());
        assert_eq!(source.token().await?.token, "t1");
        assert_eq!(source.token().await?.token, "t1");
        assert_eq!(provider.calls(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn refreshes_expired_tokens() -> anyhow::Result<()> {
        let provider = FakeProvider::new(vec![
            // Already expired when first used.
            Ok(token("t1", Some(Duration::from_secs(0)))),
            Ok(token("t2", Some(Duration::from_secs(3600)))),
        ]);
        let source = BearerTokenSource::new(provider.clone());
        assert_eq!(source.token().await?.token, "t1");
        assert_eq!(source.token().await?.token, "t2");
        assert_eq!(source.token().await?.token, "t2");
        assert_eq!(provider.calls(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn non_expiring_tokens_never_refresh() -> anyhow::Result<()> {
        let provider = FakeProvider::new(vec![Ok(token("t1", None))]);
        let source = BearerTokenSource::new(provider.clone());
        for _ in 0..3 {
            assert_eq!(source.token().await?.token, "t1");
        }
        assert_eq!(provider.calls(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn header_value_is_bearer_and_sensitive() -> anyhow::Result<()> {
        let provider = FakeProvider::new(vec![Ok(token("secret", None))]);
        let source = BearerTokenSource::new(provider);
        let value = source.header_value().await?;
        assert_eq!(value.to_str()?, "Bearer secret");
        assert!(value.is_sensitive());
        Ok(())
    }

    #[tokio::test]
    async fn provider_errors_propagate() {
        let provider = FakeProvider::new(vec![Err(Error::authentication("key rejected"))]);
        let source = BearerTokenSource::new(provider);
        let err = source.token().await.expect_err("provider failure");
        assert!(err.is_authentication(), "{err:?}");
    }
}
