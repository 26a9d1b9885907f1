//! Caching decorator for token providers.
//!
//! Opt-in: the client itself never caches. Wrapping a provider in
//! [`CachedTokenProvider`] keeps the last token in memory and refreshes it
//! once it gets within the safety window of its expiry.

use super::{AccessToken, TokenProvider};
use crate::error::ApiError;
use async_trait::async_trait;
use chrono::Duration;
use tokio::sync::Mutex;

/// Safety window (seconds) to refresh before expiry
const EXPIRY_SAFETY_WINDOW: i64 = 300; // 5 minutes

/// Token provider that reuses tokens until they near expiry.
pub struct CachedTokenProvider<P> {
    inner: P,
    // Held across the refresh so concurrent callers wait for a single fetch.
    cache: Mutex<Option<AccessToken>>,
    window: Duration,
}

impl<P: TokenProvider> CachedTokenProvider<P> {
    pub fn new(inner: P) -> Self {
        Self::with_window(inner, Duration::seconds(EXPIRY_SAFETY_WINDOW))
    }

    /// Use a custom refresh window.
    pub fn with_window(inner: P, window: Duration) -> Self {
        Self {
            inner,
            cache: Mutex::new(None),
            window,
        }
    }

    /// Drop the cached token so the next call fetches a fresh one.
    pub async fn invalidate(&self) {
        *self.cache.lock().await = None;
    }
}

#[async_trait]
impl<P: TokenProvider> TokenProvider for CachedTokenProvider<P> {
    async fn token(&self) -> Result<AccessToken, ApiError> {
        let mut guard = self.cache.lock().await;
        if let Some(token) = guard.as_ref()
            && !token.expires_within(self.window)
        {
            return Ok(token.clone());
        }
        let fresh = self.inner.token().await?;
        tracing::debug!(target: "api_helper::auth", expires_on = %fresh.expires_on, "cached new token");
        *guard = Some(fresh.clone());
        Ok(fresh)
    }
}
