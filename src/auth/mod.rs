//! Authentication helpers and token providers.
//! This module defines a minimal trait to supply Bearer tokens for outgoing requests.

use crate::error::ApiError;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};

pub mod cache;
pub mod client_credentials;

pub use cache::CachedTokenProvider;
pub use client_credentials::ClientCredentialsTokenProvider;

/// A bearer token returned by an identity provider.
#[derive(Debug, Clone)]
pub struct AccessToken {
    token: SecretString,
    /// Instant after which the identity provider no longer accepts the token
    pub expires_on: DateTime<Utc>,
}

impl AccessToken {
    pub fn new(token: impl Into<String>, expires_on: DateTime<Utc>) -> Self {
        Self {
            token: SecretString::from(token.into()),
            expires_on,
        }
    }

    /// Token that expires `expires_in` seconds from now.
    ///
    /// Returns `None` when the expiry falls outside the representable range.
    pub fn expiring_in(token: impl Into<String>, expires_in: i64) -> Option<Self> {
        let expires_on = Duration::try_seconds(expires_in)
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))?;
        Some(Self::new(token, expires_on))
    }

    /// Raw token string for the `Authorization` header.
    pub fn secret(&self) -> &str {
        self.token.expose_secret()
    }

    /// True when the token expires within `window` of now.
    pub fn expires_within(&self, window: Duration) -> bool {
        self.expires_on - window <= Utc::now()
    }
}

/// An async Bearer token provider.
///
/// Notes:
/// - The interface is async to allow for network calls without blocking.
/// - Implementations decide whether to cache; the client asks for a token on
///   every authenticated call.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Returns a token suitable for the `Authorization: Bearer <token>` header.
    async fn token(&self) -> Result<AccessToken, ApiError>;
}

#[async_trait]
impl<T: TokenProvider + ?Sized> TokenProvider for std::sync::Arc<T> {
    async fn token(&self) -> Result<AccessToken, ApiError> {
        (**self).token().await
    }
}

/// A simple static token provider useful for tests and basic scenarios where
/// the token is managed externally.
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    /// Create a new static token provider.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn token(&self) -> Result<AccessToken, ApiError> {
        Ok(AccessToken::new(self.token.clone(), DateTime::<Utc>::MAX_UTC))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_provider_returns_token() {
        let provider = StaticTokenProvider::new("abc");
        let token = tokio_test::block_on(provider.token()).unwrap();
        assert_eq!(token.secret(), "abc");
        assert!(!token.expires_within(Duration::minutes(5)));
    }

    #[test]
    fn expiry_window() {
        let token = AccessToken::expiring_in("t", 60).unwrap();
        assert!(token.expires_within(Duration::minutes(5)));
        assert!(!token.expires_within(Duration::seconds(10)));
    }

    #[test]
    fn debug_redacts_token() {
        let token = AccessToken::expiring_in("very-secret-token", 3600).unwrap();
        assert!(!format!("{token:?}").contains("very-secret-token"));
    }

    #[test]
    fn out_of_range_lifetime_has_no_expiry() {
        assert!(AccessToken::expiring_in("t", i64::MAX).is_none());
        assert!(AccessToken::expiring_in("t", i64::MIN).is_none());
    }
}
