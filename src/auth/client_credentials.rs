//! OAuth 2.0 client-credentials token provider.
//!
//! The application authenticates as itself with its client id and secret and
//! receives a token for `<resource_id>/.default`. No caching happens here:
//! every call to [`TokenProvider::token`] performs a fresh grant. Wrap the
//! provider in [`CachedTokenProvider`](super::CachedTokenProvider) to reuse
//! tokens until they near expiry.

use super::{AccessToken, TokenProvider};
use crate::config::ClientConfig;
use crate::error::ApiError;
use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::Deserialize;
use std::sync::Arc;

const GRANT_TYPE: &str = "client_credentials";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Client-credentials grant against the configured identity provider.
pub struct ClientCredentialsTokenProvider {
    config: Arc<ClientConfig>,
}

impl ClientCredentialsTokenProvider {
    pub fn new(config: Arc<ClientConfig>) -> Self {
        Self { config }
    }

    fn check_config(&self) -> Result<(), ApiError> {
        let config = &self.config;
        let missing = [
            (
                "tenant id",
                config.tenant_id.is_empty() && config.token_endpoint.is_none(),
            ),
            ("client id", config.client_id.is_empty()),
            ("client secret", config.client_secret.expose_secret().is_empty()),
            ("resource id", config.resource_id.is_empty()),
        ];
        if let Some((name, _)) = missing.iter().find(|(_, empty)| *empty) {
            return Err(ApiError::AuthenticationError(format!(
                "Cannot request token: {name} is not configured"
            )));
        }
        Ok(())
    }

    /// Perform the client-credentials grant to obtain a new access token.
    async fn fetch_new_token(&self) -> Result<AccessToken, ApiError> {
        self.check_config()?;

        let token_url = self.config.token_url();
        let scope = self.config.scope();
        let form = [
            ("grant_type", GRANT_TYPE),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.expose_secret()),
            ("scope", scope.as_str()),
        ];

        let mut builder = reqwest::Client::builder().pool_max_idle_per_host(0);
        if let Some(timeout) = self.config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(|e| {
            ApiError::AuthenticationError(format!("Failed to build HTTP client: {e}"))
        })?;

        tracing::debug!(target: "api_helper::auth", url = %token_url, scope = %scope, "requesting client-credentials token");

        let resp = http
            .post(&token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                ApiError::AuthenticationError(format!("Token endpoint request failed: {e}"))
            })?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| {
            ApiError::AuthenticationError(format!("Failed to read token response: {e}"))
        })?;

        if !status.is_success() {
            let detail = serde_json::from_str::<TokenErrorResponse>(&text)
                .map(|e| match e.error_description {
                    Some(desc) => format!("{}: {}", e.error, desc),
                    None => e.error,
                })
                .unwrap_or(text);
            return Err(ApiError::AuthenticationError(format!(
                "Token endpoint returned {}: {detail}",
                status.as_u16()
            )));
        }

        let tr: TokenResponse = serde_json::from_str(&text).map_err(|e| {
            ApiError::AuthenticationError(format!("Failed to parse token response: {e}"))
        })?;
        if let Some(kind) = &tr.token_type
            && !kind.eq_ignore_ascii_case("bearer")
        {
            return Err(ApiError::AuthenticationError(format!(
                "Unsupported token type: {kind}"
            )));
        }

        let token = AccessToken::expiring_in(tr.access_token, tr.expires_in).ok_or_else(|| {
            ApiError::AuthenticationError(format!("Invalid expires_in: {}", tr.expires_in))
        })?;
        tracing::debug!(target: "api_helper::auth", expires_in = tr.expires_in, "token acquired");
        Ok(token)
    }
}

#[async_trait]
impl TokenProvider for ClientCredentialsTokenProvider {
    async fn token(&self) -> Result<AccessToken, ApiError> {
        self.fetch_new_token().await
    }
}
