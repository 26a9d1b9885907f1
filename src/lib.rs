//! # api-helper - Typed JSON REST client
//!
//! A small REST client that sends GET/POST/PUT/DELETE requests, optionally
//! authenticates them with an OAuth2 client-credentials bearer token, and
//! decodes JSON responses into caller-specified types.
//!
#![deny(unsafe_code)]

//! ## Quick Start
//!
//! ```rust,no_run
//! use api_helper::prelude::*;
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct UserDto {
//!     id: u32,
//!     name: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ApiError> {
//!     let config = ClientConfig::from_env(true);
//!     let client = RestClient::new(config);
//!
//!     let user: UserDto = client.get("https://api.example.com/users/1").await?;
//!     println!("{} {}", user.id, user.name);
//!     Ok(())
//! }
//! ```
//!
//! ## Behavior notes
//!
//! - Each call opens its own connection and releases it before returning.
//! - With auth enabled a token is requested on every call unless the client is
//!   built with [`RestClientBuilder::cache_tokens`].
//! - The HTTP status is ignored by default and the body is decoded regardless;
//!   use [`StatusPolicy::RequireSuccess`] to fail on non-2xx responses.

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod telemetry;

pub use client::{RestClient, RestClientBuilder};
pub use config::{ClientConfig, ClientConfigBuilder, StatusPolicy};
pub use error::{ApiError, ErrorCategory, Result};

/// Commonly used types.
pub mod prelude {
    pub use crate::auth::{
        AccessToken, CachedTokenProvider, ClientCredentialsTokenProvider, StaticTokenProvider,
        TokenProvider,
    };
    pub use crate::client::{RestClient, RestClientBuilder};
    pub use crate::config::{ClientConfig, StatusPolicy};
    pub use crate::error::{ApiError, ErrorCategory};
    pub use tokio_util::sync::CancellationToken;
}
