//! HTTP Headers Utility
//!
//! Builds the header set sent with every request and merges caller headers
//! into it.
//!
//! Merge policy:
//! - defaults go in first (`Accept: application/json`, `Content-Type` for
//!   requests with a body, the configured `User-Agent`)
//! - caller headers are applied in sorted key order and replace any
//!   non-reserved header of the same (case-insensitive) name
//! - `Accept` and `Authorization` are reserved; caller values for them are
//!   dropped
//! - `Authorization: Bearer <token>` is added last, once the merged set is
//!   known to be valid

use crate::error::ApiError;
use reqwest::header::{
    ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, USER_AGENT,
};
use std::collections::HashMap;

pub const APPLICATION_JSON: &str = "application/json";

/// Headers the client owns and callers cannot override.
pub fn is_reserved(name: &HeaderName) -> bool {
    *name == ACCEPT || *name == AUTHORIZATION
}

/// HTTP header builder for API requests
pub struct HttpHeaderBuilder {
    headers: HeaderMap,
}

impl HttpHeaderBuilder {
    /// Create a new header builder
    pub fn new() -> Self {
        Self {
            headers: HeaderMap::new(),
        }
    }

    /// Add `Accept: application/json`
    pub fn with_json_accept(mut self) -> Self {
        self.headers
            .insert(ACCEPT, HeaderValue::from_static(APPLICATION_JSON));
        self
    }

    /// Add Bearer token authorization
    pub fn with_bearer_auth(mut self, token: &str) -> Result<Self, ApiError> {
        let mut value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|e| {
            ApiError::AuthenticationError(format!("Invalid access token format: {e}"))
        })?;
        value.set_sensitive(true);
        self.headers.insert(AUTHORIZATION, value);
        Ok(self)
    }

    /// Add JSON content type
    pub fn with_json_content_type(mut self) -> Self {
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));
        self
    }

    /// Add user agent
    pub fn with_user_agent(mut self, user_agent: &str) -> Result<Self, ApiError> {
        self.headers.insert(
            USER_AGENT,
            HeaderValue::from_str(user_agent)
                .map_err(|e| ApiError::ConfigurationError(format!("Invalid user agent: {e}")))?,
        );
        Ok(self)
    }

    /// Build the final HeaderMap
    pub fn build(self) -> HeaderMap {
        self.headers
    }
}

impl Default for HttpHeaderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue), ApiError> {
    let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
        ApiError::ConfigurationError(format!("Invalid header name '{name}': {e}"))
    })?;
    let header_value = HeaderValue::from_str(value).map_err(|e| {
        ApiError::ConfigurationError(format!("Invalid header value for '{name}': {e}"))
    })?;
    Ok((header_name, header_value))
}

/// Merge caller headers into `base` following the module's merge policy.
///
/// Invalid header names or values fail the whole merge.
pub fn merge_request_headers(
    mut base: HeaderMap,
    extra: &HashMap<String, String>,
) -> Result<HeaderMap, ApiError> {
    let mut keys: Vec<&String> = extra.keys().collect();
    keys.sort();
    for key in keys {
        let (name, value) = parse_header(key, &extra[key])?;
        if is_reserved(&name) {
            tracing::warn!(target: "api_helper::http", header = %name, "ignoring caller-supplied reserved header");
            continue;
        }
        base.insert(name, value);
    }
    Ok(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_builder() {
        let headers = HttpHeaderBuilder::new()
            .with_json_accept()
            .with_bearer_auth("test-token")
            .unwrap()
            .with_json_content_type()
            .with_user_agent("test-agent")
            .unwrap()
            .build();

        assert_eq!(headers.get(ACCEPT).unwrap(), "application/json");
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer test-token");
        assert!(headers.get(AUTHORIZATION).unwrap().is_sensitive());
        assert_eq!(headers.get(CONTENT_TYPE).unwrap(), "application/json");
        assert_eq!(headers.get(USER_AGENT).unwrap(), "test-agent");
    }

    #[test]
    fn caller_overrides_non_reserved_default() {
        let base = HttpHeaderBuilder::new()
            .with_json_accept()
            .with_user_agent("default-agent")
            .unwrap()
            .build();
        let extra = HashMap::from([
            ("User-Agent".to_string(), "caller-agent".to_string()),
            ("X-Request-Source".to_string(), "tests".to_string()),
        ]);

        let merged = merge_request_headers(base, &extra).unwrap();
        assert_eq!(merged.get(USER_AGENT).unwrap(), "caller-agent");
        assert_eq!(merged.get("x-request-source").unwrap(), "tests");
    }

    #[test]
    fn reserved_headers_are_kept() {
        let base = HttpHeaderBuilder::new()
            .with_json_accept()
            .with_bearer_auth("abc")
            .unwrap()
            .build();
        let extra = HashMap::from([
            ("accept".to_string(), "text/plain".to_string()),
            ("Authorization".to_string(), "Basic Zm9vOmJhcg==".to_string()),
        ]);

        let merged = merge_request_headers(base, &extra).unwrap();
        assert_eq!(merged.get_all(ACCEPT).iter().count(), 1);
        assert_eq!(merged.get(ACCEPT).unwrap(), "application/json");
        assert_eq!(merged.get(AUTHORIZATION).unwrap(), "Bearer abc");
    }

    #[test]
    fn case_variants_resolve_deterministically() {
        let extra = HashMap::from([
            ("X-Tenant".to_string(), "upper".to_string()),
            ("x-tenant".to_string(), "lower".to_string()),
        ]);
        // Sorted order puts "X-Tenant" before "x-tenant", so the lowercase key wins.
        for _ in 0..16 {
            let merged = merge_request_headers(HeaderMap::new(), &extra).unwrap();
            assert_eq!(merged.get("x-tenant").unwrap(), "lower");
        }
    }

    #[test]
    fn invalid_header_name_is_configuration_error() {
        let extra = HashMap::from([("bad header".to_string(), "v".to_string())]);
        let err = merge_request_headers(HeaderMap::new(), &extra).unwrap_err();
        assert!(matches!(err, ApiError::ConfigurationError(_)));
    }
}
