//! Client configuration.
//!
//! `ClientConfig` is built once and never mutated afterwards. Credential
//! fields are not validated here; an empty tenant, client id, secret or
//! resource only surfaces when a token is requested.

use secrecy::SecretString;
use std::time::Duration;

/// Default Azure AD / Entra ID authority host.
pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";

/// Environment keys read by [`ClientConfig::from_env`].
pub const ENV_TENANT_ID: &str = "AAD_TENANT_ID";
pub const ENV_CLIENT_ID: &str = "AAD_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "AAD_CLIENT_SECRET";
pub const ENV_RESOURCE_ID: &str = "AAD_RESOURCE_ID";
pub const ENV_AUTHORITY_HOST: &str = "AAD_AUTHORITY_HOST";

/// How the client treats the HTTP status of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusPolicy {
    /// Deserialize the body whatever the status code.
    #[default]
    Ignore,
    /// Fail with `ApiError::ApiError` on any non-2xx status.
    RequireSuccess,
}

/// Immutable client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Directory (tenant) identifier
    pub tenant_id: String,
    /// Application (client) identifier
    pub client_id: String,
    /// Client secret, redacted in `Debug` output
    pub client_secret: SecretString,
    /// Resource the token is requested for; the scope is `<resource_id>/.default`
    pub resource_id: String,
    /// Whether requests carry a bearer token
    pub auth_enabled: bool,
    /// Identity provider authority host
    pub authority_host: String,
    /// Full token endpoint override; bypasses `authority_host`/`tenant_id` routing
    pub token_endpoint: Option<String>,
    /// Per-request timeout; `None` keeps the transport default
    pub timeout: Option<Duration>,
    pub status_policy: StatusPolicy,
    pub user_agent: Option<String>,
}

impl ClientConfig {
    /// Create a config with empty credentials.
    pub fn new(auth_enabled: bool) -> Self {
        Self {
            tenant_id: String::new(),
            client_id: String::new(),
            client_secret: SecretString::from(String::new()),
            resource_id: String::new(),
            auth_enabled,
            authority_host: DEFAULT_AUTHORITY_HOST.to_string(),
            token_endpoint: None,
            timeout: None,
            status_policy: StatusPolicy::default(),
            user_agent: None,
        }
    }

    /// Create a new builder.
    pub fn builder(auth_enabled: bool) -> ClientConfigBuilder {
        ClientConfigBuilder {
            config: Self::new(auth_enabled),
        }
    }

    /// Load credentials from process environment variables.
    ///
    /// Missing variables become empty strings.
    pub fn from_env(auth_enabled: bool) -> Self {
        Self::from_lookup(auth_enabled, |key| std::env::var(key).ok())
    }

    /// Load credentials from an arbitrary key/value source.
    pub fn from_lookup<F>(auth_enabled: bool, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::new(auth_enabled);
        config.tenant_id = lookup(ENV_TENANT_ID).unwrap_or_default();
        config.client_id = lookup(ENV_CLIENT_ID).unwrap_or_default();
        config.client_secret = SecretString::from(lookup(ENV_CLIENT_SECRET).unwrap_or_default());
        config.resource_id = lookup(ENV_RESOURCE_ID).unwrap_or_default();
        if let Some(host) = lookup(ENV_AUTHORITY_HOST)
            && !host.is_empty()
        {
            config.authority_host = host;
        }
        config
    }

    /// OAuth2 scope requested for `resource_id`.
    pub fn scope(&self) -> String {
        let resource = self.resource_id.trim_end_matches('/');
        if resource.ends_with("/.default") {
            resource.to_string()
        } else {
            format!("{resource}/.default")
        }
    }

    /// Token endpoint for the client-credentials grant.
    pub fn token_url(&self) -> String {
        if let Some(endpoint) = &self.token_endpoint {
            return endpoint.clone();
        }
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.authority_host.trim_end_matches('/'),
            urlencoding::encode(&self.tenant_id)
        )
    }
}

/// Builder for [`ClientConfig`]
#[derive(Debug)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn tenant_id(mut self, tenant_id: impl Into<String>) -> Self {
        self.config.tenant_id = tenant_id.into();
        self
    }

    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.config.client_id = client_id.into();
        self
    }

    pub fn client_secret(mut self, client_secret: impl Into<String>) -> Self {
        self.config.client_secret = SecretString::from(client_secret.into());
        self
    }

    pub fn resource_id(mut self, resource_id: impl Into<String>) -> Self {
        self.config.resource_id = resource_id.into();
        self
    }

    pub fn authority_host(mut self, host: impl Into<String>) -> Self {
        self.config.authority_host = host.into();
        self
    }

    /// Send token requests to this exact URL.
    pub fn token_endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.token_endpoint = Some(url.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout);
        self
    }

    pub fn status_policy(mut self, policy: StatusPolicy) -> Self {
        self.config.status_policy = policy;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = Some(user_agent.into());
        self
    }

    /// Build the configuration
    pub fn build(self) -> ClientConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    #[test]
    fn scope_appends_default_suffix() {
        let config = ClientConfig::builder(true)
            .resource_id("api://my-resource")
            .build();
        assert_eq!(config.scope(), "api://my-resource/.default");

        let trailing = ClientConfig::builder(true)
            .resource_id("https://graph.microsoft.com/")
            .build();
        assert_eq!(trailing.scope(), "https://graph.microsoft.com/.default");

        let already = ClientConfig::builder(true)
            .resource_id("api://x/.default")
            .build();
        assert_eq!(already.scope(), "api://x/.default");
    }

    #[test]
    fn token_url_uses_authority_and_tenant() {
        let config = ClientConfig::builder(true).tenant_id("contoso").build();
        assert_eq!(
            config.token_url(),
            "https://login.microsoftonline.com/contoso/oauth2/v2.0/token"
        );

        let overridden = ClientConfig::builder(true)
            .tenant_id("contoso")
            .token_endpoint("http://127.0.0.1:9/token")
            .build();
        assert_eq!(overridden.token_url(), "http://127.0.0.1:9/token");
    }

    #[test]
    fn from_lookup_reads_keys_and_tolerates_missing() {
        let values: HashMap<&str, &str> = HashMap::from([
            (ENV_TENANT_ID, "tenant"),
            (ENV_CLIENT_ID, "client"),
            (ENV_CLIENT_SECRET, "s3cret"),
        ]);
        let config =
            ClientConfig::from_lookup(true, |key| values.get(key).map(|v| v.to_string()));

        assert!(config.auth_enabled);
        assert_eq!(config.tenant_id, "tenant");
        assert_eq!(config.client_id, "client");
        assert_eq!(config.client_secret.expose_secret(), "s3cret");
        assert_eq!(config.resource_id, "");
        assert_eq!(config.authority_host, DEFAULT_AUTHORITY_HOST);
    }

    #[test]
    fn debug_output_redacts_secret() {
        let config = ClientConfig::builder(true)
            .client_secret("super-secret-value")
            .build();
        let printed = format!("{config:?}");
        assert!(!printed.contains("super-secret-value"));
    }

    #[test]
    fn default_status_policy_ignores_status() {
        assert_eq!(ClientConfig::new(false).status_policy, StatusPolicy::Ignore);
    }
}
