//! REST client
//!
//! [`RestClient`] issues GET/POST/PUT/DELETE requests, optionally attaching a
//! bearer token, and decodes the JSON response into a caller-chosen type.
//!
//! Every call runs the same pipeline:
//! 1. Build headers: `Accept: application/json`, `Content-Type` for POST/PUT,
//!    then caller headers
//! 2. Acquire a token when auth is enabled and add `Authorization` (a failure
//!    aborts the call before anything is sent to the endpoint)
//! 3. Encode the body as JSON
//! 4. Send through the transport, which opens and releases its own connection
//! 5. Apply the status policy and decode the body

use crate::auth::{CachedTokenProvider, ClientCredentialsTokenProvider, TokenProvider};
use crate::config::{ClientConfig, StatusPolicy};
use crate::error::{ApiError, Result};
use crate::http::headers::{HttpHeaderBuilder, merge_request_headers};
use crate::http::transport::{
    HttpRequestContext, HttpTransport, HttpTransportRequest, HttpTransportResponse,
    ReqwestTransport,
};
use crate::telemetry::format_headers_for_logging;
use reqwest::Method;
use reqwest::header::HeaderMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Typed JSON REST client.
///
/// Cheap to clone; clones share configuration, token provider and transport.
#[derive(Clone)]
pub struct RestClient {
    config: Arc<ClientConfig>,
    token_provider: Option<Arc<dyn TokenProvider>>,
    transport: Arc<dyn HttpTransport>,
    cancel: Option<CancellationToken>,
}

static_assertions::assert_impl_all!(RestClient: Send, Sync, Clone);

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("config", &self.config)
            .field("auth_enabled", &self.token_provider.is_some())
            .field("cancellable", &self.cancel.is_some())
            .finish()
    }
}

impl RestClient {
    /// Create a client with the default transport and, when auth is enabled,
    /// the client-credentials token provider.
    pub fn new(config: ClientConfig) -> Self {
        Self::builder(config).build()
    }

    pub fn builder(config: ClientConfig) -> RestClientBuilder {
        RestClientBuilder::new(config)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn is_auth_enabled(&self) -> bool {
        self.token_provider.is_some()
    }

    /// Return a client whose calls abort with `ApiError::Cancelled` once
    /// `token` is cancelled.
    pub fn with_cancellation(&self, token: CancellationToken) -> Self {
        Self {
            cancel: Some(token),
            ..self.clone()
        }
    }

    /// GET `endpoint` and decode the response as `T`.
    pub async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T> {
        self.get_with_headers(endpoint, &HashMap::new()).await
    }

    pub async fn get_with_headers<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        headers: &HashMap<String, String>,
    ) -> Result<T> {
        self.execute(Method::GET, endpoint, None::<&()>, headers)
            .await
    }

    /// POST `body` as JSON to `endpoint` and decode the response as `Resp`.
    pub async fn post<Req, Resp>(&self, endpoint: &str, body: &Req) -> Result<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        self.post_with_headers(endpoint, body, &HashMap::new())
            .await
    }

    pub async fn post_with_headers<Req, Resp>(
        &self,
        endpoint: &str,
        body: &Req,
        headers: &HashMap<String, String>,
    ) -> Result<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        self.execute(Method::POST, endpoint, Some(body), headers)
            .await
    }

    /// PUT `body` as JSON to `endpoint` and decode the response as `Resp`.
    pub async fn put<Req, Resp>(&self, endpoint: &str, body: &Req) -> Result<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        self.put_with_headers(endpoint, body, &HashMap::new())
            .await
    }

    pub async fn put_with_headers<Req, Resp>(
        &self,
        endpoint: &str,
        body: &Req,
        headers: &HashMap<String, String>,
    ) -> Result<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        self.execute(Method::PUT, endpoint, Some(body), headers)
            .await
    }

    /// DELETE `endpoint` and decode the response as `T`.
    pub async fn delete<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T> {
        self.delete_with_headers(endpoint, &HashMap::new()).await
    }

    pub async fn delete_with_headers<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        headers: &HashMap<String, String>,
    ) -> Result<T> {
        self.execute(Method::DELETE, endpoint, None::<&()>, headers)
            .await
    }

    async fn execute<Req, T>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&Req>,
        headers: &HashMap<String, String>,
    ) -> Result<T>
    where
        Req: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = reqwest::Url::parse(endpoint).map_err(|e| {
            ApiError::ConfigurationError(format!("Invalid endpoint '{endpoint}': {e}"))
        })?;
        let ctx = HttpRequestContext::new(method, url.as_str());
        let span = tracing::info_span!(
            "api_request",
            method = %ctx.method,
            url = %ctx.url,
            request_id = %ctx.request_id,
        );

        let pipeline = async {
            let started = Instant::now();
            let response = self.send(ctx, body, headers).await?;
            tracing::info!(
                status = response.status,
                duration_ms = started.elapsed().as_millis() as u64,
                response_length = response.body.len(),
                "request completed"
            );
            decode_response(self.config.status_policy, response)
        }
        .instrument(span.clone());

        let result = match &self.cancel {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => Err(ApiError::Cancelled("request cancelled".to_string())),
                    res = pipeline => res,
                }
            }
            None => pipeline.await,
        };

        if let Err(e) = &result {
            span.in_scope(|| tracing::warn!(error = %e, "request failed"));
        }
        result
    }

    async fn send<Req>(
        &self,
        ctx: HttpRequestContext,
        body: Option<&Req>,
        extra_headers: &HashMap<String, String>,
    ) -> Result<HttpTransportResponse>
    where
        Req: Serialize + ?Sized,
    {
        let headers = self.build_headers(body.is_some(), extra_headers).await?;
        let body = body.map(serde_json::to_vec).transpose()?;

        tracing::debug!(
            headers = %format_headers_for_logging(&headers),
            body_length = body.as_ref().map(Vec::len).unwrap_or(0),
            "sending request"
        );

        self.transport
            .execute(HttpTransportRequest { ctx, headers, body })
            .await
    }

    async fn build_headers(
        &self,
        has_body: bool,
        extra: &HashMap<String, String>,
    ) -> Result<HeaderMap> {
        let mut builder = HttpHeaderBuilder::new().with_json_accept();
        if has_body {
            builder = builder.with_json_content_type();
        }
        if let Some(user_agent) = &self.config.user_agent {
            builder = builder.with_user_agent(user_agent)?;
        }
        let mut headers = merge_request_headers(builder.build(), extra)?;

        // Authorization is reserved, so nothing merged above can shadow it.
        if let Some(provider) = &self.token_provider {
            let token = provider.token().await?;
            headers.extend(HttpHeaderBuilder::new().with_bearer_auth(token.secret())?.build());
        }
        Ok(headers)
    }
}

/// Apply the status policy, then decode the body.
///
/// An empty body decodes as JSON `null`, so `Option<T>` yields `None` and
/// `()` succeeds for bodiless responses.
fn decode_response<T: DeserializeOwned>(
    policy: StatusPolicy,
    response: HttpTransportResponse,
) -> Result<T> {
    if policy == StatusPolicy::RequireSuccess && !response.is_success() {
        let message = reqwest::StatusCode::from_u16(response.status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("Unknown status")
            .to_string();
        return Err(ApiError::api_error(response.status, message, response.body));
    }

    let text = response.body.trim();
    let text = if text.is_empty() { "null" } else { text };
    Ok(serde_json::from_str(text)?)
}

/// Builder for [`RestClient`]
pub struct RestClientBuilder {
    config: ClientConfig,
    token_provider: Option<Arc<dyn TokenProvider>>,
    transport: Option<Arc<dyn HttpTransport>>,
    cache_tokens: bool,
}

impl RestClientBuilder {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            token_provider: None,
            transport: None,
            cache_tokens: false,
        }
    }

    /// Use a custom token provider instead of the client-credentials grant.
    ///
    /// Ignored when `auth_enabled` is false.
    pub fn token_provider(mut self, provider: impl TokenProvider + 'static) -> Self {
        self.token_provider = Some(Arc::new(provider));
        self
    }

    /// Use a custom transport instead of reqwest.
    pub fn transport(mut self, transport: impl HttpTransport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Reuse tokens until they near expiry instead of fetching one per call.
    pub fn cache_tokens(mut self, enabled: bool) -> Self {
        self.cache_tokens = enabled;
        self
    }

    pub fn build(self) -> RestClient {
        let config = Arc::new(self.config);

        let token_provider = if config.auth_enabled {
            let provider = self.token_provider.unwrap_or_else(|| {
                Arc::new(ClientCredentialsTokenProvider::new(config.clone()))
                    as Arc<dyn TokenProvider>
            });
            if self.cache_tokens {
                Some(Arc::new(CachedTokenProvider::new(provider)) as Arc<dyn TokenProvider>)
            } else {
                Some(provider)
            }
        } else {
            None
        };

        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(ReqwestTransport::new(config.timeout)) as Arc<dyn HttpTransport>);

        RestClient {
            config,
            token_provider,
            transport,
            cancel: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AccessToken, StaticTokenProvider};
    use async_trait::async_trait;
    use serde::Deserialize;
    use std::sync::Mutex;

    #[derive(Debug, Deserialize, PartialEq)]
    struct UserDto {
        id: u32,
        name: String,
    }

    /// Records every request and answers with a canned response.
    #[derive(Clone)]
    struct RecordingTransport {
        requests: Arc<Mutex<Vec<HttpTransportRequest>>>,
        status: u16,
        body: String,
    }

    impl RecordingTransport {
        fn new(status: u16, body: &str) -> Self {
            Self {
                requests: Arc::new(Mutex::new(Vec::new())),
                status,
                body: body.to_string(),
            }
        }

        fn sent(&self) -> Vec<HttpTransportRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HttpTransport for RecordingTransport {
        async fn execute(
            &self,
            request: HttpTransportRequest,
        ) -> Result<HttpTransportResponse> {
            self.requests.lock().unwrap().push(request);
            Ok(HttpTransportResponse {
                status: self.status,
                body: self.body.clone(),
            })
        }
    }

    struct FailingTokenProvider;

    #[async_trait]
    impl TokenProvider for FailingTokenProvider {
        async fn token(&self) -> Result<AccessToken> {
            Err(ApiError::AuthenticationError("invalid_client".into()))
        }
    }

    fn client(auth: bool, transport: RecordingTransport) -> RestClient {
        RestClient::builder(ClientConfig::new(auth))
            .token_provider(StaticTokenProvider::new("abc"))
            .transport(transport)
            .build()
    }

    #[tokio::test]
    async fn get_decodes_body() {
        let transport = RecordingTransport::new(200, r#"{"id":1,"name":"Ann"}"#);
        let user: UserDto = client(false, transport.clone())
            .get("https://api.example.com/users/1")
            .await
            .unwrap();
        assert_eq!(
            user,
            UserDto {
                id: 1,
                name: "Ann".into()
            }
        );

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].ctx.method, Method::GET);
        assert!(sent[0].body.is_none());
        assert!(sent[0].headers.get("content-type").is_none());
    }

    #[tokio::test]
    async fn auth_disabled_sends_no_authorization() {
        let transport = RecordingTransport::new(200, "{}");
        let c = client(false, transport.clone());
        assert!(!c.is_auth_enabled());
        let headers = HashMap::from([("Authorization".to_string(), "Bearer nope".to_string())]);
        let _: serde_json::Value = c
            .get_with_headers("https://api.example.com/x", &headers)
            .await
            .unwrap();
        assert!(transport.sent()[0].headers.get("authorization").is_none());
        assert_eq!(
            transport.sent()[0].headers.get("accept").unwrap(),
            "application/json"
        );
    }

    #[tokio::test]
    async fn auth_enabled_sends_bearer_on_every_verb() {
        let transport = RecordingTransport::new(200, "{}");
        let c = client(true, transport.clone());
        let body = serde_json::json!({"k": "v"});
        let _: serde_json::Value = c.get("https://api.example.com/a").await.unwrap();
        let _: serde_json::Value = c.post("https://api.example.com/a", &body).await.unwrap();
        let _: serde_json::Value = c.put("https://api.example.com/a", &body).await.unwrap();
        let _: serde_json::Value = c.delete("https://api.example.com/a").await.unwrap();

        let sent = transport.sent();
        assert_eq!(sent.len(), 4);
        for req in sent {
            assert_eq!(req.headers.get("authorization").unwrap(), "Bearer abc");
            assert_eq!(req.headers.get("accept").unwrap(), "application/json");
        }
    }

    #[tokio::test]
    async fn token_failure_sends_nothing() {
        let transport = RecordingTransport::new(200, "{}");
        let c = RestClient::builder(ClientConfig::new(true))
            .token_provider(FailingTokenProvider)
            .transport(transport.clone())
            .build();
        let err = c
            .get::<serde_json::Value>("https://api.example.com/a")
            .await
            .unwrap_err();
        assert!(err.is_auth_error());
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn post_body_matches_serde_json_encoding() {
        #[derive(Serialize)]
        struct NewUser<'a> {
            name: &'a str,
            tags: Vec<&'a str>,
            admin: bool,
        }
        let value = NewUser {
            name: "Ann \"the\" admin",
            tags: vec!["a", "ü"],
            admin: false,
        };
        let transport = RecordingTransport::new(201, r#"{"id":9,"name":"Ann"}"#);
        let created: UserDto = client(false, transport.clone())
            .post("https://api.example.com/users", &value)
            .await
            .unwrap();
        assert_eq!(created.id, 9);

        let sent = transport.sent();
        assert_eq!(sent[0].ctx.method, Method::POST);
        assert_eq!(sent[0].body.as_deref(), Some(serde_json::to_vec(&value).unwrap().as_slice()));
        assert_eq!(sent[0].headers.get("content-type").unwrap(), "application/json");
    }

    #[tokio::test]
    async fn malformed_json_is_deserialization_error() {
        let transport = RecordingTransport::new(200, r#"{"id":1,"name":"#);
        let err = client(false, transport)
            .get::<UserDto>("https://api.example.com/users/1")
            .await
            .unwrap_err();
        assert!(err.is_deserialization_error());
    }

    #[tokio::test]
    async fn schema_mismatch_is_deserialization_error() {
        let transport = RecordingTransport::new(200, r#"{"id":"one"}"#);
        let err = client(false, transport)
            .get::<UserDto>("https://api.example.com/users/1")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::JsonError(_)));
    }

    #[tokio::test]
    async fn empty_body_decodes_as_null() {
        let transport = RecordingTransport::new(204, "");
        let c = client(false, transport);
        let none: Option<UserDto> = c.delete("https://api.example.com/users/1").await.unwrap();
        assert!(none.is_none());
        let _: () = c.delete("https://api.example.com/users/1").await.unwrap();
    }

    #[tokio::test]
    async fn invalid_caller_header_fails_before_token() {
        let transport = RecordingTransport::new(200, "{}");
        let c = RestClient::builder(ClientConfig::new(true))
            .token_provider(FailingTokenProvider)
            .transport(transport.clone())
            .build();
        let headers = HashMap::from([("bad header".to_string(), "v".to_string())]);
        let err = c
            .get_with_headers::<serde_json::Value>("https://api.example.com/a", &headers)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::ConfigurationError(_)));
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn invalid_endpoint_fails_before_token() {
        let transport = RecordingTransport::new(200, "{}");
        let c = RestClient::builder(ClientConfig::new(true))
            .token_provider(FailingTokenProvider)
            .transport(transport.clone())
            .build();
        let err = c.get::<serde_json::Value>("not a url").await.unwrap_err();
        assert!(matches!(err, ApiError::ConfigurationError(_)));
        assert!(transport.sent().is_empty());
    }

    #[test]
    fn decode_ignores_status_by_default() {
        let resp = HttpTransportResponse {
            status: 500,
            body: r#"{"id":1,"name":"Ann"}"#.into(),
        };
        let user: UserDto = decode_response(StatusPolicy::Ignore, resp).unwrap();
        assert_eq!(user.id, 1);
    }

    #[test]
    fn decode_require_success_maps_status() {
        let resp = HttpTransportResponse {
            status: 404,
            body: r#"{"error":"missing"}"#.into(),
        };
        let err = decode_response::<UserDto>(StatusPolicy::RequireSuccess, resp).unwrap_err();
        assert_eq!(
            err,
            ApiError::api_error(404, "Not Found", r#"{"error":"missing"}"#)
        );
    }

    #[tokio::test]
    async fn cancelled_token_aborts_call() {
        let transport = RecordingTransport::new(200, "{}");
        let cancel = CancellationToken::new();
        cancel.cancel();
        let c = client(false, transport.clone()).with_cancellation(cancel);
        let err = c
            .get::<serde_json::Value>("https://api.example.com/a")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Cancelled(_)));
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn logs_never_contain_raw_token() {
        let transport = RecordingTransport::new(200, "{}");
        let c = RestClient::builder(ClientConfig::new(true))
            .token_provider(StaticTokenProvider::new("secret-token-value-123"))
            .transport(transport)
            .build();
        let _: serde_json::Value = c.get("https://api.example.com/a").await.unwrap();

        assert!(logs_contain("request completed"));
        assert!(logs_contain("sending request"));
        assert!(!logs_contain("secret-token-value-123"));
    }

    #[test]
    fn auth_disabled_drops_token_provider() {
        let c = RestClient::builder(ClientConfig::new(false))
            .token_provider(StaticTokenProvider::new("abc"))
            .build();
        assert!(!c.is_auth_enabled());
        let debug = format!("{c:?}");
        assert!(debug.contains("auth_enabled: false"));
    }
}
