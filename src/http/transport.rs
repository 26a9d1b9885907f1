//! HTTP transport abstraction.
//!
//! The client hands a fully built request (method, URL, headers, encoded body)
//! to an [`HttpTransport`] and gets the status and body text back.
//! [`ReqwestTransport`] is the default; tests can inject their own transport
//! to observe the exact bytes sent without going through a socket.

use crate::error::ApiError;
use async_trait::async_trait;
use reqwest::Method;
use reqwest::header::HeaderMap;
use std::time::Duration;

/// Context describing a single request, used for logging.
#[derive(Clone, Debug)]
pub struct HttpRequestContext {
    pub request_id: String,
    pub method: Method,
    pub url: String,
}

impl HttpRequestContext {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            request_id: generate_request_id(),
            method,
            url: url.into(),
        }
    }
}

/// Generate a unique id for correlating log lines of one request.
pub fn generate_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Transport-level request data.
#[derive(Debug, Clone)]
pub struct HttpTransportRequest {
    pub ctx: HttpRequestContext,
    pub headers: HeaderMap,
    /// Encoded JSON body; `None` for GET/DELETE
    pub body: Option<Vec<u8>>,
}

/// Transport-level response data.
#[derive(Debug, Clone)]
pub struct HttpTransportResponse {
    pub status: u16,
    pub body: String,
}

impl HttpTransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends one request and reads the full response body.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn execute(&self, request: HttpTransportRequest)
    -> Result<HttpTransportResponse, ApiError>;
}

/// Default transport backed by `reqwest`.
///
/// A new `reqwest::Client` is created for every request and dropped before
/// `execute` returns, on success and on every error path alike. Connections
/// are never shared between calls.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    timeout: Option<Duration>,
}

impl ReqwestTransport {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    fn build_client(&self) -> Result<reqwest::Client, ApiError> {
        let mut builder = reqwest::Client::builder().pool_max_idle_per_host(0);
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        builder
            .build()
            .map_err(|e| ApiError::HttpError(format!("Failed to build HTTP client: {e}")))
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(
        &self,
        request: HttpTransportRequest,
    ) -> Result<HttpTransportResponse, ApiError> {
        let client = self.build_client()?;

        let mut rb = client
            .request(request.ctx.method.clone(), &request.ctx.url)
            .headers(request.headers);
        if let Some(body) = request.body {
            rb = rb.body(body);
        }

        let resp = rb.send().await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;

        Ok(HttpTransportResponse { status, body })
    }
}
