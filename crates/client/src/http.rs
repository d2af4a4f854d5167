//! HTTP client for the marketplace REST API.
//!
//! Thin wrapper over `reqwest` that resolves paths against the configured
//! base URL, attaches the caller's bearer token, and turns responses into
//! JSON or an [`ApiError`].

use std::sync::Arc;

use reqwest::multipart::Form;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::Value;
use tracing::instrument;
use url::Url;

use crate::config::ClientConfig;
use crate::error::ApiError;

/// REST API client.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a new API client.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Network` if the HTTP client fails to build.
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                base_url: config.base_url.clone(),
            }),
        })
    }

    /// Base URL every path is resolved against.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Resolve an absolute API path (`/agents`) against the base URL.
    ///
    /// The base URL's own path is kept, so `https://host/api` + `/agents`
    /// becomes `https://host/api/agents`.
    fn url(&self, path: &str) -> String {
        let base = self.inner.base_url.as_str().trim_end_matches('/');
        format!("{base}/{}", path.trim_start_matches('/'))
    }

    fn request(
        &self,
        method: reqwest::Method,
        path: &str,
        query: &[(&str, String)],
        token: Option<&SecretString>,
    ) -> reqwest::RequestBuilder {
        let mut builder = self.inner.client.request(method, self.url(path));
        if !query.is_empty() {
            builder = builder.query(query);
        }
        if let Some(token) = token {
            builder = builder.bearer_auth(token.expose_secret());
        }
        builder
    }

    /// Execute a GET request.
    ///
    /// # Errors
    ///
    /// See [`ApiError`].
    #[instrument(skip(self, query, token))]
    pub async fn get_json(
        &self,
        path: &str,
        query: &[(&str, String)],
        token: Option<&SecretString>,
    ) -> Result<Value, ApiError> {
        let response = self
            .request(reqwest::Method::GET, path, query, token)
            .send()
            .await?;
        handle_response(response).await
    }

    /// Execute a POST request with a JSON body.
    ///
    /// # Errors
    ///
    /// See [`ApiError`].
    #[instrument(skip(self, query, body, token))]
    pub async fn post_json<B: Serialize + Sync>(
        &self,
        path: &str,
        query: &[(&str, String)],
        body: &B,
        token: Option<&SecretString>,
    ) -> Result<Value, ApiError> {
        let response = self
            .request(reqwest::Method::POST, path, query, token)
            .json(body)
            .send()
            .await?;
        handle_response(response).await
    }

    /// Execute a POST request and only check its status.
    ///
    /// Used for mutations, whose success bodies vary by endpoint and are not
    /// read.
    ///
    /// # Errors
    ///
    /// See [`ApiError`].
    #[instrument(skip(self, query, body, token))]
    pub async fn post_for_status<B: Serialize + Sync>(
        &self,
        path: &str,
        query: &[(&str, String)],
        body: Option<&B>,
        token: Option<&SecretString>,
    ) -> Result<(), ApiError> {
        let mut builder = self.request(reqwest::Method::POST, path, query, token);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        check_status(builder.send().await?).await
    }

    /// Execute a multipart POST request.
    ///
    /// # Errors
    ///
    /// See [`ApiError`].
    #[instrument(skip(self, form, token))]
    pub async fn post_multipart(
        &self,
        path: &str,
        form: Form,
        token: Option<&SecretString>,
    ) -> Result<Value, ApiError> {
        let response = self
            .request(reqwest::Method::POST, path, &[], token)
            .multipart(form)
            .send()
            .await?;
        handle_response(response).await
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url.as_str())
            .finish_non_exhaustive()
    }
}

/// Turn a response into JSON or an error.
///
/// An empty 2xx body is `Value::Null`.
async fn handle_response(response: reqwest::Response) -> Result<Value, ApiError> {
    let status = response.status();
    let body = response.text().await?;

    if status.is_success() {
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        return serde_json::from_str(&body)
            .map_err(|e| ApiError::Protocol(format!("Failed to parse response: {e}")));
    }

    Err(status_error(status, &body))
}

/// Check the status of a response whose success body is not needed.
async fn check_status(response: reqwest::Response) -> Result<(), ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await?;
    Err(status_error(status, &body))
}

fn status_error(status: reqwest::StatusCode, body: &str) -> ApiError {
    let message = error_message(status, body);
    if status == reqwest::StatusCode::UNAUTHORIZED {
        ApiError::Unauthorized(message)
    } else {
        ApiError::Rejected {
            status: status.as_u16(),
            message,
        }
    }
}

/// Message to surface for a rejected request.
///
/// `message` then `error` from a JSON body, else the raw body, else the
/// status reason phrase.
fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
        for field in ["message", "error"] {
            if let Some(Value::String(message)) = map.get(field)
                && !message.trim().is_empty()
            {
                return message.clone();
            }
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        status
            .canonical_reason()
            .map_or_else(|| format!("HTTP {}", status.as_u16()), str::to_string)
    } else {
        trimmed.to_string()
    }
}
