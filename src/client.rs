//! REST transport for the SumoLogic API.
//!
//! [`RestClient`] is the capability every resource operation receives. The
//! production implementation is [`HttpRestClient`]; tests substitute an
//! in-memory fake.

use async_trait::async_trait;
use reqwest::header::{ETAG, IF_MATCH};
use reqwest::{Method, StatusCode};
use tracing::debug;

use crate::config::ResolvedConfig;
use crate::error::ProviderError;

/// Body and entity tag of a successful GET.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestResponse {
    /// Raw response body.
    pub body: Vec<u8>,
    /// `ETag` header, required by the API to guard updates.
    pub etag: Option<String>,
}

/// Minimal HTTP verbs against paths relative to the API root.
///
/// Every method performs exactly one HTTP call and returns the raw body.
/// Error statuses become [`ProviderError`]s through
/// [`ProviderError::from_status`], except a GET answered with 404 which is
/// `Ok(None)`.
#[async_trait]
pub trait RestClient: Send + Sync {
    /// GET `path`; `Ok(None)` when the object does not exist.
    async fn get(&self, path: &str) -> Result<Option<RestResponse>, ProviderError>;

    /// POST a JSON body to `path`.
    async fn post(&self, path: &str, body: &serde_json::Value) -> Result<Vec<u8>, ProviderError>;

    /// PUT a JSON body to `path`, guarded by `etag` when one is known.
    async fn put(
        &self,
        path: &str,
        body: &serde_json::Value,
        etag: Option<&str>,
    ) -> Result<Vec<u8>, ProviderError>;

    /// DELETE `path`.
    async fn delete(&self, path: &str) -> Result<Vec<u8>, ProviderError>;
}

/// [`RestClient`] backed by `reqwest`, authenticating with the access
/// id/key pair over HTTP basic auth.
#[derive(Debug, Clone)]
pub struct HttpRestClient {
    client: reqwest::Client,
    base_url: String,
    access_id: String,
    access_key: String,
}

impl HttpRestClient {
    /// Build a client for the resolved provider configuration.
    pub fn new(config: ResolvedConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url,
            access_id: config.access_id,
            access_key: config.access_key,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        debug!(%method, path, "SumoLogic API request");
        self.client
            .request(method, self.url(path))
            .basic_auth(&self.access_id, Some(&self.access_key))
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, ProviderError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                debug!(status = status.as_u16(), error = %e, "Failed to read SumoLogic error body");
                String::new()
            },
        };
        debug!(status = status.as_u16(), %message, "SumoLogic API error");
        Err(ProviderError::from_status(status.as_u16(), message))
    }
}

#[async_trait]
impl RestClient for HttpRestClient {
    async fn get(&self, path: &str) -> Result<Option<RestResponse>, ProviderError> {
        let response = match self.send(self.request(Method::GET, path)).await {
            Ok(response) => response,
            Err(ProviderError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };

        let etag = response
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?.to_vec();
        Ok(Some(RestResponse { body, etag }))
    }

    async fn post(&self, path: &str, body: &serde_json::Value) -> Result<Vec<u8>, ProviderError> {
        let request = self
            .request(Method::POST, path)
            .json(body);
        let response = self.send(request).await?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn put(
        &self,
        path: &str,
        body: &serde_json::Value,
        etag: Option<&str>,
    ) -> Result<Vec<u8>, ProviderError> {
        let mut request = self
            .request(Method::PUT, path)
            .json(body);
        if let Some(etag) = etag {
            request = request.header(IF_MATCH, etag);
        }
        let response = self.send(request).await?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn delete(&self, path: &str) -> Result<Vec<u8>, ProviderError> {
        let response = self.send(self.request(Method::DELETE, path)).await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(Vec::new());
        }
        Ok(response.bytes().await?.to_vec())
    }
}
