//! Request/response APIs of the playground gateway: the snippet store and
//! the example library. No protocol state; each call is one HTTP exchange.

use crate::session::SessionConfig;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// A stored piece of source code with its language.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeSnippet {
    pub code: String,
    pub language: String,
}

/// One entry of the example library.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Example {
    #[serde(default)]
    pub path: String,
    pub name: String,
    #[serde(rename = "lang")]
    pub language: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub code: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("unexpected http status {0}")]
    HttpStatus(StatusCode),
    #[error("invalid api endpoint: {0}")]
    InvalidEndpoint(String),
}

#[derive(Clone)]
pub struct ApiClient {
    base_url: Url,
    backend: Arc<dyn ApiBackend>,
}

impl ApiClient {
    pub fn new(config: &SessionConfig) -> Result<Self, ApiError> {
        let backend = Arc::new(ReqwestApiBackend::new()?);
        Ok(Self {
            base_url: config.http_base(),
            backend,
        })
    }

    #[cfg(test)]
    fn with_backend(config: &SessionConfig, backend: Arc<dyn ApiBackend>) -> Self {
        Self {
            base_url: config.http_base(),
            backend,
        }
    }

    /// Store a snippet; returns the key it can be loaded back with.
    pub async fn store(&self, snippet: &CodeSnippet) -> Result<String, ApiError> {
        let key = self.backend.store(&self.base_url, snippet).await?;
        tracing::debug!(target: "tidepool::api", key = %key, "snippet stored");
        Ok(key)
    }

    /// Load a previously stored snippet by key.
    pub async fn load(&self, key: &str) -> Result<CodeSnippet, ApiError> {
        self.backend.load(&self.base_url, key).await
    }

    /// Query the example library. An empty query matches everything.
    pub async fn query_examples(&self, query: &str) -> Result<Vec<Example>, ApiError> {
        self.backend.query(&self.base_url, query).await
    }
}

#[async_trait]
trait ApiBackend: Send + Sync {
    async fn store(&self, base_url: &Url, snippet: &CodeSnippet) -> Result<String, ApiError>;
    async fn load(&self, base_url: &Url, key: &str) -> Result<CodeSnippet, ApiError>;
    async fn query(&self, base_url: &Url, query: &str) -> Result<Vec<Example>, ApiError>;
}

struct ReqwestApiBackend {
    client: reqwest::Client,
}

impl ReqwestApiBackend {
    fn new() -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(3))
            .timeout(Duration::from_secs(8))
            .no_proxy()
            .build()?;
        Ok(Self { client })
    }
}

fn join_endpoint(base_url: &Url, path: &str) -> Result<Url, ApiError> {
    base_url
        .join(path)
        .map_err(|err| ApiError::InvalidEndpoint(format!("{path}: {err}")))
}

#[async_trait]
impl ApiBackend for ReqwestApiBackend {
    async fn store(&self, base_url: &Url, snippet: &CodeSnippet) -> Result<String, ApiError> {
        let endpoint = join_endpoint(base_url, "api/store/store")?;
        let response = self.client.post(endpoint).json(snippet).send().await?;
        if !response.status().is_success() {
            return Err(ApiError::HttpStatus(response.status()));
        }
        // The key comes back as plain text, not JSON.
        Ok(response.text().await?)
    }

    async fn load(&self, base_url: &Url, key: &str) -> Result<CodeSnippet, ApiError> {
        let mut endpoint = join_endpoint(base_url, "api/store/load")?;
        endpoint.query_pairs_mut().append_pair("key", key);
        let response = self.client.get(endpoint).send().await?;
        if !response.status().is_success() {
            return Err(ApiError::HttpStatus(response.status()));
        }
        Ok(response.json::<CodeSnippet>().await?)
    }

    async fn query(&self, base_url: &Url, query: &str) -> Result<Vec<Example>, ApiError> {
        let mut endpoint = join_endpoint(base_url, "api/examples/query")?;
        endpoint.query_pairs_mut().append_pair("q", query);
        let response = self.client.get(endpoint).send().await?;
        if !response.status().is_success() {
            return Err(ApiError::HttpStatus(response.status()));
        }
        Ok(response.json::<Vec<Example>>().await?)
    }
}
