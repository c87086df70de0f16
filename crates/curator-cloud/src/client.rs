//! HTTP cloud service client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, info, warn};

use curator_core::{
    defaults, CloudService, Error, RemoteDimension, RemoteTag, Result, SyncPayload,
};

/// Configuration for the cloud client.
#[derive(Debug, Clone)]
pub struct CloudConfig {
    /// Base URL of the REST endpoint.
    pub base_url: String,
    /// Bearer token (optional for local endpoints).
    pub api_key: Option<String>,
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::CLOUD_BASE_URL.to_string(),
            api_key: None,
            timeout_seconds: defaults::CLOUD_TIMEOUT_SECS,
        }
    }
}

impl CloudConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `CLOUD_BASE_URL` | `http://127.0.0.1:54321/rest/v1` | REST endpoint |
    /// | `CLOUD_API_KEY` | unset | Bearer token |
    /// | `CLOUD_TIMEOUT_SECS` | `30` | Per-request timeout |
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("CLOUD_BASE_URL")
                .unwrap_or_else(|_| defaults::CLOUD_BASE_URL.to_string()),
            api_key: std::env::var("CLOUD_API_KEY").ok().filter(|k| !k.is_empty()),
            timeout_seconds: std::env::var("CLOUD_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults::CLOUD_TIMEOUT_SECS),
        }
    }
}

/// Error body returned by the cloud service.
#[derive(Debug, Default, Deserialize)]
struct CloudErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default, alias = "error", alias = "msg")]
    message: Option<String>,
}

/// HTTP implementation of [`CloudService`].
#[derive(Clone)]
pub struct CloudClient {
    client: Client,
    config: CloudConfig,
}

impl CloudClient {
    /// Create a new client with the given configuration.
    pub fn new(config: CloudConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            subsystem = "cloud",
            component = "client",
            base_url = %config.base_url,
            timeout_secs = config.timeout_seconds,
            authenticated = config.api_key.is_some(),
            "Initializing cloud client"
        );

        Ok(Self { client, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(CloudConfig::from_env())
    }

    /// Get the current configuration.
    pub fn config(&self) -> &CloudConfig {
        &self.config
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), endpoint)
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.config.api_key {
            Some(ref api_key) => req.header("Authorization", format!("Bearer {}", api_key)),
            None => req,
        }
    }

    fn build_get(&self, endpoint: &str, language: &str) -> reqwest::RequestBuilder {
        self.authorize(self.client.get(self.url(endpoint)))
            .query(&[("language", language)])
    }

    fn build_post(&self, endpoint: &str, language: &str) -> reqwest::RequestBuilder {
        self.authorize(self.client.post(self.url(endpoint)))
            .query(&[("language", language)])
            .header("Content-Type", "application/json")
    }

    /// Turn a non-success response into a typed error.
    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let body: CloudErrorBody = serde_json::from_str(&text).unwrap_or_default();
        let message = body
            .message
            .unwrap_or_else(|| if text.is_empty() { status.to_string() } else { text });

        Err(match status {
            StatusCode::UNAUTHORIZED => Error::Unauthorized(message),
            StatusCode::FORBIDDEN => Error::Forbidden(message),
            _ => Error::Cloud {
                status: status.as_u16(),
                code: body.code,
                message,
            },
        })
    }

    /// Reachability check against `GET /health`.
    ///
    /// `Ok(false)` means the service answered but reported itself unhealthy.
    pub async fn health(&self) -> Result<bool> {
        let response = self
            .authorize(self.client.get(self.url("/health")))
            .timeout(Duration::from_secs(defaults::CONNECTIVITY_TIMEOUT_SECS))
            .send()
            .await?;

        if response.status().is_success() {
            Ok(true)
        } else {
            warn!(
                subsystem = "cloud",
                component = "client",
                status = %response.status(),
                "Cloud health check failed"
            );
            Ok(false)
        }
    }
}

#[async_trait]
impl CloudService for CloudClient {
    async fn fetch_dimensions(&self, language: &str) -> Result<Vec<RemoteDimension>> {
        let response = self.build_get("/dimensions", language).send().await?;
        let dimensions: Vec<RemoteDimension> = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| Error::Serialization(format!("Failed to parse dimensions: {}", e)))?;

        debug!(
            subsystem = "cloud",
            op = "fetch_dimensions",
            language,
            result_count = dimensions.len(),
            "Fetched cloud dimensions"
        );
        Ok(dimensions)
    }

    async fn fetch_tags(&self, language: &str) -> Result<Vec<RemoteTag>> {
        let response = self.build_get("/tags", language).send().await?;
        let tags: Vec<RemoteTag> = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| Error::Serialization(format!("Failed to parse tags: {}", e)))?;

        debug!(
            subsystem = "cloud",
            op = "fetch_tags",
            language,
            result_count = tags.len(),
            "Fetched cloud tags"
        );
        Ok(tags)
    }

    async fn batch_sync(&self, payload: &SyncPayload, language: &str) -> Result<()> {
        debug!(
            subsystem = "cloud",
            op = "batch_sync",
            language,
            records = payload.record_count(),
            "Uploading batch"
        );

        let response = self
            .build_post("/sync/batch", language)
            .json(payload)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}
