use std::sync::RwLock;
use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

use crate::error::{AppError, Result};

use super::types::{
    ContentsRequest, ContentsResponse, SearchOptions, SearchRequest, SearchResponse,
};

pub const EXA_API_URL: &str = "https://api.exa.ai";

/// Client for the Exa search API.
///
/// The key can be swapped at runtime from the settings screen, so it lives
/// behind a lock rather than being fixed at construction.
pub struct ExaClient {
    client: Client,
    base_url: Url,
    api_key: RwLock<Option<String>>,
}

impl ExaClient {
    pub fn new(api_key: Option<String>, base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("topic-feed/1.0")
            .build()
            .map_err(|e| AppError::Config(format!("Failed to create HTTP client: {e}")))?;

        // Url::join drops the last path segment unless the base ends with '/'
        let mut base_url = Url::parse(base_url)
            .map_err(|e| AppError::Config(format!("Invalid API base URL {base_url}: {e}")))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            client,
            base_url,
            api_key: RwLock::new(api_key),
        })
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key().is_some()
    }

    pub fn set_api_key(&self, api_key: Option<String>) {
        let mut guard = self.api_key.write().unwrap_or_else(|e| e.into_inner());
        *guard = api_key.filter(|k| !k.trim().is_empty());
    }

    fn api_key(&self) -> Option<String> {
        self.api_key
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub async fn search(&self, query: &str, options: &SearchOptions) -> Result<SearchResponse> {
        let request = SearchRequest::new(query, options);
        let response: SearchResponse = self.post_json("search", &request, "search response").await?;
        tracing::debug!(
            "Search for {:?} returned {} results (request {:?})",
            query,
            response.results.len(),
            response.request_id
        );
        Ok(response)
    }

    /// Fetch extracted contents for documents already known by id or URL.
    pub async fn get_contents(&self, ids: &[String]) -> Result<ContentsResponse> {
        let request = ContentsRequest { ids };
        self.post_json("contents", &request, "contents response").await
    }

    async fn post_json<B, T>(&self, endpoint: &str, body: &B, context: &str) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let api_key = self.api_key().ok_or(AppError::MissingApiKey)?;
        let url = self
            .base_url
            .join(endpoint)
            .map_err(|e| AppError::Config(format!("Invalid endpoint {endpoint}: {e}")))?;

        let response = self
            .client
            .post(url)
            .header("x-api-key", api_key)
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!("Exa {} failed with HTTP {}: {}", endpoint, status, body);
            return Err(match status.as_u16() {
                401 | 403 => AppError::Auth {
                    status: status.as_u16(),
                },
                429 => AppError::RateLimited,
                code => AppError::Api { status: code, body },
            });
        }

        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|source| AppError::Parse {
            context: context.to_string(),
            source,
        })
    }
}
