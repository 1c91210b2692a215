use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, error, info};

use crate::error::CurationError;

/// A fetched news article.
///
/// Only `title` and `description` are inspected by this crate; every other field the
/// search API returns (url, source, author, publishedAt, ...) is carried in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleRecord {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub description: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ArticleRecord {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            extra: serde_json::Map::new(),
        }
    }

    pub fn display_title(&self) -> &str {
        if self.title.is_empty() {
            "Untitled"
        } else {
            &self.title
        }
    }

    /// Copy of this record with only the description replaced.
    pub fn with_description(&self, description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..self.clone()
        }
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Anything that turns keywords into an ordered list of articles.
#[async_trait]
pub trait ArticleSource: Send + Sync {
    async fn fetch(&self, keywords: &str) -> Result<Vec<ArticleRecord>, CurationError>;
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    status: Option<String>,
    message: Option<String>,
    #[serde(default)]
    articles: Vec<ArticleRecord>,
}

/// NewsAPI `everything` search endpoint.
#[derive(Clone)]
pub struct NewsApiSource {
    base_url: String,
    api_key: Option<String>,
    api_key_env: String,
    client: Client,
}

impl NewsApiSource {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key,
            api_key_env: "NEWSAPI_KEY".to_string(),
            client: Client::new(),
        }
    }

    pub fn from_config(cfg: &common::NewsApiConfig) -> Self {
        let mut source = Self::new(cfg.base_url(), common::read_secret(cfg.api_key_env()));
        source.api_key_env = cfg.api_key_env().to_string();
        source
    }

    pub fn has_key(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn search_url(&self, keywords: &str, api_key: &str) -> Result<url::Url, CurationError> {
        let endpoint = format!("{}/everything", self.base_url.trim_end_matches('/'));
        url::Url::parse_with_params(&endpoint, &[("q", keywords), ("apiKey", api_key)])
            .map_err(|e| CurationError::Configuration(format!("Invalid NewsAPI base URL {}: {}", self.base_url, e)))
    }

    /// Lightweight authenticated query used by preflight. Returns whether the key was accepted.
    pub async fn validate_key(&self) -> bool {
        let Some(api_key) = self.api_key.as_deref() else {
            error!("NewsAPI key validation skipped: {} not set", self.api_key_env);
            return false;
        };
        let url = match self.search_url("test", api_key) {
            Ok(url) => url,
            Err(e) => {
                error!("NewsAPI key validation failed: {}", e);
                return false;
            }
        };
        match self.client.get(url).send().await {
            Ok(resp) if resp.status().is_success() => {
                debug!("NewsAPI key validated successfully: {}", resp.status());
                true
            }
            Ok(resp) => {
                error!("NewsAPI key validation failed: {}", resp.status());
                false
            }
            Err(e) => {
                error!("NewsAPI connection error: {}", e);
                false
            }
        }
    }
}

#[async_trait]
impl ArticleSource for NewsApiSource {
    async fn fetch(&self, keywords: &str) -> Result<Vec<ArticleRecord>, CurationError> {
        let keywords = keywords.trim();
        if keywords.is_empty() {
            return Err(CurationError::InvalidInput("keywords must not be empty".into()));
        }
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            CurationError::Configuration(format!("{} not set in .env", self.api_key_env))
        })?;

        let url = self.search_url(keywords, api_key)?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CurationError::Upstream(format!("NewsAPI request failed: {}", e)))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(CurationError::Authentication(format!(
                "NewsAPI authentication failed: Check {} in .env or get a valid key at https://newsapi.org",
                self.api_key_env
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CurationError::Upstream(format!(
                "NewsAPI request failed: {} {}",
                status, body
            )));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| CurationError::Upstream(format!("NewsAPI returned malformed JSON: {}", e)))?;

        if body.status.as_deref() != Some("ok") {
            return Err(CurationError::Upstream(format!(
                "NewsAPI error: {}",
                body.message.as_deref().unwrap_or("Unknown error")
            )));
        }

        info!("Fetched {} articles for '{}'", body.articles.len(), keywords);
        Ok(body.articles)
    }
}
