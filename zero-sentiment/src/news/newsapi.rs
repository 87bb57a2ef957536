//! NewsAPI adapter.
//!
//! # API Documentation
//! <https://newsapi.org/docs/endpoints/everything>
//!
//! Uses the `/v2/everything` endpoint with the key in the `X-Api-Key` header
//! so it never appears in URLs or logs.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{ArticleSource, SearchQuery};
use crate::error::SourceError;
use crate::types::Article;
use zero_common::config::Config;

/// Everything endpoint
const EVERYTHING_ENDPOINT: &str = "/v2/everything";

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct NewsApiResponse {
    status: String,
    #[serde(default)]
    articles: Vec<NewsApiArticle>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NewsApiArticle {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

impl From<NewsApiArticle> for Article {
    fn from(article: NewsApiArticle) -> Self {
        Self {
            title: article.title,
            description: article.description,
        }
    }
}

// ============================================================================
// Adapter
// ============================================================================

/// NewsAPI article source.
pub struct NewsApiSource {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl NewsApiSource {
    /// Create a new adapter against `base_url` (e.g. "https://newsapi.org").
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Create from config. Fails when no API key is configured.
    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key = config
            .news_api_key()
            .ok_or_else(|| anyhow!("NEWS_API_KEY must be set (secrets.external.news_api)"))?;
        let news = &config.sentiment.news;

        Ok(Self::new(
            api_key,
            news.base_url.clone(),
            Duration::from_secs(news.timeout_secs),
        ))
    }

    fn map_transport_error(e: reqwest::Error) -> SourceError {
        if e.is_timeout() {
            SourceError::Network("Request timeout".into())
        } else if e.is_connect() {
            SourceError::Network("Connection failed".into())
        } else {
            SourceError::Network(e.without_url().to_string())
        }
    }
}

#[async_trait]
impl ArticleSource for NewsApiSource {
    fn name(&self) -> &'static str {
        "newsapi"
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<Article>, SourceError> {
        let url = format!("{}{}", self.base_url, EVERYTHING_ENDPOINT);
        let page_size = query.page_size.to_string();

        debug!(query = %query.query, page_size = query.page_size, "Searching NewsAPI");

        let response = self
            .client
            .get(&url)
            .header("X-Api-Key", &self.api_key)
            .header("accept", "application/json")
            .query(&[
                ("q", query.query.as_str()),
                ("language", query.language.as_str()),
                ("sortBy", query.sort_by.as_str()),
                ("pageSize", page_size.as_str()),
            ])
            .send()
            .await
            .map_err(Self::map_transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(Self::map_transport_error)?;

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(SourceError::Auth(error_message(&body)));
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(SourceError::RateLimited(error_message(&body)));
        }

        let parsed: Option<NewsApiResponse> = serde_json::from_str(&body).ok();

        if !status.is_success() {
            return Err(match parsed {
                Some(r) => SourceError::Api {
                    code: r.code.unwrap_or_else(|| status.as_u16().to_string()),
                    message: r.message.unwrap_or_default(),
                },
                None => SourceError::Api {
                    code: status.as_u16().to_string(),
                    message: zero_common::util::truncate_with_ellipsis(&body, 200),
                },
            });
        }

        let parsed = parsed.ok_or_else(|| {
            SourceError::InvalidResponse(zero_common::util::truncate_with_ellipsis(&body, 200))
        })?;

        if parsed.status != "ok" {
            return Err(SourceError::Api {
                code: parsed.code.unwrap_or_else(|| parsed.status.clone()),
                message: parsed.message.unwrap_or_default(),
            });
        }

        let articles: Vec<Article> = parsed
            .articles
            .into_iter()
            .take(query.page_size as usize)
            .map(Article::from)
            .collect();

        debug!(query = %query.query, count = articles.len(), "NewsAPI search complete");
        Ok(articles)
    }
}

/// Pull `message` out of a NewsAPI error body, falling back to the raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<NewsApiResponse>(body)
        .ok()
        .and_then(|r| r.message)
        .unwrap_or_else(|| zero_common::util::truncate_with_ellipsis(body, 200))
}
