//! Supabase sentiment storage over the PostgREST API.
//!
//! # API
//! - `POST /rest/v1/stock_sentiment?on_conflict=ticker` with
//!   `Prefer: resolution=merge-duplicates` for the upsert
//! - `POST /rest/v1/sentiment_history` for history rows
//! - `GET /rest/v1/<table>?ticker=eq.<TICKER>` for reads
//!
//! Every request carries the project key both as `apikey` and as a bearer
//! token.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{format_timestamp, parse_timestamp, SentimentStore};
use crate::error::StorageError;
use crate::types::{PersistedSentiment, SentimentHistoryEntry};
use zero_common::config::Config;

const CURRENT_TABLE: &str = "stock_sentiment";
const HISTORY_TABLE: &str = "sentiment_history";

/// Request timeout for PostgREST calls
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// Row Types
// ============================================================================

#[derive(Debug, Serialize)]
struct CurrentRowOut<'a> {
    ticker: &'a str,
    sentiment_score: f64,
    article_count: i64,
    updated_at: String,
}

#[derive(Debug, Serialize)]
struct HistoryRowOut<'a> {
    ticker: &'a str,
    sentiment_score: f64,
    article_count: i64,
    recorded_at: String,
}

#[derive(Debug, Deserialize)]
struct CurrentRowIn {
    ticker: String,
    sentiment_score: f64,
    article_count: i64,
    updated_at: String,
}

#[derive(Debug, Deserialize)]
struct HistoryRowIn {
    ticker: String,
    sentiment_score: f64,
    article_count: i64,
    recorded_at: String,
}

// ============================================================================
// Store
// ============================================================================

/// Sentiment store backed by Supabase tables.
pub struct SupabaseSentimentStore {
    rest_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl SupabaseSentimentStore {
    /// Create a store for the project at `url` (e.g. "https://xyz.supabase.co").
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            rest_url: format!("{}/rest/v1", url.into().trim_end_matches('/')),
            api_key: api_key.into(),
            client,
        }
    }

    /// Create from config. Fails when URL or key is missing.
    pub fn from_config(config: &Config) -> Result<Self> {
        let (url, key) = config
            .supabase_credentials()
            .ok_or_else(|| anyhow!("SUPABASE_URL and SUPABASE_KEY must be set"))?;
        Ok(Self::new(url, key))
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{}", self.rest_url, table)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    fn map_transport_error(e: reqwest::Error) -> StorageError {
        if e.is_timeout() {
            StorageError::Request("Request timeout".into())
        } else if e.is_connect() {
            StorageError::Request("Connection failed".into())
        } else {
            StorageError::Request(e.without_url().to_string())
        }
    }

    /// Send a write and map a non-2xx answer to `Rejected`.
    async fn send_write(
        &self,
        request: reqwest::RequestBuilder,
        ticker: &str,
    ) -> Result<(), StorageError> {
        let response = request.send().await.map_err(Self::map_transport_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(StorageError::Rejected {
            ticker: ticker.to_string(),
            message: format!(
                "HTTP {}: {}",
                status.as_u16(),
                zero_common::util::truncate_with_ellipsis(&body, 200)
            ),
        })
    }

    async fn fetch_rows<T: serde::de::DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, StorageError> {
        let response = self
            .authorized(self.client.get(self.table_url(table)))
            .query(query)
            .send()
            .await
            .map_err(Self::map_transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(Self::map_transport_error)?;
        if !status.is_success() {
            return Err(StorageError::Request(format!(
                "HTTP {}: {}",
                status.as_u16(),
                zero_common::util::truncate_with_ellipsis(&body, 200)
            )));
        }

        serde_json::from_str(&body)
            .map_err(|e| StorageError::InvalidRecord(format!("Failed to parse rows: {}", e)))
    }
}

#[async_trait]
impl SentimentStore for SupabaseSentimentStore {
    fn name(&self) -> &'static str {
        "supabase"
    }

    async fn upsert_current(
        &self,
        ticker: &str,
        score: f64,
        count: i64,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let row = CurrentRowOut {
            ticker,
            sentiment_score: score,
            article_count: count,
            updated_at: format_timestamp(updated_at),
        };

        let request = self
            .authorized(self.client.post(self.table_url(CURRENT_TABLE)))
            .query(&[("on_conflict", "ticker")])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&row);

        self.send_write(request, ticker).await?;
        debug!(ticker, "Upserted current sentiment");
        Ok(())
    }

    async fn append_history(
        &self,
        ticker: &str,
        score: f64,
        count: i64,
        recorded_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let row = HistoryRowOut {
            ticker,
            sentiment_score: score,
            article_count: count,
            recorded_at: format_timestamp(recorded_at),
        };

        let request = self
            .authorized(self.client.post(self.table_url(HISTORY_TABLE)))
            .header("Prefer", "return=minimal")
            .json(&row);

        self.send_write(request, ticker).await
    }

    async fn get_current(&self, ticker: &str) -> Result<Option<PersistedSentiment>, StorageError> {
        let rows: Vec<CurrentRowIn> = self
            .fetch_rows(
                CURRENT_TABLE,
                &[
                    ("select", "*".to_string()),
                    ("ticker", format!("eq.{}", ticker)),
                ],
            )
            .await?;

        match rows.into_iter().next() {
            Some(row) => Ok(Some(PersistedSentiment {
                ticker: row.ticker,
                sentiment_score: row.sentiment_score,
                article_count: row.article_count,
                updated_at: parse_timestamp(&row.updated_at)?,
            })),
            None => Ok(None),
        }
    }

    async fn get_history(
        &self,
        ticker: &str,
        limit: usize,
    ) -> Result<Vec<SentimentHistoryEntry>, StorageError> {
        let rows: Vec<HistoryRowIn> = self
            .fetch_rows(
                HISTORY_TABLE,
                &[
                    ("select", "*".to_string()),
                    ("ticker", format!("eq.{}", ticker)),
                    ("order", "recorded_at.desc".to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;

        rows.into_iter()
            .map(|row| {
                Ok(SentimentHistoryEntry {
                    recorded_at: parse_timestamp(&row.recorded_at)?,
                    ticker: row.ticker,
                    sentiment_score: row.sentiment_score,
                    article_count: row.article_count,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, header_exists, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_upsert_uses_merge_duplicates() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/stock_sentiment"))
            .and(query_param("on_conflict", "ticker"))
            .and(header("apikey", "service-key"))
            .and(header("authorization", "Bearer service-key"))
            .and(header_exists("prefer"))
            .and(body_partial_json(serde_json::json!({
                "ticker": "AAPL",
                "sentiment_score": 0.25,
                "article_count": 4
            })))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let store = SupabaseSentimentStore::new(server.uri(), "service-key");
        store
            .upsert_current("AAPL", 0.25, 4, Utc::now())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_rejected_history_write() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/sentiment_history"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_string(r#"{"message":"relation \"sentiment_history\" does not exist"}"#),
            )
            .mount(&server)
            .await;

        let store = SupabaseSentimentStore::new(server.uri(), "key");
        let err = store
            .append_history("TSLA", 0.0, 0, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Rejected { ref ticker, .. } if ticker == "TSLA"));
    }

    #[tokio::test]
    async fn test_get_current_parses_naive_timestamp() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/stock_sentiment"))
            .and(query_param("ticker", "eq.NVDA"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([{
                "id": 7,
                "ticker": "NVDA",
                "sentiment_score": 0.42,
                "article_count": 18,
                "updated_at": "2024-05-01T09:15:00.123456"
            }])))
            .mount(&server)
            .await;

        let store = SupabaseSentimentStore::new(server.uri(), "key");
        let current = store.get_current("NVDA").await.unwrap().unwrap();
        assert_eq!(current.sentiment_score, 0.42);
        assert_eq!(current.article_count, 18);
    }

    #[tokio::test]
    async fn test_get_current_absent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/stock_sentiment"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;

        let store = SupabaseSentimentStore::new(server.uri(), "key");
        assert!(store.get_current("AAPL").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_history_orders_and_limits() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/sentiment_history"))
            .and(query_param("order", "recorded_at.desc"))
            .and(query_param("limit", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                { "ticker": "AAPL", "sentiment_score": 0.2, "article_count": 3, "recorded_at": "2024-05-01T10:00:00+00:00" },
                { "ticker": "AAPL", "sentiment_score": 0.1, "article_count": 5, "recorded_at": "2024-05-01T09:30:00+00:00" }
            ])))
            .mount(&server)
            .await;

        let store = SupabaseSentimentStore::new(server.uri(), "key");
        let history = store.get_history("AAPL", 2).await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(history[0].recorded_at > history[1].recorded_at);
    }

    #[test]
    fn test_from_config_requires_credentials() {
        let mut config = Config::default();
        assert!(SupabaseSentimentStore::from_config(&config).is_err());

        config.secrets.external.supabase_url = Some("https://example.supabase.co".into());
        config.secrets.external.supabase_key = Some("key".into());
        assert!(SupabaseSentimentStore::from_config(&config).is_ok());
    }
}
