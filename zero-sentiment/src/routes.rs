//! HTTP routes for the sentiment service (read path).

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error};
use zero_common::Error as ApiError;

use crate::error::StorageError;
use crate::scheduler::SchedulerStatus;
use crate::storage::SentimentStore;
use crate::types::{PersistedSentiment, SentimentHistoryEntry, Ticker};

/// History rows returned when no limit is given
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Upper bound on requested history rows
pub const MAX_HISTORY_LIMIT: usize = 500;

/// Shared state for the read API.
pub struct ApiState {
    pub tickers: Vec<Ticker>,
    pub store: Arc<dyn SentimentStore>,
    pub status: Arc<RwLock<SchedulerStatus>>,
}

impl ApiState {
    /// Configured ticker matching `symbol`, ignoring case.
    fn configured(&self, symbol: &str) -> Option<&Ticker> {
        self.tickers
            .iter()
            .find(|t| t.symbol.eq_ignore_ascii_case(symbol))
    }
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub service: String,
}

#[derive(Debug, Serialize)]
pub struct SentimentListResponse {
    pub sentiments: Vec<PersistedSentiment>,
    /// Configured tickers without a stored value yet
    pub missing: Vec<String>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub ticker: String,
    pub entries: Vec<SentimentHistoryEntry>,
    pub count: usize,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

fn reject(err: ApiError) -> StatusCode {
    if err.is_server_fault() {
        error!(error = %err, "Read request failed");
    } else {
        debug!(error = %err, "Read request rejected");
    }
    StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

fn storage_status(e: StorageError) -> StatusCode {
    reject(e.into())
}

fn not_configured(symbol: &str) -> StatusCode {
    reject(ApiError::NotFound(format!("{} is not a configured ticker", symbol)))
}

// ============================================================================
// Route Handlers
// ============================================================================

/// Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        service: "zero-sentiment".to_string(),
    })
}

/// Scheduler status
pub async fn get_status(State(state): State<Arc<ApiState>>) -> Json<SchedulerStatus> {
    Json(state.status.read().await.clone())
}

/// Current sentiment for every configured ticker
pub async fn list_sentiment(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<SentimentListResponse>, StatusCode> {
    let mut sentiments = Vec::with_capacity(state.tickers.len());
    let mut missing = Vec::new();

    for ticker in &state.tickers {
        match state.store.get_current(&ticker.symbol).await.map_err(storage_status)? {
            Some(current) => sentiments.push(current),
            None => missing.push(ticker.symbol.clone()),
        }
    }

    let count = sentiments.len();
    Ok(Json(SentimentListResponse {
        sentiments,
        missing,
        count,
    }))
}

/// Current sentiment for one ticker
pub async fn get_sentiment(
    State(state): State<Arc<ApiState>>,
    Path(symbol): Path<String>,
) -> Result<Json<PersistedSentiment>, StatusCode> {
    let ticker = state
        .configured(&symbol)
        .ok_or_else(|| not_configured(&symbol))?;

    state
        .store
        .get_current(&ticker.symbol)
        .await
        .map_err(storage_status)?
        .map(Json)
        .ok_or_else(|| {
            reject(ApiError::NotFound(format!(
                "no sentiment stored for {}",
                ticker.symbol
            )))
        })
}

/// Sentiment history for one ticker, newest first
pub async fn get_history(
    State(state): State<Arc<ApiState>>,
    Path(symbol): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, StatusCode> {
    let ticker = state
        .configured(&symbol)
        .ok_or_else(|| not_configured(&symbol))?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);

    let entries = state
        .store
        .get_history(&ticker.symbol, limit)
        .await
        .map_err(storage_status)?;

    let count = entries.len();
    Ok(Json(HistoryResponse {
        ticker: ticker.symbol.clone(),
        entries,
        count,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteSentimentStore;
    use chrono::{Duration, Utc};
    use tempfile::{tempdir, TempDir};

    async fn state() -> (Arc<ApiState>, TempDir) {
        let dir = tempdir().unwrap();
        let store = SqliteSentimentStore::new(dir.path().join("sentiment.db")).unwrap();
        let now = Utc::now();
        store.upsert_current("AAPL", 0.1667, 3, now).await.unwrap();
        for i in 0..3 {
            store
                .append_history("AAPL", 0.1, i, now + Duration::minutes(i))
                .await
                .unwrap();
        }

        let state = ApiState {
            tickers: vec![Ticker::new("AAPL", "Apple"), Ticker::new("TSLA", "Tesla")],
            store: Arc::new(store),
            status: Arc::new(RwLock::new(SchedulerStatus::default())),
        };
        (Arc::new(state), dir)
    }

    #[tokio::test]
    async fn test_health() {
        let Json(body) = health().await;
        assert_eq!(body.status, "healthy");
        assert_eq!(body.service, "zero-sentiment");
    }

    #[tokio::test]
    async fn test_list_reports_missing_tickers() {
        let (state, _dir) = state().await;
        let Json(body) = list_sentiment(State(state)).await.unwrap();
        assert_eq!(body.count, 1);
        assert_eq!(body.sentiments[0].ticker, "AAPL");
        assert_eq!(body.missing, vec!["TSLA".to_string()]);
    }

    #[tokio::test]
    async fn test_get_sentiment_case_insensitive_and_not_found() {
        let (state, _dir) = state().await;

        let Json(current) = get_sentiment(State(state.clone()), Path("aapl".into()))
            .await
            .unwrap();
        assert_eq!(current.article_count, 3);

        let err = get_sentiment(State(state.clone()), Path("TSLA".into()))
            .await
            .unwrap_err();
        assert_eq!(err, StatusCode::NOT_FOUND);

        let err = get_sentiment(State(state), Path("MSFT".into())).await.unwrap_err();
        assert_eq!(err, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_history_limit() {
        let (state, _dir) = state().await;

        let Json(body) = get_history(
            State(state.clone()),
            Path("AAPL".into()),
            Query(HistoryQuery { limit: Some(2) }),
        )
        .await
        .unwrap();
        assert_eq!(body.count, 2);
        assert_eq!(body.entries[0].article_count, 2);

        let Json(body) = get_history(
            State(state),
            Path("AAPL".into()),
            Query(HistoryQuery { limit: None }),
        )
        .await
        .unwrap();
        assert_eq!(body.count, 3);
    }

    struct UnreachableStore;

    #[async_trait::async_trait]
    impl SentimentStore for UnreachableStore {
        fn name(&self) -> &'static str {
            "unreachable"
        }

        async fn upsert_current(
            &self,
            _ticker: &str,
            _score: f64,
            _count: i64,
            _updated_at: chrono::DateTime<Utc>,
        ) -> Result<(), StorageError> {
            Err(StorageError::Request("connection refused".into()))
        }

        async fn append_history(
            &self,
            _ticker: &str,
            _score: f64,
            _count: i64,
            _recorded_at: chrono::DateTime<Utc>,
        ) -> Result<(), StorageError> {
            Err(StorageError::Request("connection refused".into()))
        }

        async fn get_current(
            &self,
            _ticker: &str,
        ) -> Result<Option<PersistedSentiment>, StorageError> {
            Err(StorageError::Request("connection refused".into()))
        }

        async fn get_history(
            &self,
            _ticker: &str,
            _limit: usize,
        ) -> Result<Vec<SentimentHistoryEntry>, StorageError> {
            Err(StorageError::Request("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn test_storage_failure_is_service_unavailable() {
        let state = Arc::new(ApiState {
            tickers: vec![Ticker::new("AAPL", "Apple")],
            store: Arc::new(UnreachableStore),
            status: Arc::new(RwLock::new(SchedulerStatus::default())),
        });

        let err = list_sentiment(State(state.clone())).await.unwrap_err();
        assert_eq!(err, StatusCode::SERVICE_UNAVAILABLE);

        let err = get_sentiment(State(state.clone()), Path("AAPL".into()))
            .await
            .unwrap_err();
        assert_eq!(err, StatusCode::SERVICE_UNAVAILABLE);

        // Unconfigured tickers are rejected before the store is touched
        let err = get_history(
            State(state),
            Path("MSFT".into()),
            Query(HistoryQuery { limit: None }),
        )
        .await
        .unwrap_err();
        assert_eq!(err, StatusCode::NOT_FOUND);
    }
}
