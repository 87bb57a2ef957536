//! Sentiment persistence.
//!
//! Two tables back every store: a current snapshot keyed by ticker
//! (last-write-wins) and an append-only history. The two writes are separate
//! operations and are never conflated.

pub mod sqlite;
pub mod supabase;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use tracing::info;

use crate::error::{Degrade, StorageError};
use crate::types::{PersistedSentiment, SentimentHistoryEntry, TickerSentimentResult};

pub use sqlite::SqliteSentimentStore;
pub use supabase::SupabaseSentimentStore;

/// Persistence adapter for sentiment results.
#[async_trait]
pub trait SentimentStore: Send + Sync {
    /// Backend name for logging (e.g., "sqlite")
    fn name(&self) -> &'static str;

    /// Insert or overwrite the current snapshot for `ticker`.
    async fn upsert_current(
        &self,
        ticker: &str,
        score: f64,
        count: i64,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    /// Append one history row.
    async fn append_history(
        &self,
        ticker: &str,
        score: f64,
        count: i64,
        recorded_at: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    /// Current snapshot for `ticker`, if one was ever written.
    async fn get_current(&self, ticker: &str) -> Result<Option<PersistedSentiment>, StorageError>;

    /// Up to `limit` history rows for `ticker`, newest first.
    async fn get_history(
        &self,
        ticker: &str,
        limit: usize,
    ) -> Result<Vec<SentimentHistoryEntry>, StorageError>;
}

/// Persist one ticker's result: upsert the snapshot, then append history.
///
/// An upsert error is returned to the caller as the ticker's failure. A
/// history error is logged and dropped.
pub async fn persist_result(
    store: &dyn SentimentStore,
    result: &TickerSentimentResult,
    now: DateTime<Utc>,
) -> Result<(), StorageError> {
    let score = result.aggregate_score.value();
    let count = result.article_count as i64;

    store
        .upsert_current(&result.ticker, score, count, now)
        .await?;

    store
        .append_history(&result.ticker, score, count, now)
        .await
        .or_degrade((), "append_history", &result.ticker);

    info!(
        ticker = %result.ticker,
        store = store.name(),
        sentiment = %result.aggregate_score,
        articles = result.article_count,
        "Stored sentiment"
    );
    Ok(())
}

/// Timestamp format written by every store: RFC 3339, UTC, microseconds.
pub(crate) fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored timestamp. Accepts RFC 3339 and offset-less ISO 8601
/// (interpreted as UTC).
pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StorageError> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .map(|naive| naive.and_utc())
        .map_err(|e| StorageError::InvalidRecord(format!("bad timestamp '{}': {}", raw, e)))
}
