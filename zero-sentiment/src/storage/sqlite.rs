//! Local sentiment storage using SQLite.
//!
//! Default backend. One database file holds the current snapshot table and
//! the history table.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{format_timestamp, parse_timestamp, SentimentStore};
use crate::error::StorageError;
use crate::types::{PersistedSentiment, SentimentHistoryEntry};
use zero_common::config::Config;

// ============================================================================
// Database Schema
// ============================================================================

const CREATE_TABLES_SQL: &str = r#"
-- Current sentiment, one row per ticker
CREATE TABLE IF NOT EXISTS stock_sentiment (
    ticker TEXT PRIMARY KEY,
    sentiment_score REAL NOT NULL,
    article_count INTEGER NOT NULL,
    updated_at TEXT NOT NULL
);

-- Append-only sentiment history
CREATE TABLE IF NOT EXISTS sentiment_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    ticker TEXT NOT NULL,
    sentiment_score REAL NOT NULL,
    article_count INTEGER NOT NULL,
    recorded_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sentiment_history_ticker_ts
ON sentiment_history(ticker, recorded_at DESC);
"#;

// ============================================================================
// Store
// ============================================================================

/// SQLite-backed sentiment store.
pub struct SqliteSentimentStore {
    /// rusqlite::Connection is Send but not Sync, so it lives behind a Mutex.
    db: Arc<Mutex<Connection>>,
    db_path: PathBuf,
}

impl SqliteSentimentStore {
    /// Open (or create) the database at `db_path`.
    pub fn new(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create database directory {}", parent.display())
                })?;
            }
        }

        let conn = Connection::open(&db_path).context("Failed to open sentiment database")?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .context("Failed to set database pragmas")?;

        conn.execute_batch(CREATE_TABLES_SQL)
            .context("Failed to create database tables")?;

        info!(db_path = %db_path.display(), "Initialized sentiment storage");

        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
            db_path,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.sentiment.storage.db_path.clone())
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Number of history rows for `ticker`.
    pub async fn history_count(&self, ticker: &str) -> Result<u64, StorageError> {
        let db = self.db.lock().await;
        let count: i64 = db.query_row(
            "SELECT COUNT(*) FROM sentiment_history WHERE ticker = ?1",
            params![ticker],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Number of current-snapshot rows.
    pub async fn current_count(&self) -> Result<u64, StorageError> {
        let db = self.db.lock().await;
        let count: i64 =
            db.query_row("SELECT COUNT(*) FROM stock_sentiment", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

#[async_trait]
impl SentimentStore for SqliteSentimentStore {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn upsert_current(
        &self,
        ticker: &str,
        score: f64,
        count: i64,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let db = self.db.lock().await;

        db.execute(
            r#"
            INSERT INTO stock_sentiment (ticker, sentiment_score, article_count, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(ticker) DO UPDATE SET
                sentiment_score = excluded.sentiment_score,
                article_count = excluded.article_count,
                updated_at = excluded.updated_at
            "#,
            params![ticker, score, count, format_timestamp(updated_at)],
        )?;

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
        let db = self.db.lock().await;

        db.execute(
            r#"
            INSERT INTO sentiment_history (ticker, sentiment_score, article_count, recorded_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![ticker, score, count, format_timestamp(recorded_at)],
        )?;

        Ok(())
    }

    async fn get_current(&self, ticker: &str) -> Result<Option<PersistedSentiment>, StorageError> {
        let db = self.db.lock().await;

        let row = db
            .query_row(
                "SELECT ticker, sentiment_score, article_count, updated_at
                 FROM stock_sentiment WHERE ticker = ?1",
                params![ticker],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, f64>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;

        match row {
            Some((ticker, sentiment_score, article_count, updated_at)) => {
                Ok(Some(PersistedSentiment {
                    ticker,
                    sentiment_score,
                    article_count,
                    updated_at: parse_timestamp(&updated_at)?,
                }))
            }
            None => Ok(None),
        }
    }

    async fn get_history(
        &self,
        ticker: &str,
        limit: usize,
    ) -> Result<Vec<SentimentHistoryEntry>, StorageError> {
        let db = self.db.lock().await;

        let mut stmt = db.prepare(
            "SELECT ticker, sentiment_score, article_count, recorded_at
             FROM sentiment_history WHERE ticker = ?1
             ORDER BY recorded_at DESC, id DESC LIMIT ?2",
        )?;

        let rows = stmt.query_map(params![ticker, limit as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, f64>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (ticker, sentiment_score, article_count, recorded_at) = row?;
            entries.push(SentimentHistoryEntry {
                ticker,
                sentiment_score,
                article_count,
                recorded_at: parse_timestamp(&recorded_at)?,
            });
        }
        Ok(entries)
    }
}
