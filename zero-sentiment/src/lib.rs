//! Zero Sentiment Library
//!
//! Periodic news sentiment for a fixed universe of stock tickers. Each cycle
//! fetches recent articles per ticker, scores them with a financial text
//! classifier, averages the scores and stores the latest value plus a
//! history row.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                   zero-sentiment (Rust Service)                     │
//! │                           :4436                                     │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │  CycleScheduler ──▶ TickerAggregator ──▶ SentimentScorer            │
//! │        │                   │                    │                   │
//! │        ▼                   ▼                    ▼                   │
//! │  SentimentStore      ArticleSource        TextClassifier            │
//! │  (SQLite/Supabase)   (NewsAPI)            (Hugging Face FinBERT)    │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Scoring
//!
//! - Article text is `"<title> <description>"`; empty text is skipped.
//! - Article score is `p_positive - p_negative`, in [-1, 1].
//! - Ticker score is the mean over scored articles, or 0.0 with count 0
//!   when nothing could be scored.

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod aggregator;
pub mod classifier;
pub mod error;
pub mod news;
pub mod routes;
pub mod scheduler;
pub mod scorer;
pub mod shutdown;
pub mod storage;
pub mod types;

use anyhow::{bail, Result};
use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use zero_common::config::Config;

use crate::classifier::HuggingFaceClassifier;
use crate::news::NewsApiSource;
use crate::routes::ApiState;
use crate::scheduler::{AdapterFactory, CycleAdapters, CycleScheduler, SchedulerConfig};
use crate::shutdown::{ShutdownHandle, ShutdownSignal};
use crate::storage::{SentimentStore, SqliteSentimentStore, SupabaseSentimentStore};

// ============================================================================
// Adapter Factory
// ============================================================================

/// Builds production adapters from configuration.
pub struct ConfiguredAdapters {
    config: Config,
}

impl ConfiguredAdapters {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Open the configured storage backend.
    pub fn build_store(&self) -> Result<Arc<dyn SentimentStore>> {
        let backend = self.config.sentiment.storage.backend.to_lowercase();
        let store: Arc<dyn SentimentStore> = match backend.as_str() {
            "sqlite" => Arc::new(SqliteSentimentStore::from_config(&self.config)?),
            "supabase" => Arc::new(SupabaseSentimentStore::from_config(&self.config)?),
            other => bail!("Unknown storage backend: {}", other),
        };
        Ok(store)
    }
}

impl AdapterFactory for ConfiguredAdapters {
    fn build(&self) -> Result<CycleAdapters> {
        Ok(CycleAdapters {
            source: Arc::new(NewsApiSource::from_config(&self.config)?),
            classifier: Arc::new(HuggingFaceClassifier::from_config(&self.config)?),
            store: self.build_store()?,
        })
    }
}

// ============================================================================
// Service
// ============================================================================

/// Main sentiment service: scheduler plus read API.
pub struct SentimentService {
    config: Config,
    factory: Arc<dyn AdapterFactory>,
}

impl SentimentService {
    /// Create a service with adapters built from `config`.
    pub fn new(config: Config) -> Self {
        let factory = Arc::new(ConfiguredAdapters::new(config.clone()));
        Self::with_factory(config, factory)
    }

    pub fn with_factory(config: Config, factory: Arc<dyn AdapterFactory>) -> Self {
        Self { config, factory }
    }

    /// Build the HTTP router for the read API.
    pub fn router(state: Arc<ApiState>) -> Router {
        Router::new()
            .route("/health", get(routes::health))
            .route("/api/v1/status", get(routes::get_status))
            .route("/api/v1/sentiment", get(routes::list_sentiment))
            .route("/api/v1/sentiment/:ticker", get(routes::get_sentiment))
            .route("/api/v1/sentiment/:ticker/history", get(routes::get_history))
            .with_state(state)
    }

    /// Run until SIGINT/SIGTERM.
    ///
    /// Adapters are built once up front; any error there is returned before
    /// the scheduler or the server starts.
    pub async fn start(self) -> Result<()> {
        let (handle, signal) = ShutdownHandle::new();

        let signal_handle = handle.clone();
        tokio::spawn(async move {
            if let Err(e) = shutdown::trigger_on_signal(signal_handle).await {
                tracing::error!(error = %e, "Failed to install signal handlers");
            }
        });

        self.run_until(handle, signal).await
    }

    /// Run until `signal` fires. `handle` is triggered if the HTTP server
    /// exits early so the scheduler stops too.
    pub async fn run_until(self, handle: ShutdownHandle, signal: ShutdownSignal) -> Result<()> {
        let startup = self.factory.build()?;
        tracing::info!(
            source = startup.source.name(),
            classifier = startup.classifier.name(),
            store = startup.store.name(),
            "Adapters initialized"
        );

        let scheduler = Arc::new(CycleScheduler::new(
            SchedulerConfig::from(&self.config.sentiment),
            Arc::clone(&self.factory),
        ));

        let state = Arc::new(ApiState {
            tickers: scheduler.config().tickers.clone(),
            store: startup.store,
            status: scheduler.status_handle(),
        });
        let app = Self::router(state);

        let addr: SocketAddr =
            format!("{}:{}", self.config.bind_address(), self.config.sentiment_port()).parse()?;
        tracing::info!(address = %addr, "Starting HTTP server");
        let listener = tokio::net::TcpListener::bind(addr).await?;

        let mut server_signal = signal.clone();
        let server_handle = handle.clone();
        let server = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move { server_signal.wait().await })
                .await;
            if let Err(ref e) = result {
                tracing::error!(error = %e, "HTTP server failed");
            }
            server_handle.trigger();
            result
        });

        scheduler.run(signal).await;

        server.await??;
        tracing::info!("Sentiment service stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zero_common::config::TickerEntry;

    fn config_with_backend(backend: &str, dir: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.sentiment.tickers = vec![TickerEntry::new("AAPL", "Apple")];
        config.sentiment.storage.backend = backend.to_string();
        config.sentiment.storage.db_path = dir.join("sentiment.db");
        config
    }

    #[test]
    fn test_factory_requires_news_key() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_with_backend("sqlite", dir.path());
        let err = ConfiguredAdapters::new(config).build().err().unwrap();
        assert!(err.to_string().contains("NEWS_API_KEY"));
    }

    #[test]
    fn test_factory_builds_sqlite_adapters() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_with_backend("sqlite", dir.path());
        config.secrets.external.news_api = Some("key".into());

        let adapters = ConfiguredAdapters::new(config).build().unwrap();
        assert_eq!(adapters.source.name(), "newsapi");
        assert_eq!(adapters.classifier.name(), "ProsusAI/finbert");
        assert_eq!(adapters.store.name(), "sqlite");
    }

    #[test]
    fn test_factory_supabase_requires_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_with_backend("supabase", dir.path());
        config.secrets.external.news_api = Some("key".into());
        assert!(ConfiguredAdapters::new(config).build().is_err());
    }

    #[test]
    fn test_unknown_backend() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_with_backend("redis", dir.path());
        config.secrets.external.news_api = Some("key".into());
        assert!(ConfiguredAdapters::new(config).build_store().is_err());
    }
}
