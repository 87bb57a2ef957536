//! Sentiment cycle scheduler.
//!
//! Drives the aggregator across the ticker universe on a fixed interval.
//!
//! # State machine
//!
//! ```text
//! Idle ─▶ RunningCycle ─┬─ ok ──▶ Sleeping ───┐
//!             ▲         └─ err ─▶ Recovering ─┤
//!             └───────────────────────────────┘
//!
//! shutdown signal (between tickers or during a wait) ─▶ Stopped
//! ```
//!
//! A ticker failure is logged and the cycle moves on. A failure that escapes
//! the ticker loop abandons the cycle and waits the recovery backoff before a
//! fresh attempt. Retries are unbounded at a fixed backoff; the consecutive
//! failure count is reported in the status but never acted on.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{error, info, info_span, warn, Instrument};

use crate::aggregator::TickerAggregator;
use crate::classifier::TextClassifier;
use crate::error::StorageError;
use crate::news::ArticleSource;
use crate::scorer::SentimentScorer;
use crate::shutdown::ShutdownSignal;
use crate::storage::{persist_result, SentimentStore};
use crate::types::{Ticker, TickerSentimentResult};
use zero_common::config::SentimentConfig;
use zero_common::logging::generate_trace_id;
use zero_common::util::sanitize_for_log;

// ============================================================================
// Configuration
// ============================================================================

/// Immutable scheduler configuration, fixed at construction.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Ticker universe in processing order
    pub tickers: Vec<Ticker>,
    /// Wait after a completed cycle
    pub interval: Duration,
    /// Wait after a failed cycle
    pub recovery_backoff: Duration,
    /// Articles requested per ticker
    pub page_size: u32,
    /// Article language filter
    pub language: String,
}

impl SchedulerConfig {
    pub fn new(tickers: Vec<Ticker>) -> Self {
        Self {
            tickers,
            interval: Duration::from_secs(30 * 60),
            recovery_backoff: Duration::from_secs(5 * 60),
            page_size: 20,
            language: "en".to_string(),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_recovery_backoff(mut self, backoff: Duration) -> Self {
        self.recovery_backoff = backoff;
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }
}

impl From<&SentimentConfig> for SchedulerConfig {
    fn from(config: &SentimentConfig) -> Self {
        Self {
            tickers: config.tickers.iter().map(Ticker::from).collect(),
            interval: Duration::from_secs(config.interval_secs),
            recovery_backoff: Duration::from_secs(config.recovery_backoff_secs),
            page_size: config.page_size,
            language: config.language.clone(),
        }
    }
}

// ============================================================================
// Status
// ============================================================================

/// Scheduler state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    /// Constructed, not yet running
    Idle,
    /// Processing tickers
    RunningCycle,
    /// Waiting the normal interval
    Sleeping,
    /// Waiting the recovery backoff after a failed cycle
    Recovering,
    /// Shut down
    Stopped,
}

/// Summary of one completed cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleReport {
    pub cycle: u64,
    pub tickers_processed: usize,
    pub tickers_failed: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Observable scheduler status.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub state: SchedulerState,
    /// Cycle attempts so far, failed ones included
    pub cycle_count: u64,
    pub consecutive_failures: u32,
    pub last_cycle: Option<CycleReport>,
    pub last_error: Option<String>,
}

impl Default for SchedulerStatus {
    fn default() -> Self {
        Self {
            state: SchedulerState::Idle,
            cycle_count: 0,
            consecutive_failures: 0,
            last_cycle: None,
            last_error: None,
        }
    }
}

// ============================================================================
// Adapters
// ============================================================================

/// Adapters used by one cycle.
#[derive(Clone)]
pub struct CycleAdapters {
    pub source: Arc<dyn ArticleSource>,
    pub classifier: Arc<dyn TextClassifier>,
    pub store: Arc<dyn SentimentStore>,
}

/// Builds the adapters for a cycle.
///
/// Called once at startup, where an error is fatal, and at the start of
/// every cycle, where an error fails that cycle.
pub trait AdapterFactory: Send + Sync {
    fn build(&self) -> Result<CycleAdapters>;
}

// ============================================================================
// Scheduler
// ============================================================================

/// Periodic sentiment scheduler.
pub struct CycleScheduler {
    config: SchedulerConfig,
    factory: Arc<dyn AdapterFactory>,
    status: Arc<RwLock<SchedulerStatus>>,
}

impl CycleScheduler {
    pub fn new(config: SchedulerConfig, factory: Arc<dyn AdapterFactory>) -> Self {
        Self {
            config,
            factory,
            status: Arc::new(RwLock::new(SchedulerStatus::default())),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Shared status, for the read API.
    pub fn status_handle(&self) -> Arc<RwLock<SchedulerStatus>> {
        Arc::clone(&self.status)
    }

    pub async fn status(&self) -> SchedulerStatus {
        self.status.read().await.clone()
    }

    async fn set_state(&self, state: SchedulerState) {
        self.status.write().await.state = state;
    }

    /// Run cycles until `shutdown` fires.
    pub async fn run(&self, mut shutdown: ShutdownSignal) {
        info!(
            tickers = ?self.config.tickers.iter().map(|t| t.symbol.as_str()).collect::<Vec<_>>(),
            interval_secs = self.config.interval.as_secs(),
            recovery_backoff_secs = self.config.recovery_backoff.as_secs(),
            "Sentiment scheduler started"
        );

        while !shutdown.is_triggered() {
            let cycle = {
                let mut status = self.status.write().await;
                status.cycle_count += 1;
                status.state = SchedulerState::RunningCycle;
                status.cycle_count
            };

            let span = info_span!("sentiment_cycle", cycle, cycle_id = %generate_trace_id());
            let outcome = self.run_cycle(cycle, &shutdown).instrument(span).await;

            let wait = match outcome {
                Ok(report) => {
                    let mut status = self.status.write().await;
                    status.last_cycle = Some(report);
                    status.consecutive_failures = 0;
                    status.last_error = None;
                    status.state = SchedulerState::Sleeping;
                    self.config.interval
                }
                Err(e) => {
                    let message = sanitize_for_log(&format!("{:#}", e));
                    error!(cycle, error = %message, "Sentiment cycle failed");

                    let mut status = self.status.write().await;
                    status.consecutive_failures += 1;
                    status.last_error = Some(message);
                    status.state = SchedulerState::Recovering;
                    warn!(
                        consecutive_failures = status.consecutive_failures,
                        retry_in_secs = self.config.recovery_backoff.as_secs(),
                        "Retrying after recovery backoff"
                    );
                    self.config.recovery_backoff
                }
            };

            if shutdown.is_triggered() {
                break;
            }

            info!(wait_secs = wait.as_secs(), "Next cycle scheduled");
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = shutdown.wait() => break,
            }
        }

        self.set_state(SchedulerState::Stopped).await;
        info!("Sentiment scheduler stopped");
    }

    /// Run one cycle over the full ticker universe.
    ///
    /// Returns `Err` only when the cycle cannot start. Ticker failures are
    /// counted in the report.
    pub async fn run_cycle(&self, cycle: u64, shutdown: &ShutdownSignal) -> Result<CycleReport> {
        let started_at = Utc::now();
        info!(tickers = self.config.tickers.len(), "Starting sentiment cycle");

        let adapters = self
            .factory
            .build()
            .context("Failed to build cycle adapters")?;

        let aggregator = TickerAggregator::new(
            Arc::clone(&adapters.source),
            SentimentScorer::new(Arc::clone(&adapters.classifier)),
            self.config.language.clone(),
            self.config.page_size,
        );

        let mut processed = 0;
        let mut failed = 0;

        for ticker in &self.config.tickers {
            if shutdown.is_triggered() {
                info!(processed, "Shutdown requested, stopping between tickers");
                break;
            }

            match process_ticker(&aggregator, adapters.store.as_ref(), ticker).await {
                Ok(_) => processed += 1,
                Err(e) => {
                    failed += 1;
                    error!(
                        ticker = %ticker.symbol,
                        error = %sanitize_for_log(&e.to_string()),
                        "Failed to process ticker"
                    );
                }
            }
        }

        let finished_at = Utc::now();
        info!(
            processed,
            failed,
            duration_ms = (finished_at - started_at).num_milliseconds(),
            "Sentiment cycle completed"
        );

        Ok(CycleReport {
            cycle,
            tickers_processed: processed,
            tickers_failed: failed,
            started_at,
            finished_at,
        })
    }
}

/// Aggregate and persist one ticker.
pub async fn process_ticker(
    aggregator: &TickerAggregator,
    store: &dyn SentimentStore,
    ticker: &Ticker,
) -> Result<TickerSentimentResult, StorageError> {
    let result = aggregator.aggregate(ticker).await;
    persist_result(store, &result, Utc::now()).await?;
    Ok(result)
}
