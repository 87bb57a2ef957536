//! End-to-end tests for the sentiment pipeline.
//!
//! Runs full cycles against mock news and classifier adapters and a real
//! SQLite store, checking what ends up persisted.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tempfile::TempDir;

use zero_sentiment::classifier::TextClassifier;
use zero_sentiment::error::{ClassifierError, SourceError, StorageError};
use zero_sentiment::news::{ArticleSource, SearchQuery};
use zero_sentiment::scheduler::{
    AdapterFactory, CycleAdapters, CycleScheduler, SchedulerConfig,
};
use zero_sentiment::shutdown::ShutdownHandle;
use zero_sentiment::storage::{SentimentStore, SqliteSentimentStore};
use zero_sentiment::types::{
    Article, ClassProbabilities, PersistedSentiment, SentimentHistoryEntry, Ticker,
};

// ============================================================================
// Mock Adapters
// ============================================================================

/// Article source keyed by ticker symbol. Unknown symbols fail.
struct MockSource {
    articles: HashMap<String, Vec<Article>>,
    calls: AtomicU32,
}

impl MockSource {
    fn new(articles: Vec<(&str, Vec<Article>)>) -> Self {
        Self {
            articles: articles
                .into_iter()
                .map(|(symbol, list)| (symbol.to_string(), list))
                .collect(),
            calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl ArticleSource for MockSource {
    fn name(&self) -> &'static str {
        "mock-news"
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<Article>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let symbol = query.query.split(" OR ").next().unwrap_or_default();
        self.articles
            .get(symbol)
            .cloned()
            .ok_or_else(|| SourceError::Network("mock source unreachable".into()))
    }
}

/// Classifier returning fixed probabilities per exact text; anything else is
/// fully neutral.
struct MockClassifier {
    outputs: HashMap<String, (f64, f64, f64)>,
    calls: AtomicU32,
}

impl MockClassifier {
    fn new(outputs: Vec<(&str, (f64, f64, f64))>) -> Self {
        Self {
            outputs: outputs
                .into_iter()
                .map(|(text, probs)| (text.to_string(), probs))
                .collect(),
            calls: AtomicU32::new(0),
        }
    }

    fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextClassifier for MockClassifier {
    fn name(&self) -> &str {
        "mock-finbert"
    }

    fn max_length(&self) -> usize {
        512
    }

    async fn classify(&self, text: &str) -> Result<ClassProbabilities, ClassifierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (p, n, u) = self.outputs.get(text).copied().unwrap_or((0.0, 0.0, 1.0));
        ClassProbabilities::new(p, n, u).map_err(ClassifierError::InvalidOutput)
    }
}

/// Wraps a store and fails selected operations for one ticker.
struct FlakyStore {
    inner: Arc<SqliteSentimentStore>,
    fail_upsert_for: Option<&'static str>,
    fail_history_for: Option<&'static str>,
}

#[async_trait]
impl SentimentStore for FlakyStore {
    fn name(&self) -> &'static str {
        "flaky"
    }

    async fn upsert_current(
        &self,
        ticker: &str,
        score: f64,
        count: i64,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        if self.fail_upsert_for == Some(ticker) {
            return Err(StorageError::Request("connection reset".into()));
        }
        self.inner.upsert_current(ticker, score, count, updated_at).await
    }

    async fn append_history(
        &self,
        ticker: &str,
        score: f64,
        count: i64,
        recorded_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        if self.fail_history_for == Some(ticker) {
            return Err(StorageError::Rejected {
                ticker: ticker.to_string(),
                message: "history table missing".into(),
            });
        }
        self.inner.append_history(ticker, score, count, recorded_at).await
    }

    async fn get_current(&self, ticker: &str) -> Result<Option<PersistedSentiment>, StorageError> {
        self.inner.get_current(ticker).await
    }

    async fn get_history(
        &self,
        ticker: &str,
        limit: usize,
    ) -> Result<Vec<SentimentHistoryEntry>, StorageError> {
        self.inner.get_history(ticker, limit).await
    }
}

struct FixedFactory {
    adapters: CycleAdapters,
}

impl AdapterFactory for FixedFactory {
    fn build(&self) -> anyhow::Result<CycleAdapters> {
        Ok(self.adapters.clone())
    }
}

// ============================================================================
// Fixtures
// ============================================================================

struct Harness {
    scheduler: CycleScheduler,
    sqlite: Arc<SqliteSentimentStore>,
    source: Arc<MockSource>,
    classifier: Arc<MockClassifier>,
    _dir: TempDir,
}

impl Harness {
    fn new(
        tickers: Vec<Ticker>,
        source: MockSource,
        classifier: MockClassifier,
        fail_upsert_for: Option<&'static str>,
        fail_history_for: Option<&'static str>,
    ) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let sqlite = Arc::new(SqliteSentimentStore::new(dir.path().join("sentiment.db")).unwrap());
        let source = Arc::new(source);
        let classifier = Arc::new(classifier);

        let store = Arc::new(FlakyStore {
            inner: Arc::clone(&sqlite),
            fail_upsert_for,
            fail_history_for,
        });
        let factory = Arc::new(FixedFactory {
            adapters: CycleAdapters {
                source: source.clone(),
                classifier: classifier.clone(),
                store,
            },
        });

        Self {
            scheduler: CycleScheduler::new(SchedulerConfig::new(tickers), factory),
            sqlite,
            source,
            classifier,
            _dir: dir,
        }
    }

    async fn run_cycle(&self) -> zero_sentiment::scheduler::CycleReport {
        let (_handle, signal) = ShutdownHandle::new();
        self.scheduler.run_cycle(1, &signal).await.unwrap()
    }
}

fn universe() -> Vec<Ticker> {
    vec![
        Ticker::new("AAPL", "Apple"),
        Ticker::new("NVDA", "NVIDIA"),
        Ticker::new("TSLA", "Tesla"),
    ]
}

fn apple_articles() -> Vec<Article> {
    vec![
        Article::new(Some("Apple beats"), Some("Record services revenue")),
        Article::new(Some("Apple delays launch"), None),
        Article::new(None, Some("Apple holds event")),
    ]
}

fn apple_classifier() -> MockClassifier {
    MockClassifier::new(vec![
        ("Apple beats Record services revenue", (0.7, 0.1, 0.2)),
        ("Apple delays launch", (0.2, 0.4, 0.4)),
        ("Apple holds event", (0.3, 0.2, 0.5)),
    ])
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn test_three_scored_articles_average() {
    let harness = Harness::new(
        vec![Ticker::new("AAPL", "Apple")],
        MockSource::new(vec![("AAPL", apple_articles())]),
        apple_classifier(),
        None,
        None,
    );

    let report = harness.run_cycle().await;
    assert_eq!(report.tickers_processed, 1);

    let current = harness.sqlite.get_current("AAPL").await.unwrap().unwrap();
    assert_eq!(current.article_count, 3);
    assert_eq!(format!("{:.4}", current.sentiment_score), "0.1667");
    assert_eq!(harness.classifier.call_count(), 3);
}

#[tokio::test]
async fn test_no_articles_is_neutral_without_classifier() {
    let harness = Harness::new(
        vec![Ticker::new("TSLA", "Tesla")],
        MockSource::new(vec![("TSLA", Vec::new())]),
        apple_classifier(),
        None,
        None,
    );

    harness.run_cycle().await;

    let current = harness.sqlite.get_current("TSLA").await.unwrap().unwrap();
    assert_eq!(current.sentiment_score, 0.0);
    assert_eq!(current.article_count, 0);
    assert_eq!(harness.classifier.call_count(), 0);
}

#[tokio::test]
async fn test_source_failure_persists_neutral() {
    let harness = Harness::new(
        vec![Ticker::new("NVDA", "NVIDIA")],
        MockSource::new(Vec::new()),
        apple_classifier(),
        None,
        None,
    );

    let report = harness.run_cycle().await;
    assert_eq!(report.tickers_processed, 1);
    assert_eq!(report.tickers_failed, 0);

    let current = harness.sqlite.get_current("NVDA").await.unwrap().unwrap();
    assert_eq!(current.sentiment_score, 0.0);
    assert_eq!(current.article_count, 0);
    assert_eq!(harness.classifier.call_count(), 0);
}

#[tokio::test]
async fn test_empty_articles_excluded_from_count() {
    let mut articles = apple_articles();
    articles.push(Article::new(Some(""), Some("   ")));
    articles.push(Article::default());

    let harness = Harness::new(
        vec![Ticker::new("AAPL", "Apple")],
        MockSource::new(vec![("AAPL", articles)]),
        apple_classifier(),
        None,
        None,
    );

    harness.run_cycle().await;

    let current = harness.sqlite.get_current("AAPL").await.unwrap().unwrap();
    assert_eq!(current.article_count, 3);
    assert_eq!(format!("{:.4}", current.sentiment_score), "0.1667");
    assert_eq!(harness.classifier.call_count(), 3);
}

#[tokio::test]
async fn test_failing_ticker_does_not_stop_cycle() {
    let harness = Harness::new(
        universe(),
        MockSource::new(vec![
            ("AAPL", apple_articles()),
            ("NVDA", apple_articles()),
            ("TSLA", apple_articles()),
        ]),
        apple_classifier(),
        Some("NVDA"),
        None,
    );

    let report = harness.run_cycle().await;
    assert_eq!(report.tickers_processed, 2);
    assert_eq!(report.tickers_failed, 1);
    assert_eq!(harness.source.calls.load(Ordering::SeqCst), 3);

    assert!(harness.sqlite.get_current("AAPL").await.unwrap().is_some());
    assert!(harness.sqlite.get_current("NVDA").await.unwrap().is_none());
    assert!(harness.sqlite.get_current("TSLA").await.unwrap().is_some());
    assert_eq!(harness.sqlite.history_count("NVDA").await.unwrap(), 0);
}

#[tokio::test]
async fn test_history_failure_keeps_current_snapshot() {
    let harness = Harness::new(
        universe(),
        MockSource::new(vec![
            ("AAPL", apple_articles()),
            ("NVDA", Vec::new()),
            ("TSLA", Vec::new()),
        ]),
        apple_classifier(),
        None,
        Some("AAPL"),
    );

    let report = harness.run_cycle().await;
    assert_eq!(report.tickers_processed, 3);
    assert_eq!(report.tickers_failed, 0);

    let current = harness.sqlite.get_current("AAPL").await.unwrap().unwrap();
    assert_eq!(current.article_count, 3);
    assert_eq!(harness.sqlite.history_count("AAPL").await.unwrap(), 0);
    assert_eq!(harness.sqlite.history_count("TSLA").await.unwrap(), 1);
}

#[tokio::test]
async fn test_repeated_cycles_overwrite_current_and_append_history() {
    let harness = Harness::new(
        universe(),
        MockSource::new(vec![
            ("AAPL", apple_articles()),
            ("NVDA", Vec::new()),
            ("TSLA", Vec::new()),
        ]),
        apple_classifier(),
        None,
        None,
    );

    harness.run_cycle().await;
    harness.run_cycle().await;

    assert_eq!(harness.sqlite.current_count().await.unwrap(), 3);
    for ticker in universe() {
        assert_eq!(harness.sqlite.history_count(&ticker.symbol).await.unwrap(), 2);
    }
    let history = harness.sqlite.get_history("AAPL", 10).await.unwrap();
    assert!(history[0].recorded_at >= history[1].recorded_at);
}
