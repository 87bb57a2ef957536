//! Per-ticker aggregation: fetch, score, reduce.
//!
//! Failures never escape this module. A failed fetch, an empty result and a
//! batch with no scorable text all collapse to the neutral result
//! `{0.0, 0}`; a failed classification scores that article 0.0 and still
//! counts it.

use std::sync::Arc;
use tracing::{debug, info};

use crate::error::Degrade;
use crate::news::{ArticleSource, SearchQuery};
use crate::scorer::SentimentScorer;
use crate::types::{SentimentScore, Ticker, TickerSentimentResult};

/// Fetches a ticker's recent articles and reduces their scores to one value.
pub struct TickerAggregator {
    source: Arc<dyn ArticleSource>,
    scorer: SentimentScorer,
    language: String,
    page_size: u32,
}

impl TickerAggregator {
    pub fn new(
        source: Arc<dyn ArticleSource>,
        scorer: SentimentScorer,
        language: impl Into<String>,
        page_size: u32,
    ) -> Self {
        Self {
            source,
            scorer,
            language: language.into(),
            page_size,
        }
    }

    /// Aggregate the current news sentiment for `ticker`.
    pub async fn aggregate(&self, ticker: &Ticker) -> TickerSentimentResult {
        let symbol = ticker.symbol.as_str();
        let query = SearchQuery::for_ticker(ticker, &self.language, self.page_size);

        let articles = self
            .source
            .search(&query)
            .await
            .or_degrade(Vec::new(), "fetch_articles", symbol);

        if articles.is_empty() {
            info!(ticker = symbol, source = self.source.name(), "No articles found");
            return TickerSentimentResult::neutral(symbol);
        }

        let fetched = articles.len();
        let mut scores = Vec::with_capacity(fetched);
        for article in &articles {
            let Some(text) = article.scoring_text() else {
                continue;
            };
            scores.push(self.scorer.score(&text, symbol).await);
        }

        let Some(aggregate_score) = SentimentScore::mean(&scores) else {
            info!(ticker = symbol, fetched, "No articles with scorable text");
            return TickerSentimentResult::neutral(symbol);
        };

        debug!(
            ticker = symbol,
            fetched,
            scored = scores.len(),
            classifier = self.scorer.classifier_name(),
            "Scored articles"
        );

        TickerSentimentResult {
            ticker: symbol.to_string(),
            aggregate_score,
            article_count: scores.len(),
        }
    }
}
