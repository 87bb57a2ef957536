//! News article sources.
//!
//! Defines the `ArticleSource` trait consumed by the ticker aggregator and the
//! NewsAPI implementation used in production.

pub mod newsapi;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SourceError;
use crate::types::{Article, Ticker};

pub use newsapi::NewsApiSource;

/// Sort order NewsAPI uses for most-recent-first.
pub const SORT_MOST_RECENT: &str = "publishedAt";

/// Parameters of one article search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Free-text query, e.g. "AAPL OR Apple"
    pub query: String,
    /// Language filter (ISO 639-1)
    pub language: String,
    /// Sort order
    pub sort_by: String,
    /// Maximum articles returned
    pub page_size: u32,
}

impl SearchQuery {
    /// Most-recent-first search for a ticker.
    pub fn for_ticker(ticker: &Ticker, language: &str, page_size: u32) -> Self {
        Self {
            query: ticker.search_query(),
            language: language.to_string(),
            sort_by: SORT_MOST_RECENT.to_string(),
            page_size,
        }
    }
}

/// Source of recent news articles.
///
/// Implementations may return fewer articles than requested, or none. Errors
/// are returned as values; the aggregator decides how to degrade.
#[async_trait]
pub trait ArticleSource: Send + Sync {
    /// Source name for logging (e.g., "newsapi")
    fn name(&self) -> &'static str;

    /// Search for articles matching `query`.
    async fn search(&self, query: &SearchQuery) -> Result<Vec<Article>, SourceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_for_ticker() {
        let query = SearchQuery::for_ticker(&Ticker::new("TSLA", "Tesla"), "en", 20);
        assert_eq!(query.query, "TSLA OR Tesla");
        assert_eq!(query.language, "en");
        assert_eq!(query.sort_by, "publishedAt");
        assert_eq!(query.page_size, 20);
    }
}
