//! Core sentiment types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use zero_common::config::TickerEntry;

// ============================================================================
// Ticker
// ============================================================================

/// A tracked stock: the aggregation unit of one cycle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ticker {
    /// Stock symbol (e.g., "AAPL")
    pub symbol: String,
    /// Company name used alongside the symbol in the news query
    pub company_name: String,
}

impl Ticker {
    pub fn new(symbol: impl Into<String>, company_name: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            company_name: company_name.into(),
        }
    }

    /// News query for this ticker: `"<symbol> OR <company_name>"`.
    pub fn search_query(&self) -> String {
        format!("{} OR {}", self.symbol, self.company_name)
    }
}

impl From<&TickerEntry> for Ticker {
    fn from(entry: &TickerEntry) -> Self {
        Self::new(entry.symbol.trim(), entry.company.trim())
    }
}

impl fmt::Display for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.symbol, self.company_name)
    }
}

// ============================================================================
// Article
// ============================================================================

/// A news article as returned by the source. Both fields may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl Article {
    pub fn new(title: Option<&str>, description: Option<&str>) -> Self {
        Self {
            title: title.map(String::from),
            description: description.map(String::from),
        }
    }

    /// Title and description joined by a space, or `None` when nothing but
    /// whitespace remains.
    pub fn scoring_text(&self) -> Option<String> {
        let text = format!(
            "{} {}",
            self.title.as_deref().unwrap_or(""),
            self.description.as_deref().unwrap_or("")
        );
        let trimmed = text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }
}

// ============================================================================
// Classifier output
// ============================================================================

/// Allowed drift of the probability sum away from 1.0.
pub const PROBABILITY_TOLERANCE: f64 = 1e-3;

/// Class probabilities for the positive/negative/neutral label schema.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassProbabilities {
    pub positive: f64,
    pub negative: f64,
    pub neutral: f64,
}

impl ClassProbabilities {
    /// Build a probability triple, rejecting values outside [0, 1] or a sum
    /// that is not 1 within [`PROBABILITY_TOLERANCE`].
    pub fn new(positive: f64, negative: f64, neutral: f64) -> Result<Self, String> {
        for (label, p) in [("positive", positive), ("negative", negative), ("neutral", neutral)] {
            if !p.is_finite() || !(0.0..=1.0).contains(&p) {
                return Err(format!("{} probability {} outside [0, 1]", label, p));
            }
        }

        let sum = positive + negative + neutral;
        if (sum - 1.0).abs() > PROBABILITY_TOLERANCE {
            return Err(format!("probabilities sum to {:.4}, expected 1.0", sum));
        }

        Ok(Self {
            positive,
            negative,
            neutral,
        })
    }
}

// ============================================================================
// Sentiment score
// ============================================================================

/// Scalar sentiment in the closed interval [-1.0, 1.0].
///
/// -1 is maximally negative, 0 neutral or unknown, +1 maximally positive.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SentimentScore(f64);

impl SentimentScore {
    pub const NEUTRAL: Self = Self(0.0);
    pub const MIN: f64 = -1.0;
    pub const MAX: f64 = 1.0;

    /// Clamp into [-1, 1]. NaN maps to neutral.
    pub fn new(value: f64) -> Self {
        if value.is_nan() {
            return Self::NEUTRAL;
        }
        Self(value.clamp(Self::MIN, Self::MAX))
    }

    /// `p_positive - p_negative`; the neutral mass is deliberately ignored.
    pub fn from_probabilities(probs: &ClassProbabilities) -> Self {
        Self::new(probs.positive - probs.negative)
    }

    /// Arithmetic mean, or `None` for an empty slice.
    pub fn mean(scores: &[SentimentScore]) -> Option<Self> {
        if scores.is_empty() {
            return None;
        }
        let sum: f64 = scores.iter().map(|s| s.0).sum();
        Some(Self::new(sum / scores.len() as f64))
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl From<SentimentScore> for f64 {
    fn from(score: SentimentScore) -> Self {
        score.0
    }
}

impl fmt::Display for SentimentScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}", self.0)
    }
}

// ============================================================================
// Results and persisted records
// ============================================================================

/// Outcome of aggregating one ticker in one cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickerSentimentResult {
    pub ticker: String,
    pub aggregate_score: SentimentScore,
    /// Articles actually scored (after dropping empty text)
    pub article_count: usize,
}

impl TickerSentimentResult {
    /// The "no usable signal" result: score 0.0, count 0.
    pub fn neutral(ticker: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            aggregate_score: SentimentScore::NEUTRAL,
            article_count: 0,
        }
    }
}

/// Current snapshot row, one per ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedSentiment {
    pub ticker: String,
    pub sentiment_score: f64,
    pub article_count: i64,
    pub updated_at: DateTime<Utc>,
}

/// Append-only history row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentHistoryEntry {
    pub ticker: String,
    pub sentiment_score: f64,
    pub article_count: i64,
    pub recorded_at: DateTime<Utc>,
}
