//! Per-article sentiment scoring.

use std::sync::Arc;

use crate::classifier::TextClassifier;
use crate::error::Degrade;
use crate::types::SentimentScore;

/// Converts one article's text into a scalar score in [-1, 1].
#[derive(Clone)]
pub struct SentimentScorer {
    classifier: Arc<dyn TextClassifier>,
}

impl SentimentScorer {
    pub fn new(classifier: Arc<dyn TextClassifier>) -> Self {
        Self { classifier }
    }

    pub fn classifier_name(&self) -> &str {
        self.classifier.name()
    }

    /// Score `text` as `p_positive - p_negative`.
    ///
    /// Callers skip empty text. Any classification failure yields
    /// [`SentimentScore::NEUTRAL`] and is logged against `ticker`.
    pub async fn score(&self, text: &str, ticker: &str) -> SentimentScore {
        self.classifier
            .classify(text)
            .await
            .map(|probs| SentimentScore::from_probabilities(&probs))
            .or_degrade(SentimentScore::NEUTRAL, "classify", ticker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClassifierError;
    use crate::types::ClassProbabilities;
    use async_trait::async_trait;

    struct FixedClassifier(Result<(f64, f64, f64), ()>);

    #[async_trait]
    impl TextClassifier for FixedClassifier {
        fn name(&self) -> &str {
            "fixed"
        }

        fn max_length(&self) -> usize {
            512
        }

        async fn classify(&self, _text: &str) -> Result<ClassProbabilities, ClassifierError> {
            match self.0 {
                Ok((p, n, u)) => {
                    ClassProbabilities::new(p, n, u).map_err(ClassifierError::InvalidOutput)
                }
                Err(()) => Err(ClassifierError::Network("connection reset".into())),
            }
        }
    }

    #[tokio::test]
    async fn test_score_is_positive_minus_negative() {
        let scorer = SentimentScorer::new(Arc::new(FixedClassifier(Ok((0.7, 0.1, 0.2)))));
        let score = scorer.score("Apple beats estimates", "AAPL").await;
        assert!((score.value() - 0.6).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_failure_scores_neutral() {
        let scorer = SentimentScorer::new(Arc::new(FixedClassifier(Err(()))));
        assert_eq!(scorer.score("anything", "AAPL").await, SentimentScore::NEUTRAL);
    }

    #[tokio::test]
    async fn test_invalid_output_scores_neutral() {
        let scorer = SentimentScorer::new(Arc::new(FixedClassifier(Ok((0.9, 0.9, 0.9)))));
        assert_eq!(scorer.score("anything", "AAPL").await, SentimentScore::NEUTRAL);
    }
}
