//! Hugging Face inference adapter for FinBERT-style classifiers.
//!
//! # API
//! `POST {base_url}/models/{model}` with `{"inputs": "..."}`. The response is a
//! list of `{label, score}` objects, nested one level deeper when the endpoint
//! batches inputs. The default model is `ProsusAI/finbert`, whose labels are
//! `positive`, `negative` and `neutral`.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{truncate_words, word_budget, TextClassifier};
use crate::error::ClassifierError;
use crate::types::ClassProbabilities;
use zero_common::config::Config;

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Debug, Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
    parameters: InferenceParameters,
    options: InferenceOptions,
}

/// Tokenizer settings forwarded to the text-classification pipeline
#[derive(Debug, Serialize)]
struct InferenceParameters {
    truncation: bool,
    max_length: usize,
}

#[derive(Debug, Serialize)]
struct InferenceOptions {
    wait_for_model: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct LabelScore {
    label: String,
    score: f64,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InferenceResponse {
    Batched(Vec<Vec<LabelScore>>),
    Flat(Vec<LabelScore>),
}

#[derive(Debug, Deserialize)]
struct InferenceError {
    error: String,
}

impl InferenceResponse {
    fn into_scores(self) -> Vec<LabelScore> {
        match self {
            Self::Batched(mut batches) => {
                if batches.is_empty() {
                    Vec::new()
                } else {
                    batches.swap_remove(0)
                }
            }
            Self::Flat(scores) => scores,
        }
    }
}

/// Map label scores onto the positive/negative/neutral schema.
fn probabilities_from_labels(scores: &[LabelScore]) -> Result<ClassProbabilities, ClassifierError> {
    let find = |name: &str| {
        scores
            .iter()
            .find(|s| s.label.eq_ignore_ascii_case(name))
            .map(|s| s.score)
            .ok_or_else(|| ClassifierError::InvalidOutput(format!("missing label '{}'", name)))
    };

    let positive = find("positive")?;
    let negative = find("negative")?;
    let neutral = find("neutral")?;

    ClassProbabilities::new(positive, negative, neutral).map_err(ClassifierError::InvalidOutput)
}

// ============================================================================
// Adapter
// ============================================================================

/// Classifier backed by a Hugging Face inference endpoint.
pub struct HuggingFaceClassifier {
    endpoint: String,
    model: String,
    token: Option<String>,
    max_length: usize,
    client: reqwest::Client,
}

impl HuggingFaceClassifier {
    /// Create a new classifier for `model` served under `base_url`.
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        token: Option<String>,
        max_length: usize,
        timeout: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        let model = model.into();
        let endpoint = format!(
            "{}/models/{}",
            base_url.into().trim_end_matches('/'),
            model
        );

        Self {
            endpoint,
            model,
            token,
            max_length,
            client,
        }
    }

    /// Create from config. The access token is optional for public models.
    pub fn from_config(config: &Config) -> Result<Self> {
        let classifier = &config.sentiment.classifier;
        Ok(Self::new(
            classifier.base_url.clone(),
            classifier.model.clone(),
            config.huggingface_token(),
            classifier.max_length,
            Duration::from_secs(classifier.timeout_secs),
        ))
    }

    fn map_transport_error(e: reqwest::Error) -> ClassifierError {
        if e.is_timeout() {
            ClassifierError::Network("Request timeout".into())
        } else if e.is_connect() {
            ClassifierError::Network("Connection failed".into())
        } else {
            ClassifierError::Network(e.without_url().to_string())
        }
    }
}

#[async_trait]
impl TextClassifier for HuggingFaceClassifier {
    fn name(&self) -> &str {
        &self.model
    }

    fn max_length(&self) -> usize {
        self.max_length
    }

    async fn classify(&self, text: &str) -> Result<ClassProbabilities, ClassifierError> {
        let input = truncate_words(text, word_budget(self.max_length));
        if input.is_empty() {
            return Err(ClassifierError::EmptyInput);
        }

        let mut request = self.client.post(&self.endpoint).json(&InferenceRequest {
            inputs: &input,
            parameters: InferenceParameters {
                truncation: true,
                max_length: self.max_length,
            },
            options: InferenceOptions {
                wait_for_model: true,
            },
        });
        if let Some(ref token) = self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(Self::map_transport_error)?;
        let status = response.status();
        let body = response.text().await.map_err(Self::map_transport_error)?;

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(ClassifierError::Auth(format!("HTTP {}", status.as_u16())));
        }

        if !status.is_success() {
            let message = serde_json::from_str::<InferenceError>(&body)
                .map(|e| e.error)
                .unwrap_or_else(|_| zero_common::util::truncate_with_ellipsis(&body, 200));
            return Err(ClassifierError::Unavailable(format!(
                "HTTP {}: {}",
                status.as_u16(),
                message
            )));
        }

        let parsed: InferenceResponse = serde_json::from_str(&body).map_err(|e| {
            ClassifierError::InvalidOutput(format!("Failed to parse response: {}", e))
        })?;

        let probs = probabilities_from_labels(&parsed.into_scores())?;
        debug!(
            model = %self.model,
            positive = probs.positive,
            negative = probs.negative,
            neutral = probs.neutral,
            "Classified text"
        );
        Ok(probs)
    }
}
