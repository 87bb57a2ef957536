//! Zero Sentiment - news sentiment service for the Zero ecosystem.
//!
//! Scores recent news per ticker with a FinBERT classifier on a fixed
//! schedule and serves the results over HTTP.

use anyhow::Result;
use zero_common::config::Config;
use zero_common::config_loader::check_modular_files;
use zero_common::logging::init_logging_with_exclusions;
use zero_sentiment::SentimentService;

#[tokio::main]
async fn main() -> Result<()> {
    let startup_start = std::time::Instant::now();

    // Load and validate configuration; invalid config is fatal
    let config = Config::load_and_validate()?;

    init_logging_with_exclusions(
        &config.observability.log_level,
        &config.observability.log_format,
        &config.observability.excluded_targets,
    );

    tracing::info!("Zero Sentiment v{}", env!("CARGO_PKG_VERSION"));
    for (file, present) in check_modular_files(None) {
        tracing::debug!(file = %file, present, "Config file");
    }
    tracing::info!(
        endpoint = %config.sentiment_endpoint(),
        tickers = config.sentiment.tickers.len(),
        backend = %config.sentiment.storage.backend,
        "Configuration loaded"
    );

    let service = SentimentService::new(config);

    let startup_duration = startup_start.elapsed();
    tracing::info!(
        duration_ms = startup_duration.as_millis() as u64,
        "Service initialized in {:?}",
        startup_duration
    );

    service.start().await
}
