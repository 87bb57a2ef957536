//! Zero Common - Shared types, utilities, and configuration for the Zero ecosystem.
//!
//! This crate provides:
//! - Configuration types and loading
//! - Configuration validation
//! - Read API error type
//! - Logging setup
//! - Utility functions used across Zero services

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod config_loader;
pub mod error;
pub mod logging;
pub mod util;
pub mod validation;

pub use config::{
    ClassifierConfig, Config, NewsSourceConfig, ObservabilityConfig, SentimentConfig,
    SentimentStorageConfig, TickerEntry,
};
pub use error::Error;
pub use validation::{Validate, ValidationError, ValidationResult};
