//! Quarry: a polite research content harvester
//!
//! This crate discovers candidate pages through a search provider (or seed
//! URLs), fetches them under per-domain throttling with rotating browser
//! fingerprints and robots.txt compliance, extracts their text, drops exact
//! and near duplicates, and writes the surviving records. Progress is kept
//! in a crash-safe checkpoint so interrupted runs resume where they stopped.

pub mod checkpoint;
pub mod config;
pub mod crawler;
pub mod dedup;
pub mod extract;
pub mod fetch;
pub mod output;
pub mod robots;
pub mod search;
pub mod state;
pub mod url;

use thiserror::Error;

/// Main error type for Quarry operations
#[derive(Debug, Error)]
pub enum QuarryError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Search failed for '{query}': {message}")]
    Search { query: String, message: String },

    #[error("Extraction failed for {url}: {message}")]
    Extraction { url: String, message: String },

    #[error("Tor error: {0}")]
    Tor(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid date in config: {0}")]
    InvalidDate(String),

    #[error("Required input file missing: {0}")]
    MissingInput(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,
}

/// Result type alias for Quarry operations
pub type Result<T> = std::result::Result<T, QuarryError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use checkpoint::Checkpoint;
pub use config::Config;
pub use crawler::{Pipeline, RunSummary, WorkUnit};
pub use dedup::Deduplicator;
pub use fetch::{FetchClient, FetchError, FetchOutcome};
pub use state::{DomainState, UnitState};
