//! Configuration module for Quarry
//!
//! This module handles loading, parsing, and validating TOML configuration files,
//! plus the plain-text input lists (queries, seeds) a run consumes.
//!
//! # Example
//!
//! ```no_run
//! use quarry::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("quarry.toml")).unwrap();
//! println!("Per-domain concurrency: {}", config.fetch.max_concurrent_per_domain);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    CheckpointConfig, Config, CrawlConfig, DedupConfig, ExtractConfig, FetchConfig,
    OutputConfig, SearchConfig, TorConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, load_input_lines};
pub use validation::{parse_config_date, validate};
