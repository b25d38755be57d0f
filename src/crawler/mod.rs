//! Crawl orchestration
//!
//! This module contains the per-unit pipeline that ties search, fetching,
//! extraction, deduplication, checkpointing, and output together.

mod pipeline;

pub use pipeline::{FrontierEntry, Pipeline, RunSummary, WorkUnit, MAX_URL_RETRIES};
