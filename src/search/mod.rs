//! Search providers
//!
//! A provider turns a query into candidate URLs for the first frontier level.

mod duckduckgo;

pub use duckduckgo::{decode_result_link, parse_results, DuckDuckGoSearch};

use crate::Result;
use async_trait::async_trait;

/// One search result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub url: String,
    pub title: String,
    pub snippet: String,
    /// 1-based position in the result list
    pub rank: usize,
}

/// Source of candidate URLs for a query
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Returns up to `max_results` hits for `query`
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>>;
}
