//! Pipeline - per-unit orchestration
//!
//! Each work unit walks the same path:
//! - Search (or take the seed URL) to get candidates
//! - Filter candidates against exclusions, dedup, and the checkpoint
//! - Fetch breadth-first, one frontier level at a time
//! - Extract, date-filter, and dedup the pages
//! - Write the accepted batch and mark the unit done
//!
//! The pipeline owns the checkpoint and deduplicator outright; only the
//! fetch client is shared with the concurrent fetches of a level. Both are
//! persisted after every finished unit.

use crate::checkpoint::Checkpoint;
use crate::config::Config;
use crate::dedup::Deduplicator;
use crate::extract::{
    filter_links_same_domain, DateFilter, DateFilterStats, Extraction, ExtractorPool,
    HtmlLinkExtractor, LinkExtractor,
};
use crate::fetch::{FetchClient, FetchOutcome};
use crate::output::{make_source_file_tag, Record, RecordWriter, SourceMode};
use crate::search::SearchProvider;
use crate::state::UnitState;
use crate::url::{clean_link, domain_of, ExclusionList};
use crate::{QuarryError, Result};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Fetch failures after which a URL is no longer retried on resume
pub const MAX_URL_RETRIES: u32 = 3;

/// One independent piece of work
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WorkUnit {
    /// A search query
    Query(String),
    /// A seed URL to crawl from
    Seed(String),
}

impl WorkUnit {
    /// Checkpoint key: the query text or seed URL
    pub fn id(&self) -> &str {
        match self {
            WorkUnit::Query(query) => query,
            WorkUnit::Seed(url) => url,
        }
    }

    fn source_mode(&self, news: bool) -> SourceMode {
        match self {
            WorkUnit::Seed(_) => SourceMode::Crawl,
            WorkUnit::Query(_) if news => SourceMode::News,
            WorkUnit::Query(_) => SourceMode::Text,
        }
    }
}

/// A URL queued for fetching
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierEntry {
    pub url: String,
    pub unit: String,
    pub depth: u32,
}

/// Counters for one `Pipeline::run`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub units_total: usize,
    pub units_skipped: usize,
    pub units_done: usize,
    pub urls_fetched: usize,
    pub fetch_failures: usize,
    pub extraction_failures: usize,
    pub duplicates_skipped: usize,
    pub date_filtered: usize,
    pub records_written: usize,
    /// Accepted records per extraction method label
    pub extraction_methods: BTreeMap<String, usize>,
    /// Accepted records per netloc
    pub domains: BTreeMap<String, usize>,
    pub elapsed: Duration,
}

impl RunSummary {
    /// The `n` domains with the most accepted records, busiest first
    pub fn top_domains(&self, n: usize) -> Vec<(&str, usize)> {
        let mut domains: Vec<(&str, usize)> = self
            .domains
            .iter()
            .map(|(domain, count)| (domain.as_str(), *count))
            .collect();
        domains.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        domains.truncate(n);
        domains
    }

    fn record_accepted(&mut self, method: &str, domain: &str) {
        *self.extraction_methods.entry(method.to_string()).or_insert(0) += 1;
        *self.domains.entry(domain.to_string()).or_insert(0) += 1;
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Units:               {} ({} done, {} skipped)", self.units_total, self.units_done, self.units_skipped)?;
        writeln!(f, "URLs fetched:        {}", self.urls_fetched)?;
        writeln!(f, "Fetch failures:      {}", self.fetch_failures)?;
        writeln!(f, "Extraction failures: {}", self.extraction_failures)?;
        writeln!(f, "Duplicates skipped:  {}", self.duplicates_skipped)?;
        writeln!(f, "Date filtered:       {}", self.date_filtered)?;
        writeln!(f, "Records written:     {}", self.records_written)?;
        if !self.extraction_methods.is_empty() {
            let methods: Vec<String> = self
                .extraction_methods
                .iter()
                .map(|(method, count)| format!("{}={}", method, count))
                .collect();
            writeln!(f, "Extraction methods:  {}", methods.join(", "))?;
        }
        let top = self.top_domains(10);
        if !top.is_empty() {
            writeln!(f, "Top domains:")?;
            for (domain, count) in top {
                writeln!(f, "  {:<30} {}", domain, count)?;
            }
        }
        write!(f, "Elapsed:             {:.1}s", self.elapsed.as_secs_f64())
    }
}

/// Bookkeeping shared by every unit of one `run`
#[derive(Debug, Default)]
struct RunState {
    /// Pages fetched per netloc; caps link discovery
    domain_page_counts: HashMap<String, usize>,
    /// URLs requested in this run, whatever the outcome
    attempted: HashSet<String>,
}

/// Drives work units through search, fetch, extraction, and output
pub struct Pipeline {
    fetcher: FetchClient,
    search: Option<Arc<dyn SearchProvider>>,
    extractors: ExtractorPool,
    links: Box<dyn LinkExtractor>,
    dedup: Deduplicator,
    checkpoint: Checkpoint,
    date_filter: DateFilter,
    exclusions: ExclusionList,
    writer: Box<dyn RecordWriter>,
    dedup_index_path: Option<PathBuf>,
    run_state: RunState,
    follow_links: bool,
    max_depth: u32,
    max_pages_per_domain: usize,
    max_results: usize,
    min_word_count: usize,
    news: bool,
    allow_http: bool,
}

impl Pipeline {
    /// Creates a pipeline with the built-in extractors
    ///
    /// # Arguments
    ///
    /// * `config` - Run configuration (crawl, search, extract sections)
    /// * `fetcher` - Politeness-enforcing fetch client
    /// * `checkpoint` - Resume state; persisted after every unit
    /// * `dedup` - Duplicate index, possibly preloaded from disk
    /// * `writer` - Destination for accepted records
    ///
    /// # Returns
    ///
    /// * `Ok(Pipeline)` - Ready to run
    /// * `Err(QuarryError)` - The configured date range is invalid
    pub fn new(
        config: &Config,
        fetcher: FetchClient,
        checkpoint: Checkpoint,
        dedup: Deduplicator,
        writer: Box<dyn RecordWriter>,
    ) -> Result<Self> {
        Ok(Self {
            fetcher,
            search: None,
            extractors: ExtractorPool::from_config(&config.extract),
            links: Box::new(HtmlLinkExtractor::with_skip_patterns(&config.crawl.skip_patterns)),
            dedup,
            checkpoint,
            date_filter: DateFilter::from_config(&config.extract)?,
            exclusions: ExclusionList::new(),
            writer,
            dedup_index_path: None,
            run_state: RunState::default(),
            follow_links: config.crawl.enabled,
            max_depth: config.crawl.max_depth,
            max_pages_per_domain: config.crawl.max_pages_per_domain,
            max_results: config.search.max_results,
            min_word_count: config.extract.min_word_count,
            news: config.search.news,
            allow_http: config.fetch.allow_http,
        })
    }

    pub fn with_search(mut self, search: Arc<dyn SearchProvider>) -> Self {
        self.search = Some(search);
        self
    }

    pub fn with_exclusions(mut self, exclusions: ExclusionList) -> Self {
        self.exclusions = exclusions;
        self
    }

    pub fn with_extractors(mut self, extractors: ExtractorPool) -> Self {
        self.extractors = extractors;
        self
    }

    pub fn with_link_extractor(mut self, links: Box<dyn LinkExtractor>) -> Self {
        self.links = links;
        self
    }

    /// Saves the deduplicator to `path` after every finished unit
    pub fn with_dedup_index(mut self, path: impl Into<PathBuf>) -> Self {
        self.dedup_index_path = Some(path.into());
        self
    }

    pub fn dedup_index_path(&self) -> Option<&Path> {
        self.dedup_index_path.as_deref()
    }

    pub fn checkpoint(&self) -> &Checkpoint {
        &self.checkpoint
    }

    pub fn dedup(&self) -> &Deduplicator {
        &self.dedup
    }

    pub fn fetcher(&self) -> &FetchClient {
        &self.fetcher
    }

    pub fn date_filter_stats(&self) -> DateFilterStats {
        self.date_filter.stats()
    }

    /// Processes every unit in order
    ///
    /// Units already completed in the checkpoint are skipped. A failing unit
    /// is logged and still marked done; only a checkpoint or dedup index
    /// that cannot be persisted stops the run.
    pub async fn run(&mut self, units: &[WorkUnit]) -> Result<RunSummary> {
        let started = Instant::now();
        self.run_state = RunState::default();
        let mut summary = RunSummary {
            units_total: units.len(),
            ..RunSummary::default()
        };

        tracing::info!("Starting run over {} units", units.len());

        for (index, unit) in units.iter().enumerate() {
            if self.checkpoint.is_unit_done(unit.id()) {
                tracing::debug!("Skipping completed unit '{}'", unit.id());
                summary.units_skipped += 1;
                continue;
            }

            tracing::info!("[{}/{}] {}", index + 1, units.len(), unit.id());
            if let Err(e) = self.process_unit(unit, &mut summary).await {
                tracing::error!("Unit '{}' failed: {}", unit.id(), e);
            }

            self.checkpoint.mark_unit_done(unit.id())?;
            if let Some(path) = &self.dedup_index_path {
                self.dedup.save(path)?;
            }
            summary.units_done += 1;
        }

        summary.elapsed = started.elapsed();
        tracing::info!(
            "Run complete: {} units done, {} skipped, {} records written in {:.1}s",
            summary.units_done,
            summary.units_skipped,
            summary.records_written,
            summary.elapsed.as_secs_f64()
        );
        Ok(summary)
    }

    async fn process_unit(&mut self, unit: &WorkUnit, summary: &mut RunSummary) -> Result<()> {
        let id = unit.id();
        let mut state = UnitState::Pending;

        let candidates = match unit {
            WorkUnit::Query(query) => {
                advance(id, &mut state, UnitState::Searching);
                let search = self.search.clone().ok_or_else(|| QuarryError::Search {
                    query: query.clone(),
                    message: "no search provider configured".to_string(),
                })?;
                let hits = search.search(query, self.max_results).await?;
                tracing::debug!("Search for '{}' returned {} hits", query, hits.len());
                hits.into_iter().map(|hit| hit.url).collect()
            }
            WorkUnit::Seed(url) => {
                advance(id, &mut state, UnitState::Seeded);
                vec![url.clone()]
            }
        };

        advance(id, &mut state, UnitState::Filtering);
        let mut level = self.filter_candidates(id, candidates);
        if level.is_empty() {
            tracing::info!("No new URLs for '{}'", id);
            advance(id, &mut state, UnitState::Done);
            return Ok(());
        }

        let mut seen_in_unit: HashSet<String> = level.iter().map(|entry| entry.url.clone()).collect();
        let mut records = Vec::new();
        let mut depth = 0;

        while !level.is_empty() {
            advance(id, &mut state, UnitState::Fetching { depth });
            let urls: Vec<String> = level.iter().map(|entry| entry.url.clone()).collect();
            self.run_state.attempted.extend(urls.iter().cloned());
            let outcomes = self.fetcher.fetch_batch(&urls).await;

            advance(id, &mut state, UnitState::Extracting);
            let mut next_level = Vec::new();

            for outcome in outcomes {
                summary.urls_fetched += 1;
                self.checkpoint.mark_url_fetched(&outcome.url);

                if let Some(error) = &outcome.error {
                    tracing::debug!("Fetch failed for {}: {}", outcome.url, error);
                    self.checkpoint.mark_url_failed(&outcome.url);
                    summary.fetch_failures += 1;
                    continue;
                }

                let host = domain_of(&outcome.url).unwrap_or_default();
                *self.run_state.domain_page_counts.entry(host.clone()).or_insert(0) += 1;

                if self.follow_links && depth < self.max_depth && outcome.is_html() {
                    self.discover_links(
                        id,
                        &outcome,
                        &host,
                        depth + 1,
                        &mut seen_in_unit,
                        &mut next_level,
                    );
                }

                let Some(body) = outcome.body else {
                    continue;
                };
                let extraction = self.extractors.extract(body, &outcome.url).await;
                if extraction.is_failure(self.min_word_count) {
                    tracing::debug!(
                        "Extraction too thin for {} ({} words, {})",
                        outcome.url,
                        extraction.word_count,
                        extraction.method
                    );
                    self.checkpoint.record_failed_extraction();
                    summary.extraction_failures += 1;
                    continue;
                }

                if !self.date_filter.passes(extraction.date.as_deref()) {
                    summary.date_filtered += 1;
                    continue;
                }

                if self.dedup.is_duplicate_content(&extraction.text) {
                    tracing::debug!("Duplicate content at {}", outcome.url);
                    summary.duplicates_skipped += 1;
                    continue;
                }

                self.dedup.mark_seen(&outcome.url, &extraction.text);
                self.checkpoint.record_page(extraction.word_count);
                summary.record_accepted(extraction.method.label(), &host);
                records.push(build_record(unit, self.news, &outcome.url, &host, extraction));
            }

            if !next_level.is_empty() {
                tracing::debug!("Queued {} links at depth {} for '{}'", next_level.len(), depth + 1, id);
            }
            level = next_level;
            depth += 1;
        }

        advance(id, &mut state, UnitState::Writing);
        self.writer.append(&records)?;
        summary.records_written += records.len();

        tracing::info!("Unit '{}' done: {} records", id, records.len());
        advance(id, &mut state, UnitState::Done);
        Ok(())
    }

    /// Drops excluded, already seen, and already fetched candidates
    fn filter_candidates(&self, unit: &str, candidates: Vec<String>) -> Vec<FrontierEntry> {
        let total = candidates.len();
        let mut queued = HashSet::new();
        let mut level = Vec::new();

        for url in candidates.iter().filter_map(|c| self.clean_candidate(c)) {
            let excluded = domain_of(&url)
                .map(|host| self.exclusions.is_excluded(&host))
                .unwrap_or(true);
            if excluded || self.is_known(&url) || !queued.insert(url.clone()) {
                continue;
            }
            level.push(FrontierEntry {
                url,
                unit: unit.to_string(),
                depth: 0,
            });
        }

        tracing::debug!("{} of {} candidates kept for '{}'", level.len(), total, unit);
        level
    }

    /// Strips fragments and tracking parameters; drops unusable URLs
    fn clean_candidate(&self, url: &str) -> Option<String> {
        let cleaned = clean_link(url).ok()?;
        if !self.allow_http && cleaned.scheme() == "http" {
            return None;
        }
        Some(cleaned.to_string())
    }

    /// Returns true if a URL was already handled, in this run or a previous one
    ///
    /// Within a run every URL is requested at most once. A URL whose fetches
    /// failed in earlier runs stays eligible until it exhausts its retry
    /// budget.
    fn is_known(&self, url: &str) -> bool {
        if self.run_state.attempted.contains(url) || self.dedup.is_duplicate_url(url) {
            return true;
        }
        if !self.checkpoint.is_url_fetched(url) {
            return false;
        }
        let failures = self.checkpoint.failure_count(url);
        failures == 0 || !self.checkpoint.should_retry(url, MAX_URL_RETRIES)
    }

    fn discover_links(
        &self,
        unit: &str,
        outcome: &FetchOutcome,
        host: &str,
        depth: u32,
        seen_in_unit: &mut HashSet<String>,
        next_level: &mut Vec<FrontierEntry>,
    ) {
        let Some(html) = outcome.text() else {
            return;
        };

        let links: Vec<String> = self
            .links
            .extract_links(html, &outcome.url)
            .iter()
            .filter_map(|link| self.clean_candidate(link))
            .collect();
        let candidates = filter_links_same_domain(
            &links,
            host,
            &self.exclusions,
            seen_in_unit,
            &self.run_state.domain_page_counts,
            self.max_pages_per_domain,
        );

        for link in candidates {
            if next_level.len() >= self.max_pages_per_domain {
                break;
            }
            if self.is_known(&link) || !seen_in_unit.insert(link.clone()) {
                continue;
            }
            next_level.push(FrontierEntry {
                url: link,
                unit: unit.to_string(),
                depth,
            });
        }
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("follow_links", &self.follow_links)
            .field("max_depth", &self.max_depth)
            .field("checkpoint", &self.checkpoint.path())
            .field("dedup", &self.dedup.strategy())
            .field("dedup_index", &self.dedup_index_path)
            .finish()
    }
}

fn advance(unit: &str, state: &mut UnitState, next: UnitState) {
    if !state.can_transition_to(next) {
        tracing::warn!("Unexpected transition for '{}': {} -> {}", unit, state, next);
    }
    tracing::trace!("'{}': {} -> {}", unit, state, next);
    *state = next;
}

fn build_record(unit: &WorkUnit, news: bool, url: &str, host: &str, extraction: Extraction) -> Record {
    let source_file = make_source_file_tag(unit.id(), extraction.date.as_deref(), unit.source_mode(news));
    Record {
        company: unit.id().to_string(),
        title: extraction.title.unwrap_or_default(),
        link: url.to_string(),
        snippet: Record::snippet_from(&extraction.text),
        date: extraction.date,
        source: host.to_string(),
        full_text: extraction.text,
        source_file,
    }
}
