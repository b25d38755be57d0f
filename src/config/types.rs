use serde::Deserialize;
use std::path::PathBuf;

/// Main configuration structure for Quarry
///
/// Every section is optional; missing sections fall back to their defaults
/// so a config file only has to name what it changes.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub fetch: FetchConfig,
    pub search: SearchConfig,
    pub crawl: CrawlConfig,
    pub extract: ExtractConfig,
    pub dedup: DedupConfig,
    pub output: OutputConfig,
    pub checkpoint: CheckpointConfig,
    pub tor: TorConfig,

    /// File of excluded domains, one per line
    #[serde(rename = "exclude-file")]
    pub exclude_file: Option<PathBuf>,

    /// Lower concurrency and widen search delays
    pub stealth: bool,
}

impl Config {
    /// Applies the stealth profile: fewer parallel fetches and slower searches
    pub fn apply_stealth(&mut self) {
        self.stealth = true;
        self.fetch.max_concurrent_total = 4;
        self.fetch.max_concurrent_per_domain = 2;
        self.search.delay_min_secs = 5.0;
        self.search.delay_max_secs = 8.0;
    }
}

/// HTTP fetching and politeness configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Maximum number of in-flight fetches across all domains
    #[serde(rename = "max-concurrent-total")]
    pub max_concurrent_total: usize,

    /// Maximum number of in-flight fetches to a single domain
    #[serde(rename = "max-concurrent-per-domain")]
    pub max_concurrent_per_domain: usize,

    /// Hard timeout for a single request (seconds)
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,

    /// Timeout for robots.txt requests (seconds)
    #[serde(rename = "robots-timeout-secs")]
    pub robots_timeout_secs: u64,

    /// Whether robots.txt directives are enforced
    #[serde(rename = "respect-robots")]
    pub respect_robots: bool,

    /// Steady request rate per domain (requests per second)
    #[serde(rename = "base-rate")]
    pub base_rate: f64,

    /// Upper bound for the adaptive penalty delay (seconds)
    #[serde(rename = "max-delay")]
    pub max_delay: f64,

    /// Agent name matched against robots.txt groups
    #[serde(rename = "robots-user-agent")]
    pub robots_user_agent: String,

    /// Permit plain-HTTP URLs
    #[serde(rename = "allow-http")]
    pub allow_http: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_concurrent_total: 10,
            max_concurrent_per_domain: 3,
            timeout_secs: 20,
            robots_timeout_secs: 5,
            respect_robots: true,
            base_rate: 1.0,
            max_delay: 30.0,
            robots_user_agent: "Mozilla/5.0".to_string(),
            allow_http: true,
        }
    }
}

/// Search provider configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// File with one query per line
    #[serde(rename = "queries-file")]
    pub queries_file: Option<PathBuf>,

    /// Maximum number of hits requested per query
    #[serde(rename = "max-results")]
    pub max_results: usize,

    #[serde(rename = "delay-min-secs")]
    pub delay_min_secs: f64,

    #[serde(rename = "delay-max-secs")]
    pub delay_max_secs: f64,

    /// DuckDuckGo region code
    pub region: String,

    /// HTML search endpoint
    pub endpoint: String,

    /// Tag records as news results rather than web results
    pub news: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            queries_file: None,
            max_results: 20,
            delay_min_secs: 3.0,
            delay_max_secs: 6.0,
            region: "wt-wt".to_string(),
            endpoint: "https://html.duckduckgo.com/html/".to_string(),
            news: false,
        }
    }
}

/// Link-following configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Follow same-site links from search results
    pub enabled: bool,

    /// File with one seed URL per line (crawl mode)
    #[serde(rename = "seeds-file")]
    pub seeds_file: Option<PathBuf>,

    /// Maximum link depth below the first frontier level
    #[serde(rename = "max-depth")]
    pub max_depth: u32,

    /// Maximum pages fetched per domain in one run
    #[serde(rename = "max-pages-per-domain")]
    pub max_pages_per_domain: usize,

    /// Path fragments that are never followed in crawl mode
    #[serde(rename = "skip-patterns")]
    pub skip_patterns: Vec<String>,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            seeds_file: None,
            max_depth: 2,
            max_pages_per_domain: 50,
            skip_patterns: [
                "/login", "/signin", "/register", "/account", "/contact", "/career", "/jobs",
                "/about-us", "/privacy", "/cookie", "/terms", "/legal", "/disclaimer",
                "/search", "/faq", "/video",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

/// Content extraction configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// Pages with fewer words count as failed extractions
    #[serde(rename = "min-word-count")]
    pub min_word_count: usize,

    /// Inclusive lower bound on publication date (YYYY-MM-DD)
    #[serde(rename = "date-from")]
    pub date_from: Option<String>,

    /// Inclusive upper bound on publication date (YYYY-MM-DD)
    #[serde(rename = "date-to")]
    pub date_to: Option<String>,

    /// Blocking extraction workers
    pub workers: usize,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            min_word_count: 100,
            date_from: None,
            date_to: None,
            workers: 4,
        }
    }
}

/// Duplicate detection configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Enable MinHash near-duplicate detection
    pub fuzzy: bool,

    /// Words per shingle
    #[serde(rename = "shingle-size")]
    pub shingle_size: usize,

    /// Number of min-hash permutations per signature
    #[serde(rename = "num-perm")]
    pub num_perm: usize,

    /// Number of LSH bands; must divide num-perm
    pub bands: usize,

    /// Estimated Jaccard similarity at which content is a duplicate
    pub threshold: f64,

    /// Where the dedup index is persisted between runs
    #[serde(rename = "index-path")]
    pub index_path: Option<PathBuf>,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            fuzzy: true,
            shingle_size: 3,
            num_perm: 128,
            bands: 16,
            threshold: 0.85,
            index_path: None,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Optional JSON Lines mirror of every written record
    #[serde(rename = "jsonl-path")]
    pub jsonl_path: Option<PathBuf>,

    /// Optional Markdown report; one file per article goes in a sibling
    /// `markdown/` directory
    #[serde(rename = "markdown-path")]
    pub markdown_path: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            database_path: "quarry.db".to_string(),
            jsonl_path: None,
            markdown_path: None,
        }
    }
}

/// Checkpoint configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CheckpointConfig {
    pub path: PathBuf,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(".quarry_checkpoint.json"),
        }
    }
}

/// Tor transport configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TorConfig {
    pub enabled: bool,

    #[serde(rename = "socks-port")]
    pub socks_port: u16,

    #[serde(rename = "control-port")]
    pub control_port: u16,

    /// Control port password (empty for cookie-less null auth)
    pub password: String,

    /// Renew the circuit after this many searches
    #[serde(rename = "renew-every")]
    pub renew_every: u32,

    #[serde(rename = "renew-on-ratelimit")]
    pub renew_on_ratelimit: bool,
}

impl Default for TorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            socks_port: 9150,
            control_port: 9051,
            password: String::new(),
            renew_every: 20,
            renew_on_ratelimit: true,
        }
    }
}
