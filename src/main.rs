//! Quarry main entry point
//!
//! This is the command-line interface for the Quarry content harvester.

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use quarry::checkpoint::Checkpoint;
use quarry::config::{load_config_with_hash, load_input_lines, Config};
use quarry::dedup::Deduplicator;
use quarry::fetch::{FetchClient, TorManager};
use quarry::output::{JsonlRecordWriter, MarkdownRecordWriter, MultiWriter, SqliteRecordWriter};
use quarry::search::DuckDuckGoSearch;
use quarry::url::ExclusionList;
use quarry::{Pipeline, WorkUnit};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Quarry: a polite research content harvester
///
/// Quarry finds pages through DuckDuckGo queries or crawls outward from seed
/// URLs, fetches them politely, extracts article text, drops duplicates, and
/// stores the results. Interrupted runs pick up where they stopped.
#[derive(Parser, Debug)]
#[command(name = "quarry")]
#[command(version)]
#[command(about = "A polite research content harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Discover pages by search queries or by crawling seed URLs
    #[arg(value_enum, default_value_t = Mode::Search)]
    mode: Mode,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Continue from the existing checkpoint instead of starting fresh
    #[arg(long)]
    resume: bool,

    /// Forget completed units (keeps fetched-URL history); implies --resume
    #[arg(long)]
    reset_units: bool,

    /// Lower concurrency and slow down searches
    #[arg(long)]
    stealth: bool,

    /// Validate config and show what would run without fetching anything
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show checkpoint and output statistics and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    Search,
    Crawl,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if cli.stealth || config.stealth {
        config.apply_stealth();
        tracing::info!("Stealth mode: lowered concurrency and widened search delays");
    }
    if cli.mode == Mode::Crawl {
        config.crawl.enabled = true;
    }

    if cli.stats {
        return handle_stats(&config);
    }

    let units = load_units(&config, cli.mode)?;

    if cli.dry_run {
        handle_dry_run(&config, &hash, cli.mode, &units);
        return Ok(());
    }

    handle_run(config, units, cli.resume || cli.reset_units, cli.reset_units).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("quarry=info,warn"),
            1 => EnvFilter::new("quarry=debug,info"),
            2 => EnvFilter::new("quarry=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Reads the queries or seed URLs for the selected mode
fn load_units(config: &Config, mode: Mode) -> anyhow::Result<Vec<WorkUnit>> {
    let (path, label) = match mode {
        Mode::Search => (config.search.queries_file.as_deref(), "search.queries-file"),
        Mode::Crawl => (config.crawl.seeds_file.as_deref(), "crawl.seeds-file"),
    };
    let Some(path) = path else {
        bail!("{} must be set for {} mode", label, label.split('.').next().unwrap_or("this"));
    };

    let lines = load_input_lines(path)?;
    let units: Vec<WorkUnit> = match mode {
        Mode::Search => lines.into_iter().map(WorkUnit::Query).collect(),
        Mode::Crawl => lines.into_iter().map(WorkUnit::Seed).collect(),
    };
    if units.is_empty() {
        bail!("{} contains no entries", path.display());
    }
    Ok(units)
}

/// Handles the --dry-run mode: shows what would run
fn handle_dry_run(config: &Config, hash: &str, mode: Mode, units: &[WorkUnit]) {
    println!("=== Quarry Dry Run ===\n");
    println!("Config hash: {}", hash);
    println!("Mode: {:?}", mode);

    println!("\nFetching:");
    println!(
        "  Concurrency: {} total, {} per domain",
        config.fetch.max_concurrent_total, config.fetch.max_concurrent_per_domain
    );
    println!("  Base rate: {} req/s per domain", config.fetch.base_rate);
    println!("  Respect robots.txt: {}", config.fetch.respect_robots);
    println!("  Tor: {}", config.tor.enabled);

    println!("\nCrawling:");
    println!("  Follow links: {}", config.crawl.enabled);
    println!("  Max depth: {}", config.crawl.max_depth);
    println!("  Max pages per domain: {}", config.crawl.max_pages_per_domain);

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    if let Some(jsonl) = &config.output.jsonl_path {
        println!("  JSONL: {}", jsonl.display());
    }
    if let Some(markdown) = &config.output.markdown_path {
        println!("  Markdown: {}", markdown.display());
    }
    if let Some(index) = &config.dedup.index_path {
        println!("  Dedup index: {}", index.display());
    }
    println!("  Checkpoint: {}", config.checkpoint.path.display());

    println!("\nWork units ({}):", units.len());
    for unit in units.iter().take(20) {
        println!("  - {}", unit.id());
    }
    if units.len() > 20 {
        println!("  ... and {} more", units.len() - 20);
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows checkpoint and output statistics
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    let checkpoint = Checkpoint::load(&config.checkpoint.path)
        .with_context(|| format!("Failed to read checkpoint {}", config.checkpoint.path.display()))?;
    let stats = checkpoint.stats();

    println!("Checkpoint: {}\n", config.checkpoint.path.display());
    println!("  Completed units:     {}", stats.total_units);
    println!("  Pages kept:          {}", stats.total_pages);
    println!("  Words kept:          {}", stats.total_words);
    println!("  Failed fetches:      {}", stats.failed_fetches);
    println!("  Failed extractions:  {}", stats.failed_extractions);
    println!("  URLs fetched:        {}", checkpoint.state().fetched_urls.len());

    let db_path = Path::new(&config.output.database_path);
    if db_path.exists() {
        let writer = SqliteRecordWriter::open(db_path)?;
        println!("\nDatabase: {}", db_path.display());
        println!("  Records stored:      {}", writer.count()?);
    }

    Ok(())
}

/// Handles a search or crawl run
async fn handle_run(
    config: Config,
    units: Vec<WorkUnit>,
    resume: bool,
    reset_units: bool,
) -> anyhow::Result<()> {
    let checkpoint_path = &config.checkpoint.path;
    let mut checkpoint = if resume {
        let checkpoint = Checkpoint::load(checkpoint_path)
            .with_context(|| format!("Failed to read checkpoint {}", checkpoint_path.display()))?;
        tracing::info!(
            "Resuming: {} units already done, {} URLs fetched",
            checkpoint.completed_units(),
            checkpoint.state().fetched_urls.len()
        );
        checkpoint
    } else {
        tracing::info!("Starting fresh (checkpoint {} will be replaced)", checkpoint_path.display());
        Checkpoint::new(checkpoint_path)
    };
    if reset_units {
        checkpoint.reset_units()?;
        tracing::info!("Cleared completed units; URL history kept");
    }

    let tor = TorManager::connect(&config.tor).await.map(Arc::new);

    let proxy_url = tor.as_ref().map(|t| t.proxy_url());
    let fetcher = FetchClient::new(&config.fetch, proxy_url.as_deref())
        .context("Failed to build HTTP client")?;

    let mut dedup = Deduplicator::new(&config.dedup);
    if let (true, Some(index_path)) = (resume, &config.dedup.index_path) {
        dedup
            .load(index_path)
            .with_context(|| format!("Failed to load dedup index {}", index_path.display()))?;
        tracing::info!("Loaded dedup index: {} URLs, {} documents", dedup.url_count(), dedup.content_count());
    }

    let mut writer = MultiWriter::new();
    writer.push(Box::new(SqliteRecordWriter::open(Path::new(&config.output.database_path))?));
    if let Some(jsonl) = &config.output.jsonl_path {
        writer.push(Box::new(JsonlRecordWriter::new(jsonl)));
    }
    if let Some(markdown) = &config.output.markdown_path {
        writer.push(Box::new(MarkdownRecordWriter::new(markdown)));
    }

    let exclusions = match &config.exclude_file {
        Some(path) => {
            let list = ExclusionList::load(path)?;
            tracing::info!("Loaded {} excluded domains", list.len());
            list
        }
        None => ExclusionList::new(),
    };

    let mut pipeline = Pipeline::new(&config, fetcher, checkpoint, dedup, Box::new(writer))?
        .with_exclusions(exclusions);
    if let Some(index_path) = &config.dedup.index_path {
        pipeline = pipeline.with_dedup_index(index_path);
    }
    if units.iter().any(|u| matches!(u, WorkUnit::Query(_))) {
        let search = DuckDuckGoSearch::new(&config.search, tor.clone())?;
        pipeline = pipeline.with_search(Arc::new(search));
    }

    let summary = pipeline.run(&units).await?;

    if let Some(index_path) = pipeline.dedup_index_path() {
        tracing::info!(
            "Dedup index at {}: {} URLs, {} documents",
            index_path.display(),
            pipeline.dedup().url_count(),
            pipeline.dedup().content_count()
        );
    }

    let filtered = pipeline.date_filter_stats();
    if filtered.filtered_out > 0 || filtered.no_date_kept > 0 {
        tracing::info!(
            "Date filter: {} passed, {} filtered out, {} kept without a date",
            filtered.passed,
            filtered.filtered_out,
            filtered.no_date_kept
        );
    }

    println!("\n=== Run Summary ===");
    println!("{}", summary);

    Ok(())
}
