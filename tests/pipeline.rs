//! Integration tests for the pipeline
//!
//! A counting search provider and wiremock pages drive full runs, so these
//! tests cover resume, crawling, and the per-unit bookkeeping together.

use async_trait::async_trait;
use quarry::checkpoint::Checkpoint;
use quarry::config::{Config, DedupConfig};
use quarry::dedup::Deduplicator;
use quarry::fetch::FetchClient;
use quarry::output::{JsonlRecordWriter, Record};
use quarry::search::{SearchHit, SearchProvider};
use quarry::url::ExclusionList;
use quarry::{Pipeline, QuarryError, RunSummary, WorkUnit};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Returns canned hits per query and counts calls
#[derive(Default)]
struct CountingSearch {
    results: HashMap<String, Vec<String>>,
    calls: AtomicUsize,
}

impl CountingSearch {
    fn new(results: &[(&str, Vec<String>)]) -> Self {
        Self {
            results: results
                .iter()
                .map(|(query, urls)| (query.to_string(), urls.clone()))
                .collect(),
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchProvider for CountingSearch {
    async fn search(&self, query: &str, max_results: usize) -> quarry::Result<Vec<SearchHit>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let Some(urls) = self.results.get(query) else {
            return Err(QuarryError::Search {
                query: query.to_string(),
                message: "no canned results".to_string(),
            });
        };

        Ok(urls
            .iter()
            .take(max_results)
            .enumerate()
            .map(|(i, url)| SearchHit {
                url: url.clone(),
                title: String::new(),
                snippet: String::new(),
                rank: i + 1,
            })
            .collect())
    }
}

/// Records how many URLs the saved dedup index holds at each search
struct IndexReadingSearch {
    inner: CountingSearch,
    index_path: PathBuf,
    dedup: DedupConfig,
    observed: Mutex<Vec<(String, usize)>>,
}

#[async_trait]
impl SearchProvider for IndexReadingSearch {
    async fn search(&self, query: &str, max_results: usize) -> quarry::Result<Vec<SearchHit>> {
        let mut saved = Deduplicator::new(&self.dedup);
        saved.load(&self.index_path)?;
        self.observed
            .lock()
            .unwrap()
            .push((query.to_string(), saved.url_count()));
        self.inner.search(query, max_results).await
    }
}

fn test_config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.fetch.respect_robots = false;
    config.fetch.base_rate = 1000.0;
    config.fetch.max_delay = 0.0;
    config.fetch.timeout_secs = 5;
    config.extract.min_word_count = 20;
    config.checkpoint.path = dir.join("checkpoint.json");
    config.output.database_path = dir.join("records.db").display().to_string();
    config
}

/// A link-only page
fn hub(links: &[&str]) -> String {
    let anchors: Vec<String> = links
        .iter()
        .map(|link| format!(r#"<a href="{}">{}</a>"#, link, link))
        .collect();
    format!("<html><body>{}</body></html>", anchors.join("\n"))
}

/// An article whose words are unique to `tag`
fn article(tag: &str, title: &str) -> String {
    let words: Vec<String> = (0..150).map(|i| format!("{}{}", tag, i)).collect();
    format!(
        "<html><head><title>{}</title></head><body><article><p>{}</p></article></body></html>",
        title,
        words.join(" ")
    )
}

async fn mount_page(server: &MockServer, route: &str, html: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_raw(html, "text/html; charset=utf-8"))
        .mount(server)
        .await;
}

fn read_records(path: &Path) -> Vec<Record> {
    match std::fs::read_to_string(path) {
        Ok(content) => content
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect(),
        Err(_) => Vec::new(),
    }
}

async fn run_once(
    config: &Config,
    checkpoint: Checkpoint,
    search: Arc<CountingSearch>,
    jsonl: &Path,
    units: &[WorkUnit],
) -> (RunSummary, Checkpoint) {
    let fetcher = FetchClient::new(&config.fetch, None).unwrap();
    let dedup = Deduplicator::new(&config.dedup);
    let writer = Box::new(JsonlRecordWriter::new(jsonl));

    let mut pipeline = Pipeline::new(config, fetcher, checkpoint, dedup, writer)
        .unwrap()
        .with_search(search);
    let summary = pipeline.run(units).await.unwrap();
    let checkpoint = Checkpoint::load(pipeline.checkpoint().path()).unwrap();
    (summary, checkpoint)
}

#[tokio::test]
async fn test_resume_skips_completed_units() {
    let server = MockServer::start().await;
    mount_page(&server, "/acme", article("acme", "Acme results")).await;
    mount_page(&server, "/globex", article("globex", "Globex results")).await;

    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let jsonl = dir.path().join("records.jsonl");
    let units = vec![
        WorkUnit::Query("acme".to_string()),
        WorkUnit::Query("globex".to_string()),
    ];
    let canned = [
        ("acme", vec![format!("{}/acme", server.uri())]),
        ("globex", vec![format!("{}/globex", server.uri())]),
    ];

    // First run does all the work
    let search = Arc::new(CountingSearch::new(&canned));
    let (summary, checkpoint) = run_once(
        &config,
        Checkpoint::new(&config.checkpoint.path),
        search.clone(),
        &jsonl,
        &units,
    )
    .await;

    assert_eq!(search.calls(), 2);
    assert_eq!(summary.units_done, 2);
    assert_eq!(summary.records_written, 2);
    assert_eq!(checkpoint.completed_units(), 2);
    assert_eq!(checkpoint.stats().total_pages, 2);
    assert_eq!(checkpoint.stats().total_words, 300);

    let records = read_records(&jsonl);
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].company, "acme");
    assert_eq!(records[0].title, "Acme results");
    assert!(records[0].source_file.starts_with("acme_ddgtext_"));
    let requests_after_first = server.received_requests().await.unwrap().len();
    assert_eq!(requests_after_first, 2);

    // Second run over the same checkpoint does nothing
    let search = Arc::new(CountingSearch::new(&canned));
    let (summary, _) = run_once(&config, checkpoint, search.clone(), &jsonl, &units).await;

    assert_eq!(search.calls(), 0);
    assert_eq!(summary.units_skipped, 2);
    assert_eq!(summary.units_done, 0);
    assert_eq!(summary.records_written, 0);
    assert_eq!(read_records(&jsonl).len(), 2);
    assert_eq!(server.received_requests().await.unwrap().len(), requests_after_first);
}

#[tokio::test]
async fn test_reset_units_keeps_url_history() {
    let server = MockServer::start().await;
    mount_page(&server, "/acme", article("acme", "Acme results")).await;

    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let jsonl = dir.path().join("records.jsonl");
    let units = vec![WorkUnit::Query("acme".to_string())];
    let canned = [("acme", vec![format!("{}/acme", server.uri())])];

    let search = Arc::new(CountingSearch::new(&canned));
    let (_, mut checkpoint) = run_once(
        &config,
        Checkpoint::new(&config.checkpoint.path),
        search,
        &jsonl,
        &units,
    )
    .await;
    checkpoint.reset_units().unwrap();

    let search = Arc::new(CountingSearch::new(&canned));
    let (summary, _) = run_once(&config, checkpoint, search.clone(), &jsonl, &units).await;

    // Searched again, but the only hit was already fetched
    assert_eq!(search.calls(), 1);
    assert_eq!(summary.units_done, 1);
    assert_eq!(summary.urls_fetched, 0);
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_failures_and_filters_are_counted() {
    let server = MockServer::start().await;
    mount_page(&server, "/good", article("good", "Good")).await;
    mount_page(&server, "/copy", article("good", "Copy")).await;
    mount_page(&server, "/thin", "<html><body><p>too short</p></body></html>".to_string()).await;

    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let jsonl = dir.path().join("records.jsonl");
    let uri = server.uri();
    let urls = vec![
        format!("{}/good", uri),
        format!("{}/copy", uri),
        format!("{}/thin", uri),
        format!("{}/missing", uri),
        format!("{}/good", uri),
    ];
    let search = Arc::new(CountingSearch::new(&[("acme", urls)]));

    let fetcher = FetchClient::new(&config.fetch, None).unwrap();
    let mut pipeline = Pipeline::new(
        &config,
        fetcher,
        Checkpoint::new(&config.checkpoint.path),
        Deduplicator::new(&config.dedup),
        Box::new(JsonlRecordWriter::new(&jsonl)),
    )
    .unwrap()
    .with_search(search);

    let summary = pipeline
        .run(&[WorkUnit::Query("acme".to_string())])
        .await
        .unwrap();

    // The repeated /good hit is dropped before fetching
    assert_eq!(summary.urls_fetched, 4);
    assert_eq!(summary.fetch_failures, 1);
    assert_eq!(summary.extraction_failures, 1);
    assert_eq!(summary.duplicates_skipped, 1);
    assert_eq!(summary.records_written, 1);

    let checkpoint = pipeline.checkpoint();
    assert_eq!(checkpoint.failure_count(&format!("{}/missing", uri)), 1);
    assert_eq!(checkpoint.stats().failed_fetches, 1);
    assert_eq!(checkpoint.stats().failed_extractions, 1);
    assert!(pipeline.dedup().is_duplicate_url(&format!("{}/good", uri)));
}

#[tokio::test]
async fn test_search_failure_still_completes_unit() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let jsonl = dir.path().join("records.jsonl");
    let search = Arc::new(CountingSearch::default());

    let (summary, checkpoint) = run_once(
        &config,
        Checkpoint::new(&config.checkpoint.path),
        search.clone(),
        &jsonl,
        &[WorkUnit::Query("unknown".to_string())],
    )
    .await;

    assert_eq!(search.calls(), 1);
    assert_eq!(summary.units_done, 1);
    assert!(checkpoint.is_unit_done("unknown"));
}

#[tokio::test]
async fn test_crawl_follows_same_site_links() {
    let server = MockServer::start().await;
    let uri = server.uri();

    let index = r##"<html><body>
        <a href="/p1">One</a>
        <a href="/p2#comments">Two</a>
        <a href="/login">Sign in</a>
        <a href="/logo.png">Logo</a>
        <a href="https://elsewhere.example.net/story">Elsewhere</a>
        </body></html>"##
        .to_string();
    mount_page(&server, "/", index).await;
    mount_page(&server, "/p1", article("first", "First")).await;
    mount_page(&server, "/p2", article("second", "Second")).await;

    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path());
    config.crawl.enabled = true;
    config.crawl.max_depth = 1;
    config.crawl.skip_patterns = vec!["/login".to_string()];
    let jsonl = dir.path().join("records.jsonl");

    let fetcher = FetchClient::new(&config.fetch, None).unwrap();
    let mut pipeline = Pipeline::new(
        &config,
        fetcher,
        Checkpoint::new(&config.checkpoint.path),
        Deduplicator::new(&config.dedup),
        Box::new(JsonlRecordWriter::new(&jsonl)),
    )
    .unwrap();

    let seed = format!("{}/", uri);
    let summary = pipeline.run(&[WorkUnit::Seed(seed.clone())]).await.unwrap();

    // The link-only index page is too thin to keep
    assert_eq!(summary.urls_fetched, 3);
    assert_eq!(summary.extraction_failures, 1);
    assert_eq!(summary.records_written, 2);

    let records = read_records(&jsonl);
    let mut links: Vec<&str> = records.iter().map(|r| r.link.as_str()).collect();
    links.sort();
    assert_eq!(links, vec![format!("{}/p1", uri), format!("{}/p2", uri)]);
    assert!(records.iter().all(|r| r.company == seed));
    assert!(records.iter().all(|r| r.source_file.contains("_crawl_")));
}

#[tokio::test]
async fn test_excluded_domains_are_not_fetched() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/acme"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let search = Arc::new(CountingSearch::new(&[("acme", vec![format!("{}/acme", server.uri())])]));

    let fetcher = FetchClient::new(&config.fetch, None).unwrap();
    let mut pipeline = Pipeline::new(
        &config,
        fetcher,
        Checkpoint::new(&config.checkpoint.path),
        Deduplicator::new(&config.dedup),
        Box::new(JsonlRecordWriter::new(dir.path().join("records.jsonl"))),
    )
    .unwrap()
    .with_search(search)
    .with_exclusions(ExclusionList::from_lines(["127.0.0.1"]));

    let summary = pipeline
        .run(&[WorkUnit::Query("acme".to_string())])
        .await
        .unwrap();
    assert_eq!(summary.urls_fetched, 0);
    assert_eq!(summary.units_done, 1);
}

#[tokio::test]
async fn test_page_cap_spans_units() {
    let server = MockServer::start().await;

    mount_page(&server, "/s1", hub(&["/a", "/b", "/e"])).await;
    mount_page(&server, "/s2", hub(&["/c", "/d"])).await;
    mount_page(&server, "/a", article("alpha", "A")).await;
    mount_page(&server, "/b", article("bravo", "B")).await;

    for route in ["/c", "/d", "/e"] {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
    }

    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path());
    config.crawl.enabled = true;
    config.crawl.max_depth = 1;
    config.crawl.max_pages_per_domain = 2;

    let fetcher = FetchClient::new(&config.fetch, None).unwrap();
    let mut pipeline = Pipeline::new(
        &config,
        fetcher,
        Checkpoint::new(&config.checkpoint.path),
        Deduplicator::new(&config.dedup),
        Box::new(JsonlRecordWriter::new(dir.path().join("records.jsonl"))),
    )
    .unwrap();

    let uri = server.uri();
    let summary = pipeline
        .run(&[
            WorkUnit::Seed(format!("{}/s1", uri)),
            WorkUnit::Seed(format!("{}/s2", uri)),
        ])
        .await
        .unwrap();

    // The host is over its cap once unit one is done; the second seed is
    // still fetched but its links are not followed
    let mut requested: Vec<String> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|request| request.url.path().to_string())
        .collect();
    assert_eq!(requested.len(), 4);
    assert_eq!(requested[0], "/s1");
    assert_eq!(requested[3], "/s2");
    requested.sort();
    assert_eq!(requested, vec!["/a", "/b", "/s1", "/s2"]);
    assert_eq!(summary.urls_fetched, 4);
    assert_eq!(summary.records_written, 2);
    assert_eq!(summary.units_done, 2);
}

#[tokio::test]
async fn test_failed_url_not_refetched_by_later_units() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let missing = format!("{}/missing", server.uri());
    let search = Arc::new(CountingSearch::new(&[
        ("acme", vec![missing.clone()]),
        ("globex", vec![missing.clone()]),
        ("initech", vec![missing.clone()]),
    ]));
    let units = vec![
        WorkUnit::Query("acme".to_string()),
        WorkUnit::Query("globex".to_string()),
        WorkUnit::Query("initech".to_string()),
    ];

    let (summary, checkpoint) = run_once(
        &config,
        Checkpoint::new(&config.checkpoint.path),
        search.clone(),
        &dir.path().join("records.jsonl"),
        &units,
    )
    .await;

    assert_eq!(search.calls(), 3);
    assert_eq!(summary.units_done, 3);
    assert_eq!(summary.urls_fetched, 1);
    assert_eq!(summary.fetch_failures, 1);
    assert_eq!(checkpoint.failure_count(&missing), 1);
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_dedup_index_saved_after_each_unit() {
    let server = MockServer::start().await;
    mount_page(&server, "/acme", article("acme", "Acme results")).await;
    mount_page(&server, "/globex", article("globex", "Globex results")).await;

    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let index_path = dir.path().join("dedup.json");
    let search = Arc::new(IndexReadingSearch {
        inner: CountingSearch::new(&[
            ("acme", vec![format!("{}/acme", server.uri())]),
            ("globex", vec![format!("{}/globex", server.uri())]),
        ]),
        index_path: index_path.clone(),
        dedup: config.dedup.clone(),
        observed: Mutex::new(Vec::new()),
    });

    let fetcher = FetchClient::new(&config.fetch, None).unwrap();
    let mut pipeline = Pipeline::new(
        &config,
        fetcher,
        Checkpoint::new(&config.checkpoint.path),
        Deduplicator::new(&config.dedup),
        Box::new(JsonlRecordWriter::new(dir.path().join("records.jsonl"))),
    )
    .unwrap()
    .with_search(search.clone())
    .with_dedup_index(&index_path);

    let summary = pipeline
        .run(&[
            WorkUnit::Query("acme".to_string()),
            WorkUnit::Query("globex".to_string()),
        ])
        .await
        .unwrap();
    assert_eq!(summary.records_written, 2);

    // The first unit's page was already on disk when the second unit began
    let observed = search.observed.lock().unwrap().clone();
    assert_eq!(
        observed,
        vec![("acme".to_string(), 0), ("globex".to_string(), 1)]
    );

    let mut reloaded = Deduplicator::new(&config.dedup);
    reloaded.load(&index_path).unwrap();
    assert_eq!(reloaded.url_count(), 2);
    assert!(reloaded.is_duplicate_url(&format!("{}/acme", server.uri())));
}
