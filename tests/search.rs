//! Integration tests for the DuckDuckGo search provider

use quarry::config::SearchConfig;
use quarry::search::{DuckDuckGoSearch, SearchProvider};
use quarry::QuarryError;
use std::time::Duration;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const RESULTS: &str = r#"<html><body>
<div class="result results_links">
  <a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fnews.example.com%2Facme-q3">Acme Q3 results</a>
  <a class="result__snippet">Acme posted record revenue.</a>
</div>
<div class="result results_links">
  <a class="result__a" href="https://ir.acme.com/q3.pdf">Q3 report</a>
</div>
</body></html>"#;

fn test_config(server: &MockServer, news: bool) -> SearchConfig {
    SearchConfig {
        endpoint: format!("{}/html/", server.uri()),
        delay_min_secs: 0.0,
        delay_max_secs: 0.0,
        news,
        ..SearchConfig::default()
    }
}

#[tokio::test]
async fn test_search_parses_results() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/html/"))
        .and(body_string_contains("q=acme+earnings"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(RESULTS, "text/html"))
        .expect(1)
        .mount(&server)
        .await;

    let search = DuckDuckGoSearch::new(&test_config(&server, false), None).unwrap();
    let hits = search.search("acme earnings", 10).await.unwrap();

    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].url, "https://news.example.com/acme-q3");
    assert_eq!(hits[0].title, "Acme Q3 results");
    assert_eq!(hits[0].snippet, "Acme posted record revenue.");
    assert_eq!(hits[1].url, "https://ir.acme.com/q3.pdf");
}

#[tokio::test]
async fn test_news_mode_sends_news_flag() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/html/"))
        .and(body_string_contains("iar=news"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(RESULTS, "text/html"))
        .expect(1)
        .mount(&server)
        .await;

    let search = DuckDuckGoSearch::new(&test_config(&server, true), None).unwrap();
    let hits = search.search("acme", 1).await.unwrap();
    assert_eq!(hits.len(), 1);
}

#[tokio::test]
async fn test_rate_limited_search_gives_up() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/html/"))
        .respond_with(ResponseTemplate::new(202))
        .expect(3)
        .mount(&server)
        .await;

    let search = DuckDuckGoSearch::new(&test_config(&server, false), None)
        .unwrap()
        .with_backoff_unit(Duration::from_millis(1));

    match search.search("acme", 10).await {
        Err(QuarryError::Search { query, message }) => {
            assert_eq!(query, "acme");
            assert!(message.contains("202"), "unexpected message {}", message);
        }
        other => panic!("expected search error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_recovers_after_transient_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/html/"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/html/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(RESULTS, "text/html"))
        .mount(&server)
        .await;

    let search = DuckDuckGoSearch::new(&test_config(&server, false), None)
        .unwrap()
        .with_backoff_unit(Duration::from_millis(1));
    let hits = search.search("acme", 10).await.unwrap();
    assert_eq!(hits.len(), 2);
}
