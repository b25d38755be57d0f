//! DuckDuckGo HTML search
//!
//! Queries the no-JavaScript HTML endpoint and scrapes the result list.
//! Searches are spaced by a randomized delay that grows after consecutive
//! failures; when Tor is in use the circuit is renewed periodically and on
//! rate limiting.

use crate::config::SearchConfig;
use crate::fetch::{fingerprint, TorManager};
use crate::search::{SearchHit, SearchProvider};
use crate::{QuarryError, Result};
use async_trait::async_trait;
use rand::Rng;
use reqwest::{Client, StatusCode};
use scraper::{Html, Selector};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use url::Url;

const MAX_ATTEMPTS: u32 = 3;

/// Extra pre-search delay per consecutive failed search
const COOLDOWN_PER_FAILURE: f64 = 15.0;

#[derive(Debug, Default)]
struct Pacing {
    last_search: Option<Instant>,
    consecutive_failures: u32,
}

/// Search provider backed by html.duckduckgo.com
#[derive(Debug)]
pub struct DuckDuckGoSearch {
    client: Client,
    endpoint: String,
    region: String,
    news: bool,
    delay_min: f64,
    delay_max: f64,
    backoff_unit: Duration,
    tor: Option<Arc<TorManager>>,
    pacing: Mutex<Pacing>,
}

impl DuckDuckGoSearch {
    /// Creates a provider
    ///
    /// # Arguments
    ///
    /// * `config` - Search configuration (endpoint, region, delays)
    /// * `tor` - Tor transport; when set, searches go through its SOCKS port
    pub fn new(config: &SearchConfig, tor: Option<Arc<TorManager>>) -> Result<Self> {
        let mut builder = Client::builder()
            .default_headers(fingerprint::CHROME_WINDOWS.headers())
            .timeout(Duration::from_secs(30))
            .gzip(true)
            .brotli(true)
            .deflate(true);
        if let Some(tor) = &tor {
            builder = builder.proxy(tor.proxy()?);
        }

        Ok(Self {
            client: builder.build()?,
            endpoint: config.endpoint.clone(),
            region: config.region.clone(),
            news: config.news,
            delay_min: config.delay_min_secs,
            delay_max: config.delay_max_secs,
            backoff_unit: Duration::from_secs(1),
            tor,
            pacing: Mutex::new(Pacing::default()),
        })
    }

    /// Scales retry backoff; rate-limit waits are 10, 20, 40 units
    pub fn with_backoff_unit(mut self, unit: Duration) -> Self {
        self.backoff_unit = unit;
        self
    }

    /// Waits out the randomized gap since the previous search
    async fn pace(&self, pacing: &mut Pacing) {
        let mut delay = if self.delay_max > self.delay_min {
            rand::thread_rng().gen_range(self.delay_min..=self.delay_max)
        } else {
            self.delay_min
        };
        if pacing.consecutive_failures > 0 {
            let cooldown = pacing.consecutive_failures as f64 * COOLDOWN_PER_FAILURE;
            tracing::info!(
                "Extra search cooldown of {}s after {} failed searches",
                cooldown,
                pacing.consecutive_failures
            );
            delay += cooldown;
        }

        if let Some(last) = pacing.last_search {
            let remaining = delay - last.elapsed().as_secs_f64();
            if remaining > 0.0 {
                tokio::time::sleep(Duration::from_secs_f64(remaining)).await;
            }
        }
    }

    async fn attempt(&self, query: &str) -> std::result::Result<String, AttemptError> {
        let mut form = vec![("q", query.to_string()), ("kl", self.region.clone())];
        if self.news {
            form.push(("iar", "news".to_string()));
        }

        let response = self
            .client
            .post(&self.endpoint)
            .form(&form)
            .send()
            .await
            .map_err(|e| AttemptError::Other(e.to_string()))?;

        match response.status() {
            StatusCode::OK => response
                .text()
                .await
                .map_err(|e| AttemptError::Other(e.to_string())),
            // DuckDuckGo answers 202 with an anomaly page when it throttles
            StatusCode::ACCEPTED | StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => {
                Err(AttemptError::RateLimited(response.status().as_u16()))
            }
            status => Err(AttemptError::Other(format!("HTTP {}", status))),
        }
    }
}

enum AttemptError {
    RateLimited(u16),
    Other(String),
}

#[async_trait]
impl SearchProvider for DuckDuckGoSearch {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        let mut pacing = self.pacing.lock().await;
        self.pace(&mut pacing).await;

        if let Some(tor) = &self.tor {
            if tor.should_renew() {
                if let Err(e) = tor.renew_circuit().await {
                    tracing::warn!("Scheduled circuit renewal failed: {}", e);
                }
            }
        }

        pacing.last_search = Some(Instant::now());

        let mut last_error = String::new();
        for attempt in 0..MAX_ATTEMPTS {
            match self.attempt(query).await {
                Ok(html) => {
                    let hits = parse_results(&html, max_results);
                    if hits.is_empty() {
                        pacing.consecutive_failures += 1;
                    } else {
                        pacing.consecutive_failures = pacing.consecutive_failures.saturating_sub(1);
                    }
                    if let Some(tor) = &self.tor {
                        tor.record_query();
                    }
                    tracing::debug!("Search '{}' returned {} hits", query, hits.len());
                    return Ok(hits);
                }
                Err(AttemptError::RateLimited(status)) => {
                    tracing::warn!(
                        "Search rate limited (HTTP {}) on attempt {}/{} for '{}'",
                        status,
                        attempt + 1,
                        MAX_ATTEMPTS,
                        query
                    );
                    if let Some(tor) = &self.tor {
                        tor.on_ratelimit().await;
                    }
                    last_error = format!("rate limited (HTTP {})", status);
                    tokio::time::sleep(self.backoff_unit * 10 * 2u32.pow(attempt)).await;
                }
                Err(AttemptError::Other(message)) => {
                    tracing::warn!("Search error for '{}': {}", query, message);
                    last_error = message;
                    if attempt + 1 < MAX_ATTEMPTS {
                        tokio::time::sleep(self.backoff_unit * 2u32.pow(attempt + 1)).await;
                    }
                }
            }
        }

        pacing.consecutive_failures += 1;
        Err(QuarryError::Search {
            query: query.to_string(),
            message: last_error,
        })
    }
}

/// Parses the HTML result page
///
/// Ads are skipped. Hits without a usable link are dropped; ranks count
/// only the hits kept.
pub fn parse_results(html: &str, max_results: usize) -> Vec<SearchHit> {
    let document = Html::parse_document(html);
    let (Ok(result_sel), Ok(link_sel), Ok(snippet_sel)) = (
        Selector::parse("div.result"),
        Selector::parse("a.result__a"),
        Selector::parse(".result__snippet"),
    ) else {
        return Vec::new();
    };

    let mut hits = Vec::new();
    for result in document.select(&result_sel) {
        if hits.len() >= max_results {
            break;
        }
        if result.value().classes().any(|c| c == "result--ad") {
            continue;
        }

        let Some(link) = result.select(&link_sel).next() else {
            continue;
        };
        let Some(url) = link.value().attr("href").and_then(decode_result_link) else {
            continue;
        };

        let title = collapse(&link.text().collect::<String>());
        let snippet = result
            .select(&snippet_sel)
            .next()
            .map(|s| collapse(&s.text().collect::<String>()))
            .unwrap_or_default();

        hits.push(SearchHit {
            url,
            title,
            snippet,
            rank: hits.len() + 1,
        });
    }
    hits
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Resolves a result href, unwrapping DuckDuckGo's `/l/?uddg=` redirect
pub fn decode_result_link(href: &str) -> Option<String> {
    let href = href.trim();
    let absolute = if href.starts_with("//") {
        format!("https:{}", href)
    } else if href.starts_with('/') {
        format!("https://duckduckgo.com{}", href)
    } else {
        href.to_string()
    };

    let url = Url::parse(&absolute).ok()?;
    if url.path().starts_with("/l/") {
        let target = url
            .query_pairs()
            .find(|(key, _)| key == "uddg")
            .map(|(_, value)| value.into_owned())?;
        return Url::parse(&target)
            .ok()
            .filter(|u| matches!(u.scheme(), "http" | "https"))
            .map(|u| u.to_string());
    }

    matches!(url.scheme(), "http" | "https").then(|| url.to_string())
}
