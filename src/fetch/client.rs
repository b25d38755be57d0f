//! Politeness-compliant HTTP fetching
//!
//! One logical fetch is:
//! 1. robots.txt check (no network call to the page when disallowed)
//! 2. per-domain throttle acquisition
//! 3. a GET with the domain's browser fingerprint under the global cap
//! 4. on 403/429, one retry with the next fingerprint
//!
//! The caller only ever sees the final outcome.

use crate::config::FetchConfig;
use crate::fetch::fingerprint::FingerprintPool;
use crate::fetch::outcome::{is_pdf, Body, FetchError, FetchOutcome};
use crate::fetch::throttle::DomainThrottler;
use crate::robots::RobotChecker;
use crate::url::domain_of;
use chardetng::EncodingDetector;
use encoding_rs::Encoding;
use futures::future::join_all;
use reqwest::{Client, Proxy};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

/// Builds the HTTP client used for page fetches
///
/// Per-request fingerprint headers replace any default user agent, so the
/// client itself only carries transport settings.
///
/// # Arguments
///
/// * `config` - The fetch configuration
/// * `proxy` - Optional proxy (the Tor SOCKS port)
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &FetchConfig, proxy: Option<Proxy>) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.timeout_secs.min(10)))
        .https_only(!config.allow_http)
        .gzip(true)
        .brotli(true)
        .deflate(true);

    if let Some(proxy) = proxy {
        builder = builder.proxy(proxy);
    }

    builder.build()
}

/// Builds the short-timeout client used for robots.txt
fn build_robots_client(config: &FetchConfig, proxy: Option<Proxy>) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder()
        .user_agent(config.robots_user_agent.clone())
        .timeout(Duration::from_secs(config.robots_timeout_secs));

    if let Some(proxy) = proxy {
        builder = builder.proxy(proxy);
    }

    builder.build()
}

/// Fetch client composing robots compliance, throttling, and fingerprints
#[derive(Debug)]
pub struct FetchClient {
    http: Client,
    throttler: Arc<DomainThrottler>,
    robots: Arc<RobotChecker>,
    global: Semaphore,
    fingerprints: FingerprintPool,
    respect_robots: bool,
    max_delay: f64,
    tor: bool,
    /// Domains whose robots crawl-delay has already been handed to the throttler
    delay_fed: Mutex<HashSet<String>>,
}

impl FetchClient {
    /// Creates a fetch client from configuration
    ///
    /// # Arguments
    ///
    /// * `config` - The fetch configuration
    /// * `proxy_url` - Proxy for every request, e.g. `socks5h://127.0.0.1:9150`
    pub fn new(config: &FetchConfig, proxy_url: Option<&str>) -> Result<Self, reqwest::Error> {
        let proxy = proxy_url.map(Proxy::all).transpose()?;
        let http = build_http_client(config, proxy.clone())?;
        let robots_client = build_robots_client(config, proxy)?;
        let robots = RobotChecker::new(robots_client, &config.robots_user_agent);

        Ok(Self {
            http,
            throttler: Arc::new(DomainThrottler::from_config(config)),
            robots: Arc::new(robots),
            global: Semaphore::new(config.max_concurrent_total),
            fingerprints: FingerprintPool::new(),
            respect_robots: config.respect_robots,
            max_delay: config.max_delay,
            tor: proxy_url.is_some(),
            delay_fed: Mutex::new(HashSet::new()),
        })
    }

    /// Returns true if requests go through Tor
    pub fn is_tor(&self) -> bool {
        self.tor
    }

    /// The shared per-domain throttler
    pub fn throttler(&self) -> &Arc<DomainThrottler> {
        &self.throttler
    }

    /// The shared robots.txt checker
    pub fn robots(&self) -> &Arc<RobotChecker> {
        &self.robots
    }

    /// Fetches a URL under every politeness rule
    ///
    /// # Returns
    ///
    /// The final outcome. `status` is 0 when no HTTP response was received
    /// (robots denial, transport failure).
    pub async fn fetch(&self, url: &str) -> FetchOutcome {
        if self.respect_robots && !self.robots.is_allowed(url).await {
            tracing::debug!("Disallowed by robots.txt: {}", url);
            return FetchOutcome::failed(url, FetchError::PolicyDenied);
        }

        let Some(domain) = domain_of(url) else {
            return FetchOutcome::failed(url, FetchError::Transport(format!("no host in {}", url)));
        };
        self.feed_crawl_delay(&domain);

        let index = self.fingerprints.index_for(&domain);
        let _permit = self.throttler.acquire(&domain).await;

        let first = self.send(url, index).await;
        if first.status != 403 && first.status != 429 {
            return self.settle(&domain, first);
        }

        let retry_after = first.retry_after();
        self.throttler
            .report_failure(&domain, first.status, retry_after);
        if let Some(secs) = retry_after {
            let wait = secs.min(self.max_delay);
            tracing::debug!("{} asked to retry after {:.1}s", domain, wait);
            tokio::time::sleep(Duration::from_secs_f64(wait)).await;
        }

        let next = self.fingerprints.next_index(index);
        tracing::debug!(
            "HTTP {} from {}; retrying as {}",
            first.status,
            domain,
            self.fingerprints.get(next).name
        );
        let second = self.send(url, next).await;
        self.settle(&domain, second)
    }

    /// Fetches several URLs concurrently
    ///
    /// Outcomes are returned in input order.
    pub async fn fetch_batch(&self, urls: &[String]) -> Vec<FetchOutcome> {
        join_all(urls.iter().map(|url| self.fetch(url))).await
    }

    /// Classifies a final response and reports it to the throttler
    fn settle(&self, domain: &str, mut outcome: FetchOutcome) -> FetchOutcome {
        if outcome.error.is_some() {
            return outcome;
        }

        match outcome.status {
            200 => {
                self.throttler.report_success(domain);
                return outcome;
            }
            403 => outcome.error = Some(FetchError::Forbidden),
            429 => outcome.error = Some(FetchError::RateLimited),
            status @ 500..=599 => outcome.error = Some(FetchError::ServerError(status)),
            status => outcome.error = Some(FetchError::HttpStatus(status)),
        }

        if matches!(outcome.status, 403 | 429 | 500..=599) {
            self.throttler
                .report_failure(domain, outcome.status, outcome.retry_after());
        }
        outcome.body = None;
        outcome
    }

    /// Performs a single GET with the given fingerprint
    async fn send(&self, url: &str, profile_index: usize) -> FetchOutcome {
        let _global = match self.global.acquire().await {
            Ok(permit) => Some(permit),
            Err(e) => {
                tracing::warn!("Global fetch semaphore unavailable: {}", e);
                None
            }
        };

        let profile = self.fingerprints.get(profile_index);
        let response = match self.http.get(url).headers(profile.headers()).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!("Transport error for {}: {}", url, e);
                return FetchOutcome::failed(url, FetchError::Transport(e.to_string()));
            }
        };

        let status = response.status().as_u16();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_lowercase(), v.to_string()))
            })
            .collect();
        let content_type = headers
            .get("content-type")
            .map(|v| v.to_lowercase())
            .unwrap_or_default();

        let mut outcome = FetchOutcome {
            url: url.to_string(),
            status,
            body: None,
            content_type,
            error: None,
            headers,
        };

        if status != 200 {
            return outcome;
        }

        match response.bytes().await {
            Ok(bytes) => {
                outcome.body = Some(if is_pdf(url, &outcome.content_type) {
                    Body::Bytes(bytes.to_vec())
                } else {
                    Body::Text(decode_body(&bytes, &outcome.content_type))
                });
            }
            Err(e) => {
                tracing::debug!("Failed to read body of {}: {}", url, e);
                outcome.status = 0;
                outcome.error = Some(FetchError::Transport(e.to_string()));
            }
        }
        outcome
    }

    fn feed_crawl_delay(&self, domain: &str) {
        let first_sight = match self.delay_fed.lock() {
            Ok(mut guard) => guard.insert(domain.to_string()),
            Err(poisoned) => poisoned.into_inner().insert(domain.to_string()),
        };
        if !first_sight {
            return;
        }
        if let Some(delay) = self.robots.get_crawl_delay(domain) {
            tracing::info!("Honoring robots.txt crawl-delay of {}s for {}", delay, domain);
            self.throttler.set_crawl_delay(domain, delay);
        }
    }
}

/// Decodes a text body
///
/// Uses the Content-Type charset when present, then UTF-8, then a detected
/// encoding.
pub fn decode_body(bytes: &[u8], content_type: &str) -> String {
    if let Some(encoding) = charset(content_type).and_then(|c| Encoding::for_label(c.as_bytes())) {
        let (text, _, _) = encoding.decode(bytes);
        return text.into_owned();
    }

    if let Ok(text) = std::str::from_utf8(bytes) {
        return text.to_string();
    }

    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    let encoding = detector.guess(None, true);
    let (text, _, _) = encoding.decode(bytes);
    text.into_owned()
}

fn charset(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        (key.trim().eq_ignore_ascii_case("charset"))
            .then(|| value.trim().trim_matches('"').to_string())
    })
}
