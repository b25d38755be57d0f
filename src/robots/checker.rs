//! Cached robots.txt checker
//!
//! Each origin's robots.txt is fetched at most once per process. Concurrent
//! callers for the same origin wait on the same fetch.

use crate::robots::ParsedRobots;
use reqwest::{Client, StatusCode};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;
use url::Url;

type RobotsSlot = Arc<OnceCell<Arc<ParsedRobots>>>;

/// Answers allow/deny and crawl-delay questions from cached robots.txt files
#[derive(Debug)]
pub struct RobotChecker {
    client: Client,
    user_agent: String,
    cache: Mutex<HashMap<String, RobotsSlot>>,
}

impl RobotChecker {
    /// Creates a new checker
    ///
    /// # Arguments
    ///
    /// * `client` - HTTP client used for robots.txt requests; its timeout
    ///   bounds each fetch
    /// * `user_agent` - Agent name matched against robots.txt groups
    pub fn new(client: Client, user_agent: &str) -> Self {
        Self {
            client,
            user_agent: user_agent.to_string(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Checks whether a URL may be fetched
    ///
    /// Unparsable URLs and origins whose robots.txt could not be read are
    /// allowed.
    pub async fn is_allowed(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return true;
        };
        let Some(origin) = origin_of(&parsed) else {
            return true;
        };

        let robots = self.robots_for(&origin).await;
        robots.is_allowed(url, &self.user_agent)
    }

    /// Returns the Crawl-delay for a domain, if its robots.txt has been read
    ///
    /// `domain` is matched against the netloc of cached origins, so this
    /// never triggers a fetch.
    pub fn get_crawl_delay(&self, domain: &str) -> Option<f64> {
        let cache = match self.cache.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        cache
            .iter()
            .filter(|(origin, _)| origin_netloc(origin) == domain)
            .find_map(|(_, slot)| slot.get().and_then(|r| r.crawl_delay(&self.user_agent)))
    }

    /// Number of origins with a cached robots.txt
    pub fn cached_origins(&self) -> usize {
        match self.cache.lock() {
            Ok(guard) => guard.values().filter(|slot| slot.initialized()).count(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    async fn robots_for(&self, origin: &str) -> Arc<ParsedRobots> {
        let slot = {
            let mut cache = match self.cache.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            cache
                .entry(origin.to_string())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        slot.get_or_init(|| async { Arc::new(self.fetch_robots(origin).await) })
            .await
            .clone()
    }

    /// Fetches and parses `{origin}/robots.txt`, failing open
    async fn fetch_robots(&self, origin: &str) -> ParsedRobots {
        let robots_url = format!("{}/robots.txt", origin);
        tracing::debug!("Fetching robots.txt: {}", robots_url);

        let response = match self.client.get(&robots_url).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!("robots.txt unavailable for {}: {}", origin, e);
                return ParsedRobots::allow_all();
            }
        };

        if response.status() != StatusCode::OK {
            tracing::debug!(
                "robots.txt for {} returned {}; allowing all",
                origin,
                response.status()
            );
            return ParsedRobots::allow_all();
        }

        match response.bytes().await {
            Ok(bytes) => ParsedRobots::from_content(&String::from_utf8_lossy(&bytes)),
            Err(e) => {
                tracing::debug!("Failed to read robots.txt for {}: {}", origin, e);
                ParsedRobots::allow_all()
            }
        }
    }
}

/// `scheme://host[:port]` of an HTTP(S) URL
fn origin_of(url: &Url) -> Option<String> {
    match url.scheme() {
        "http" | "https" => {
            let origin = url.origin().ascii_serialization();
            (origin != "null").then_some(origin)
        }
        _ => None,
    }
}

fn origin_netloc(origin: &str) -> &str {
    origin.split_once("://").map(|(_, rest)| rest).unwrap_or(origin)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_of() {
        let url = Url::parse("https://X.com/private?a=1").unwrap();
        assert_eq!(origin_of(&url), Some("https://x.com".to_string()));

        let url = Url::parse("http://127.0.0.1:8080/a").unwrap();
        assert_eq!(origin_of(&url), Some("http://127.0.0.1:8080".to_string()));

        let url = Url::parse("mailto:someone@x.com").unwrap();
        assert_eq!(origin_of(&url), None);
    }

    #[test]
    fn test_origin_netloc() {
        assert_eq!(origin_netloc("https://x.com"), "x.com");
        assert_eq!(origin_netloc("http://127.0.0.1:8080"), "127.0.0.1:8080");
    }

    #[tokio::test]
    async fn test_unparsable_url_is_allowed() {
        let checker = RobotChecker::new(Client::new(), "Mozilla/5.0");
        assert!(checker.is_allowed("not a url").await);
        assert_eq!(checker.cached_origins(), 0);
    }

    #[tokio::test]
    async fn test_unreachable_origin_fails_open() {
        let client = Client::builder()
            .timeout(std::time::Duration::from_millis(500))
            .build()
            .unwrap();
        let checker = RobotChecker::new(client, "Mozilla/5.0");
        // Port 9 (discard) on localhost is not expected to serve HTTP
        assert!(checker.is_allowed("http://127.0.0.1:9/private").await);
        assert_eq!(checker.get_crawl_delay("127.0.0.1:9"), None);
    }
}
