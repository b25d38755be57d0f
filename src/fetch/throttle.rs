//! Per-domain adaptive throttling
//!
//! This module handles:
//! - Per-domain concurrency caps via semaphores
//! - Pacing request issuance at the configured base rate
//! - Honoring robots.txt crawl delays
//! - Adaptive penalty delays driven by 403/429/5xx responses

use crate::config::FetchConfig;
use crate::state::DomainState;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::OwnedSemaphorePermit;

/// Proof that the holder may issue a request to a domain
///
/// Dropping the permit releases the domain's concurrency slot.
#[derive(Debug)]
pub struct DomainPermit {
    domain: String,
    _slot: Option<OwnedSemaphorePermit>,
}

impl DomainPermit {
    /// The domain this permit was issued for
    pub fn domain(&self) -> &str {
        &self.domain
    }
}

/// DomainThrottler coordinates politeness across all in-flight fetches
///
/// The throttler coordinates:
/// - Per-domain concurrency limits (max in-flight requests per domain)
/// - Per-domain pacing (one request per `1 / base_rate` seconds, or the
///   robots crawl-delay when that is longer)
/// - Adaptive penalty delays that grow on pushback and shrink on success
///
/// Domain states are created on first use and kept for the process lifetime.
#[derive(Debug)]
pub struct DomainThrottler {
    base_rate: f64,
    max_delay: f64,
    max_per_domain: usize,
    domains: Mutex<HashMap<String, Arc<DomainState>>>,
}

impl DomainThrottler {
    /// Creates a new throttler
    ///
    /// # Arguments
    ///
    /// * `base_rate` - Steady requests per second per domain
    /// * `max_delay` - Upper bound on the adaptive penalty (seconds)
    /// * `max_per_domain` - Maximum concurrent requests per domain
    pub fn new(base_rate: f64, max_delay: f64, max_per_domain: usize) -> Self {
        Self {
            base_rate,
            max_delay,
            max_per_domain,
            domains: Mutex::new(HashMap::new()),
        }
    }

    /// Creates a throttler from the fetch configuration
    pub fn from_config(config: &FetchConfig) -> Self {
        Self::new(
            config.base_rate,
            config.max_delay,
            config.max_concurrent_per_domain,
        )
    }

    /// Returns the state for a domain, creating it on first touch
    pub fn state(&self, domain: &str) -> Arc<DomainState> {
        let mut domains = match self.domains.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        domains
            .entry(domain.to_string())
            .or_insert_with(|| Arc::new(DomainState::new(self.max_per_domain)))
            .clone()
    }

    /// Waits until a request to `domain` is allowed
    ///
    /// Takes a concurrency slot first, then waits for the pacing slot, then
    /// sleeps off any pending penalty. The returned permit holds the slot.
    pub async fn acquire(&self, domain: &str) -> DomainPermit {
        let state = self.state(domain);

        let slot = match state.acquire_slot().await {
            Ok(permit) => Some(permit),
            Err(e) => {
                tracing::warn!("Domain semaphore unavailable for {}: {}", domain, e);
                None
            }
        };

        let wait = state.reserve_issue_slot(self.pacing_interval(&state)).await;
        if !wait.is_zero() {
            tracing::trace!("Pacing {} for {:?}", domain, wait);
            tokio::time::sleep(wait).await;
        }

        let extra = state.extra_delay();
        if extra > 0.0 {
            tracing::debug!("Penalty delay of {:.2}s for {}", extra, domain);
            tokio::time::sleep(Duration::from_secs_f64(extra)).await;
        }

        DomainPermit {
            domain: domain.to_string(),
            _slot: slot,
        }
    }

    /// Releases a permit obtained from `acquire`
    pub fn release(&self, permit: DomainPermit) {
        drop(permit);
    }

    /// Halves the domain's penalty after a successful response
    pub fn report_success(&self, domain: &str) {
        self.state(domain).record_success();
    }

    /// Raises the domain's penalty after a failed response
    ///
    /// # Arguments
    ///
    /// * `domain` - The domain that answered
    /// * `status` - HTTP status code (429, 403, and 5xx raise the penalty)
    /// * `retry_after` - Parsed `Retry-After` seconds, if the server sent one
    pub fn report_failure(&self, domain: &str, status: u16, retry_after: Option<f64>) {
        let delay = self
            .state(domain)
            .record_failure(status, retry_after, self.max_delay);
        tracing::debug!(
            "Domain {} answered {}; penalty now {:.2}s",
            domain,
            status,
            delay
        );
    }

    /// Current penalty delay for a domain in seconds
    pub fn extra_delay(&self, domain: &str) -> f64 {
        self.state(domain).extra_delay()
    }

    /// Records a robots.txt crawl-delay for a domain
    pub fn set_crawl_delay(&self, domain: &str, delay: f64) {
        self.state(domain).set_crawl_delay(delay, self.max_delay);
    }

    /// Number of domains touched so far
    pub fn domain_count(&self) -> usize {
        match self.domains.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    /// Upper bound on the penalty delay
    pub fn max_delay(&self) -> f64 {
        self.max_delay
    }

    fn pacing_interval(&self, state: &DomainState) -> Duration {
        let base = 1.0 / self.base_rate;
        let secs = match state.crawl_delay() {
            Some(delay) if delay > base => delay,
            _ => base,
        };
        Duration::from_secs_f64(secs)
    }
}
