use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;

/// Penalty delays below this are treated as zero
const PENALTY_EPSILON: f64 = 0.01;

/// Tracks the politeness state of one domain
///
/// Owned by the throttler and shared with in-flight fetches through an
/// `Arc`. The semaphore caps concurrent requests, the pacing slot spaces
/// request issuance in time, and the penalty adapts to server pushback.
#[derive(Debug)]
pub struct DomainState {
    /// Per-domain concurrency cap
    semaphore: Arc<Semaphore>,

    /// Earliest instant the next request may be issued
    next_slot: tokio::sync::Mutex<Instant>,

    /// Adaptive delay and robots crawl-delay, in seconds
    penalty: Mutex<Penalty>,
}

#[derive(Debug, Clone, Copy, Default)]
struct Penalty {
    extra_delay: f64,
    crawl_delay: Option<f64>,
}

impl DomainState {
    /// Creates a new DomainState allowing `max_concurrent` in-flight requests
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
            next_slot: tokio::sync::Mutex::new(Instant::now()),
            penalty: Mutex::new(Penalty::default()),
        }
    }

    /// Waits for a free concurrency slot on this domain
    pub async fn acquire_slot(&self) -> Result<OwnedSemaphorePermit, AcquireError> {
        self.semaphore.clone().acquire_owned().await
    }

    /// Number of concurrency slots currently free
    pub fn available_slots(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Reserves the next issuance slot and returns how long to wait for it
    ///
    /// Successive reservations are spaced at least `interval` apart, so
    /// concurrent callers queue behind each other rather than bursting.
    pub async fn reserve_issue_slot(&self, interval: Duration) -> Duration {
        let mut next = self.next_slot.lock().await;
        let now = Instant::now();
        let start = if *next > now { *next } else { now };
        *next = start + interval;
        start - now
    }

    /// Current adaptive penalty delay in seconds
    pub fn extra_delay(&self) -> f64 {
        self.with_penalty(|p| p.extra_delay)
    }

    /// Robots.txt crawl-delay recorded for this domain, if any
    pub fn crawl_delay(&self) -> Option<f64> {
        self.with_penalty(|p| p.crawl_delay)
    }

    /// Records a robots.txt crawl-delay, capped at `max_delay`
    pub fn set_crawl_delay(&self, delay: f64, max_delay: f64) {
        self.with_penalty(|p| p.crawl_delay = Some(delay.clamp(0.0, max_delay)));
    }

    /// Halves the penalty after a successful response
    pub fn record_success(&self) {
        self.with_penalty(|p| {
            let halved = p.extra_delay / 2.0;
            p.extra_delay = if halved < PENALTY_EPSILON { 0.0 } else { halved };
        });
    }

    /// Raises the penalty after a failed response
    ///
    /// Returns the new penalty in seconds.
    pub fn record_failure(&self, status: u16, retry_after: Option<f64>, max_delay: f64) -> f64 {
        self.with_penalty(|p| {
            p.extra_delay = next_penalty(p.extra_delay, status, retry_after, max_delay);
            p.extra_delay
        })
    }

    fn with_penalty<T>(&self, f: impl FnOnce(&mut Penalty) -> T) -> T {
        // A poisoned lock still holds plain numbers; keep using them.
        let mut guard = match self.penalty.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }
}

/// Computes the penalty that follows `current` after a failure status
///
/// | Status | New penalty |
/// |--------|-------------|
/// | 429 with Retry-After | `min(retry_after, max_delay)` |
/// | 429 | `min(base * 2, max_delay)` |
/// | 403 | `min(base * 1.5, max_delay)` |
/// | 5xx | `min(base * 1.25, max_delay)` |
/// | other | unchanged |
///
/// `base` is the current penalty, or 1.0 when there is none yet.
pub fn next_penalty(current: f64, status: u16, retry_after: Option<f64>, max_delay: f64) -> f64 {
    let base = if current > 0.0 { current } else { 1.0 };
    match status {
        429 => match retry_after {
            Some(secs) => secs.max(0.0).min(max_delay),
            None => (base * 2.0).min(max_delay),
        },
        403 => (base * 1.5).min(max_delay),
        500..=599 => (base * 1.25).min(max_delay),
        _ => current,
    }
}
