//! Fetching module
//!
//! This module contains the HTTP side of the harvester: browser fingerprints,
//! per-domain throttling, the fetch client, and the optional Tor transport.

mod client;
pub mod fingerprint;
mod outcome;
mod throttle;
mod tor;

pub use client::{build_http_client, decode_body, FetchClient};
pub use fingerprint::{FingerprintPool, FingerprintProfile};
pub use outcome::{is_pdf, parse_retry_after, Body, FetchError, FetchOutcome};
pub use throttle::{DomainPermit, DomainThrottler};
pub use tor::TorManager;
