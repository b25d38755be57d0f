//! URL handling module for Quarry
//!
//! This module provides dedup identities, link cleaning, domain extraction,
//! and the domain exclusion list.

mod domain;
mod matcher;
mod normalize;

pub use domain::{bare_host, base_domain, domain_of, extract_domain, netloc};
pub use matcher::{matches_wildcard, ExclusionList};
pub use normalize::{clean_link, url_identity};

/// Returns true if two hosts share a base domain
///
/// # Examples
///
/// ```
/// use quarry::url::same_site;
///
/// assert!(same_site("www.reuters.com", "graphics.reuters.com"));
/// assert!(!same_site("reuters.com", "bloomberg.com"));
/// ```
pub fn same_site(a: &str, b: &str) -> bool {
    base_domain(a) == base_domain(b)
}
