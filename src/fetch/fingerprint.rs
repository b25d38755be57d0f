//! Browser fingerprint profiles
//!
//! Each profile is a fixed bundle of request headers copied from a real
//! browser/OS combination. A domain always gets the same profile; a blocked
//! request is retried once with the next profile in the pool.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use sha2::{Digest, Sha256};

/// An immutable browser identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FingerprintProfile {
    pub name: &'static str,
    pub user_agent: &'static str,
    pub accept: &'static str,
    pub accept_language: &'static str,
    pub accept_encoding: &'static str,
    pub sec_ch_ua: Option<&'static str>,
    pub sec_ch_ua_mobile: Option<&'static str>,
    pub sec_ch_ua_platform: Option<&'static str>,
    pub sec_fetch_site: &'static str,
    pub sec_fetch_mode: &'static str,
    pub sec_fetch_dest: &'static str,
    pub upgrade_insecure_requests: &'static str,
}

impl FingerprintProfile {
    /// Builds the request headers for this profile
    ///
    /// Client-hint headers are only sent by the profiles whose browser sends
    /// them. `Connection: keep-alive` is always included.
    pub fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let mut put = |name: &'static str, value: &'static str| {
            headers.insert(
                HeaderName::from_static(name),
                HeaderValue::from_static(value),
            );
        };

        put("user-agent", self.user_agent);
        put("accept", self.accept);
        put("accept-language", self.accept_language);
        put("accept-encoding", self.accept_encoding);
        put("sec-fetch-site", self.sec_fetch_site);
        put("sec-fetch-mode", self.sec_fetch_mode);
        put("sec-fetch-dest", self.sec_fetch_dest);
        put("upgrade-insecure-requests", self.upgrade_insecure_requests);
        put("connection", "keep-alive");

        if let Some(value) = self.sec_ch_ua {
            put("sec-ch-ua", value);
        }
        if let Some(value) = self.sec_ch_ua_mobile {
            put("sec-ch-ua-mobile", value);
        }
        if let Some(value) = self.sec_ch_ua_platform {
            put("sec-ch-ua-platform", value);
        }

        headers
    }
}

const CHROMIUM_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8";

pub const CHROME_WINDOWS: FingerprintProfile = FingerprintProfile {
    name: "Chrome 122 Windows",
    user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36",
    accept: CHROMIUM_ACCEPT,
    accept_language: "en-US,en;q=0.9",
    accept_encoding: "gzip, deflate, br",
    sec_ch_ua: Some(r#""Chromium";v="122", "Not(A:Brand";v="24", "Google Chrome";v="122""#),
    sec_ch_ua_mobile: Some("?0"),
    sec_ch_ua_platform: Some(r#""Windows""#),
    sec_fetch_site: "none",
    sec_fetch_mode: "navigate",
    sec_fetch_dest: "document",
    upgrade_insecure_requests: "1",
};

pub const CHROME_MAC: FingerprintProfile = FingerprintProfile {
    name: "Chrome 122 macOS",
    user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36",
    accept: CHROMIUM_ACCEPT,
    accept_language: "en-US,en;q=0.9",
    accept_encoding: "gzip, deflate, br",
    sec_ch_ua: Some(r#""Chromium";v="122", "Not(A:Brand";v="24", "Google Chrome";v="122""#),
    sec_ch_ua_mobile: Some("?0"),
    sec_ch_ua_platform: Some(r#""macOS""#),
    sec_fetch_site: "none",
    sec_fetch_mode: "navigate",
    sec_fetch_dest: "document",
    upgrade_insecure_requests: "1",
};

pub const FIREFOX_WINDOWS: FingerprintProfile = FingerprintProfile {
    name: "Firefox 123 Windows",
    user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:123.0) Gecko/20100101 Firefox/123.0",
    accept: "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
    accept_language: "en-US,en;q=0.5",
    accept_encoding: "gzip, deflate, br",
    sec_ch_ua: None,
    sec_ch_ua_mobile: None,
    sec_ch_ua_platform: None,
    sec_fetch_site: "none",
    sec_fetch_mode: "navigate",
    sec_fetch_dest: "document",
    upgrade_insecure_requests: "1",
};

pub const SAFARI_MAC: FingerprintProfile = FingerprintProfile {
    name: "Safari 17 macOS",
    user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2.1 Safari/605.1.15",
    accept: "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
    accept_language: "en-US,en;q=0.9",
    accept_encoding: "gzip, deflate, br",
    sec_ch_ua: None,
    sec_ch_ua_mobile: None,
    sec_ch_ua_platform: None,
    sec_fetch_site: "none",
    sec_fetch_mode: "navigate",
    sec_fetch_dest: "document",
    upgrade_insecure_requests: "1",
};

pub const EDGE_WINDOWS: FingerprintProfile = FingerprintProfile {
    name: "Edge 122 Windows",
    user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36 Edg/122.0.0.0",
    accept: CHROMIUM_ACCEPT,
    accept_language: "en-US,en;q=0.9",
    accept_encoding: "gzip, deflate, br",
    sec_ch_ua: Some(r#""Chromium";v="122", "Not(A:Brand";v="24", "Microsoft Edge";v="122""#),
    sec_ch_ua_mobile: Some("?0"),
    sec_ch_ua_platform: Some(r#""Windows""#),
    sec_fetch_site: "none",
    sec_fetch_mode: "navigate",
    sec_fetch_dest: "document",
    upgrade_insecure_requests: "1",
};

/// All built-in profiles, in rotation order
pub const ALL_PROFILES: [FingerprintProfile; 5] = [
    CHROME_WINDOWS,
    CHROME_MAC,
    FIREFOX_WINDOWS,
    SAFARI_MAC,
    EDGE_WINDOWS,
];

/// Fixed pool of profiles with deterministic per-domain assignment
#[derive(Debug, Clone)]
pub struct FingerprintPool {
    profiles: Vec<FingerprintProfile>,
}

impl Default for FingerprintPool {
    fn default() -> Self {
        Self {
            profiles: ALL_PROFILES.to_vec(),
        }
    }
}

impl FingerprintPool {
    /// Creates a pool of the built-in profiles
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of profiles in the pool
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Index of the profile assigned to a domain
    ///
    /// The assignment hashes the lowercase domain with SHA-256, so it does
    /// not change between processes.
    pub fn index_for(&self, domain: &str) -> usize {
        let digest = Sha256::digest(domain.to_lowercase().as_bytes());
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        (u64::from_be_bytes(prefix) % self.profiles.len() as u64) as usize
    }

    /// Index of the profile that follows `index` in rotation
    pub fn next_index(&self, index: usize) -> usize {
        (index + 1) % self.profiles.len()
    }

    /// Profile at a given index (wrapping)
    pub fn get(&self, index: usize) -> &FingerprintProfile {
        &self.profiles[index % self.profiles.len()]
    }

    /// Profile assigned to a domain
    pub fn for_domain(&self, domain: &str) -> &FingerprintProfile {
        self.get(self.index_for(domain))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_has_five_profiles() {
        let pool = FingerprintPool::new();
        assert_eq!(pool.len(), 5);
        let names: Vec<&str> = ALL_PROFILES.iter().map(|p| p.name).collect();
        assert!(names.contains(&"Safari 17 macOS"));
    }

    #[test]
    fn test_assignment_is_deterministic() {
        let pool = FingerprintPool::new();
        let first = pool.index_for("reuters.com");
        for _ in 0..10 {
            assert_eq!(pool.index_for("reuters.com"), first);
        }
        assert_eq!(pool.index_for("REUTERS.com"), first);
    }

    #[test]
    fn test_assignment_spreads_domains() {
        let pool = FingerprintPool::new();
        let mut used = std::collections::HashSet::new();
        for i in 0..50 {
            used.insert(pool.index_for(&format!("site{}.example.com", i)));
        }
        assert!(used.len() > 1);
    }

    #[test]
    fn test_next_index_wraps() {
        let pool = FingerprintPool::new();
        assert_eq!(pool.next_index(0), 1);
        assert_eq!(pool.next_index(4), 0);
        assert_ne!(pool.get(2).name, pool.get(pool.next_index(2)).name);
    }

    #[test]
    fn test_chrome_headers_include_client_hints() {
        let headers = CHROME_WINDOWS.headers();
        assert_eq!(headers.get("sec-ch-ua-platform").unwrap(), "\"Windows\"");
        assert_eq!(headers.get("connection").unwrap(), "keep-alive");
        assert!(headers
            .get("user-agent")
            .unwrap()
            .to_str()
            .unwrap()
            .contains("Chrome/122"));
    }

    #[test]
    fn test_firefox_and_safari_omit_client_hints() {
        for profile in [FIREFOX_WINDOWS, SAFARI_MAC] {
            let headers = profile.headers();
            assert!(headers.get("sec-ch-ua").is_none());
            assert!(headers.get("sec-ch-ua-mobile").is_none());
            assert!(headers.get("sec-ch-ua-platform").is_none());
            assert_eq!(headers.get("upgrade-insecure-requests").unwrap(), "1");
        }
    }
}
