use crate::url::domain::bare_host;
use crate::ConfigError;
use std::collections::HashSet;
use std::path::Path;

/// Checks if a domain matches a wildcard pattern
///
/// This function supports two types of patterns:
/// 1. Exact match: "example.com" matches only "example.com"
/// 2. Wildcard match: "*.example.com" matches:
///    - "example.com" (the bare domain)
///    - "blog.example.com" (single subdomain)
///    - "api.v2.example.com" (nested subdomains)
///
/// # Examples
///
/// ```
/// use quarry::url::matches_wildcard;
///
/// assert!(matches_wildcard("example.com", "example.com"));
/// assert!(!matches_wildcard("example.com", "other.com"));
/// assert!(matches_wildcard("*.example.com", "api.v2.example.com"));
/// assert!(!matches_wildcard("*.example.com", "example.org"));
/// ```
pub fn matches_wildcard(pattern: &str, candidate: &str) -> bool {
    if let Some(base) = pattern.strip_prefix("*.") {
        candidate == base || candidate.ends_with(&format!(".{}", base))
    } else {
        candidate == pattern
    }
}

/// Set of domains that are never searched into or crawled
///
/// Plain entries are matched exactly against the host with `www.` and the
/// port removed; `*.` entries also cover every subdomain.
#[derive(Debug, Clone, Default)]
pub struct ExclusionList {
    exact: HashSet<String>,
    wildcards: Vec<String>,
}

impl ExclusionList {
    /// Creates an empty exclusion list
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads an exclusion file, one domain per line
    ///
    /// Lines starting with `#` are comments. Entries may carry a scheme,
    /// a `www.` prefix, or a path; all of these are stripped.
    ///
    /// # Returns
    ///
    /// * `Ok(ExclusionList)` - Parsed list
    /// * `Err(ConfigError::MissingInput)` - The file could not be read
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::MissingInput(format!("{}: {}", path.display(), e)))?;
        Ok(Self::from_lines(content.lines()))
    }

    /// Builds a list from raw lines
    pub fn from_lines<'a, I>(lines: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut list = Self::new();
        for line in lines {
            if let Some(entry) = parse_exclusion_line(line) {
                list.insert(&entry);
            }
        }
        list
    }

    /// Adds one already-cleaned entry
    pub fn insert(&mut self, entry: &str) {
        if entry.starts_with("*.") {
            self.wildcards.push(entry.to_string());
        } else {
            self.exact.insert(entry.to_string());
        }
    }

    /// Returns true if the host (or netloc) is excluded
    pub fn is_excluded(&self, host: &str) -> bool {
        let host = bare_host(host);
        self.exact.contains(&host) || self.wildcards.iter().any(|p| matches_wildcard(p, &host))
    }

    /// Number of entries in the list
    pub fn len(&self) -> usize {
        self.exact.len() + self.wildcards.len()
    }

    /// Returns true if nothing is excluded
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Cleans a single exclusion-file line into a bare domain
fn parse_exclusion_line(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let lower = line.to_lowercase();
    let without_scheme = lower
        .strip_prefix("https://")
        .or_else(|| lower.strip_prefix("http://"))
        .unwrap_or(&lower);
    let without_www = without_scheme.strip_prefix("www.").unwrap_or(without_scheme);
    let domain = without_www.split('/').next().unwrap_or_default().trim();

    if domain.is_empty() {
        None
    } else {
        Some(domain.to_string())
    }
}
