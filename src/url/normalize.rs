use crate::UrlError;
use url::Url;

/// Tracking query parameters removed from discovered links
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "mc_eid",
];

/// Computes the identity string used for URL deduplication
///
/// The fragment is dropped, the whole string is lowercased, and trailing
/// slashes are removed. This works on raw strings so URLs the `url` crate
/// rejects still get a stable identity.
///
/// # Examples
///
/// ```
/// use quarry::url::url_identity;
///
/// assert_eq!(url_identity("https://EX.com/a/"), "https://ex.com/a");
/// assert_eq!(url_identity("https://ex.com/a#x"), "https://ex.com/a");
/// ```
pub fn url_identity(url: &str) -> String {
    let without_fragment = url.split('#').next().unwrap_or_default();
    without_fragment
        .trim()
        .to_lowercase()
        .trim_end_matches('/')
        .to_string()
}

/// Cleans a discovered link before it enters the frontier
///
/// # Cleaning Steps
///
/// 1. Parse the URL; reject if malformed or not HTTP(S)
/// 2. Lowercase the host (done by the parser)
/// 3. Remove the fragment
/// 4. Remove tracking query parameters, keeping the rest in order
/// 5. Remove an empty query string
///
/// Paths are left untouched; servers are free to treat them case-sensitively.
///
/// # Returns
///
/// * `Ok(Url)` - Cleaned URL
/// * `Err(UrlError)` - Failed to parse or unsupported scheme
pub fn clean_link(url_str: &str) -> Result<Url, UrlError> {
    let mut url = Url::parse(url_str).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    if url.host_str().is_none() {
        return Err(UrlError::MissingDomain);
    }

    url.set_fragment(None);

    if url.query().is_some() {
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| !TRACKING_PARAMS.contains(&key.to_lowercase().as_str()))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        if kept.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(kept);
        }
    }

    Ok(url)
}
