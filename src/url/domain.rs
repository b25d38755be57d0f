use url::Url;

/// Extracts the domain from a URL
///
/// This function retrieves the host portion of a URL and converts it to lowercase.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use quarry::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Returns the lowercase `host[:port]` of a URL
///
/// This is the key used for per-domain throttling and page caps, so two
/// servers on one host but different ports are paced independently.
pub fn netloc(url: &Url) -> Option<String> {
    let host = extract_domain(url)?;
    Some(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host,
    })
}

/// Parses a URL string and returns its netloc, if any
pub fn domain_of(url: &str) -> Option<String> {
    Url::parse(url).ok().as_ref().and_then(netloc)
}

/// Strips the port and a leading `www.` from a host or netloc
pub fn bare_host(netloc: &str) -> String {
    let lower = netloc.to_lowercase();
    let host = match lower.rsplit_once(':') {
        Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) => host,
        _ => lower.as_str(),
    };
    host.strip_prefix("www.").unwrap_or(host).to_string()
}

/// Reduces a host to its last two labels (`blog.reuters.com` → `reuters.com`)
///
/// This is a deliberately simple registrable-domain approximation; it treats
/// `bbc.co.uk` as `co.uk`.
pub fn base_domain(host: &str) -> String {
    let host = bare_host(host);
    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() >= 2 {
        labels[labels.len() - 2..].join(".")
    } else {
        host
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_subdomain() {
        let url = Url::parse("https://blog.example.com/post").unwrap();
        assert_eq!(extract_domain(&url), Some("blog.example.com".to_string()));
    }

    #[test]
    fn test_extract_mixed_case() {
        let url = Url::parse("https://Example.COM/").unwrap();
        assert_eq!(extract_domain(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_netloc_keeps_explicit_port() {
        let url = Url::parse("http://127.0.0.1:8080/page").unwrap();
        assert_eq!(netloc(&url), Some("127.0.0.1:8080".to_string()));

        // Default ports are not reported by the url crate
        let url = Url::parse("https://example.com:443/").unwrap();
        assert_eq!(netloc(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_domain_of_invalid() {
        assert_eq!(domain_of("not a url"), None);
        assert_eq!(domain_of("https://News.Example.com/a"), Some("news.example.com".to_string()));
    }

    #[test]
    fn test_bare_host() {
        assert_eq!(bare_host("www.example.com:8080"), "example.com");
        assert_eq!(bare_host("WWW.Example.com"), "example.com");
        assert_eq!(bare_host("api.example.com"), "api.example.com");
    }

    #[test]
    fn test_base_domain() {
        assert_eq!(base_domain("blog.reuters.com"), "reuters.com");
        assert_eq!(base_domain("reuters.com"), "reuters.com");
        assert_eq!(base_domain("www.a.b.example.org:8443"), "example.org");
        assert_eq!(base_domain("localhost"), "localhost");
    }
}
