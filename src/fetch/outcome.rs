use std::collections::HashMap;
use thiserror::Error;

/// Why a fetch did not produce content
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// robots.txt forbids the URL; never retried
    #[error("robots.txt disallowed")]
    PolicyDenied,

    /// HTTP 429 survived the single fingerprint-rotated retry
    #[error("HTTP 429 rate limited")]
    RateLimited,

    /// HTTP 403 survived the single fingerprint-rotated retry
    #[error("HTTP 403 forbidden")]
    Forbidden,

    /// HTTP 5xx
    #[error("HTTP {0} server error")]
    ServerError(u16),

    /// Any other non-200 status
    #[error("HTTP {0}")]
    HttpStatus(u16),

    /// Timeout, connection failure, or an unusable URL
    #[error("transport error: {0}")]
    Transport(String),
}

/// Response content, either decoded text or raw bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    Text(String),
    Bytes(Vec<u8>),
}

/// Final result of one logical fetch
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    /// The requested URL
    pub url: String,

    /// HTTP status code; 0 when no response was received
    pub status: u16,

    /// Response content on success
    pub body: Option<Body>,

    /// Lowercased Content-Type header value
    pub content_type: String,

    /// Error classification on failure
    pub error: Option<FetchError>,

    /// Response headers of the final attempt
    pub headers: HashMap<String, String>,
}

impl FetchOutcome {
    /// Creates an outcome for a fetch that never got an HTTP response
    pub fn failed(url: &str, error: FetchError) -> Self {
        Self {
            url: url.to_string(),
            status: 0,
            body: None,
            content_type: String::new(),
            error: Some(error),
            headers: HashMap::new(),
        }
    }

    /// Returns true if the fetch produced content
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.body.is_some()
    }

    /// Decoded text body, if the response was text
    pub fn text(&self) -> Option<&str> {
        match &self.body {
            Some(Body::Text(text)) => Some(text),
            _ => None,
        }
    }

    /// Raw body, if the response was binary
    pub fn bytes(&self) -> Option<&[u8]> {
        match &self.body {
            Some(Body::Bytes(bytes)) => Some(bytes),
            _ => None,
        }
    }

    /// Returns true if the body is HTML-like text
    pub fn is_html(&self) -> bool {
        self.text().is_some()
            && (self.content_type.is_empty()
                || self.content_type.contains("html")
                || self.content_type.contains("xml"))
    }

    /// Parsed numeric `Retry-After` header, in seconds
    pub fn retry_after(&self) -> Option<f64> {
        self.headers.get("retry-after").and_then(|v| parse_retry_after(v))
    }
}

/// Parses a numeric `Retry-After` value
///
/// HTTP-date values are ignored.
pub fn parse_retry_after(value: &str) -> Option<f64> {
    let value = value.trim();
    if value.is_empty() || !value.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return None;
    }
    value.parse::<f64>().ok().filter(|secs| secs.is_finite())
}

/// Returns true if a response should be kept as raw bytes
pub fn is_pdf(url: &str, content_type: &str) -> bool {
    content_type.contains("application/pdf") || url.to_lowercase().ends_with(".pdf")
}
