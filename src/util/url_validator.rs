use thiserror::Error;
use url::Url;

/// Errors that can occur while validating a feed link.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The link string could not be parsed as an absolute URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The link uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// The link parsed but names no host.
    #[error("URL has no host: {0}")]
    MissingHost(String),
}

/// Validates a feed link before it is registered.
///
/// Only the shape of the link is checked: it must be an absolute `http` or
/// `https` URL with a host. Reachability is left to the fetch itself.
///
/// # Examples
///
/// ```
/// use feedmill::util::validate_feed_link;
///
/// let url = validate_feed_link("https://example.com/feed.xml").unwrap();
/// assert_eq!(url.host_str(), Some("example.com"));
///
/// assert!(validate_feed_link("file:///etc/passwd").is_err());
/// assert!(validate_feed_link("example.com/rss").is_err());
/// ```
pub fn validate_feed_link(link: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(link)?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(UrlValidationError::MissingHost(link.to_owned())),
    }
}
