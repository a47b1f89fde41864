use thiserror::Error;
use url::Url;

/// Errors that can occur while validating a configured feed URL.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// The URL has no host component.
    #[error("URL has no host")]
    MissingHost,
}

/// Validates a URL string for use as a polled feed.
///
/// Feeds are configured by the operator, so local and private hosts are
/// accepted (a self-hosted bridge on the LAN is a normal setup). Only the
/// shape is checked: an absolute `http`/`https` URL with a host.
///
/// # Examples
///
/// ```
/// use pingtube::util::validate_feed_url;
///
/// assert!(validate_feed_url("https://www.youtube.com/feeds/videos.xml?channel_id=UC1").is_ok());
/// assert!(validate_feed_url("file:///etc/passwd").is_err());
/// assert!(validate_feed_url("not a url").is_err());
/// ```
pub fn validate_feed_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str)?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(UrlValidationError::MissingHost),
    }
}
