use thiserror::Error;
use url::Url;

/// Errors from URL validation.
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
    /// A plain-http API base that is not a loopback address.
    #[error("API base must use https (plain http is only allowed for loopback hosts)")]
    InsecureApiBase,
}

/// Validates a URL for storage as an article location.
///
/// Only the scheme and host are policed: `javascript:`, `data:`, `file:`
/// and friends must never enter the store, but intranet and loopback hosts
/// are legitimate article locations, so no address-range filtering happens
/// here.
///
/// # Examples
///
/// ```
/// use dogear::util::validate_article_url;
///
/// let url = validate_article_url("https://example.com/post/42").unwrap();
/// assert_eq!(url.domain(), Some("example.com"));
///
/// assert!(validate_article_url("javascript:alert(1)").is_err());
/// assert!(validate_article_url("file:///etc/passwd").is_err());
/// ```
pub fn validate_article_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str)?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    if url.host_str().is_none() {
        return Err(UrlValidationError::MissingHost);
    }

    Ok(url)
}

/// Validates the base URL the API client will send credentials to.
///
/// Bearer tokens ride on every request, so the base must be https; plain
/// http is tolerated only for loopback hosts (a dev server on
/// `http://127.0.0.1:3000` or `http://localhost`).
pub fn validate_api_base(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = validate_article_url(url_str)?;

    if url.scheme() == "http" && !is_loopback_host(&url) {
        return Err(UrlValidationError::InsecureApiBase);
    }

    Ok(url)
}

fn is_loopback_host(url: &Url) -> bool {
    match url.host() {
        Some(url::Host::Domain(domain)) => domain == "localhost",
        Some(url::Host::Ipv4(ip)) => ip.is_loopback(),
        Some(url::Host::Ipv6(ip)) => ip.is_loopback(),
        None => false,
    }
}
