use std::net::IpAddr;
use thiserror::Error;
use url::Url;

/// Errors produced while validating a feed or server URL.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    #[error("URL has no host")]
    MissingHost,
    /// Credentials would travel in clear text to a remote host.
    #[error("Refusing to send credentials over plain HTTP to {0}")]
    InsecureServer(String),
}

/// Validates a feed URL typed by the user before it is sent to the server.
///
/// The server does the actual fetching, so only the shape is checked here.
/// A bare host such as `example.com/feed.xml` is accepted and given an
/// `https://` scheme.
///
/// ```
/// use feedtree::util::validate_feed_url;
///
/// let url = validate_feed_url("example.com/feed.xml").unwrap();
/// assert_eq!(url.as_str(), "https://example.com/feed.xml");
/// assert!(validate_feed_url("ftp://example.com/feed").is_err());
/// ```
pub fn validate_feed_url(input: &str) -> Result<Url, UrlValidationError> {
    let input = input.trim();
    let url = match Url::parse(input) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(&format!("https://{input}"))?,
        Err(e) => return Err(e.into()),
    };
    check_http(&url)?;
    Ok(url)
}

/// Validates the reader server base URL.
///
/// When `sends_credentials` is set, plain `http` is only allowed for
/// loopback hosts (`localhost`, `127.0.0.0/8`, `::1`).
pub fn validate_server_url(input: &str, sends_credentials: bool) -> Result<Url, UrlValidationError> {
    let url = Url::parse(input.trim())?;
    check_http(&url)?;

    if sends_credentials && url.scheme() == "http" {
        let host = url.host_str().unwrap_or_default();
        if !is_loopback_host(host) {
            return Err(UrlValidationError::InsecureServer(host.to_owned()));
        }
    }
    Ok(url)
}

fn check_http(url: &Url) -> Result<(), UrlValidationError> {
    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }
    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(()),
        _ => Err(UrlValidationError::MissingHost),
    }
}

fn is_loopback_host(host: &str) -> bool {
    if host.eq_ignore_ascii_case("localhost") {
        return true;
    }
    // IPv6 hosts come back bracketed from host_str()
    let bare = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    bare.parse::<IpAddr>().is_ok_and(|ip| ip.is_loopback())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_url_accepts_http_and_https() {
        assert!(validate_feed_url("https://example.com/feed.xml").is_ok());
        assert!(validate_feed_url("http://news.example.org").is_ok());
    }

    #[test]
    fn test_feed_url_adds_scheme_to_bare_host() {
        let url = validate_feed_url("  blog.example.com/rss  ").unwrap();
        assert_eq!(url.scheme(), "https");
        assert_eq!(url.host_str(), Some("blog.example.com"));
    }

    #[test]
    fn test_feed_url_rejects_other_schemes() {
        assert!(matches!(
            validate_feed_url("file:///etc/passwd"),
            Err(UrlValidationError::UnsupportedScheme(_))
        ));
        assert!(validate_feed_url("ftp://example.com").is_err());
    }

    #[test]
    fn test_feed_url_rejects_empty() {
        assert!(validate_feed_url("").is_err());
        assert!(validate_feed_url("   ").is_err());
    }

    #[test]
    fn test_server_url_plain_http_without_credentials() {
        assert!(validate_server_url("http://reader.example.com", false).is_ok());
    }

    #[test]
    fn test_server_url_plain_http_with_credentials() {
        assert!(matches!(
            validate_server_url("http://reader.example.com", true),
            Err(UrlValidationError::InsecureServer(_))
        ));
        assert!(validate_server_url("https://reader.example.com", true).is_ok());
    }

    #[test]
    fn test_server_url_loopback_allowed_with_credentials() {
        assert!(validate_server_url("http://localhost:8080/api", true).is_ok());
        assert!(validate_server_url("http://127.0.0.1:9000", true).is_ok());
        assert!(validate_server_url("http://[::1]:9000", true).is_ok());
    }
}
