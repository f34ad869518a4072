use crate::UrlError;
use url::Url;

/// Parses and checks an HTTP(S) URL
///
/// # Rules
///
/// 1. The raw string must be at most `max_len` characters
/// 2. It must parse as an absolute URL
/// 3. The scheme must be `http` or `https`
/// 4. A host must be present
///
/// # Examples
///
/// ```
/// use fundwatch::url::parse_http_url;
///
/// assert!(parse_http_url("https://example.com/funding.json", 1024).is_ok());
/// assert!(parse_http_url("ftp://example.com/funding.json", 1024).is_err());
/// assert!(parse_http_url("https://example.com/funding.json", 10).is_err());
/// ```
pub fn parse_http_url(raw: &str, max_len: usize) -> Result<Url, UrlError> {
    if raw.chars().count() > max_len {
        return Err(UrlError::TooLong { max: max_len });
    }

    let url = Url::parse(raw).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingHost);
    }

    Ok(url)
}
