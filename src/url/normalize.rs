use crate::url::extract_domain;
use crate::UrlError;
use url::Url;

/// Normalizes a URL into the canonical key used for deduplication
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Reject anything that is not http:// or https://
/// 3. Keep scheme, lowercase host and non-default port
/// 4. Keep the path with dot segments resolved by the parser
/// 5. Drop query string and fragment
/// 6. Remove every trailing slash (the site root becomes `scheme://host`)
///
/// # Arguments
///
/// * `url_str` - The URL string to normalize
///
/// # Returns
///
/// * `Ok(String)` - The canonical key
/// * `Err(UrlError)` - Failed to parse the URL or unsupported scheme
///
/// # Examples
///
/// ```
/// use crawl_graph::url::normalize_url;
///
/// let key = normalize_url("https://EXAMPLE.com/docs/").unwrap();
/// assert_eq!(key, "https://example.com/docs");
/// ```
pub fn normalize_url(url_str: &str) -> Result<String, UrlError> {
    let url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(format!("{url_str}: {e}")))?;
    canonical_key(&url)
}

/// Resolves a raw (possibly relative) link against the page it was found on
/// and normalizes the result
///
/// `page_url` should be the URL the page was actually served from, so that
/// relative links on directory-style pages resolve the way a browser would.
///
/// # Examples
///
/// ```
/// use crawl_graph::url::resolve_link;
///
/// let key = resolve_link("https://example.com/docs/", "../a/").unwrap();
/// assert_eq!(key, "https://example.com/a");
/// ```
pub fn resolve_link(page_url: &str, raw_link: &str) -> Result<String, UrlError> {
    let base = Url::parse(page_url).map_err(|e| UrlError::Parse(format!("{page_url}: {e}")))?;
    let joined = base
        .join(raw_link.trim())
        .map_err(|e| UrlError::Parse(format!("{raw_link}: {e}")))?;
    canonical_key(&joined)
}

/// Builds `scheme://authority/path` without trailing slashes
fn canonical_key(url: &Url) -> Result<String, UrlError> {
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    let authority = extract_domain(url).ok_or_else(|| UrlError::MissingHost(url.to_string()))?;
    let key = format!("{}://{}{}", url.scheme(), authority, url.path());

    Ok(key.trim_end_matches('/').to_string())
}
