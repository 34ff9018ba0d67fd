//! URL handling module
//!
//! This module provides URL normalization, relative link resolution, domain
//! extraction, and internal/external link classification.

mod domain;
mod normalize;

// Re-export main functions
pub use domain::extract_domain;
pub use normalize::{normalize_url, resolve_link};

use url::Url;

/// Whether a link stays on the job's root domain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkScope {
    /// Same domain as the crawl root - recorded and fetched
    Internal,
    /// Any other domain - recorded but never fetched
    External,
}

impl LinkScope {
    /// Returns true if the link points off the root domain
    pub fn is_external(&self) -> bool {
        matches!(self, Self::External)
    }
}

/// Classifies a candidate URL relative to the job's root domain
///
/// This is the only place the internal/external decision is made. A candidate
/// that cannot be parsed or has no host is treated as external, so it is never
/// fetched.
///
/// # Arguments
///
/// * `root_domain` - The root domain, as returned by [`extract_domain`]
/// * `candidate` - The URL to classify (normally a canonical key)
///
/// # Examples
///
/// ```
/// use crawl_graph::url::{classify_link, LinkScope};
///
/// assert_eq!(classify_link("example.com", "https://example.com/a"), LinkScope::Internal);
/// assert_eq!(classify_link("example.com", "https://other.com/x"), LinkScope::External);
/// ```
pub fn classify_link(root_domain: &str, candidate: &str) -> LinkScope {
    let domain = Url::parse(candidate)
        .ok()
        .and_then(|url| extract_domain(&url));

    match domain {
        Some(d) if d == root_domain.to_lowercase() => LinkScope::Internal,
        _ => LinkScope::External,
    }
}
