//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with proper user agent strings
//! - GET requests to fetch page content
//! - Error classification (transient per-URL failures vs fatal errors)

use crate::config::{CrawlerConfig, UserAgentConfig};
use crate::CrawlError;
use reqwest::{redirect::Policy, Client};
use tracing::debug;

/// Maximum number of redirects followed for a single fetch
const MAX_REDIRECTS: usize = 10;

/// Result of a fetch operation
#[derive(Debug)]
pub enum FetchOutcome {
    /// A response was received (any status code)
    Page {
        /// Final URL after redirects
        final_url: String,
        /// HTTP status code
        status_code: u16,
        /// Page body content
        body: String,
    },

    /// The URL could not be reached (timeout, connect/TLS failure, redirect loop)
    ///
    /// The crawl treats this as an empty page and moves on.
    Unreachable {
        /// Error description
        reason: String,
    },
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `user_agent` - The user agent configuration
/// * `crawler` - Crawler settings (supplies the per-request timeout)
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use crawl_graph::config::Config;
/// use crawl_graph::crawler::build_http_client;
///
/// let config = Config::default();
/// let client = build_http_client(&config.user_agent, &config.crawler).unwrap();
/// ```
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    crawler: &CrawlerConfig,
) -> Result<Client, reqwest::Error> {
    // Format: CrawlerName/Version (+ContactURL)
    Client::builder()
        .user_agent(user_agent.header_value())
        .timeout(crawler.fetch_timeout())
        .connect_timeout(crawler.fetch_timeout())
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches a single page
///
/// Non-2xx responses are still pages: their status is recorded and their body
/// is scanned for links like any other.
///
/// # Error Classification
///
/// | Condition | Result |
/// |-----------|--------|
/// | Any HTTP response | `Ok(Page)` |
/// | Timeout (connect, headers or body) | `Ok(Unreachable)` |
/// | Connection refused / DNS / TLS failure | `Ok(Unreachable)` |
/// | Redirect loop or chain > 10 | `Ok(Unreachable)` |
/// | Anything else | `Err(CrawlError::Http)` |
///
/// # Arguments
///
/// * `client` - The HTTP client to use
/// * `url` - The URL to fetch
pub async fn fetch_page(client: &Client, url: &str) -> Result<FetchOutcome, CrawlError> {
    let response = match client.get(url).send().await {
        Ok(response) => response,
        Err(e) => return classify_error(url, e),
    };

    let status_code = response.status().as_u16();
    let final_url = response.url().to_string();

    match response.text().await {
        Ok(body) => {
            debug!("Fetched {} -> {} ({} bytes)", url, status_code, body.len());
            Ok(FetchOutcome::Page {
                final_url,
                status_code,
                body,
            })
        }
        Err(e) => classify_error(url, e),
    }
}

/// Returns true for failures that only affect the URL being fetched
pub fn is_transient(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_redirect()
}

fn classify_error(url: &str, error: reqwest::Error) -> Result<FetchOutcome, CrawlError> {
    if is_transient(&error) {
        let reason = if error.is_timeout() {
            format!("Request timeout: {}", error)
        } else if error.is_redirect() {
            format!("Redirect error: {}", error)
        } else {
            format!("Connection failed: {}", error)
        };
        return Ok(FetchOutcome::Unreachable { reason });
    }

    Err(CrawlError::Http {
        url: url.to_string(),
        source: error,
    })
}
