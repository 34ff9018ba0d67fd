//! Link extraction from fetched pages
//!
//! Two sources are unioned:
//! - `<a href>` attributes
//! - quoted URLs assigned in inline `<script>` bodies (`window.location = "..."`,
//!   `fetch: '...'` and similar). This is a pattern scan, not a JavaScript parser.
//!
//! Links are returned raw (possibly relative); resolution happens later.

use regex::Regex;
use scraper::{Html, Selector};
use std::collections::BTreeSet;
use std::sync::OnceLock;

/// Matches `window.location|href|fetch|axios.get|url` followed by `=` or `:`
/// and a quoted string
fn script_link_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?:window\.location|href|fetch|axios\.get|url)\s*[=:]\s*['"]([^'"]+)"#)
            .expect("script link pattern is a valid regex")
    })
}

/// Extracts raw link targets from an HTML document
///
/// # Arguments
///
/// * `html` - The page body
/// * `page_url` - The URL the page was requested as; an anchor whose href is
///   exactly this string is a self-link and is skipped
///
/// # Returns
///
/// The set of raw link strings, in sorted order
///
/// # Example
///
/// ```
/// use crawl_graph::crawler::extract_links;
///
/// let html = r##"<a href="/about">About</a><a href="#">Top</a>"##;
/// let links = extract_links(html, "https://example.com");
/// assert_eq!(links.into_iter().collect::<Vec<_>>(), vec!["/about".to_string()]);
/// ```
pub fn extract_links(html: &str, page_url: &str) -> BTreeSet<String> {
    let document = Html::parse_document(html);
    let mut links = BTreeSet::new();

    links.extend(anchor_links(&document, page_url));
    links.extend(script_links(&document));

    links
}

fn anchor_links(document: &Html, page_url: &str) -> Vec<String> {
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter_map(|element| element.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty() && *href != "#" && *href != page_url)
        .map(str::to_string)
        .collect()
}

fn script_links(document: &Html) -> Vec<String> {
    let Ok(selector) = Selector::parse("script") else {
        return Vec::new();
    };

    let pattern = script_link_pattern();
    let mut links = Vec::new();

    for script in document.select(&selector) {
        let body: String = script.text().collect();
        for captures in pattern.captures_iter(&body) {
            if let Some(link) = captures.get(1) {
                links.push(link.as_str().to_string());
            }
        }
    }

    links
}
