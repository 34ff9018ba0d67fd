//! Sitemap seeding
//!
//! Probes the well-known sitemap locations of a site and expands sitemap index
//! files into page URLs. Every failure is tolerated; when nothing is found the
//! base URL itself is the only seed.

use crate::CrawlError;
use quick_xml::events::Event as XmlEvent;
use quick_xml::Reader;
use reqwest::Client;
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, info, warn};
use url::Url;

/// Paths probed on the base URL, in order
const PROBE_PATHS: [&str; 3] = ["/", "/sitemap.xml", "/sitemap_index.xml"];

/// What a fetched document turned out to be
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SitemapDocument {
    /// `<urlset>`: page URLs
    UrlSet(Vec<String>),
    /// `<sitemapindex>`: URLs of further sitemaps
    Index(Vec<String>),
    /// Anything else (HTML, empty body, unrelated XML)
    NotASitemap,
}

/// Parses a sitemap or sitemap index
///
/// `<loc>` values are resolved against `source_url` so relative entries still
/// produce absolute URLs.
pub fn parse_sitemap(source_url: &Url, xml: &[u8]) -> Result<SitemapDocument, CrawlError> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut in_loc = false;
    let mut locs = Vec::new();
    let mut saw_urlset = false;
    let mut saw_index = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(XmlEvent::Start(e)) => {
                let name = e.name();
                if name.as_ref().ends_with(b"urlset") {
                    saw_urlset = true;
                } else if name.as_ref().ends_with(b"sitemapindex") {
                    saw_index = true;
                } else if name.as_ref().ends_with(b"loc") {
                    in_loc = true;
                }
            }
            Ok(XmlEvent::End(e)) => {
                if e.name().as_ref().ends_with(b"loc") {
                    in_loc = false;
                }
            }
            Ok(XmlEvent::Text(t)) if in_loc => {
                let text = t.unescape().map_err(|e| CrawlError::Sitemap {
                    url: source_url.to_string(),
                    message: e.to_string(),
                })?;
                if let Ok(resolved) = source_url.join(text.trim()) {
                    locs.push(resolved.to_string());
                }
            }
            Ok(XmlEvent::Eof) => break,
            Err(e) => {
                // Not well-formed: keep what was read if this is a sitemap at all
                debug!("Stopped reading {} at XML error: {}", source_url, e);
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(if saw_index && !saw_urlset {
        SitemapDocument::Index(locs)
    } else if saw_urlset {
        SitemapDocument::UrlSet(locs)
    } else {
        SitemapDocument::NotASitemap
    })
}

/// Collects seed URLs for a site from its sitemaps
///
/// # Arguments
///
/// * `client` - HTTP client
/// * `base_url` - The crawl's seed URL
/// * `max_depth` - How many levels of sitemap index nesting to follow
///
/// # Returns
///
/// A de-duplicated set of page URLs, or `{base_url}` if no sitemap yields any
pub async fn discover_seed_urls(client: &Client, base_url: &Url, max_depth: u32) -> BTreeSet<String> {
    let mut pages = BTreeSet::new();
    let mut fetched: HashSet<String> = HashSet::new();
    let mut pending: Vec<(Url, u32)> = PROBE_PATHS
        .iter()
        .rev()
        .filter_map(|p| base_url.join(p).ok())
        .map(|url| (url, 0))
        .collect();

    while let Some((sitemap_url, depth)) = pending.pop() {
        if !fetched.insert(sitemap_url.to_string()) {
            continue;
        }

        let document = match fetch_document(client, &sitemap_url).await {
            Ok(Some(body)) => match parse_sitemap(&sitemap_url, &body) {
                Ok(document) => document,
                Err(e) => {
                    warn!("{}", e);
                    continue;
                }
            },
            Ok(None) => continue,
            Err(e) => {
                warn!("Sitemap probe failed for {}: {}", sitemap_url, e);
                continue;
            }
        };

        match document {
            SitemapDocument::UrlSet(urls) => {
                debug!("{} lists {} URLs", sitemap_url, urls.len());
                pages.extend(urls);
            }
            SitemapDocument::Index(children) if depth < max_depth => {
                debug!("{} indexes {} sitemaps", sitemap_url, children.len());
                pending.extend(
                    children
                        .iter()
                        .rev()
                        .filter_map(|c| Url::parse(c).ok())
                        .map(|url| (url, depth + 1)),
                );
            }
            SitemapDocument::Index(_) => {
                warn!(
                    "Not following sitemap index {}: nesting deeper than {}",
                    sitemap_url, max_depth
                );
            }
            SitemapDocument::NotASitemap => {}
        }
    }

    if pages.is_empty() {
        info!("No sitemap URLs found for {}, seeding with base URL", base_url);
        pages.insert(base_url.to_string());
    } else {
        info!("Sitemaps for {} list {} URLs", base_url, pages.len());
    }

    pages
}

/// Fetches a body, returning `None` for non-success statuses
async fn fetch_document(client: &Client, url: &Url) -> Result<Option<Vec<u8>>, reqwest::Error> {
    let response = client.get(url.clone()).send().await?;
    if !response.status().is_success() {
        debug!("{} returned HTTP {}", url, response.status());
        return Ok(None);
    }
    Ok(Some(response.bytes().await?.to_vec()))
}
