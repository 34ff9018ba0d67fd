//! Crawler module for web page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with transient/fatal error classification
//! - Link extraction from HTML anchors and inline scripts
//! - Sitemap seeding
//! - Cooperative cancellation and progress reporting
//! - The per-job orchestrator state machine

mod cancel;
mod extractor;
mod fetcher;
mod orchestrator;
mod progress;
mod sitemap;

pub use cancel::CancelSignal;
pub use extractor::extract_links;
pub use fetcher::{build_http_client, fetch_page, is_transient, FetchOutcome};
pub use orchestrator::Orchestrator;
pub use progress::{ProgressCallback, ProgressSnapshot};
pub use sitemap::{discover_seed_urls, parse_sitemap, SitemapDocument};

use crate::config::Config;
use crate::state::JobStatus;
use crate::storage::SqliteStorage;
use crate::CrawlError;
use std::path::Path;
use std::sync::Arc;

/// Runs one job to completion on its own connection
///
/// This is the entry point used by the job service and the CLI. It opens the
/// database, builds an orchestrator and drives the job until it reaches a
/// terminal state.
///
/// # Arguments
///
/// * `config` - The crawler configuration
/// * `job_id` - An existing job
/// * `cancel` - Stop signal for the run
/// * `on_progress` - Optional per-URL callback
///
/// # Returns
///
/// * `Ok(JobStatus)` - Terminal status reached
/// * `Err(CrawlError)` - Job missing or failed
pub async fn run_job(
    config: Arc<Config>,
    job_id: &str,
    cancel: CancelSignal,
    on_progress: Option<ProgressCallback>,
) -> Result<JobStatus, CrawlError> {
    let storage = SqliteStorage::new(Path::new(&config.storage.database_path))?;
    let mut orchestrator = Orchestrator::new(storage, config, cancel)?;
    if let Some(callback) = on_progress {
        orchestrator = orchestrator.with_progress_callback(callback);
    }
    orchestrator.run(job_id).await
}
