//! Crawl orchestrator - drives one job from seed to a terminal state
//!
//! This module contains the main crawl loop, including:
//! - Seeding the frontier from the site's sitemaps
//! - Pulling batches of pending URLs from the stored frontier
//! - Robots checks, crawl delay, fetching and link extraction
//! - Writing each processed URL's graph changes as one unit of work
//! - Cancellation checkpoints and terminal status bookkeeping

use crate::config::Config;
use crate::crawler::cancel::CancelSignal;
use crate::crawler::extractor::extract_links;
use crate::crawler::fetcher::{build_http_client, fetch_page, FetchOutcome};
use crate::crawler::progress::{ProgressCallback, ProgressSnapshot};
use crate::crawler::sitemap::discover_seed_urls;
use crate::robots::RobotsGate;
use crate::state::JobStatus;
use crate::storage::{DiscoveredUrl, JobRecord, LinkType, NodeRecord, TransactionalStorage};
use crate::url::{classify_link, extract_domain, normalize_url, resolve_link};
use crate::{CrawlError, UrlError};
use reqwest::Client;
use std::collections::BTreeSet;
use std::sync::Arc;
use url::Url;

/// What happened to one frontier entry
enum Resolution {
    /// Fetched; the status is recorded and the targets linked
    Fetched {
        status_code: u16,
        targets: Vec<DiscoveredUrl>,
    },
    /// External, disallowed or unreachable: closed without a status
    Skipped,
    /// Stop requested during the crawl delay: left pending
    Interrupted,
}

/// Runs crawl jobs against a transactional store
pub struct Orchestrator<S: TransactionalStorage> {
    storage: S,
    client: Client,
    config: Arc<Config>,
    cancel: CancelSignal,
    on_progress: Option<ProgressCallback>,
}

impl<S: TransactionalStorage> Orchestrator<S> {
    /// Creates a new orchestrator
    ///
    /// # Arguments
    ///
    /// * `storage` - Store owned by this orchestrator for the whole run
    /// * `config` - Crawler configuration
    /// * `cancel` - Signal polled at every checkpoint
    ///
    /// # Returns
    ///
    /// * `Ok(Orchestrator)` - Ready to run
    /// * `Err(CrawlError)` - The HTTP client could not be built
    pub fn new(storage: S, config: Arc<Config>, cancel: CancelSignal) -> Result<Self, CrawlError> {
        let client = build_http_client(&config.user_agent, &config.crawler)?;
        Ok(Self {
            storage,
            client,
            config,
            cancel,
            on_progress: None,
        })
    }

    /// Registers a callback invoked after every processed URL
    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.on_progress = Some(callback);
        self
    }

    /// Runs a job to a terminal state
    ///
    /// A `pending` job is seeded and started; a `running` job resumes from its
    /// stored frontier; a terminal job is left untouched.
    ///
    /// # Returns
    ///
    /// * `Ok(JobStatus)` - The job's status when the run ended (`completed` or
    ///   `aborted`, or the existing terminal status)
    /// * `Err(CrawlError)` - The job does not exist, or a fatal error occurred
    ///   (the job is marked `failed` first)
    pub async fn run(mut self, job_id: &str) -> Result<JobStatus, CrawlError> {
        let job = self
            .storage
            .autocommit()
            .get_job(job_id)?
            .ok_or_else(|| CrawlError::JobNotFound(job_id.to_string()))?;

        if job.status.is_terminal() {
            tracing::info!("Job {} is already {}, nothing to do", job_id, job.status);
            return Ok(job.status);
        }

        match self.crawl(&job).await {
            Ok(status) => Ok(status),
            Err(e) => {
                tracing::error!("Job {} failed: {}", job_id, e);
                let message = e.to_string();
                if let Err(store_err) = self.storage.autocommit().transition_job(
                    job_id,
                    JobStatus::Failed,
                    Some(&message),
                ) {
                    tracing::error!("Could not record failure of job {}: {}", job_id, store_err);
                }
                Err(e)
            }
        }
    }

    async fn crawl(&mut self, job: &JobRecord) -> Result<JobStatus, CrawlError> {
        let job_id = job.id.as_str();
        let seed = Url::parse(&job.seed_url)?;
        let root_domain = extract_domain(&seed)
            .ok_or_else(|| UrlError::MissingHost(job.seed_url.clone()))?;

        let robots = RobotsGate::fetch(
            &self.client,
            &seed,
            &self.config.user_agent.crawler_name,
            self.config.crawler.default_crawl_delay(),
        )
        .await;

        if job.status == JobStatus::Pending {
            if !self.start(job_id, &root_domain, &seed).await? {
                return self.stored_status(job_id);
            }
        } else {
            tracing::info!("Resuming job {} from its stored frontier", job_id);
        }

        let batch_size = self.config.crawler.batch_size as usize;

        loop {
            if self.cancel_requested(job_id)? {
                return self.finish(job_id, JobStatus::Aborted);
            }

            let batch = self.storage.autocommit().next_batch(job_id, batch_size)?;
            if batch.is_empty() {
                return self.finish(job_id, JobStatus::Completed);
            }
            tracing::debug!("Job {}: processing batch of {}", job_id, batch.len());

            for node in &batch {
                if self.cancel_requested(job_id)? {
                    return self.finish(job_id, JobStatus::Aborted);
                }
                self.process_node(job_id, &root_domain, &robots, node)
                    .await?;
            }
        }
    }

    /// Seeds the frontier and moves the job to `running`
    ///
    /// Returns false if the job could not be started (it was stopped first).
    async fn start(
        &mut self,
        job_id: &str,
        root_domain: &str,
        seed: &Url,
    ) -> Result<bool, CrawlError> {
        let max_depth = self.config.crawler.max_sitemap_depth;
        let seeds = discover_seed_urls(&self.client, seed, max_depth).await;
        let discovered = classify_seeds(root_domain, &seeds);

        let started = self.storage.unit_of_work(|store| {
            if !store.transition_job(job_id, JobStatus::Running, None)? {
                return Ok(false);
            }
            let enqueued = store.seed(job_id, &discovered)?;
            let total = store.count_nodes(job_id)?;
            store.record_progress(job_id, 0, total)?;
            tracing::info!(
                "Job {} running: {} seed URLs enqueued for {}",
                job_id,
                enqueued,
                root_domain
            );
            Ok(true)
        })?;

        Ok(started)
    }

    async fn process_node(
        &mut self,
        job_id: &str,
        root_domain: &str,
        robots: &RobotsGate,
        node: &NodeRecord,
    ) -> Result<(), CrawlError> {
        let resolution = if node.is_external {
            tracing::debug!("Not fetching external URL {}", node.url);
            Resolution::Skipped
        } else if !robots.is_allowed(&node.url) {
            tracing::debug!("URL {} disallowed by robots.txt", node.url);
            Resolution::Skipped
        } else {
            fetch_and_extract(&self.client, &self.cancel, root_domain, robots, node).await?
        };

        let (status_code, targets) = match resolution {
            Resolution::Fetched {
                status_code,
                targets,
            } => (Some(status_code), targets),
            Resolution::Skipped => (None, Vec::new()),
            Resolution::Interrupted => return Ok(()),
        };

        let (processed, total) = self.storage.unit_of_work(|store| {
            store.mark_visited(job_id, &node.url, status_code)?;

            for target in &targets {
                let target_id =
                    store.upsert_node(job_id, &target.url, target.scope.is_external(), None)?;
                store.upsert_edge(job_id, node.id, target_id, LinkType::Hyperlink)?;
            }

            let internal: Vec<DiscoveredUrl> = targets
                .iter()
                .filter(|t| !t.scope.is_external())
                .cloned()
                .collect();
            store.seed(job_id, &internal)?;

            let processed = store.count_visited(job_id)?;
            let total = store.count_nodes(job_id)?;
            store.record_progress(job_id, processed, total)?;
            Ok((processed, total))
        })?;

        let snapshot = ProgressSnapshot::new(job_id, &node.url, processed, total);
        tracing::info!(
            "[{}] {:.1}% ({}/{}) {}",
            job_id,
            snapshot.percent,
            processed,
            total,
            node.url
        );
        if let Some(callback) = &self.on_progress {
            callback(&snapshot);
        }

        Ok(())
    }

    fn cancel_requested(&self, job_id: &str) -> Result<bool, CrawlError> {
        Ok(self.cancel.is_cancelled(self.storage.autocommit(), job_id)?)
    }

    /// Moves the job to a terminal status and returns what is stored
    ///
    /// If another writer already made the job terminal, that status wins.
    fn finish(&self, job_id: &str, status: JobStatus) -> Result<JobStatus, CrawlError> {
        if self
            .storage
            .autocommit()
            .transition_job(job_id, status, None)?
        {
            tracing::info!("Job {} {}", job_id, status);
        }
        self.stored_status(job_id)
    }

    fn stored_status(&self, job_id: &str) -> Result<JobStatus, CrawlError> {
        self.storage
            .autocommit()
            .get_job(job_id)?
            .map(|job| job.status)
            .ok_or_else(|| CrawlError::JobNotFound(job_id.to_string()))
    }
}

/// Waits out the crawl delay, fetches the page and resolves its links
///
/// Must not borrow the whole orchestrator: its connection is not `Sync`.
async fn fetch_and_extract(
    client: &Client,
    cancel: &CancelSignal,
    root_domain: &str,
    robots: &RobotsGate,
    node: &NodeRecord,
) -> Result<Resolution, CrawlError> {
    let delay = robots.crawl_delay();
    if !delay.is_zero() {
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = cancel.token().cancelled() => {
                tracing::debug!("Crawl delay before {} cut short by stop request", node.url);
                return Ok(Resolution::Interrupted);
            }
        }
    }

    match fetch_page(client, &node.url).await? {
        FetchOutcome::Page {
            final_url,
            status_code,
            body,
        } => {
            let links = extract_links(&body, &node.url);
            let targets = resolve_targets(root_domain, &node.url, &final_url, &links);
            tracing::debug!(
                "{} -> {} ({} links, {} usable)",
                node.url,
                status_code,
                links.len(),
                targets.len()
            );
            Ok(Resolution::Fetched {
                status_code,
                targets,
            })
        }
        FetchOutcome::Unreachable { reason } => {
            tracing::warn!("Skipping {}: {}", node.url, reason);
            Ok(Resolution::Skipped)
        }
    }
}

/// Normalizes and classifies the seed URLs; invalid ones are dropped
fn classify_seeds(root_domain: &str, seeds: &BTreeSet<String>) -> Vec<DiscoveredUrl> {
    let mut seen = BTreeSet::new();
    let mut discovered = Vec::new();

    for raw in seeds {
        match normalize_url(raw) {
            Ok(url) => {
                if seen.insert(url.clone()) {
                    let scope = classify_link(root_domain, &url);
                    discovered.push(DiscoveredUrl::new(url, scope));
                }
            }
            Err(e) => tracing::debug!("Dropping seed {}: {}", raw, e),
        }
    }

    discovered
}

/// Resolves raw links against the page and classifies them
///
/// Relative links are joined against `final_url` (the URL after redirects).
/// Links that cannot be resolved and links back to `page_url` are dropped.
fn resolve_targets(
    root_domain: &str,
    page_url: &str,
    final_url: &str,
    links: &BTreeSet<String>,
) -> Vec<DiscoveredUrl> {
    let mut seen = BTreeSet::new();
    let mut targets = Vec::new();

    for link in links {
        let url = match resolve_link(final_url, link) {
            Ok(url) => url,
            Err(e) => {
                tracing::debug!("Dropping link {:?} on {}: {}", link, page_url, e);
                continue;
            }
        };
        if url == page_url || !seen.insert(url.clone()) {
            continue;
        }
        let scope = classify_link(root_domain, &url);
        targets.push(DiscoveredUrl::new(url, scope));
    }

    targets
}
