//! Job status reports

use crate::state::JobStatus;
use crate::storage::{JobRecord, Storage};
use crate::CrawlError;
use serde::Serialize;

/// Status of one job as shown to users
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub job_id: String,
    pub seed_url: String,
    pub status: JobStatus,
    pub processed_urls: u64,
    pub total_urls: u64,
    pub progress_percent: f64,
    pub internal_nodes: u64,
    pub external_nodes: u64,
    pub edges: u64,
    pub created_at: String,
    pub finished_at: Option<String>,
    pub error_message: Option<String>,
}

/// Builds the report for a job
///
/// # Returns
///
/// * `Ok(Some(JobReport))` - The job exists
/// * `Ok(None)` - No job with this id
pub fn load_report(store: &dyn Storage, job_id: &str) -> Result<Option<JobReport>, CrawlError> {
    match store.get_job(job_id)? {
        Some(job) => Ok(Some(report_for(store, job)?)),
        None => Ok(None),
    }
}

/// Builds reports for every job, newest first
pub fn load_all_reports(store: &dyn Storage) -> Result<Vec<JobReport>, CrawlError> {
    store
        .list_jobs()?
        .into_iter()
        .map(|job| report_for(store, job))
        .collect()
}

fn report_for(store: &dyn Storage, job: JobRecord) -> Result<JobReport, CrawlError> {
    let nodes = store.count_nodes(&job.id)?;
    let external_nodes = store.count_external_nodes(&job.id)?;
    let edges = store.count_edges(&job.id)?;

    Ok(JobReport {
        progress_percent: job.progress_percent(),
        job_id: job.id,
        seed_url: job.seed_url,
        status: job.status,
        processed_urls: job.processed_urls,
        total_urls: job.total_urls,
        internal_nodes: nodes.saturating_sub(external_nodes),
        external_nodes,
        edges,
        created_at: job.created_at,
        finished_at: job.finished_at,
        error_message: job.error_message,
    })
}

/// Prints a report to stdout
pub fn print_report(report: &JobReport) {
    println!("=== Crawl Job {} ===\n", report.job_id);

    println!("Overview:");
    println!("  Seed URL: {}", report.seed_url);
    println!("  Status: {}", report.status);
    println!(
        "  Progress: {:.1}% ({} / {} URLs)",
        report.progress_percent, report.processed_urls, report.total_urls
    );
    println!();

    println!("Graph:");
    println!("  Internal pages: {}", report.internal_nodes);
    println!("  External links: {}", report.external_nodes);
    println!("  Edges: {}", report.edges);
    println!();

    println!("Created: {}", report.created_at);
    if let Some(finished) = &report.finished_at {
        println!("Finished: {}", finished);
    }
    if let Some(error) = &report.error_message {
        println!("Error: {}", error);
    }
}

/// Prints one line per job
pub fn print_job_list(reports: &[JobReport]) {
    if reports.is_empty() {
        println!("No crawl jobs found");
        return;
    }

    for report in reports {
        println!(
            "{}  {:<9}  {:>6.1}%  {}  {}",
            report.job_id, report.status, report.progress_percent, report.created_at, report.seed_url
        );
    }
}
