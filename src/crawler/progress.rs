//! Progress reporting for a running job

use crate::storage::progress_percent;
use serde::Serialize;
use std::sync::Arc;

/// Callback invoked after every processed URL
pub type ProgressCallback = Arc<dyn Fn(&ProgressSnapshot) + Send + Sync>;

/// State of a job right after one URL was processed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    pub job_id: String,
    pub current_url: String,
    pub processed: u64,
    pub total: u64,
    pub percent: f64,
}

impl ProgressSnapshot {
    pub fn new(job_id: &str, current_url: &str, processed: u64, total: u64) -> Self {
        Self {
            job_id: job_id.to_string(),
            current_url: current_url.to_string(),
            processed,
            total,
            percent: progress_percent(processed, total),
        }
    }
}
