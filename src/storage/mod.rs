//! Storage module for persisting crawl data
//!
//! This module handles all database operations for the crawler, including:
//! - SQLite database initialization and schema management
//! - Job records (status, progress counters, cancellation flag)
//! - The per-job frontier used as the work queue
//! - The per-job link graph (nodes and edges)
//!
//! Every row is scoped by job id; no query crosses jobs.

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{
    FrontierStore, GraphStore, JobStore, Storage, StorageError, StorageResult,
    TransactionalStorage,
};

use crate::state::JobStatus;
use crate::url::LinkScope;
use serde::Serialize;

/// A crawl job as stored in the database
#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub id: String,
    pub seed_url: String,
    pub status: JobStatus,
    pub total_urls: u64,
    pub processed_urls: u64,
    pub created_at: String,
    pub finished_at: Option<String>,
    pub error_message: Option<String>,
    pub cancel_requested: bool,
}

impl JobRecord {
    /// processed / total * 100, or 0 when nothing has been discovered yet
    pub fn progress_percent(&self) -> f64 {
        progress_percent(self.processed_urls, self.total_urls)
    }
}

/// Progress percentage rounded to two decimals
pub fn progress_percent(processed: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let percent = processed as f64 / total as f64 * 100.0;
    (percent * 100.0).round() / 100.0
}

/// A page in a job's graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRecord {
    pub id: i64,
    pub job_id: String,
    pub url: String,
    pub is_external: bool,
    pub status_code: Option<u16>,
}

/// A link between two pages of the same job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeRecord {
    pub id: i64,
    pub job_id: String,
    pub source_id: i64,
    pub target_id: i64,
    pub link_type: LinkType,
}

/// Kind of link an edge represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkType {
    Hyperlink,
}

impl LinkType {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Hyperlink => "hyperlink",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "hyperlink" => Some(Self::Hyperlink),
            _ => None,
        }
    }
}

/// A normalized URL together with its classification, ready to be stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredUrl {
    pub url: String,
    pub scope: LinkScope,
}

impl DiscoveredUrl {
    pub fn new(url: impl Into<String>, scope: LinkScope) -> Self {
        Self {
            url: url.into(),
            scope,
        }
    }
}
