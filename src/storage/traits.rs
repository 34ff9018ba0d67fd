//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types. Operations are split by concern (jobs, frontier,
//! graph) and combined into [`Storage`]; [`TransactionalStorage`] groups a
//! set of operations into one atomic unit of work.

use crate::state::JobStatus;
use crate::storage::{DiscoveredUrl, EdgeRecord, JobRecord, LinkType, NodeRecord};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Node not found in job {job_id}: {url}")]
    NodeNotFound { job_id: String, url: String },

    #[error("Job already exists: {0}")]
    JobExists(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Job records: creation, lookup, status transitions, progress counters
pub trait JobStore {
    // ===== Job Management =====

    /// Creates a new job in `pending` with zeroed counters
    ///
    /// Fails with `JobExists` if the id is already taken.
    fn create_job(&self, job_id: &str, seed_url: &str) -> StorageResult<JobRecord>;

    /// Gets a job by ID
    fn get_job(&self, job_id: &str) -> StorageResult<Option<JobRecord>>;

    /// Lists all jobs, newest first
    fn list_jobs(&self) -> StorageResult<Vec<JobRecord>>;

    /// Moves a job to `next` if the state machine allows it from the
    /// current stored status
    ///
    /// Terminal targets stamp `finished_at`; `error` is stored when given.
    ///
    /// # Returns
    ///
    /// `true` if the row changed, `false` if the job is missing or the
    /// transition is not allowed (for example the job is already terminal)
    fn transition_job(
        &self,
        job_id: &str,
        next: JobStatus,
        error: Option<&str>,
    ) -> StorageResult<bool>;

    /// Overwrites the processed/total counters
    fn record_progress(&self, job_id: &str, processed: u64, total: u64) -> StorageResult<()>;

    /// Sets the durable cancellation flag
    ///
    /// Returns `false` if the job does not exist.
    fn request_cancel(&self, job_id: &str) -> StorageResult<bool>;

    /// Reads the durable cancellation flag
    fn is_cancel_requested(&self, job_id: &str) -> StorageResult<bool>;
}

/// The per-job work queue
pub trait FrontierStore {
    // ===== Frontier =====

    /// Ensures a node exists for every URL and enqueues any not already in
    /// the frontier
    ///
    /// Idempotent: a URL already enqueued (visited or not) is left alone.
    ///
    /// # Returns
    ///
    /// The number of newly enqueued entries
    fn seed(&self, job_id: &str, urls: &[DiscoveredUrl]) -> StorageResult<usize>;

    /// Returns up to `limit` unvisited entries in enqueue order
    fn next_batch(&self, job_id: &str, limit: usize) -> StorageResult<Vec<NodeRecord>>;

    /// Closes the frontier entry for `url` and records its status code
    ///
    /// A `None` status leaves any existing status untouched.
    fn mark_visited(&self, job_id: &str, url: &str, status_code: Option<u16>)
        -> StorageResult<()>;

    /// Counts unvisited entries
    fn count_pending(&self, job_id: &str) -> StorageResult<u64>;

    /// Counts closed entries
    fn count_visited(&self, job_id: &str) -> StorageResult<u64>;
}

/// The per-job link graph
pub trait GraphStore {
    // ===== Nodes =====

    /// Inserts a node or returns the existing one's id
    ///
    /// A non-null `status_code` overwrites the stored one; a null one never
    /// clears it. `is_external` is fixed at first insert.
    fn upsert_node(
        &self,
        job_id: &str,
        url: &str,
        is_external: bool,
        status_code: Option<u16>,
    ) -> StorageResult<i64>;

    /// Gets a node by its normalized URL
    fn get_node(&self, job_id: &str, url: &str) -> StorageResult<Option<NodeRecord>>;

    /// Counts all nodes of a job
    fn count_nodes(&self, job_id: &str) -> StorageResult<u64>;

    /// Counts nodes classified external
    fn count_external_nodes(&self, job_id: &str) -> StorageResult<u64>;

    /// Nodes with `id > after_id`, ascending, at most `limit`
    fn nodes_after(&self, job_id: &str, after_id: i64, limit: usize)
        -> StorageResult<Vec<NodeRecord>>;

    // ===== Edges =====

    /// Inserts an edge unless the (source, target) pair already exists
    ///
    /// Returns `true` if a row was inserted.
    fn upsert_edge(
        &self,
        job_id: &str,
        source_id: i64,
        target_id: i64,
        link_type: LinkType,
    ) -> StorageResult<bool>;

    /// Counts all edges of a job
    fn count_edges(&self, job_id: &str) -> StorageResult<u64>;

    /// Edges with `id > after_id`, ascending, at most `limit`
    fn edges_after(&self, job_id: &str, after_id: i64, limit: usize)
        -> StorageResult<Vec<EdgeRecord>>;

    /// Outgoing edges of a node
    fn edges_from(&self, job_id: &str, source_id: i64) -> StorageResult<Vec<EdgeRecord>>;
}

/// Every storage operation the crawler needs
pub trait Storage: JobStore + FrontierStore + GraphStore {}

impl<T: JobStore + FrontierStore + GraphStore + ?Sized> Storage for T {}

/// A storage backend that can run a group of operations atomically
pub trait TransactionalStorage: Send {
    /// Operations that commit individually
    fn autocommit(&self) -> &dyn Storage;

    /// Runs `f` inside a single write transaction
    ///
    /// Commits if `f` returns `Ok`; rolls everything back otherwise.
    fn unit_of_work<T, F>(&mut self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&dyn Storage) -> StorageResult<T>;
}
