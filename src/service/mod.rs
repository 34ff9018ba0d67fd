//! Job service - submit, inspect and stop crawl jobs
//!
//! Each submitted job runs on its own tokio task with its own database
//! connection. The service keeps one connection for control operations and
//! the in-process cancel handles of the jobs it spawned.

use crate::config::Config;
use crate::crawler::{run_job, CancelSignal, ProgressCallback};
use crate::output::{load_all_reports, load_report, write_graph_json, GraphExport, JobReport};
use crate::state::JobStatus;
use crate::storage::{SqliteStorage, StorageError, TransactionalStorage};
use crate::url::normalize_url;
use crate::CrawlError;
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use uuid::Uuid;

type JobHandle = JoinHandle<Result<JobStatus, CrawlError>>;

/// A job spawned by this service
///
/// `handle` is `None` while a caller of [`CrawlService::wait`] holds it; the
/// cancel signal stays reachable for `stop` the whole time.
struct RunningJob {
    cancel: CancelSignal,
    handle: Option<JobHandle>,
}

impl RunningJob {
    fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(false, |handle| handle.is_finished())
    }
}

/// Returns a borrowed join handle to its entry if the waiting future is dropped
struct WaitGuard<'a> {
    service: &'a CrawlService,
    job_id: &'a str,
    handle: Option<JobHandle>,
}

impl WaitGuard<'_> {
    async fn join(&mut self) -> Result<JobStatus, CrawlError> {
        let Some(handle) = self.handle.as_mut() else {
            return Err(CrawlError::JobNotFound(self.job_id.to_string()));
        };
        let joined = handle.await;

        // A completed handle must never be polled again
        self.handle = None;
        self.service.jobs().remove(self.job_id);
        joined?
    }
}

impl Drop for WaitGuard<'_> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            if let Some(job) = self.service.jobs().get_mut(self.job_id) {
                job.handle = Some(handle);
            }
        }
    }
}

/// Control surface over crawl jobs
pub struct CrawlService {
    config: Arc<Config>,
    storage: Mutex<SqliteStorage>,
    running: Mutex<HashMap<String, RunningJob>>,
    on_progress: Option<ProgressCallback>,
}

impl CrawlService {
    /// Opens the configured database
    pub fn new(config: Config) -> Result<Self, CrawlError> {
        let storage = SqliteStorage::new(Path::new(&config.storage.database_path))?;
        Ok(Self {
            config: Arc::new(config),
            storage: Mutex::new(storage),
            running: Mutex::new(HashMap::new()),
            on_progress: None,
        })
    }

    /// Registers a progress callback passed to every job spawned afterwards
    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.on_progress = Some(callback);
        self
    }

    /// Creates a job with a generated id and starts it
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Returns
    ///
    /// * `Ok(String)` - The new job's id; the crawl runs in the background
    /// * `Err(CrawlError)` - The seed URL is invalid or the job could not be stored
    pub fn submit(&self, seed_url: &str) -> Result<String, CrawlError> {
        self.submit_with_id(&Uuid::new_v4().to_string(), seed_url)
    }

    /// Creates a job with a caller-chosen id and starts it
    pub fn submit_with_id(&self, job_id: &str, seed_url: &str) -> Result<String, CrawlError> {
        let seed = normalize_url(seed_url)?;

        self.store()
            .autocommit()
            .create_job(job_id, &seed)
            .map_err(|e| match e {
                StorageError::JobExists(id) => CrawlError::JobExists(id),
                other => CrawlError::Storage(other),
            })?;

        tracing::info!("Submitted job {} for {}", job_id, seed);
        self.spawn(job_id);
        Ok(job_id.to_string())
    }

    /// Runs a job left in `running` (or `pending`) from its stored frontier
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - A run was started
    /// * `Ok(false)` - The job is terminal or already running in this process
    /// * `Err(CrawlError::JobNotFound)` - No such job
    pub fn resume(&self, job_id: &str) -> Result<bool, CrawlError> {
        let job = self
            .store()
            .autocommit()
            .get_job(job_id)?
            .ok_or_else(|| CrawlError::JobNotFound(job_id.to_string()))?;

        if job.status.is_terminal() {
            tracing::info!("Job {} is already {}, not resuming", job_id, job.status);
            return Ok(false);
        }
        if self.is_running(job_id) {
            return Ok(false);
        }

        self.spawn(job_id);
        Ok(true)
    }

    /// Status report for one job
    pub fn status(&self, job_id: &str) -> Result<Option<JobReport>, CrawlError> {
        load_report(self.store().autocommit(), job_id)
    }

    /// Status reports for all jobs, newest first
    pub fn list_jobs(&self) -> Result<Vec<JobReport>, CrawlError> {
        load_all_reports(self.store().autocommit())
    }

    /// Requests that a job stop
    ///
    /// Sets the durable cancel flag, trips the in-process token if this service
    /// spawned the job, and marks the job `aborted` unless it is already
    /// terminal.
    ///
    /// # Returns
    ///
    /// `false` if no job has this id
    pub fn stop(&self, job_id: &str) -> Result<bool, CrawlError> {
        {
            let storage = self.store();
            let store = storage.autocommit();
            if !store.request_cancel(job_id)? {
                return Ok(false);
            }
            if store.transition_job(job_id, JobStatus::Aborted, None)? {
                tracing::info!("Job {} aborted", job_id);
            }
        }

        if let Some(job) = self.jobs().get(job_id) {
            job.cancel.cancel();
        }
        Ok(true)
    }

    /// Waits for a job spawned by this service to finish
    ///
    /// The job stays stoppable while it is awaited. For a job not running in
    /// this process (or already being awaited elsewhere), returns its stored
    /// status.
    pub async fn wait(&self, job_id: &str) -> Result<JobStatus, CrawlError> {
        let handle = self
            .jobs()
            .get_mut(job_id)
            .and_then(|job| job.handle.take());

        match handle {
            Some(handle) => {
                let mut guard = WaitGuard {
                    service: self,
                    job_id,
                    handle: Some(handle),
                };
                guard.join().await
            }
            None => self
                .store()
                .autocommit()
                .get_job(job_id)?
                .map(|job| job.status)
                .ok_or_else(|| CrawlError::JobNotFound(job_id.to_string())),
        }
    }

    /// Returns true if this service has a task for the job that has not finished
    pub fn is_running(&self, job_id: &str) -> bool {
        self.jobs()
            .get(job_id)
            .map_or(false, |job| !job.is_finished())
    }

    /// Streams a job's graph as JSON
    pub fn write_graph<W: Write>(&self, job_id: &str, writer: &mut W) -> Result<GraphExport, CrawlError> {
        let storage = self.store();
        let store = storage.autocommit();
        if store.get_job(job_id)?.is_none() {
            return Err(CrawlError::JobNotFound(job_id.to_string()));
        }
        write_graph_json(store, job_id, writer)
    }

    fn spawn(&self, job_id: &str) {
        let cancel = CancelSignal::new();
        let config = Arc::clone(&self.config);
        let on_progress = self.on_progress.clone();
        let task_cancel = cancel.clone();
        let task_job_id = job_id.to_string();

        let handle = tokio::spawn(async move {
            run_job(config, &task_job_id, task_cancel, on_progress).await
        });

        let mut jobs = self.jobs();
        // Finished tasks nobody waited for; their outcome is in the store
        jobs.retain(|_, job| !job.is_finished());
        jobs.insert(
            job_id.to_string(),
            RunningJob {
                cancel,
                handle: Some(handle),
            },
        );
    }

    fn store(&self) -> MutexGuard<'_, SqliteStorage> {
        self.storage.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn jobs(&self) -> MutexGuard<'_, HashMap<String, RunningJob>> {
        self.running.lock().unwrap_or_else(|e| e.into_inner())
    }
}
