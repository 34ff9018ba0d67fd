//! SQLite storage implementation
//!
//! The storage traits are implemented directly on [`rusqlite::Connection`], so
//! the same code serves both plain autocommit calls and calls made through a
//! transaction (which derefs to a connection). [`SqliteStorage`] owns the
//! connection and provides the unit-of-work boundary.

use crate::state::JobStatus;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{
    FrontierStore, GraphStore, JobStore, Storage, StorageError, StorageResult,
    TransactionalStorage,
};
use crate::storage::{DiscoveredUrl, EdgeRecord, JobRecord, LinkType, NodeRecord};
use crate::CrawlError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::path::Path;
use std::time::Duration;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const JOB_COLUMNS: &str = "id, seed_url, status, total_urls, processed_urls, created_at, \
                           finished_at, error_message, cancel_requested";

const NODE_COLUMNS: &str = "id, job_id, url, is_external, status_code";

const EDGE_COLUMNS: &str = "id, job_id, source_id, target_id, link_type";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(CrawlError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, CrawlError> {
        let conn = Connection::open(path)?;

        // Several jobs may write the same file through separate connections
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> Result<Self, CrawlError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

impl TransactionalStorage for SqliteStorage {
    fn autocommit(&self) -> &dyn Storage {
        &self.conn
    }

    fn unit_of_work<T, F>(&mut self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&dyn Storage) -> StorageResult<T>,
    {
        // IMMEDIATE takes the write lock up front so the busy handler applies
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let result = {
            let conn: &Connection = &tx;
            f(conn)?
        };
        tx.commit()?;
        Ok(result)
    }
}

fn job_from_row(row: &Row<'_>) -> rusqlite::Result<JobRecord> {
    Ok(JobRecord {
        id: row.get(0)?,
        seed_url: row.get(1)?,
        status: JobStatus::from_db_string(&row.get::<_, String>(2)?).unwrap_or(JobStatus::Failed),
        total_urls: row.get::<_, i64>(3)? as u64,
        processed_urls: row.get::<_, i64>(4)? as u64,
        created_at: row.get(5)?,
        finished_at: row.get(6)?,
        error_message: row.get(7)?,
        cancel_requested: row.get::<_, i64>(8)? != 0,
    })
}

fn node_from_row(row: &Row<'_>) -> rusqlite::Result<NodeRecord> {
    Ok(NodeRecord {
        id: row.get(0)?,
        job_id: row.get(1)?,
        url: row.get(2)?,
        is_external: row.get::<_, i64>(3)? != 0,
        status_code: row.get::<_, Option<i64>>(4)?.map(|code| code as u16),
    })
}

fn edge_from_row(row: &Row<'_>) -> rusqlite::Result<EdgeRecord> {
    Ok(EdgeRecord {
        id: row.get(0)?,
        job_id: row.get(1)?,
        source_id: row.get(2)?,
        target_id: row.get(3)?,
        link_type: LinkType::from_db_string(&row.get::<_, String>(4)?)
            .unwrap_or(LinkType::Hyperlink),
    })
}

impl JobStore for Connection {
    fn create_job(&self, job_id: &str, seed_url: &str) -> StorageResult<JobRecord> {
        if self.get_job(job_id)?.is_some() {
            return Err(StorageError::JobExists(job_id.to_string()));
        }

        let now = Utc::now().to_rfc3339();
        self.execute(
            "INSERT INTO crawl_jobs (id, seed_url, status, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![job_id, seed_url, JobStatus::Pending.to_db_string(), now],
        )?;

        self.get_job(job_id)?
            .ok_or_else(|| StorageError::JobNotFound(job_id.to_string()))
    }

    fn get_job(&self, job_id: &str) -> StorageResult<Option<JobRecord>> {
        let sql = format!("SELECT {} FROM crawl_jobs WHERE id = ?1", JOB_COLUMNS);
        let job = self
            .query_row(&sql, params![job_id], job_from_row)
            .optional()?;
        Ok(job)
    }

    fn list_jobs(&self) -> StorageResult<Vec<JobRecord>> {
        let sql = format!(
            "SELECT {} FROM crawl_jobs ORDER BY created_at DESC, rowid DESC",
            JOB_COLUMNS
        );
        let mut stmt = self.prepare(&sql)?;
        let jobs = stmt
            .query_map([], job_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(jobs)
    }

    fn transition_job(
        &self,
        job_id: &str,
        next: JobStatus,
        error: Option<&str>,
    ) -> StorageResult<bool> {
        // The allowed source states come from the state machine itself, so the
        // check and the write happen in one statement
        let sources: Vec<String> = JobStatus::all_states()
            .into_iter()
            .filter(|from| from.can_transition_to(next))
            .map(|from| format!("'{}'", from.to_db_string()))
            .collect();
        if sources.is_empty() {
            return Ok(false);
        }

        let finished_at = next.is_terminal().then(|| Utc::now().to_rfc3339());
        let sql = format!(
            "UPDATE crawl_jobs
             SET status = ?1,
                 finished_at = COALESCE(?2, finished_at),
                 error_message = COALESCE(?3, error_message)
             WHERE id = ?4 AND status IN ({})",
            sources.join(", ")
        );
        let changed = self.execute(
            &sql,
            params![next.to_db_string(), finished_at, error, job_id],
        )?;
        Ok(changed > 0)
    }

    fn record_progress(&self, job_id: &str, processed: u64, total: u64) -> StorageResult<()> {
        let changed = self.execute(
            "UPDATE crawl_jobs SET processed_urls = ?1, total_urls = ?2 WHERE id = ?3",
            params![processed as i64, total as i64, job_id],
        )?;
        if changed == 0 {
            return Err(StorageError::JobNotFound(job_id.to_string()));
        }
        Ok(())
    }

    fn request_cancel(&self, job_id: &str) -> StorageResult<bool> {
        let changed = self.execute(
            "UPDATE crawl_jobs SET cancel_requested = 1 WHERE id = ?1",
            params![job_id],
        )?;
        Ok(changed > 0)
    }

    fn is_cancel_requested(&self, job_id: &str) -> StorageResult<bool> {
        let flag: Option<i64> = self
            .query_row(
                "SELECT cancel_requested FROM crawl_jobs WHERE id = ?1",
                params![job_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(flag.unwrap_or(0) != 0)
    }
}

impl FrontierStore for Connection {
    fn seed(&self, job_id: &str, urls: &[DiscoveredUrl]) -> StorageResult<usize> {
        let now = Utc::now().to_rfc3339();
        let mut enqueued = 0;

        for discovered in urls {
            let node_id =
                self.upsert_node(job_id, &discovered.url, discovered.scope.is_external(), None)?;
            enqueued += self.execute(
                "INSERT OR IGNORE INTO frontier (job_id, node_id, enqueued_at) VALUES (?1, ?2, ?3)",
                params![job_id, node_id, now],
            )?;
        }

        Ok(enqueued)
    }

    fn next_batch(&self, job_id: &str, limit: usize) -> StorageResult<Vec<NodeRecord>> {
        let mut stmt = self.prepare(
            "SELECT n.id, n.job_id, n.url, n.is_external, n.status_code
             FROM frontier f
             JOIN url_nodes n ON n.id = f.node_id
             WHERE f.job_id = ?1 AND f.visited_at IS NULL
             ORDER BY f.seq
             LIMIT ?2",
        )?;
        let nodes = stmt
            .query_map(params![job_id, limit as i64], node_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(nodes)
    }

    fn mark_visited(
        &self,
        job_id: &str,
        url: &str,
        status_code: Option<u16>,
    ) -> StorageResult<()> {
        let node = self
            .get_node(job_id, url)?
            .ok_or_else(|| StorageError::NodeNotFound {
                job_id: job_id.to_string(),
                url: url.to_string(),
            })?;

        if let Some(code) = status_code {
            self.execute(
                "UPDATE url_nodes SET status_code = ?1 WHERE id = ?2",
                params![code as i64, node.id],
            )?;
        }

        self.execute(
            "UPDATE frontier SET visited_at = COALESCE(visited_at, ?1)
             WHERE job_id = ?2 AND node_id = ?3",
            params![Utc::now().to_rfc3339(), job_id, node.id],
        )?;

        Ok(())
    }

    fn count_pending(&self, job_id: &str) -> StorageResult<u64> {
        let count: i64 = self.query_row(
            "SELECT COUNT(*) FROM frontier WHERE job_id = ?1 AND visited_at IS NULL",
            params![job_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_visited(&self, job_id: &str) -> StorageResult<u64> {
        let count: i64 = self.query_row(
            "SELECT COUNT(*) FROM frontier WHERE job_id = ?1 AND visited_at IS NOT NULL",
            params![job_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

impl GraphStore for Connection {
    // ===== Nodes =====

    fn upsert_node(
        &self,
        job_id: &str,
        url: &str,
        is_external: bool,
        status_code: Option<u16>,
    ) -> StorageResult<i64> {
        let id = self.query_row(
            "INSERT INTO url_nodes (job_id, url, is_external, status_code, discovered_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(job_id, url) DO UPDATE
                 SET status_code = COALESCE(excluded.status_code, url_nodes.status_code)
             RETURNING id",
            params![
                job_id,
                url,
                is_external as i64,
                status_code.map(i64::from),
                Utc::now().to_rfc3339()
            ],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    fn get_node(&self, job_id: &str, url: &str) -> StorageResult<Option<NodeRecord>> {
        let sql = format!(
            "SELECT {} FROM url_nodes WHERE job_id = ?1 AND url = ?2",
            NODE_COLUMNS
        );
        let node = self
            .query_row(&sql, params![job_id, url], node_from_row)
            .optional()?;
        Ok(node)
    }

    fn count_nodes(&self, job_id: &str) -> StorageResult<u64> {
        let count: i64 = self.query_row(
            "SELECT COUNT(*) FROM url_nodes WHERE job_id = ?1",
            params![job_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_external_nodes(&self, job_id: &str) -> StorageResult<u64> {
        let count: i64 = self.query_row(
            "SELECT COUNT(*) FROM url_nodes WHERE job_id = ?1 AND is_external = 1",
            params![job_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn nodes_after(
        &self,
        job_id: &str,
        after_id: i64,
        limit: usize,
    ) -> StorageResult<Vec<NodeRecord>> {
        let sql = format!(
            "SELECT {} FROM url_nodes WHERE job_id = ?1 AND id > ?2 ORDER BY id LIMIT ?3",
            NODE_COLUMNS
        );
        let mut stmt = self.prepare(&sql)?;
        let nodes = stmt
            .query_map(params![job_id, after_id, limit as i64], node_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(nodes)
    }

    // ===== Edges =====

    fn upsert_edge(
        &self,
        job_id: &str,
        source_id: i64,
        target_id: i64,
        link_type: LinkType,
    ) -> StorageResult<bool> {
        let inserted = self.execute(
            "INSERT OR IGNORE INTO url_edges (job_id, source_id, target_id, link_type)
             VALUES (?1, ?2, ?3, ?4)",
            params![job_id, source_id, target_id, link_type.to_db_string()],
        )?;
        Ok(inserted > 0)
    }

    fn count_edges(&self, job_id: &str) -> StorageResult<u64> {
        let count: i64 = self.query_row(
            "SELECT COUNT(*) FROM url_edges WHERE job_id = ?1",
            params![job_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn edges_after(
        &self,
        job_id: &str,
        after_id: i64,
        limit: usize,
    ) -> StorageResult<Vec<EdgeRecord>> {
        let sql = format!(
            "SELECT {} FROM url_edges WHERE job_id = ?1 AND id > ?2 ORDER BY id LIMIT ?3",
            EDGE_COLUMNS
        );
        let mut stmt = self.prepare(&sql)?;
        let edges = stmt
            .query_map(params![job_id, after_id, limit as i64], edge_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(edges)
    }

    fn edges_from(&self, job_id: &str, source_id: i64) -> StorageResult<Vec<EdgeRecord>> {
        let sql = format!(
            "SELECT {} FROM url_edges WHERE job_id = ?1 AND source_id = ?2 ORDER BY id",
            EDGE_COLUMNS
        );
        let mut stmt = self.prepare(&sql)?;
        let edges = stmt
            .query_map(params![job_id, source_id], edge_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(edges)
    }
}
