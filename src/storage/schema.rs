//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the crawl-graph database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per crawl job
CREATE TABLE IF NOT EXISTS crawl_jobs (
    id TEXT PRIMARY KEY,
    seed_url TEXT NOT NULL,
    status TEXT NOT NULL,
    total_urls INTEGER NOT NULL DEFAULT 0,
    processed_urls INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    finished_at TEXT,
    error_message TEXT,
    cancel_requested INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_crawl_jobs_created ON crawl_jobs(created_at);

-- Every URL discovered by a job, internal or external
CREATE TABLE IF NOT EXISTS url_nodes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    job_id TEXT NOT NULL REFERENCES crawl_jobs(id),
    url TEXT NOT NULL,
    is_external INTEGER NOT NULL DEFAULT 0,
    status_code INTEGER,
    discovered_at TEXT NOT NULL,
    UNIQUE(job_id, url)
);

CREATE INDEX IF NOT EXISTS idx_url_nodes_job ON url_nodes(job_id, id);

-- Links between nodes of the same job
CREATE TABLE IF NOT EXISTS url_edges (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    job_id TEXT NOT NULL REFERENCES crawl_jobs(id),
    source_id INTEGER NOT NULL REFERENCES url_nodes(id),
    target_id INTEGER NOT NULL REFERENCES url_nodes(id),
    link_type TEXT NOT NULL,
    UNIQUE(job_id, source_id, target_id)
);

CREATE INDEX IF NOT EXISTS idx_url_edges_job ON url_edges(job_id, id);

-- Work queue: seq gives FIFO order, visited_at closes the entry
CREATE TABLE IF NOT EXISTS frontier (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    job_id TEXT NOT NULL REFERENCES crawl_jobs(id),
    node_id INTEGER NOT NULL REFERENCES url_nodes(id),
    enqueued_at TEXT NOT NULL,
    visited_at TEXT,
    UNIQUE(job_id, node_id)
);

CREATE INDEX IF NOT EXISTS idx_frontier_pending ON frontier(job_id, visited_at, seq);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
