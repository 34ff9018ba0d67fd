//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `JobStatus`: the job state machine (pending, running, completed, failed, aborted)

mod job_status;

// Re-export main types
pub use job_status::JobStatus;
