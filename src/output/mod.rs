//! Output module for job reports and graph export
//!
//! This module handles:
//! - Building and printing job status reports
//! - Streaming a job's link graph as JSON

mod graph;
mod report;

pub use graph::{write_graph_json, GraphExport, EDGE_CHUNK_SIZE, NODE_CHUNK_SIZE};
pub use report::{load_all_reports, load_report, print_job_list, print_report, JobReport};
