//! Configuration module for crawl-graph
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every section is optional; missing keys fall back to the crawler defaults.
//!
//! # Example
//!
//! ```no_run
//! use crawl_graph::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("crawl-graph.toml")).unwrap();
//! println!("Frontier batch size: {}", config.crawler.batch_size);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, CrawlerConfig, StorageConfig, UserAgentConfig};

// Re-export parser functions
pub use parser::{config_hash, load_config, load_or_default, parse_config, LoadedConfig};
pub use validation::validate;
