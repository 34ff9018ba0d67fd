use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// A configuration together with the fingerprint of the file it came from
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: Config,
    /// Hex SHA-256 of the file content; `None` for built-in defaults
    pub hash: Option<String>,
}

/// Loads and validates a configuration file
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use crawl_graph::config::load_config;
///
/// let config = load_config(Path::new("config.toml")).unwrap();
/// println!("Batch size: {}", config.crawler.batch_size);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    Ok(read_config(path)?.config)
}

/// Parses and validates configuration text
///
/// Every section and key is optional.
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Hex-encoded SHA-256 of configuration text
pub fn config_hash(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

/// Loads the configuration at `path`, or the defaults when no path is given
///
/// The file is read once; the hash is taken over exactly the bytes that were
/// parsed.
pub fn load_or_default(path: Option<&Path>) -> Result<LoadedConfig, ConfigError> {
    match path {
        Some(path) => read_config(path),
        None => {
            let config = Config::default();
            validate(&config)?;
            Ok(LoadedConfig { config, hash: None })
        }
    }
}

fn read_config(path: &Path) -> Result<LoadedConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config = parse_config(&content)?;
    Ok(LoadedConfig {
        config,
        hash: Some(config_hash(&content)),
    })
}
