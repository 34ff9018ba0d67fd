//! Robots.txt handling module
//!
//! A [`RobotsGate`] is built once per job for the job's root domain. It never
//! fails: a robots.txt that cannot be fetched means "allow all, default delay".

mod parser;

pub use parser::RobotsRules;

use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Allow/deny decisions and crawl delay for one job
#[derive(Debug, Clone)]
pub struct RobotsGate {
    rules: RobotsRules,
    agent: String,
    crawl_delay: Duration,
}

impl RobotsGate {
    /// Builds a gate from already-parsed rules
    pub fn new(rules: RobotsRules, agent: &str, default_delay: Duration) -> Self {
        let crawl_delay = rules.crawl_delay(agent).unwrap_or(default_delay);
        Self {
            rules,
            agent: agent.to_string(),
            crawl_delay,
        }
    }

    /// A gate that allows every URL
    pub fn allow_all(agent: &str, default_delay: Duration) -> Self {
        Self::new(RobotsRules::permissive(), agent, default_delay)
    }

    /// Fetches `/robots.txt` for the root of `root_url`
    ///
    /// # Arguments
    ///
    /// * `client` - HTTP client (carries the user agent and timeout)
    /// * `root_url` - Any URL on the job's root domain
    /// * `agent` - Product token matched against `User-agent` groups
    /// * `default_delay` - Delay used when no `Crawl-delay` applies
    pub async fn fetch(
        client: &Client,
        root_url: &Url,
        agent: &str,
        default_delay: Duration,
    ) -> Self {
        let robots_url = match root_url.join("/robots.txt") {
            Ok(url) => url,
            Err(e) => {
                warn!("Cannot build robots.txt URL for {}: {}", root_url, e);
                return Self::allow_all(agent, default_delay);
            }
        };

        let response = match client.get(robots_url.clone()).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("Failed to fetch {}: {}, allowing all", robots_url, e);
                return Self::allow_all(agent, default_delay);
            }
        };

        if !response.status().is_success() {
            info!(
                "No robots.txt at {} (HTTP {}), allowing all",
                robots_url,
                response.status()
            );
            return Self::allow_all(agent, default_delay);
        }

        match response.text().await {
            Ok(body) => {
                let gate = Self::new(RobotsRules::parse(&body), agent, default_delay);
                debug!(
                    "Loaded robots.txt from {} (crawl delay {:?})",
                    robots_url, gate.crawl_delay
                );
                gate
            }
            Err(e) => {
                warn!("Failed to read {}: {}, allowing all", robots_url, e);
                Self::allow_all(agent, default_delay)
            }
        }
    }

    /// Checks whether the crawler may fetch `url`
    pub fn is_allowed(&self, url: &str) -> bool {
        self.rules.allows(&self.agent, url)
    }

    /// Delay to wait before every fetch
    pub fn crawl_delay(&self) -> Duration {
        self.crawl_delay
    }
}
