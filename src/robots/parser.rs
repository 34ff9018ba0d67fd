//! Robots.txt rule matching
//!
//! Allow/disallow matching is delegated to the robotstxt crate (Google's
//! matcher). `Crawl-delay` is not part of that matcher, so it is read here from
//! the group that applies to the agent.

use robotstxt::DefaultMatcher;
use std::time::Duration;

/// Parsed robots.txt rules for one site
#[derive(Debug, Clone)]
pub struct RobotsRules {
    /// Raw robots.txt body; `None` means everything is allowed
    content: Option<String>,
}

impl RobotsRules {
    /// Wraps a robots.txt body
    pub fn parse(content: &str) -> Self {
        Self {
            content: Some(content.to_string()),
        }
    }

    /// Rules that allow everything and specify no delay
    ///
    /// Used whenever robots.txt is missing or could not be fetched.
    pub fn permissive() -> Self {
        Self { content: None }
    }

    /// Returns true if this set of rules never blocks anything
    pub fn is_permissive(&self) -> bool {
        self.content.as_deref().map_or(true, |c| c.trim().is_empty())
    }

    /// Checks if `agent` may fetch `url`
    ///
    /// # Arguments
    ///
    /// * `agent` - The product token matched against `User-agent` lines
    /// * `url` - Absolute URL or path to check
    pub fn allows(&self, agent: &str, url: &str) -> bool {
        match self.content.as_deref() {
            Some(content) if !content.trim().is_empty() => {
                let mut matcher = DefaultMatcher::default();
                matcher.one_agent_allowed_by_robots(content, agent, url)
            }
            _ => true,
        }
    }

    /// Gets the `Crawl-delay` that applies to `agent`
    ///
    /// A group naming the agent wins over the `*` group. Consecutive
    /// `User-agent` lines form one group; any other directive closes the
    /// list of agents for that group.
    pub fn crawl_delay(&self, agent: &str) -> Option<Duration> {
        let content = self.content.as_deref()?;
        let agent = agent.to_lowercase();

        let mut group_agents: Vec<String> = Vec::new();
        let mut reading_agents = false;
        let mut wildcard_delay = None;
        let mut agent_delay = None;

        for line in content.lines() {
            // Strip trailing comments
            let line = line.split('#').next().unwrap_or("").trim();
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim().to_lowercase();
            let value = value.trim();

            if key == "user-agent" {
                if !reading_agents {
                    group_agents.clear();
                }
                group_agents.push(value.to_lowercase());
                reading_agents = true;
                continue;
            }
            reading_agents = false;

            if key != "crawl-delay" {
                continue;
            }
            let Some(delay) = value
                .parse::<f64>()
                .ok()
                .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
            else {
                continue;
            };

            if group_agents.iter().any(|ua| ua == &agent) {
                agent_delay.get_or_insert(delay);
            } else if group_agents.iter().any(|ua| ua == "*") {
                wildcard_delay.get_or_insert(delay);
            }
        }

        agent_delay.or(wildcard_delay)
    }
}
