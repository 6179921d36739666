//! User agent selection for sessions that spoof a browser

use std::fmt;

use rand::seq::IndexedRandom;

use crate::utils::constants::DEFAULT_USER_AGENT;

/// Supplies the `User-Agent` header for outgoing requests
pub trait UserAgentProvider: Send + Sync + fmt::Debug {
    fn user_agent(&self) -> String;
}

/// Always the same user agent
#[derive(Debug, Clone)]
pub struct StaticUserAgent(String);

impl StaticUserAgent {
    pub fn new(agent: impl Into<String>) -> Self {
        Self(agent.into())
    }
}

impl Default for StaticUserAgent {
    fn default() -> Self {
        Self(DEFAULT_USER_AGENT.to_string())
    }
}

impl UserAgentProvider for StaticUserAgent {
    fn user_agent(&self) -> String {
        self.0.clone()
    }
}

/// Picks a random agent from a list on every request
#[derive(Debug, Clone)]
pub struct RotatingUserAgent {
    agents: Vec<String>,
}

impl RotatingUserAgent {
    pub fn new<I, S>(agents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            agents: agents.into_iter().map(Into::into).collect(),
        }
    }
}

impl UserAgentProvider for RotatingUserAgent {
    fn user_agent(&self) -> String {
        self.agents
            .choose(&mut rand::rng())
            .cloned()
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string())
    }
}
