//! Per-prefix fetch strategy selection.

use serde::{Deserialize, Serialize};

/// How an intercepted GET is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Serve a stored copy if present, otherwise go to the network.
    #[default]
    CacheFirst,
    /// Go to the network, fall back to a stored copy on failure.
    NetworkFirst,
}

/// Applies `strategy` to every path starting with `prefix`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRule {
    pub prefix: String,
    pub strategy: Strategy,
}

impl RouteRule {
    pub fn new(prefix: impl Into<String>, strategy: Strategy) -> Self {
        Self { prefix: prefix.into(), strategy }
    }
}

/// Longest-prefix route lookup with a cache-first default.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    rules: Vec<RouteRule>,
}

impl RouteTable {
    pub fn new(mut rules: Vec<RouteRule>) -> Self {
        rules.sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()));
        Self { rules }
    }

    pub fn strategy_for(&self, path: &str) -> Strategy {
        self.rules
            .iter()
            .find(|rule| path.starts_with(&rule.prefix))
            .map(|rule| rule.strategy)
            .unwrap_or_default()
    }
}
