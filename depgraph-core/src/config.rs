//! Graph Configuration
//!
//! Evaluation behavior that the embedding scene may want to tune. The
//! defaults match an interactive editor: one broken node does not stop the
//! rest of the scene from refreshing.

use serde::{Deserialize, Serialize};

/// What a pass does when a node callback returns an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Record the failure, leave the node dirty, skip everything that
    /// reads from it, and keep evaluating unrelated nodes.
    #[default]
    Isolate,

    /// Stop the pass at the first failure and return it as an error.
    Abort,
}

/// Configuration for a [`Graph`](crate::graph::Graph).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// How callback failures are handled.
    pub failure_policy: FailurePolicy,

    /// Highest visit epoch handed out before every node is rewound.
    pub epoch_limit: u32,
}

impl GraphConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Set the failure policy.
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Set the epoch limit.
    pub fn with_epoch_limit(mut self, limit: u32) -> Self {
        self.epoch_limit = limit;
        self
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            failure_policy: FailurePolicy::Isolate,
            epoch_limit: u32::MAX,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = GraphConfig::default();
        assert_eq!(config.failure_policy, FailurePolicy::Isolate);
        assert_eq!(config.epoch_limit, u32::MAX);
    }

    #[test]
    fn parses_partial_json() {
        let config = GraphConfig::from_json(r#"{ "failure_policy": "abort" }"#).unwrap();
        assert_eq!(config.failure_policy, FailurePolicy::Abort);
        assert_eq!(config.epoch_limit, u32::MAX);

        let config = GraphConfig::from_json("{}").unwrap();
        assert_eq!(config, GraphConfig::default());
    }

    #[test]
    fn rejects_unknown_policy() {
        assert!(GraphConfig::from_json(r#"{ "failure_policy": "retry" }"#).is_err());
    }

    #[test]
    fn builder_setters() {
        let config = GraphConfig::default()
            .with_failure_policy(FailurePolicy::Abort)
            .with_epoch_limit(16);
        assert_eq!(config.failure_policy, FailurePolicy::Abort);
        assert_eq!(config.epoch_limit, 16);
    }
}
