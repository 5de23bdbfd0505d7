//! Configuration for the aggregation subsystem
//!
//! Loading hierarchy: env > file > defaults. Environment overrides use the
//! `FLOWGATE_` prefix so the subsystem can be tuned without editing the
//! node's config file.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{ClusterError, Result};

/// Configuration of one node's statistics aggregation role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterStatConfig {
    /// This node's name, unique within the cluster
    pub node_name: String,
    /// Group this node aggregates for
    pub group: String,
    /// Deadline applied when a query does not carry its own, milliseconds
    pub default_timeout_ms: u64,
    /// Transport-level retry hops for the response path
    pub response_relay_count: u32,
}

impl Default for ClusterStatConfig {
    fn default() -> Self {
        ClusterStatConfig {
            node_name: "localhost".to_string(),
            group: "default".to_string(),
            default_timeout_ms: 10_000,
            response_relay_count: 1,
        }
    }
}

impl ClusterStatConfig {
    /// Load configuration from `path` (when present) with environment
    /// overrides applied on top
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) if p.exists() => {
                let content = std::fs::read_to_string(p)
                    .map_err(|e| ClusterError::InvalidConfig(format!("read {}: {e}", p.display())))?;
                toml::from_str(&content)
                    .map_err(|e| ClusterError::InvalidConfig(format!("parse {}: {e}", p.display())))?
            }
            _ => ClusterStatConfig::default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply `FLOWGATE_*` environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("FLOWGATE_NODE_NAME") {
            self.node_name = v;
        }
        if let Ok(v) = std::env::var("FLOWGATE_GROUP") {
            self.group = v;
        }
        if let Ok(v) = std::env::var("FLOWGATE_STAT_TIMEOUT_MS") {
            if let Ok(ms) = v.parse() {
                self.default_timeout_ms = ms;
            }
        }
        if let Ok(v) = std::env::var("FLOWGATE_STAT_RESPONSE_RELAY_COUNT") {
            if let Ok(count) = v.parse() {
                self.response_relay_count = count;
            }
        }
    }

    /// Reject configurations the coordinator cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.node_name.is_empty() {
            return Err(ClusterError::InvalidConfig("empty node name".to_string()));
        }
        if self.group.is_empty() {
            return Err(ClusterError::InvalidConfig("empty group".to_string()));
        }
        if self.default_timeout_ms == 0 {
            return Err(ClusterError::InvalidConfig(
                "default timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
