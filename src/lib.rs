//! FlowGate Cluster Statistics Aggregation
//!
//! Answers "what is the value of indicator X across the entire gateway
//! group?" for a peer group of FlowGate nodes, each running user-defined
//! pipelines of plugins executing tasks and each keeping a local
//! statistics registry.
//!
//! # Architecture
//!
//! - **Member Selection**: Read-mode members are preferred query targets,
//!   with fallback to write-mode members for availability
//! - **Two-Hop Fan-Out**: The entry node resolves locally, relays the query
//!   to every live peer in the group, and collects replies under the query
//!   deadline; relayed queries are never re-broadcast
//! - **Typed Aggregation**: Per-indicator reducers (sum, max, min, avg over
//!   f64/i64/u64), set-union for name listings, first-non-empty for
//!   descriptions
//! - **Partial-Failure Tolerance**: Timed-out peers, error replies and
//!   malformed payloads are dropped; the aggregate stands on what arrived

#![warn(missing_docs)]
#![warn(unused_crate_dependencies)]

pub mod aggregator;
pub mod api;
pub mod codec;
pub mod combine;
pub mod config;
pub mod coordinator;
pub mod member;
pub mod query;
pub mod registry;
pub mod resolve;
pub mod transport;

// Re-exports
pub use api::ClusterStatsClient;
pub use config::ClusterStatConfig;
pub use coordinator::StatCoordinator;
pub use member::{choose_stat_member, Member, MemberMode, MemberStatus, Membership, StaticMembership};
pub use query::{StatFacet, StatFilter, StatQuery, StatResponse, StatScope};
pub use registry::{InMemoryRegistry, PipelineStatsSource, ScalarValue, StatsRegistry};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Result type alias for cluster statistics operations
pub type Result<T> = std::result::Result<T, ClusterError>;

/// Errors surfaced by cluster statistics aggregation
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClusterError {
    /// No alive member available to serve a query for the group
    #[error("no alive member in group: {0}")]
    NoAliveMember(String),

    /// Envelope or query failed structural/selector validation
    #[error("wrong message format: {0}")]
    WrongMessageFormat(String),

    /// The registry has no statistics for the requested pipeline
    #[error("pipeline statistics not found: {0}")]
    PipelineStatNotFound(String),

    /// Reading a pipeline-level indicator value failed
    #[error("retrieve pipeline statistics value: {0}")]
    RetrievePipelineStatValue(String),

    /// Reading a pipeline-level indicator description failed
    #[error("retrieve pipeline statistics description: {0}")]
    RetrievePipelineStatDesc(String),

    /// Reading a plugin-level indicator value failed
    #[error("retrieve plugin statistics value: {0}")]
    RetrievePluginStatValue(String),

    /// Reading a plugin-level indicator description failed
    #[error("retrieve plugin statistics description: {0}")]
    RetrievePluginStatDesc(String),

    /// Reading a task-level indicator value failed
    #[error("retrieve task statistics value: {0}")]
    RetrieveTaskStatValue(String),

    /// Reading a task-level indicator description failed
    #[error("retrieve task statistics description: {0}")]
    RetrieveTaskStatDesc(String),

    /// Query-level deadline expired before any reply arrived
    #[error("cluster stat query timed out: {0}")]
    Timeout(String),

    /// A process stop interrupted a pending cluster request
    #[error("member gone while request in flight: {0}")]
    IssueMemberGone(String),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Pack/unpack/marshal failure or an aggregate that produced nothing
    #[error("internal server error: {0}")]
    Internal(String),
}

impl ClusterError {
    /// Wire-visible discriminant for this error
    pub fn kind(&self) -> ClusterErrorKind {
        match self {
            ClusterError::NoAliveMember(_) => ClusterErrorKind::NoAliveMember,
            ClusterError::WrongMessageFormat(_) => ClusterErrorKind::WrongMessageFormat,
            ClusterError::PipelineStatNotFound(_) => ClusterErrorKind::PipelineStatNotFound,
            ClusterError::RetrievePipelineStatValue(_) => {
                ClusterErrorKind::RetrievePipelineStatValueError
            }
            ClusterError::RetrievePipelineStatDesc(_) => {
                ClusterErrorKind::RetrievePipelineStatDescError
            }
            ClusterError::RetrievePluginStatValue(_) => {
                ClusterErrorKind::RetrievePluginStatValueError
            }
            ClusterError::RetrievePluginStatDesc(_) => {
                ClusterErrorKind::RetrievePluginStatDescError
            }
            ClusterError::RetrieveTaskStatValue(_) => ClusterErrorKind::RetrieveTaskStatValueError,
            ClusterError::RetrieveTaskStatDesc(_) => ClusterErrorKind::RetrieveTaskStatDescError,
            ClusterError::Timeout(_) => ClusterErrorKind::TimeoutError,
            ClusterError::IssueMemberGone(_) => ClusterErrorKind::IssueMemberGone,
            ClusterError::InvalidConfig(_) => ClusterErrorKind::InternalServerError,
            ClusterError::Internal(_) => ClusterErrorKind::InternalServerError,
        }
    }
}

/// Error discriminants carried on the wire inside partial responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClusterErrorKind {
    /// No alive member in the target group
    NoAliveMember,
    /// Structural or selector validation failure
    WrongMessageFormat,
    /// Unknown pipeline
    PipelineStatNotFound,
    /// Pipeline indicator value retrieval failure
    RetrievePipelineStatValueError,
    /// Pipeline indicator description retrieval failure
    RetrievePipelineStatDescError,
    /// Plugin indicator value retrieval failure
    RetrievePluginStatValueError,
    /// Plugin indicator description retrieval failure
    RetrievePluginStatDescError,
    /// Task indicator value retrieval failure
    RetrieveTaskStatValueError,
    /// Task indicator description retrieval failure
    RetrieveTaskStatDescError,
    /// Query deadline exceeded
    TimeoutError,
    /// Process stop interrupted a pending request
    IssueMemberGone,
    /// Marshal failure or empty aggregate
    InternalServerError,
}

/// Initialize the tracing subscriber for binaries and examples
///
/// Filter level comes from `RUST_LOG`, defaulting to `info`.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(true)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_mapping() {
        let err = ClusterError::NoAliveMember("default".to_string());
        assert_eq!(err.kind(), ClusterErrorKind::NoAliveMember);

        let err = ClusterError::Timeout("10s elapsed".to_string());
        assert_eq!(err.kind(), ClusterErrorKind::TimeoutError);

        let err = ClusterError::InvalidConfig("empty group".to_string());
        assert_eq!(err.kind(), ClusterErrorKind::InternalServerError);
    }

    #[test]
    fn test_error_display_carries_context() {
        let err = ClusterError::PipelineStatNotFound("orders".to_string());
        assert!(err.to_string().contains("orders"));
    }
}
