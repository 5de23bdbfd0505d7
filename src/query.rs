//! Query and partial-response model
//!
//! A statistics query carries exactly one of nine filters (three scopes ×
//! three facets) plus a deadline. The admin API submits the externally
//! tagged JSON form of [`StatFilter`], so "exactly one filter per request"
//! is enforced by the serde data model rather than by null checks.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ClusterError, ClusterErrorKind, Result};

/// Scope a filter selects indicators from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatScope {
    /// Pipeline-level indicators
    Pipeline,
    /// Plugin-level indicators
    Plugin,
    /// Task-level indicators
    Task,
}

/// Facet a filter asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatFacet {
    /// Indicator name listing
    Names,
    /// One indicator's value
    Value,
    /// One indicator's description
    Desc,
}

/// Filter of a cluster statistics query, one variant per scope × facet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatFilter {
    /// List pipeline-level indicator names
    PipelineIndicatorNames {
        /// Target pipeline
        pipeline_name: String,
    },
    /// Read one pipeline-level indicator value
    PipelineIndicatorValue {
        /// Target pipeline
        pipeline_name: String,
        /// Target indicator
        indicator_name: String,
    },
    /// Read one pipeline-level indicator description
    PipelineIndicatorDesc {
        /// Target pipeline
        pipeline_name: String,
        /// Target indicator
        indicator_name: String,
    },
    /// List plugin-level indicator names
    PluginIndicatorNames {
        /// Target pipeline
        pipeline_name: String,
        /// Target plugin within the pipeline
        plugin_name: String,
    },
    /// Read one plugin-level indicator value
    PluginIndicatorValue {
        /// Target pipeline
        pipeline_name: String,
        /// Target plugin within the pipeline
        plugin_name: String,
        /// Target indicator
        indicator_name: String,
    },
    /// Read one plugin-level indicator description
    PluginIndicatorDesc {
        /// Target pipeline
        pipeline_name: String,
        /// Target plugin within the pipeline
        plugin_name: String,
        /// Target indicator
        indicator_name: String,
    },
    /// List task-level indicator names
    TaskIndicatorNames {
        /// Target pipeline
        pipeline_name: String,
    },
    /// Read one task-level indicator value
    TaskIndicatorValue {
        /// Target pipeline
        pipeline_name: String,
        /// Target indicator
        indicator_name: String,
    },
    /// Read one task-level indicator description
    TaskIndicatorDesc {
        /// Target pipeline
        pipeline_name: String,
        /// Target indicator
        indicator_name: String,
    },
}

impl StatFilter {
    /// Pipeline selector, present on every variant
    pub fn pipeline_name(&self) -> &str {
        match self {
            StatFilter::PipelineIndicatorNames { pipeline_name }
            | StatFilter::PipelineIndicatorValue { pipeline_name, .. }
            | StatFilter::PipelineIndicatorDesc { pipeline_name, .. }
            | StatFilter::PluginIndicatorNames { pipeline_name, .. }
            | StatFilter::PluginIndicatorValue { pipeline_name, .. }
            | StatFilter::PluginIndicatorDesc { pipeline_name, .. }
            | StatFilter::TaskIndicatorNames { pipeline_name }
            | StatFilter::TaskIndicatorValue { pipeline_name, .. }
            | StatFilter::TaskIndicatorDesc { pipeline_name, .. } => pipeline_name,
        }
    }

    /// Plugin selector, present on plugin-scope variants only
    pub fn plugin_name(&self) -> Option<&str> {
        match self {
            StatFilter::PluginIndicatorNames { plugin_name, .. }
            | StatFilter::PluginIndicatorValue { plugin_name, .. }
            | StatFilter::PluginIndicatorDesc { plugin_name, .. } => Some(plugin_name),
            _ => None,
        }
    }

    /// Indicator selector, present on value/desc facets only
    pub fn indicator_name(&self) -> Option<&str> {
        match self {
            StatFilter::PipelineIndicatorValue { indicator_name, .. }
            | StatFilter::PipelineIndicatorDesc { indicator_name, .. }
            | StatFilter::PluginIndicatorValue { indicator_name, .. }
            | StatFilter::PluginIndicatorDesc { indicator_name, .. }
            | StatFilter::TaskIndicatorValue { indicator_name, .. }
            | StatFilter::TaskIndicatorDesc { indicator_name, .. } => Some(indicator_name),
            _ => None,
        }
    }

    /// Scope of this filter, driving catalog lookup
    pub fn scope(&self) -> StatScope {
        match self {
            StatFilter::PipelineIndicatorNames { .. }
            | StatFilter::PipelineIndicatorValue { .. }
            | StatFilter::PipelineIndicatorDesc { .. } => StatScope::Pipeline,
            StatFilter::PluginIndicatorNames { .. }
            | StatFilter::PluginIndicatorValue { .. }
            | StatFilter::PluginIndicatorDesc { .. } => StatScope::Plugin,
            StatFilter::TaskIndicatorNames { .. }
            | StatFilter::TaskIndicatorValue { .. }
            | StatFilter::TaskIndicatorDesc { .. } => StatScope::Task,
        }
    }

    /// Facet of this filter, driving combination
    pub fn facet(&self) -> StatFacet {
        match self {
            StatFilter::PipelineIndicatorNames { .. }
            | StatFilter::PluginIndicatorNames { .. }
            | StatFilter::TaskIndicatorNames { .. } => StatFacet::Names,
            StatFilter::PipelineIndicatorValue { .. }
            | StatFilter::PluginIndicatorValue { .. }
            | StatFilter::TaskIndicatorValue { .. } => StatFacet::Value,
            StatFilter::PipelineIndicatorDesc { .. }
            | StatFilter::PluginIndicatorDesc { .. }
            | StatFilter::TaskIndicatorDesc { .. } => StatFacet::Desc,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.pipeline_name().is_empty() {
            return Err(ClusterError::WrongMessageFormat(
                "empty pipeline name".to_string(),
            ));
        }
        if let Some(plugin) = self.plugin_name() {
            if plugin.is_empty() {
                return Err(ClusterError::WrongMessageFormat(
                    "empty plugin name".to_string(),
                ));
            }
        }
        if let Some(indicator) = self.indicator_name() {
            if indicator.is_empty() {
                return Err(ClusterError::WrongMessageFormat(
                    "empty indicator name".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// A cluster statistics query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatQuery {
    /// Which indicators to read, and how
    pub filter: StatFilter,
    /// Deadline for the whole query, entry hop included
    pub timeout: Duration,
}

impl StatQuery {
    /// Create a query from a filter and a deadline
    pub fn new(filter: StatFilter, timeout: Duration) -> Self {
        StatQuery { filter, timeout }
    }

    /// Structural validation: selectors present and non-empty, deadline
    /// strictly positive
    pub fn validate(&self) -> Result<()> {
        if self.timeout.is_zero() {
            return Err(ClusterError::WrongMessageFormat(
                "timeout must be positive".to_string(),
            ));
        }
        self.filter.validate()
    }
}

/// Typed error object carried inside a partial response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// Error discriminant
    pub kind: ClusterErrorKind,
    /// Human-readable context
    pub message: String,
}

impl From<&ClusterError> for ErrorEnvelope {
    fn from(err: &ClusterError) -> Self {
        ErrorEnvelope {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl From<ErrorEnvelope> for ClusterError {
    fn from(env: ErrorEnvelope) -> Self {
        match env.kind {
            ClusterErrorKind::NoAliveMember => ClusterError::NoAliveMember(env.message),
            ClusterErrorKind::WrongMessageFormat => ClusterError::WrongMessageFormat(env.message),
            ClusterErrorKind::PipelineStatNotFound => {
                ClusterError::PipelineStatNotFound(env.message)
            }
            ClusterErrorKind::RetrievePipelineStatValueError => {
                ClusterError::RetrievePipelineStatValue(env.message)
            }
            ClusterErrorKind::RetrievePipelineStatDescError => {
                ClusterError::RetrievePipelineStatDesc(env.message)
            }
            ClusterErrorKind::RetrievePluginStatValueError => {
                ClusterError::RetrievePluginStatValue(env.message)
            }
            ClusterErrorKind::RetrievePluginStatDescError => {
                ClusterError::RetrievePluginStatDesc(env.message)
            }
            ClusterErrorKind::RetrieveTaskStatValueError => {
                ClusterError::RetrieveTaskStatValue(env.message)
            }
            ClusterErrorKind::RetrieveTaskStatDescError => {
                ClusterError::RetrieveTaskStatDesc(env.message)
            }
            ClusterErrorKind::TimeoutError => ClusterError::Timeout(env.message),
            ClusterErrorKind::IssueMemberGone => ClusterError::IssueMemberGone(env.message),
            ClusterErrorKind::InternalServerError => ClusterError::Internal(env.message),
        }
    }
}

/// One member's contribution to an aggregate
///
/// Exactly one of `names`, `value`, `desc` or `err` is set. The sub-blobs
/// stay JSON-encoded so the combiner can treat values opaquely until it is
/// time to reduce them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatResponse {
    /// JSON `{"Names":[...]}` blob, sorted and unique
    pub names: Option<Vec<u8>>,
    /// JSON `{"Value":<scalar or list>}` blob
    pub value: Option<Vec<u8>>,
    /// JSON `{"Desc":"..."}` blob
    pub desc: Option<Vec<u8>>,
    /// Typed failure; set instead of a payload when resolution failed
    pub err: Option<ErrorEnvelope>,
}

impl StatResponse {
    /// Partial carrying a names listing
    pub fn with_names(blob: Vec<u8>) -> Self {
        StatResponse {
            names: Some(blob),
            ..Default::default()
        }
    }

    /// Partial carrying an indicator value
    pub fn with_value(blob: Vec<u8>) -> Self {
        StatResponse {
            value: Some(blob),
            ..Default::default()
        }
    }

    /// Partial carrying an indicator description
    pub fn with_desc(blob: Vec<u8>) -> Self {
        StatResponse {
            desc: Some(blob),
            ..Default::default()
        }
    }

    /// Partial carrying a typed failure
    pub fn from_error(err: &ClusterError) -> Self {
        StatResponse {
            err: Some(ErrorEnvelope::from(err)),
            ..Default::default()
        }
    }

    /// Whether this partial records a failure
    pub fn is_err(&self) -> bool {
        self.err.is_some()
    }

    /// The sub-blob set on this partial, whichever facet it belongs to
    pub fn payload(&self) -> Option<&[u8]> {
        self.names
            .as_deref()
            .or(self.value.as_deref())
            .or(self.desc.as_deref())
    }
}

/// `{"Names":[...]}` payload of a names facet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamesBlob {
    /// Sorted unique indicator names
    #[serde(rename = "Names")]
    pub names: Vec<String>,
}

/// `{"Value":<scalar or list>}` payload of a value facet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueBlob {
    /// Scalar for known indicators, per-member list for unknown ones
    #[serde(rename = "Value")]
    pub value: serde_json::Value,
}

/// `{"Desc":"..."}` payload of a description facet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescBlob {
    /// Human-readable indicator description
    #[serde(rename = "Desc")]
    pub desc: String,
}
