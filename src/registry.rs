//! Statistics registry: the read seam between aggregation and the
//! pipeline execution engine
//!
//! The engine owns indicator production; aggregation only reads. The
//! in-memory implementation here is what gateway nodes wire in; tests use
//! it directly.

use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{ClusterError, Result};

/// One statistics scalar in its native numeric domain
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarValue {
    /// Signed counter or duration
    Int(i64),
    /// Unsigned counter or queue depth
    Uint(u64),
    /// Rate, percentile or variance figure
    Float(f64),
}

impl ScalarValue {
    /// JSON number form, the unit carried inside value blobs
    pub fn as_json(&self) -> serde_json::Value {
        match self {
            ScalarValue::Int(v) => json!(v),
            ScalarValue::Uint(v) => json!(v),
            ScalarValue::Float(v) => json!(v),
        }
    }
}

/// Read access to one pipeline's statistics
pub trait PipelineStatsSource: Send + Sync {
    /// Sorted names of pipeline-level indicators
    fn pipeline_indicator_names(&self) -> Vec<String>;
    /// Current value of a pipeline-level indicator
    fn pipeline_indicator_value(&self, indicator: &str) -> Result<ScalarValue>;
    /// Description of a pipeline-level indicator
    fn pipeline_indicator_desc(&self, indicator: &str) -> Result<String>;

    /// Sorted names of one plugin's indicators
    fn plugin_indicator_names(&self, plugin: &str) -> Vec<String>;
    /// Current value of a plugin-level indicator
    fn plugin_indicator_value(&self, plugin: &str, indicator: &str) -> Result<ScalarValue>;
    /// Description of a plugin-level indicator
    fn plugin_indicator_desc(&self, plugin: &str, indicator: &str) -> Result<String>;

    /// Sorted names of task-level indicators
    fn task_indicator_names(&self) -> Vec<String>;
    /// Current value of a task-level indicator
    fn task_indicator_value(&self, indicator: &str) -> Result<ScalarValue>;
    /// Description of a task-level indicator
    fn task_indicator_desc(&self, indicator: &str) -> Result<String>;
}

/// Registry of per-pipeline statistics sources
pub trait StatsRegistry: Send + Sync {
    /// Statistics for `pipeline`, or `None` when the pipeline does not run
    /// on this node
    fn pipeline(&self, pipeline: &str) -> Option<Arc<dyn PipelineStatsSource>>;
}

#[derive(Debug, Clone)]
struct IndicatorSlot {
    value: ScalarValue,
    desc: String,
}

/// Statistics of one pipeline, concurrently readable while the engine
/// updates it
#[derive(Default)]
struct PipelineStats {
    pipeline: DashMap<String, IndicatorSlot>,
    plugins: DashMap<String, DashMap<String, IndicatorSlot>>,
    tasks: DashMap<String, IndicatorSlot>,
}

fn sorted_keys(map: &DashMap<String, IndicatorSlot>) -> Vec<String> {
    let mut names: Vec<String> = map.iter().map(|entry| entry.key().clone()).collect();
    names.sort();
    names
}

impl PipelineStatsSource for PipelineStats {
    fn pipeline_indicator_names(&self) -> Vec<String> {
        sorted_keys(&self.pipeline)
    }

    fn pipeline_indicator_value(&self, indicator: &str) -> Result<ScalarValue> {
        self.pipeline
            .get(indicator)
            .map(|slot| slot.value)
            .ok_or_else(|| {
                ClusterError::RetrievePipelineStatValue(format!("no such indicator: {indicator}"))
            })
    }

    fn pipeline_indicator_desc(&self, indicator: &str) -> Result<String> {
        self.pipeline
            .get(indicator)
            .map(|slot| slot.desc.clone())
            .ok_or_else(|| {
                ClusterError::RetrievePipelineStatDesc(format!("no such indicator: {indicator}"))
            })
    }

    fn plugin_indicator_names(&self, plugin: &str) -> Vec<String> {
        self.plugins
            .get(plugin)
            .map(|slots| sorted_keys(&slots))
            .unwrap_or_default()
    }

    fn plugin_indicator_value(&self, plugin: &str, indicator: &str) -> Result<ScalarValue> {
        self.plugins
            .get(plugin)
            .and_then(|slots| slots.get(indicator).map(|slot| slot.value))
            .ok_or_else(|| {
                ClusterError::RetrievePluginStatValue(format!(
                    "no such indicator: {plugin}/{indicator}"
                ))
            })
    }

    fn plugin_indicator_desc(&self, plugin: &str, indicator: &str) -> Result<String> {
        self.plugins
            .get(plugin)
            .and_then(|slots| slots.get(indicator).map(|slot| slot.desc.clone()))
            .ok_or_else(|| {
                ClusterError::RetrievePluginStatDesc(format!(
                    "no such indicator: {plugin}/{indicator}"
                ))
            })
    }

    fn task_indicator_names(&self) -> Vec<String> {
        sorted_keys(&self.tasks)
    }

    fn task_indicator_value(&self, indicator: &str) -> Result<ScalarValue> {
        self.tasks
            .get(indicator)
            .map(|slot| slot.value)
            .ok_or_else(|| {
                ClusterError::RetrieveTaskStatValue(format!("no such indicator: {indicator}"))
            })
    }

    fn task_indicator_desc(&self, indicator: &str) -> Result<String> {
        self.tasks
            .get(indicator)
            .map(|slot| slot.desc.clone())
            .ok_or_else(|| {
                ClusterError::RetrieveTaskStatDesc(format!("no such indicator: {indicator}"))
            })
    }
}

/// In-memory statistics registry backing a gateway node
///
/// The execution engine writes through the `set_*` methods; aggregation
/// reads through [`StatsRegistry`]. All access is lock-free on the read
/// path.
#[derive(Default)]
pub struct InMemoryRegistry {
    pipelines: DashMap<String, Arc<PipelineStats>>,
}

impl InMemoryRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    fn stats_entry(&self, pipeline: &str) -> Arc<PipelineStats> {
        self.pipelines
            .entry(pipeline.to_string())
            .or_insert_with(|| Arc::new(PipelineStats::default()))
            .clone()
    }

    /// Record a pipeline-level indicator observation
    pub fn set_pipeline_indicator(
        &self,
        pipeline: &str,
        indicator: &str,
        value: ScalarValue,
        desc: &str,
    ) {
        self.stats_entry(pipeline).pipeline.insert(
            indicator.to_string(),
            IndicatorSlot {
                value,
                desc: desc.to_string(),
            },
        );
    }

    /// Record a plugin-level indicator observation
    pub fn set_plugin_indicator(
        &self,
        pipeline: &str,
        plugin: &str,
        indicator: &str,
        value: ScalarValue,
        desc: &str,
    ) {
        self.stats_entry(pipeline)
            .plugins
            .entry(plugin.to_string())
            .or_default()
            .insert(
                indicator.to_string(),
                IndicatorSlot {
                    value,
                    desc: desc.to_string(),
                },
            );
    }

    /// Record a task-level indicator observation
    pub fn set_task_indicator(
        &self,
        pipeline: &str,
        indicator: &str,
        value: ScalarValue,
        desc: &str,
    ) {
        self.stats_entry(pipeline).tasks.insert(
            indicator.to_string(),
            IndicatorSlot {
                value,
                desc: desc.to_string(),
            },
        );
    }

    /// Drop all statistics of a deleted pipeline
    pub fn remove_pipeline(&self, pipeline: &str) {
        self.pipelines.remove(pipeline);
    }
}

impl StatsRegistry for InMemoryRegistry {
    fn pipeline(&self, pipeline: &str) -> Option<Arc<dyn PipelineStatsSource>> {
        self.pipelines
            .get(pipeline)
            .map(|entry| entry.value().clone() as Arc<dyn PipelineStatsSource>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_pipeline_is_none() {
        let registry = InMemoryRegistry::new();
        assert!(registry.pipeline("orders").is_none());
    }

    #[test]
    fn test_pipeline_indicator_round_trip() {
        let registry = InMemoryRegistry::new();
        registry.set_pipeline_indicator(
            "orders",
            "EXECUTION_COUNT_ALL",
            ScalarValue::Int(17),
            "executions since start",
        );

        let source = registry.pipeline("orders").unwrap();
        assert_eq!(
            source.pipeline_indicator_value("EXECUTION_COUNT_ALL").unwrap(),
            ScalarValue::Int(17)
        );
        assert_eq!(
            source.pipeline_indicator_desc("EXECUTION_COUNT_ALL").unwrap(),
            "executions since start"
        );
    }

    #[test]
    fn test_names_are_sorted() {
        let registry = InMemoryRegistry::new();
        for name in ["c", "a", "b"] {
            registry.set_pipeline_indicator("orders", name, ScalarValue::Uint(0), "");
        }
        let source = registry.pipeline("orders").unwrap();
        assert_eq!(source.pipeline_indicator_names(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_plugin_scope_is_isolated_per_plugin() {
        let registry = InMemoryRegistry::new();
        registry.set_plugin_indicator(
            "orders",
            "rate-limiter",
            "WIP",
            ScalarValue::Uint(3),
            "in-flight requests",
        );

        let source = registry.pipeline("orders").unwrap();
        assert_eq!(source.plugin_indicator_names("rate-limiter"), vec!["WIP"]);
        assert!(source.plugin_indicator_names("other").is_empty());
        assert!(source.plugin_indicator_value("other", "WIP").is_err());
    }

    #[test]
    fn test_missing_indicator_maps_to_retrieve_errors() {
        let registry = InMemoryRegistry::new();
        registry.set_task_indicator("orders", "ABORT_COUNT", ScalarValue::Uint(0), "");
        let source = registry.pipeline("orders").unwrap();

        assert!(matches!(
            source.pipeline_indicator_value("NOPE"),
            Err(ClusterError::RetrievePipelineStatValue(_))
        ));
        assert!(matches!(
            source.task_indicator_desc("NOPE"),
            Err(ClusterError::RetrieveTaskStatDesc(_))
        ));
    }

    #[test]
    fn test_remove_pipeline() {
        let registry = InMemoryRegistry::new();
        registry.set_pipeline_indicator("orders", "WIP", ScalarValue::Uint(1), "");
        registry.remove_pipeline("orders");
        assert!(registry.pipeline("orders").is_none());
    }

    #[test]
    fn test_scalar_json_forms() {
        assert_eq!(ScalarValue::Int(-5).as_json(), serde_json::json!(-5));
        assert_eq!(ScalarValue::Uint(5).as_json(), serde_json::json!(5));
        assert_eq!(ScalarValue::Float(2.5).as_json(), serde_json::json!(2.5));
    }
}
