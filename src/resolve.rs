//! Local query resolution against the statistics registry
//!
//! Produces this node's partial response. Failures are encoded into the
//! partial rather than returned: a failing node contributes an error
//! partial, and the combiner drops it.

use tracing::{debug, error};

use crate::query::{DescBlob, NamesBlob, StatFilter, StatQuery, StatResponse, ValueBlob};
use crate::registry::{ScalarValue, StatsRegistry};
use crate::{ClusterError, Result};

/// Resolve `query` against the local registry
pub fn resolve_local(registry: &dyn StatsRegistry, query: &StatQuery) -> StatResponse {
    match try_resolve(registry, query) {
        Ok(partial) => partial,
        Err(e) => {
            debug!(pipeline = %query.filter.pipeline_name(), error = %e, "local stat resolution failed");
            StatResponse::from_error(&e)
        }
    }
}

fn try_resolve(registry: &dyn StatsRegistry, query: &StatQuery) -> Result<StatResponse> {
    query.validate()?;

    let pipeline = query.filter.pipeline_name();
    let source = registry
        .pipeline(pipeline)
        .ok_or_else(|| ClusterError::PipelineStatNotFound(pipeline.to_string()))?;

    match &query.filter {
        StatFilter::PipelineIndicatorNames { .. } => {
            names_partial(source.pipeline_indicator_names())
        }
        StatFilter::PipelineIndicatorValue { indicator_name, .. } => {
            value_partial(source.pipeline_indicator_value(indicator_name)?)
        }
        StatFilter::PipelineIndicatorDesc { indicator_name, .. } => {
            desc_partial(source.pipeline_indicator_desc(indicator_name)?)
        }
        StatFilter::PluginIndicatorNames { plugin_name, .. } => {
            names_partial(source.plugin_indicator_names(plugin_name))
        }
        StatFilter::PluginIndicatorValue {
            plugin_name,
            indicator_name,
            ..
        } => value_partial(source.plugin_indicator_value(plugin_name, indicator_name)?),
        StatFilter::PluginIndicatorDesc {
            plugin_name,
            indicator_name,
            ..
        } => desc_partial(source.plugin_indicator_desc(plugin_name, indicator_name)?),
        StatFilter::TaskIndicatorNames { .. } => names_partial(source.task_indicator_names()),
        StatFilter::TaskIndicatorValue { indicator_name, .. } => {
            value_partial(source.task_indicator_value(indicator_name)?)
        }
        StatFilter::TaskIndicatorDesc { indicator_name, .. } => {
            desc_partial(source.task_indicator_desc(indicator_name)?)
        }
    }
}

fn names_partial(mut names: Vec<String>) -> Result<StatResponse> {
    names.sort();
    names.dedup();
    Ok(StatResponse::with_names(encode(&NamesBlob { names })?))
}

fn value_partial(value: ScalarValue) -> Result<StatResponse> {
    Ok(StatResponse::with_value(encode(&ValueBlob {
        value: value.as_json(),
    })?))
}

fn desc_partial(desc: String) -> Result<StatResponse> {
    Ok(StatResponse::with_desc(encode(&DescBlob { desc })?))
}

fn encode<T: serde::Serialize>(blob: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(blob).map_err(|e| {
        error!(error = %e, "BUG: encoding stat blob failed");
        ClusterError::Internal(format!("encode stat blob: {e}"))
    })
}
