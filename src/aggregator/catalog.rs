//! Indicator catalog
//!
//! Compile-time tables mapping indicator names to reducers, one table per
//! scope. Percentile, variance and standard-deviation figures combine by
//! max: each member reports its own local statistic and the cluster keeps
//! the worst case. That is an approximation, not a true cluster
//! percentile; replacing it requires digest merging at the registry level.

use super::Aggregator;
use crate::query::StatScope;

/// Reducer for `indicator` at `scope`
///
/// `None` marks an unknown indicator; its per-member values are passed
/// through as a list instead of being reduced.
pub fn aggregator_for(scope: StatScope, indicator: &str) -> Option<Aggregator> {
    match scope {
        StatScope::Pipeline => pipeline_aggregator(indicator),
        StatScope::Plugin => plugin_aggregator(indicator),
        StatScope::Task => task_aggregator(indicator),
    }
}

fn pipeline_aggregator(indicator: &str) -> Option<Aggregator> {
    Some(match indicator {
        "THROUGHPUT_RATE_LAST_1MIN_ALL"
        | "THROUGHPUT_RATE_LAST_5MIN_ALL"
        | "THROUGHPUT_RATE_LAST_15MIN_ALL" => Aggregator::SumF64,
        "EXECUTION_COUNT_ALL" => Aggregator::SumI64,
        "EXECUTION_COUNT_LAST_1MIN_ALL" => Aggregator::SumU64,
        "EXECUTION_TIME_MAX_ALL" => Aggregator::MaxI64,
        "EXECUTION_TIME_MIN_ALL" => Aggregator::MinI64,
        "EXECUTION_TIME_AVG_ALL" => Aggregator::AvgF64,
        "EXECUTION_TIME_50TH_PERCENTILE_ALL"
        | "EXECUTION_TIME_90TH_PERCENTILE_ALL"
        | "EXECUTION_TIME_99TH_PERCENTILE_ALL"
        | "EXECUTION_TIME_STD_DEV_ALL"
        | "EXECUTION_TIME_VARIANCE_ALL" => Aggregator::MaxF64,
        "WAIT_QUEUE_LENGTH" | "WIP" => Aggregator::SumU64,
        _ => return None,
    })
}

fn plugin_aggregator(indicator: &str) -> Option<Aggregator> {
    Some(match indicator {
        "THROUGHPUT_RATE_LAST_1MIN_ALL"
        | "THROUGHPUT_RATE_LAST_5MIN_ALL"
        | "THROUGHPUT_RATE_LAST_15MIN_ALL" => Aggregator::SumF64,
        "EXECUTION_COUNT_ALL" => Aggregator::SumI64,
        "EXECUTION_COUNT_LAST_1MIN_ALL" => Aggregator::SumU64,
        "EXECUTION_TIME_MAX_ALL" => Aggregator::MaxI64,
        "EXECUTION_TIME_MIN_ALL" => Aggregator::MinI64,
        "EXECUTION_TIME_AVG_ALL" => Aggregator::AvgF64,
        "EXECUTION_TIME_50TH_PERCENTILE_ALL"
        | "EXECUTION_TIME_90TH_PERCENTILE_ALL"
        | "EXECUTION_TIME_99TH_PERCENTILE_ALL"
        | "EXECUTION_TIME_STD_DEV_ALL"
        | "EXECUTION_TIME_VARIANCE_ALL" => Aggregator::MaxF64,
        "RECENT_HEADER_COUNT" => Aggregator::SumU64,
        _ => return None,
    })
}

fn task_aggregator(indicator: &str) -> Option<Aggregator> {
    Some(match indicator {
        "EXECUTION_COUNT_ALL" => Aggregator::SumU64,
        "ABORT_COUNT" | "FAILURE_COUNT" | "SUCCESS_COUNT" => Aggregator::SumU64,
        "EXECUTION_TIME_MAX_ALL" => Aggregator::MaxI64,
        "EXECUTION_TIME_MIN_ALL" => Aggregator::MinI64,
        "EXECUTION_TIME_50TH_PERCENTILE_ALL"
        | "EXECUTION_TIME_90TH_PERCENTILE_ALL"
        | "EXECUTION_TIME_99TH_PERCENTILE_ALL" => Aggregator::MaxF64,
        _ => return None,
    })
}
