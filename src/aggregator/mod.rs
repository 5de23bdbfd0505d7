//! Typed per-indicator aggregation
//!
//! The catalog maps (scope, indicator name) to a reducer; reducers combine
//! one indicator's per-member scalars into a single cluster-wide scalar.
//! Indicators absent from the catalog are "unknown": their per-member
//! values are passed through as a list instead of being reduced.

pub mod catalog;
pub mod reduce;

pub use catalog::aggregator_for;
pub use reduce::Aggregator;
