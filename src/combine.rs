//! Combination of partial responses into one cluster aggregate
//!
//! Partials are iterated in node-name order so facets sensitive to
//! arrival order (first-non-empty descriptions, unknown-indicator value
//! lists) stay deterministic for a given set of repliers.

use serde_json::Value;
use tracing::{debug, error, warn};

use crate::aggregator::aggregator_for;
use crate::query::{DescBlob, NamesBlob, StatFacet, StatQuery, StatResponse, ValueBlob};

/// Combine partial responses into one aggregate sub-blob
///
/// `partials` pairs each responding node's name with its partial.
/// Error-bearing partials are dropped up front: a single failing member
/// never poisons the aggregate. `None` means no aggregate could be
/// produced from what arrived.
pub fn combine_stat_responses(
    query: &StatQuery,
    mut partials: Vec<(String, StatResponse)>,
) -> Option<Vec<u8>> {
    partials.sort_by(|a, b| a.0.cmp(&b.0));
    partials.retain(|(node, partial)| {
        if let Some(err) = &partial.err {
            debug!(node = %node, kind = ?err.kind, "dropping partial with error");
            return false;
        }
        true
    });
    if partials.is_empty() {
        return None;
    }

    match query.filter.facet() {
        StatFacet::Names => combine_names(&partials),
        StatFacet::Desc => combine_desc(&partials),
        StatFacet::Value => combine_values(query, &partials),
    }
}

fn combine_names(partials: &[(String, StatResponse)]) -> Option<Vec<u8>> {
    let mut merged: Vec<String> = Vec::new();
    let mut decoded_any = false;

    for (node, partial) in partials {
        let Some(blob) = &partial.names else { continue };
        match serde_json::from_slice::<NamesBlob>(blob) {
            Ok(decoded) => {
                decoded_any = true;
                for name in decoded.names {
                    if !merged.contains(&name) {
                        merged.push(name);
                    }
                }
            }
            Err(e) => warn!(node = %node, error = %e, "undecodable names partial"),
        }
    }

    if !decoded_any {
        return None;
    }
    merged.sort();
    encode(&NamesBlob { names: merged })
}

fn combine_desc(partials: &[(String, StatResponse)]) -> Option<Vec<u8>> {
    for (node, partial) in partials {
        let Some(blob) = &partial.desc else { continue };
        match serde_json::from_slice::<DescBlob>(blob) {
            Ok(decoded) if !decoded.desc.is_empty() => return encode(&decoded),
            Ok(_) => {}
            Err(e) => warn!(node = %node, error = %e, "undecodable desc partial"),
        }
    }
    None
}

fn combine_values(query: &StatQuery, partials: &[(String, StatResponse)]) -> Option<Vec<u8>> {
    let indicator = query.filter.indicator_name()?;

    let mut decoded: Vec<Value> = Vec::new();
    for (node, partial) in partials {
        let Some(blob) = &partial.value else { continue };
        match serde_json::from_slice::<ValueBlob>(blob) {
            Ok(blob) => decoded.push(blob.value),
            Err(e) => warn!(node = %node, error = %e, "undecodable value partial"),
        }
    }
    if decoded.is_empty() {
        return None;
    }

    let combined = match aggregator_for(query.filter.scope(), indicator) {
        Some(aggregator) => aggregator.reduce(&decoded)?,
        // Unknown indicator: hand back the raw per-member values.
        None => Value::Array(decoded),
    };
    encode(&ValueBlob { value: combined })
}

fn encode<T: serde::Serialize>(blob: &T) -> Option<Vec<u8>> {
    match serde_json::to_vec(blob) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            error!(error = %e, "BUG: encoding aggregate blob failed");
            None
        }
    }
}
