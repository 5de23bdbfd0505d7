//! Caller-side entry for the admin API
//!
//! Picks one group member to serve as aggregation entry point, issues the
//! query envelope to it and awaits the aggregate under the query's own
//! deadline.

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

use crate::codec::{self, MessageKind};
use crate::member::{choose_stat_member, Membership};
use crate::query::StatQuery;
use crate::transport::{ClusterTransport, RequestParams, STAT_REQUEST_NAME};
use crate::{ClusterError, Result};

/// Admin-facing client: routes a statistics query to one group member
pub struct ClusterStatsClient {
    group: String,
    membership: Arc<dyn Membership>,
    transport: Arc<dyn ClusterTransport>,
    stop: watch::Receiver<bool>,
    rng: Mutex<StdRng>,
}

impl ClusterStatsClient {
    /// Create a client for one group
    pub fn new(
        group: String,
        membership: Arc<dyn Membership>,
        transport: Arc<dyn ClusterTransport>,
        stop: watch::Receiver<bool>,
    ) -> Self {
        ClusterStatsClient {
            group,
            membership,
            transport,
            stop,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Execute `query` against the group, returning the aggregate JSON
    /// sub-blob (`{"Names":[...]}`, `{"Value":...}` or `{"Desc":"..."}`)
    pub async fn query(&self, query: &StatQuery) -> Result<serde_json::Value> {
        query.validate()?;

        let entry = {
            let mut rng = self.rng.lock();
            choose_stat_member(&self.membership.members(), &self.group, &mut *rng)?
        };
        debug!(node = %entry.node_name, group = %self.group, "issuing cluster stat query");

        let payload = codec::pack_query(MessageKind::Stat, query)?;
        let params = RequestParams {
            target_node_names: vec![entry.node_name.clone()],
            target_group: self.group.clone(),
            timeout: query.timeout,
            response_relay_count: 1,
        };
        let mut replies = self
            .transport
            .request(STAT_REQUEST_NAME, payload, params)
            .await?;

        let sleep = sleep_until(Instant::now() + query.timeout);
        tokio::pin!(sleep);
        let mut stop = self.stop.clone();

        loop {
            tokio::select! {
                _ = &mut sleep => {
                    return Err(ClusterError::Timeout(format!(
                        "no reply from {} within {:?}",
                        entry.node_name, query.timeout
                    )));
                }
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        return Err(ClusterError::IssueMemberGone(
                            "process stopping".to_string(),
                        ));
                    }
                }
                reply = replies.recv() => {
                    let payload = reply.and_then(|r| r.payload).ok_or_else(|| {
                        ClusterError::Timeout(format!(
                            "no reply from {} within {:?}",
                            entry.node_name, query.timeout
                        ))
                    })?;
                    return decode_aggregate(&payload);
                }
            }
        }
    }
}

fn decode_aggregate(payload: &[u8]) -> Result<serde_json::Value> {
    let (_, body) = codec::unpack_kind(payload)?;
    let response = codec::unpack_response(body)?;
    if let Some(err) = response.err {
        return Err(ClusterError::from(err));
    }
    let blob = response.payload().ok_or_else(|| {
        ClusterError::Internal("aggregate reply carries no payload".to_string())
    })?;
    serde_json::from_slice(blob)
        .map_err(|e| ClusterError::Internal(format!("undecodable aggregate blob: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{StatFilter, StatResponse};
    use std::time::Duration;

    #[test]
    fn test_decode_aggregate_success() {
        let response = StatResponse::with_value(b"{\"Value\":50}".to_vec());
        let payload = codec::pack_response(MessageKind::Stat, &response).unwrap();
        let value = decode_aggregate(&payload).unwrap();
        assert_eq!(value, serde_json::json!({"Value": 50}));
    }

    #[test]
    fn test_decode_aggregate_error_envelope() {
        let err = ClusterError::Internal("aggregate stat responses failed".to_string());
        let response = StatResponse::from_error(&err);
        let payload = codec::pack_response(MessageKind::Stat, &response).unwrap();
        assert_eq!(decode_aggregate(&payload).unwrap_err(), err);
    }

    #[test]
    fn test_query_validation_precedes_selection() {
        // An invalid query must fail before any member is consulted.
        let query = StatQuery::new(
            StatFilter::PipelineIndicatorNames {
                pipeline_name: String::new(),
            },
            Duration::from_secs(5),
        );
        assert!(query.validate().is_err());
    }
}
