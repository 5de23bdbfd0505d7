//! Cluster transport seam
//!
//! Request delivery, retries and framing below the envelope are owned by
//! the gossip layer; aggregation only addresses members by name and group
//! tag and consumes a stream of raw replies.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::Result;

/// Request name used for statistics traffic on the cluster transport
pub const STAT_REQUEST_NAME: &str = "stat";

/// Routing and delivery parameters for one cluster request
#[derive(Debug, Clone)]
pub struct RequestParams {
    /// Exact node names the request is addressed to
    pub target_node_names: Vec<String>,
    /// Group tag, redundant with the name list but hardening routing
    /// against stale peer lists
    pub target_group: String,
    /// Transport-level delivery deadline
    pub timeout: Duration,
    /// Transport-level retry hops for the response path
    pub response_relay_count: u32,
}

/// One member's raw reply to a cluster request
///
/// `payload` is `None` for a member that never answered within the
/// transport deadline.
#[derive(Debug, Clone)]
pub struct MemberResponse {
    /// Responding node
    pub node_name: String,
    /// Raw reply envelope
    pub payload: Option<Vec<u8>>,
}

/// Request/reply plumbing provided by the gossip layer
///
/// Implementations deliver each addressed member's reply on the returned
/// channel as it arrives and may close the channel once every target has
/// been accounted for.
#[async_trait]
pub trait ClusterTransport: Send + Sync {
    /// Issue `payload` under `name` to the members selected by `params`
    async fn request(
        &self,
        name: &str,
        payload: Vec<u8>,
        params: RequestParams,
    ) -> Result<mpsc::Receiver<MemberResponse>>;
}
