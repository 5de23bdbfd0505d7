//! Two-hop aggregation coordinator
//!
//! The entry handler resolves the query locally, relays it to every live
//! peer in the group, collects replies under the query deadline and
//! combines what arrived. The relay handler resolves locally and replies;
//! it never initiates further requests, which is what keeps the topology
//! at two hops and rules out broadcast amplification.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, warn};

use crate::codec::{self, MessageKind};
use crate::combine::combine_stat_responses;
use crate::member::{alive_group_peers, Membership};
use crate::query::{StatFacet, StatQuery, StatResponse};
use crate::registry::StatsRegistry;
use crate::resolve::resolve_local;
use crate::transport::{ClusterTransport, RequestParams, STAT_REQUEST_NAME};
use crate::{ClusterError, Result};

/// Entry-point and relay logic for cluster statistics queries
pub struct StatCoordinator {
    node_name: String,
    group: String,
    membership: Arc<dyn Membership>,
    transport: Arc<dyn ClusterTransport>,
    registry: Arc<dyn StatsRegistry>,
    stop: watch::Receiver<bool>,
}

impl StatCoordinator {
    /// Create a coordinator for one gateway node
    pub fn new(
        node_name: String,
        group: String,
        membership: Arc<dyn Membership>,
        transport: Arc<dyn ClusterTransport>,
        registry: Arc<dyn StatsRegistry>,
        stop: watch::Receiver<bool>,
    ) -> Self {
        StatCoordinator {
            node_name,
            group,
            membership,
            transport,
            registry,
            stop,
        }
    }

    /// Handle one inbound envelope, returning the reply envelope
    pub async fn handle_message(&self, payload: &[u8]) -> Vec<u8> {
        match codec::unpack_kind(payload) {
            Ok((MessageKind::Stat, body)) => self.handle_stat(payload, body).await,
            Ok((MessageKind::StatRelay, body)) => self.handle_stat_relay(body),
            Err(e) => {
                warn!(node = %self.node_name, error = %e, "rejecting stat envelope");
                reply_error(MessageKind::Stat, &e)
            }
        }
    }

    /// Entry handler: local partial, fan-out, combine, reply
    async fn handle_stat(&self, envelope: &[u8], body: &[u8]) -> Vec<u8> {
        let query = match codec::unpack_query(body) {
            Ok(query) => query,
            Err(e) => return reply_error(MessageKind::Stat, &e),
        };
        if let Err(e) = query.validate() {
            warn!(node = %self.node_name, error = %e, "invalid stat query");
            return reply_error(MessageKind::Stat, &e);
        }

        // The entry node's own failure travels as an error partial and is
        // dropped by the combiner like any peer's: the cluster result
        // stands on whatever arrived.
        let local = resolve_local(self.registry.as_ref(), &query);
        let mut partials = vec![(self.node_name.clone(), local)];

        let peers = alive_group_peers(&self.membership.members(), &self.group, &self.node_name);
        if !peers.is_empty() {
            let peer_names: Vec<String> = peers.into_iter().map(|m| m.node_name).collect();
            match self.fan_out(envelope, &query, peer_names).await {
                Ok(peer_partials) => partials.extend(peer_partials),
                Err(e @ ClusterError::IssueMemberGone(_)) => {
                    return reply_error(MessageKind::Stat, &e)
                }
                Err(e) => {
                    warn!(node = %self.node_name, error = %e, "stat fan-out failed, combining local partial only");
                }
            }
        }

        match combine_stat_responses(&query, partials) {
            Some(blob) => {
                debug!(node = %self.node_name, "stat aggregate produced");
                let response = match query.filter.facet() {
                    StatFacet::Names => StatResponse::with_names(blob),
                    StatFacet::Value => StatResponse::with_value(blob),
                    StatFacet::Desc => StatResponse::with_desc(blob),
                };
                pack_or_fallback(MessageKind::Stat, &response)
            }
            None => reply_error(
                MessageKind::Stat,
                &ClusterError::Internal("aggregate stat responses failed".to_string()),
            ),
        }
    }

    /// Relay handler: resolve locally and reply, never re-broadcast
    fn handle_stat_relay(&self, body: &[u8]) -> Vec<u8> {
        let query = match codec::unpack_query(body) {
            Ok(query) => query,
            Err(e) => return reply_error(MessageKind::StatRelay, &e),
        };
        if let Err(e) = query.validate() {
            return reply_error(MessageKind::StatRelay, &e);
        }
        let partial = resolve_local(self.registry.as_ref(), &query);
        pack_or_fallback(MessageKind::StatRelay, &partial)
    }

    async fn fan_out(
        &self,
        envelope: &[u8],
        query: &StatQuery,
        peer_names: Vec<String>,
    ) -> Result<Vec<(String, StatResponse)>> {
        // The relay envelope is the inbound one with only the kind byte
        // rewritten.
        let relay = codec::into_relay(envelope.to_vec())?;
        let params = RequestParams {
            target_node_names: peer_names.clone(),
            target_group: self.group.clone(),
            timeout: query.timeout,
            response_relay_count: 1,
        };
        debug!(
            node = %self.node_name,
            peers = peer_names.len(),
            timeout_ms = query.timeout.as_millis() as u64,
            "dispatching stat relay fan-out"
        );
        let mut replies = self
            .transport
            .request(STAT_REQUEST_NAME, relay, params)
            .await?;

        let sleep = sleep_until(Instant::now() + query.timeout);
        tokio::pin!(sleep);
        let mut stop = self.stop.clone();
        let mut outstanding: HashSet<String> = peer_names.into_iter().collect();
        let mut collected = Vec::new();

        while !outstanding.is_empty() {
            tokio::select! {
                _ = &mut sleep => {
                    debug!(node = %self.node_name, outstanding = outstanding.len(), "stat fan-out deadline expired");
                    break;
                }
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        warn!(node = %self.node_name, "process stop interrupted stat fan-out");
                        return Err(ClusterError::IssueMemberGone(
                            "process stopping".to_string(),
                        ));
                    }
                }
                reply = replies.recv() => {
                    let Some(reply) = reply else {
                        // Transport accounted for every reachable target.
                        break;
                    };
                    if !outstanding.remove(&reply.node_name) {
                        continue;
                    }
                    let Some(bytes) = reply.payload else { continue };
                    if let Some(partial) = decode_peer_partial(&reply.node_name, &bytes) {
                        collected.push((reply.node_name, partial));
                    }
                }
            }
        }

        Ok(collected)
    }
}

fn decode_peer_partial(node: &str, payload: &[u8]) -> Option<StatResponse> {
    let body = match codec::unpack_kind(payload) {
        Ok((_, body)) => body,
        Err(e) => {
            warn!(node = %node, error = %e, "undecodable peer reply envelope");
            return None;
        }
    };
    let partial = match codec::unpack_response(body) {
        Ok(partial) => partial,
        Err(e) => {
            warn!(node = %node, error = %e, "undecodable peer partial");
            return None;
        }
    };
    if let Some(err) = &partial.err {
        debug!(node = %node, kind = ?err.kind, "peer reported stat error");
        return None;
    }
    Some(partial)
}

fn reply_error(kind: MessageKind, err: &ClusterError) -> Vec<u8> {
    pack_or_fallback(kind, &StatResponse::from_error(err))
}

fn pack_or_fallback(kind: MessageKind, response: &StatResponse) -> Vec<u8> {
    // pack_response logs the anomaly before returning; an empty-body
    // envelope is still decodable as a kind.
    codec::pack_response(kind, response).unwrap_or_else(|_| vec![kind as u8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::member::{Member, MemberMode, MemberStatus, StaticMembership};
    use crate::query::{StatFilter, ValueBlob};
    use crate::registry::{InMemoryRegistry, ScalarValue};
    use crate::transport::MemberResponse;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::mpsc;

    /// Transport that never delivers a reply; counts dispatches.
    ///
    /// Keeps the sender half alive so collection must end via deadline or
    /// stop rather than channel closure.
    #[derive(Default)]
    struct SilentTransport {
        calls: AtomicUsize,
        hold: Mutex<Vec<mpsc::Sender<MemberResponse>>>,
    }

    #[async_trait]
    impl ClusterTransport for SilentTransport {
        async fn request(
            &self,
            _name: &str,
            _payload: Vec<u8>,
            _params: RequestParams,
        ) -> Result<mpsc::Receiver<MemberResponse>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let (tx, rx) = mpsc::channel(1);
            self.hold.lock().push(tx);
            Ok(rx)
        }
    }

    /// Transport whose channel closes immediately: every peer unreachable.
    #[derive(Default)]
    struct UnreachableTransport {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ClusterTransport for UnreachableTransport {
        async fn request(
            &self,
            _name: &str,
            _payload: Vec<u8>,
            _params: RequestParams,
        ) -> Result<mpsc::Receiver<MemberResponse>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let (_tx, rx) = mpsc::channel(1);
            Ok(rx)
        }
    }

    fn member(name: &str, mode: MemberMode) -> Member {
        Member {
            node_name: name.to_string(),
            group: "default".to_string(),
            mode,
            status: MemberStatus::Alive,
        }
    }

    fn registry_with_count(count: i64) -> Arc<InMemoryRegistry> {
        let registry = InMemoryRegistry::new();
        registry.set_pipeline_indicator(
            "orders",
            "EXECUTION_COUNT_ALL",
            ScalarValue::Int(count),
            "executions since start",
        );
        Arc::new(registry)
    }

    fn count_query(timeout: Duration) -> Vec<u8> {
        let query = StatQuery::new(
            StatFilter::PipelineIndicatorValue {
                pipeline_name: "orders".to_string(),
                indicator_name: "EXECUTION_COUNT_ALL".to_string(),
            },
            timeout,
        );
        codec::pack_query(MessageKind::Stat, &query).unwrap()
    }

    fn decoded_value(reply: &[u8]) -> serde_json::Value {
        let (_, body) = codec::unpack_kind(reply).unwrap();
        let response = codec::unpack_response(body).unwrap();
        assert!(response.err.is_none(), "unexpected error: {:?}", response.err);
        let blob: ValueBlob = serde_json::from_slice(&response.value.unwrap()).unwrap();
        blob.value
    }

    #[test]
    fn test_relay_handler_never_rebroadcasts() {
        let transport = Arc::new(SilentTransport::default());
        let membership = Arc::new(StaticMembership::new(vec![
            member("n1", MemberMode::Read),
            member("n2", MemberMode::Write),
        ]));
        let (_stop_tx, stop_rx) = watch::channel(false);
        let coordinator = StatCoordinator::new(
            "n1".to_string(),
            "default".to_string(),
            membership,
            transport.clone(),
            registry_with_count(17),
            stop_rx,
        );

        let relay = codec::into_relay(count_query(Duration::from_secs(5))).unwrap();
        let reply = tokio_test::block_on(coordinator.handle_message(&relay));

        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
        assert_eq!(decoded_value(&reply), serde_json::json!(17));
    }

    #[test]
    fn test_entry_without_peers_skips_fan_out() {
        let transport = Arc::new(SilentTransport::default());
        let membership = Arc::new(StaticMembership::new(vec![member("n1", MemberMode::Read)]));
        let (_stop_tx, stop_rx) = watch::channel(false);
        let coordinator = StatCoordinator::new(
            "n1".to_string(),
            "default".to_string(),
            membership,
            transport.clone(),
            registry_with_count(17),
            stop_rx,
        );

        let reply = tokio_test::block_on(
            coordinator.handle_message(&count_query(Duration::from_secs(5))),
        );

        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
        assert_eq!(decoded_value(&reply), serde_json::json!(17));
    }

    #[tokio::test]
    async fn test_entry_combines_local_when_peers_unreachable() {
        let transport = Arc::new(UnreachableTransport::default());
        let membership = Arc::new(StaticMembership::new(vec![
            member("n1", MemberMode::Read),
            member("n2", MemberMode::Write),
        ]));
        let (_stop_tx, stop_rx) = watch::channel(false);
        let coordinator = StatCoordinator::new(
            "n1".to_string(),
            "default".to_string(),
            membership,
            transport.clone(),
            registry_with_count(17),
            stop_rx,
        );

        let reply = coordinator
            .handle_message(&count_query(Duration::from_secs(5)))
            .await;

        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
        assert_eq!(decoded_value(&reply), serde_json::json!(17));
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_deadline_expiry_keeps_local_partial() {
        let transport = Arc::new(SilentTransport::default());
        let membership = Arc::new(StaticMembership::new(vec![
            member("n1", MemberMode::Read),
            member("n2", MemberMode::Write),
        ]));
        let (_stop_tx, stop_rx) = watch::channel(false);
        let coordinator = StatCoordinator::new(
            "n1".to_string(),
            "default".to_string(),
            membership,
            transport.clone(),
            registry_with_count(17),
            stop_rx,
        );

        let reply = coordinator
            .handle_message(&count_query(Duration::from_millis(50)))
            .await;

        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
        assert_eq!(decoded_value(&reply), serde_json::json!(17));
    }

    #[tokio::test]
    async fn test_stop_signal_surfaces_member_gone() {
        let transport = Arc::new(SilentTransport::default());
        let membership = Arc::new(StaticMembership::new(vec![
            member("n1", MemberMode::Read),
            member("n2", MemberMode::Write),
        ]));
        let (stop_tx, stop_rx) = watch::channel(false);
        let coordinator = StatCoordinator::new(
            "n1".to_string(),
            "default".to_string(),
            membership,
            transport,
            registry_with_count(17),
            stop_rx,
        );

        stop_tx.send(true).unwrap();
        let reply = coordinator
            .handle_message(&count_query(Duration::from_secs(5)))
            .await;

        let (_, body) = codec::unpack_kind(&reply).unwrap();
        let response = codec::unpack_response(body).unwrap();
        assert_eq!(
            response.err.unwrap().kind,
            crate::ClusterErrorKind::IssueMemberGone
        );
    }

    #[test]
    fn test_garbled_envelope_rejected() {
        let transport = Arc::new(SilentTransport::default());
        let membership = Arc::new(StaticMembership::new(vec![member("n1", MemberMode::Read)]));
        let (_stop_tx, stop_rx) = watch::channel(false);
        let coordinator = StatCoordinator::new(
            "n1".to_string(),
            "default".to_string(),
            membership,
            transport,
            registry_with_count(17),
            stop_rx,
        );

        let reply = tokio_test::block_on(coordinator.handle_message(&[0xAA, 0x01, 0x02]));
        let (_, body) = codec::unpack_kind(&reply).unwrap();
        let response = codec::unpack_response(body).unwrap();
        assert_eq!(
            response.err.unwrap().kind,
            crate::ClusterErrorKind::WrongMessageFormat
        );
    }
}
