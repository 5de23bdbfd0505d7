//! Wire framing: one message-kind byte followed by a bincode body
//!
//! The relay envelope is the entry envelope byte-for-byte with only the
//! leading kind byte rewritten, so the relayed query is provably the one
//! the entry node received.

use tracing::error;

use crate::query::{StatQuery, StatResponse};
use crate::{ClusterError, Result};

/// Message kinds understood by the aggregation subsystem
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageKind {
    /// Entry-point query: resolved locally and fanned out to the group
    Stat = 0x51,
    /// Relayed query: resolved locally, never re-broadcast
    StatRelay = 0x52,
}

impl MessageKind {
    /// Decode a kind byte
    pub fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            0x51 => Ok(MessageKind::Stat),
            0x52 => Ok(MessageKind::StatRelay),
            other => Err(ClusterError::WrongMessageFormat(format!(
                "unknown message kind byte: {other:#04x}"
            ))),
        }
    }
}

/// Frame a query under `kind`
pub fn pack_query(kind: MessageKind, query: &StatQuery) -> Result<Vec<u8>> {
    let body = bincode::serialize(query).map_err(|e| {
        error!(error = %e, "BUG: packing stat query failed");
        ClusterError::Internal(format!("pack stat query: {e}"))
    })?;
    Ok(frame(kind, body))
}

/// Frame a partial or aggregate response under `kind`
pub fn pack_response(kind: MessageKind, response: &StatResponse) -> Result<Vec<u8>> {
    let body = bincode::serialize(response).map_err(|e| {
        error!(error = %e, "BUG: packing stat response failed");
        ClusterError::Internal(format!("pack stat response: {e}"))
    })?;
    Ok(frame(kind, body))
}

fn frame(kind: MessageKind, body: Vec<u8>) -> Vec<u8> {
    let mut buf = Vec::with_capacity(body.len() + 1);
    buf.push(kind as u8);
    buf.extend_from_slice(&body);
    buf
}

/// Split an envelope into its kind and body
pub fn unpack_kind(payload: &[u8]) -> Result<(MessageKind, &[u8])> {
    let (first, body) = payload
        .split_first()
        .ok_or_else(|| ClusterError::WrongMessageFormat("empty envelope".to_string()))?;
    Ok((MessageKind::from_byte(*first)?, body))
}

/// Decode a query body
pub fn unpack_query(body: &[u8]) -> Result<StatQuery> {
    bincode::deserialize(body)
        .map_err(|e| ClusterError::WrongMessageFormat(format!("undecodable stat query: {e}")))
}

/// Decode a response body
pub fn unpack_response(body: &[u8]) -> Result<StatResponse> {
    bincode::deserialize(body)
        .map_err(|e| ClusterError::WrongMessageFormat(format!("undecodable stat response: {e}")))
}

/// Rewrite an entry envelope into its relay form, body untouched
pub fn into_relay(mut payload: Vec<u8>) -> Result<Vec<u8>> {
    if payload.is_empty() {
        return Err(ClusterError::WrongMessageFormat(
            "empty envelope".to_string(),
        ));
    }
    payload[0] = MessageKind::StatRelay as u8;
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::StatFilter;
    use std::time::Duration;

    fn query() -> StatQuery {
        StatQuery::new(
            StatFilter::PipelineIndicatorValue {
                pipeline_name: "orders".to_string(),
                indicator_name: "EXECUTION_COUNT_ALL".to_string(),
            },
            Duration::from_secs(10),
        )
    }

    #[test]
    fn test_query_round_trip() {
        let packed = pack_query(MessageKind::Stat, &query()).unwrap();
        let (kind, body) = unpack_kind(&packed).unwrap();
        assert_eq!(kind, MessageKind::Stat);
        assert_eq!(unpack_query(body).unwrap(), query());
    }

    #[test]
    fn test_response_round_trip() {
        let resp = StatResponse::with_value(b"{\"Value\":50}".to_vec());
        let packed = pack_response(MessageKind::StatRelay, &resp).unwrap();
        let (kind, body) = unpack_kind(&packed).unwrap();
        assert_eq!(kind, MessageKind::StatRelay);
        assert_eq!(unpack_response(body).unwrap(), resp);
    }

    #[test]
    fn test_unknown_kind_byte_rejected() {
        let err = unpack_kind(&[0x00, 0x01]).unwrap_err();
        assert!(matches!(err, ClusterError::WrongMessageFormat(_)));
    }

    #[test]
    fn test_empty_envelope_rejected() {
        assert!(unpack_kind(&[]).is_err());
        assert!(into_relay(Vec::new()).is_err());
    }

    #[test]
    fn test_into_relay_rewrites_only_kind_byte() {
        let packed = pack_query(MessageKind::Stat, &query()).unwrap();
        let relayed = into_relay(packed.clone()).unwrap();
        assert_eq!(relayed[0], MessageKind::StatRelay as u8);
        assert_eq!(&relayed[1..], &packed[1..]);
    }

    #[test]
    fn test_garbled_body_rejected() {
        let err = unpack_query(&[0xff, 0xfe, 0xfd]).unwrap_err();
        assert!(matches!(err, ClusterError::WrongMessageFormat(_)));
    }
}
