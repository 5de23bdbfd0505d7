//! Group membership model and query-target selection
//!
//! Membership snapshots are produced by the gossip layer; this module only
//! reads them. Selection prefers read-mode members, which are the
//! designated query responders, and falls back to write-mode members so a
//! group stays queryable after losing its read nodes.

use parking_lot::RwLock;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{ClusterError, Result};

/// Operating mode of a group member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemberMode {
    /// Designated query responder
    Read,
    /// Configuration writer; serves queries only as a fallback
    Write,
}

/// Liveness of a member as last observed by the membership service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemberStatus {
    /// Reachable and serving
    Alive,
    /// Suspected or confirmed down
    Failed,
    /// Departed the group voluntarily
    Left,
}

/// One peer in a gateway group
///
/// Immutable per observation; the membership service refreshes the whole
/// snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// Node name, unique within the cluster
    pub node_name: String,
    /// Group this member belongs to
    pub group: String,
    /// Read/write role tag
    pub mode: MemberMode,
    /// Last observed liveness
    pub status: MemberStatus,
}

impl Member {
    /// Whether the member is currently alive
    pub fn is_alive(&self) -> bool {
        self.status == MemberStatus::Alive
    }
}

/// Source of membership snapshots
pub trait Membership: Send + Sync {
    /// Current membership snapshot; a blocking read is permitted
    fn members(&self) -> Vec<Member>;
}

/// Membership snapshot holder refreshed wholesale by the bootstrap layer
pub struct StaticMembership {
    members: RwLock<Vec<Member>>,
}

impl StaticMembership {
    /// Create a membership holder from an initial snapshot
    pub fn new(members: Vec<Member>) -> Self {
        StaticMembership {
            members: RwLock::new(members),
        }
    }

    /// Replace the snapshot with a fresh observation
    pub fn replace(&self, members: Vec<Member>) {
        *self.members.write() = members;
    }
}

impl Membership for StaticMembership {
    fn members(&self) -> Vec<Member> {
        self.members.read().clone()
    }
}

/// Pick the member that should serve a cluster statistics query for `group`
///
/// Alive read-mode members are preferred; if none exist the selection falls
/// back to alive write-mode members. Selection within a pool is uniformly
/// random using the caller's RNG.
pub fn choose_stat_member<R: Rng + ?Sized>(
    members: &[Member],
    group: &str,
    rng: &mut R,
) -> Result<Member> {
    let alive: Vec<&Member> = members
        .iter()
        .filter(|m| m.is_alive() && m.group == group)
        .collect();

    let readers: Vec<&Member> = alive
        .iter()
        .copied()
        .filter(|m| m.mode == MemberMode::Read)
        .collect();

    let pool = if readers.is_empty() { &alive } else { &readers };
    pool.choose(rng)
        .map(|m| (*m).clone())
        .ok_or_else(|| ClusterError::NoAliveMember(group.to_string()))
}

/// Alive members of `group` excluding `self_name` (the fan-out targets)
pub fn alive_group_peers(members: &[Member], group: &str, self_name: &str) -> Vec<Member> {
    members
        .iter()
        .filter(|m| m.is_alive() && m.group == group && m.node_name != self_name)
        .cloned()
        .collect()
}
