//! Deterministic partitioning of monitoring keys across cluster members.
//!
//! Every member sorts the membership list into the same canonical order
//! and takes its own position in it. A key belongs to the member whose
//! position equals `crc32(ping metric id) mod member count`. Because all
//! members compute this from the same input, partitions agree across the
//! cluster without any message exchange. The cost is a full re-shuffle of
//! responsibility on every membership change, which is harmless: a member
//! that loses a key simply stops creating work for it, and any stale
//! timer it still holds no-ops on its next responsibility check.

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use tracing::{error, info, trace};

use crate::error::EngineError;
use crate::key::MonitoringKey;

/// Opaque comparable identifier of a cluster member.
///
/// Any value works as long as all members report the same identifiers in
/// their membership views (addresses, node names, uuids).
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct MemberId(String);

impl MemberId {
    /// Creates a member id.
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for MemberId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// A snapshot of cluster membership: the canonically sorted member list
/// and the local member's position in it. Recomputed wholesale on every
/// membership change, never partially updated.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClusterView {
    members: Vec<MemberId>,
    local_index: usize,
}

impl ClusterView {
    /// The view of a standalone (single member) deployment.
    #[must_use]
    pub const fn standalone() -> Self {
        Self {
            members: Vec::new(),
            local_index: 0,
        }
    }

    /// Number of members in the view.
    #[must_use]
    pub fn num_members(&self) -> usize {
        self.members.len()
    }

    /// Whether this view describes a standalone deployment.
    #[must_use]
    pub fn is_standalone(&self) -> bool {
        self.members.len() <= 1
    }
}

/// Maps monitoring keys to the cluster member responsible for them.
#[derive(Debug)]
pub struct ClusterPartitioner {
    view: ArcSwap<ClusterView>,
}

impl ClusterPartitioner {
    /// Creates a partitioner in standalone mode. It stays standalone until
    /// the first membership view is applied.
    #[must_use]
    pub fn new() -> Self {
        Self {
            view: ArcSwap::from_pointee(ClusterView::standalone()),
        }
    }

    /// Applies a new membership view.
    ///
    /// The members are sorted into canonical order and the local member's
    /// position becomes this instance's partition number. A view that does
    /// not contain the local member is rejected and the previous view is
    /// retained, since adopting it would leave some keys unwatched.
    pub fn on_membership_changed(
        &self,
        mut members: Vec<MemberId>,
        local_id: &MemberId,
    ) -> Result<(), EngineError> {
        members.sort();

        let Some(local_index) = members.iter().position(|m| m == local_id) else {
            error!(
                "Unexpected cluster topology: member {} not found in {:?}",
                local_id, members
            );
            return Err(EngineError::InvalidView(format!(
                "member {local_id} not in reported membership"
            )));
        };

        let num_members = members.len();
        self.view.store(Arc::new(ClusterView {
            members,
            local_index,
        }));

        info!(
            "Topology update: member {} assigned number {} of {}",
            local_id, local_index, num_members
        );
        Ok(())
    }

    /// Whether this instance is responsible for the given key.
    ///
    /// Reads the current view snapshot without blocking writers of a new
    /// one. Standalone deployments are responsible for everything.
    ///
    /// The hash covers the ping metric id only, so all tenants of a feed
    /// land on the same member; a forced backfill for a feed can then be
    /// routed with a single responsibility check.
    #[must_use]
    pub fn is_responsible(&self, key: &MonitoringKey) -> bool {
        self.is_responsible_for_metric(&key.ping_metric_id())
    }

    /// Responsibility check by ping metric id (see [`Self::is_responsible`]).
    #[must_use]
    pub fn is_responsible_for_metric(&self, ping_metric_id: &str) -> bool {
        let view = self.view.load();
        if view.is_standalone() {
            return true;
        }

        let hash = crc32fast::hash(ping_metric_id.as_bytes());
        let result = hash as usize % view.members.len() == view.local_index;
        trace!(
            "Member {} {} responsible for {}",
            view.local_index,
            if result { "is" } else { "is not" },
            ping_metric_id
        );
        result
    }

    /// Returns the current view snapshot.
    #[must_use]
    pub fn current_view(&self) -> Arc<ClusterView> {
        self.view.load_full()
    }
}

impl Default for ClusterPartitioner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn members(ids: &[&str]) -> Vec<MemberId> {
        ids.iter().map(|id| MemberId::from(*id)).collect()
    }

    #[test]
    fn test_standalone_always_responsible() {
        let partitioner = ClusterPartitioner::new();
        assert!(partitioner.is_responsible(&MonitoringKey::new("t1", "f1")));

        // A single-member view is still standalone
        partitioner
            .on_membership_changed(members(&["a"]), &MemberId::from("a"))
            .unwrap();
        assert!(partitioner.is_responsible(&MonitoringKey::new("t1", "f1")));
    }

    #[test]
    fn test_partitioning_is_disjoint_and_exhaustive() {
        let ids = members(&["node-b", "node-a", "node-c"]);
        let partitioners: Vec<ClusterPartitioner> = ids
            .iter()
            .map(|local| {
                let p = ClusterPartitioner::new();
                p.on_membership_changed(ids.clone(), local).unwrap();
                p
            })
            .collect();

        for i in 0..100 {
            let key = MonitoringKey::new("tenant", format!("feed-{i}"));
            let responsible = partitioners
                .iter()
                .filter(|p| p.is_responsible(&key))
                .count();
            assert_eq!(responsible, 1, "key {key} must map to exactly one member");
        }
    }

    #[test]
    fn test_same_feed_same_member_across_tenants() {
        let ids = members(&["a", "b", "c"]);
        let partitioner = ClusterPartitioner::new();
        partitioner
            .on_membership_changed(ids, &MemberId::from("b"))
            .unwrap();

        let k1 = MonitoringKey::new("t1", "f1");
        let k2 = MonitoringKey::new("t2", "f1");
        assert_eq!(
            partitioner.is_responsible(&k1),
            partitioner.is_responsible(&k2)
        );
    }

    #[test]
    fn test_membership_change_is_idempotent() {
        let ids = members(&["c", "a", "b"]);
        let local = MemberId::from("b");

        let partitioner = ClusterPartitioner::new();
        partitioner
            .on_membership_changed(ids.clone(), &local)
            .unwrap();
        let first = partitioner.current_view();

        partitioner.on_membership_changed(ids, &local).unwrap();
        let second = partitioner.current_view();

        assert_eq!(*first, *second);
    }

    #[test]
    fn test_invalid_view_retains_previous() {
        let partitioner = ClusterPartitioner::new();
        partitioner
            .on_membership_changed(members(&["a", "b"]), &MemberId::from("a"))
            .unwrap();
        let before = partitioner.current_view();

        let result =
            partitioner.on_membership_changed(members(&["c", "d"]), &MemberId::from("a"));
        assert!(result.is_err());
        assert_eq!(*partitioner.current_view(), *before);
    }

    #[test]
    fn test_sort_order_is_canonical() {
        // Two members seeing the same set in different orders agree
        let p1 = ClusterPartitioner::new();
        p1.on_membership_changed(members(&["a", "b", "c"]), &MemberId::from("a"))
            .unwrap();
        let p2 = ClusterPartitioner::new();
        p2.on_membership_changed(members(&["c", "b", "a"]), &MemberId::from("a"))
            .unwrap();

        assert_eq!(*p1.current_view(), *p2.current_view());
    }
}
