//! Cluster partitioning behavior and forced backfill.

mod common;

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use common::{fast_config, state_of, test_engine};
use feedwatch_catalog::{AvailabilityMetric, MonitoringMode};
use feedwatch_catalog_mock::MockCatalog;
use feedwatch_engine::{
    BackfillEngine, ClusterPartitioner, MemberId, MonitoringKey, ping_metric_id,
};
use feedwatch_store::Store;
use feedwatch_store_memory::MemoryStore;
use feedwatch_timeseries::Availability;
use feedwatch_timeseries_memory::MemoryTimeseries;
use tokio::time::sleep;

const FEED: &str = "f1";

fn members() -> Vec<MemberId> {
    vec![MemberId::from("member-0"), MemberId::from("member-1")]
}

/// Picks the member of `members()` that is (or is not) responsible for
/// the feed's ping stream under that two-member view.
fn member_for_feed(feed_id: &str, responsible: bool) -> MemberId {
    for local in members() {
        let partitioner = ClusterPartitioner::new();
        partitioner.on_membership_changed(members(), &local).unwrap();
        if partitioner.is_responsible_for_metric(&ping_metric_id(feed_id)) == responsible {
            return local;
        }
    }
    unreachable!("one of two members must match");
}

/// Store whose operations fail for keys under one prefix, modelling a
/// partial cache outage that hits a subset of tenants.
#[derive(Clone, Debug)]
struct PartialOutageStore {
    inner: MemoryStore,
    failing_prefix: String,
}

impl PartialOutageStore {
    fn new(failing_prefix: &str) -> Self {
        Self {
            inner: MemoryStore::new(),
            failing_prefix: failing_prefix.to_string(),
        }
    }

    fn check(&self, key: &str) -> Result<(), feedwatch_store_memory::Error> {
        if key.starts_with(&self.failing_prefix) {
            Err(feedwatch_store_memory::Error)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Store for PartialOutageStore {
    type Error = feedwatch_store_memory::Error;

    async fn del<K: Into<String> + Send>(&self, key: K) -> Result<(), Self::Error> {
        let key = key.into();
        self.check(&key)?;
        self.inner.del(key).await
    }

    async fn get<K: Into<String> + Send>(&self, key: K) -> Result<Option<Bytes>, Self::Error> {
        let key = key.into();
        self.check(&key)?;
        self.inner.get(key).await
    }

    async fn keys(&self) -> Result<Vec<String>, Self::Error> {
        self.inner.keys().await
    }

    async fn put<K: Into<String> + Send>(&self, key: K, bytes: Bytes) -> Result<(), Self::Error> {
        let key = key.into();
        self.check(&key)?;
        self.inner.put(key, bytes).await
    }
}

#[tokio::test]
async fn test_forced_backfill_covers_all_tenants_without_prior_state() {
    let (engine, store, catalog, writer) = test_engine(fast_config());
    catalog
        .register_feed(
            "t1",
            FEED,
            vec![AvailabilityMetric::new("disk", MonitoringMode::Local)],
        )
        .await;
    catalog.register_feed("t2", FEED, vec![]).await;

    // No pings were ever observed for this feed
    assert!(state_of(&store, &MonitoringKey::new("t1", FEED)).await.is_none());

    engine.force_backfill(FEED).await;
    // The batch write is fire-and-forget; give it a moment
    sleep(Duration::from_millis(100)).await;

    let writes = writer.writes().await;
    let ping_metric = ping_metric_id(FEED);

    for tenant in ["t1", "t2"] {
        assert!(
            writes
                .iter()
                .any(|w| w.tenant_id == tenant
                    && w.metric_id == ping_metric
                    && w.points[0].value == Availability::Down),
            "expected a DOWN ping point for tenant {tenant}"
        );
        // A transient default state was materialized and reset
        let state = state_of(&store, &MonitoringKey::new(tenant, FEED))
            .await
            .unwrap();
        assert_eq!(state.max_quiet_period_ms, 0);
    }

    assert!(
        writes
            .iter()
            .any(|w| w.tenant_id == "t1"
                && w.metric_id == "disk"
                && w.points[0].value == Availability::Down)
    );
}

#[tokio::test]
async fn test_forced_backfill_survives_per_tenant_store_failure() {
    // MockCatalog returns tenants sorted, so the failing tenant t1 comes
    // first and must not starve t2 of its DOWN points
    let store = PartialOutageStore::new("t1/");
    let catalog = MockCatalog::new();
    let writer = MemoryTimeseries::new();
    let engine =
        BackfillEngine::with_config(store, catalog.clone(), writer.clone(), fast_config());
    catalog.register_feed("t1", FEED, vec![]).await;
    catalog.register_feed("t2", FEED, vec![]).await;

    engine.force_backfill(FEED).await;
    sleep(Duration::from_millis(100)).await;

    let writes = writer.writes().await;
    let ping_metric = ping_metric_id(FEED);
    // t1's state writes failed before any points could be produced
    assert!(writes.iter().all(|w| w.tenant_id == "t2"));
    assert!(
        writes
            .iter()
            .any(|w| w.tenant_id == "t2"
                && w.metric_id == ping_metric
                && w.points[0].value == Availability::Down),
        "expected a DOWN ping point for tenant t2"
    );
}

#[tokio::test]
async fn test_forced_backfill_with_no_tenants_is_a_noop() {
    let (engine, _store, _catalog, writer) = test_engine(fast_config());

    engine.force_backfill("unknown-feed").await;
    sleep(Duration::from_millis(100)).await;

    assert!(writer.writes().await.is_empty());
}

#[tokio::test]
async fn test_forced_backfill_cancels_active_watchdog() {
    let (engine, store, catalog, _writer) = test_engine(fast_config());
    catalog.register_feed("t1", FEED, vec![]).await;
    let metric = ping_metric_id(FEED);

    engine.observe_ping("t1", &metric, Availability::Up).await;
    sleep(Duration::from_millis(100)).await;
    engine.observe_ping("t1", &metric, Availability::Up).await;
    assert_eq!(engine.active_watchdogs(), 1);

    engine.force_backfill(FEED).await;

    assert_eq!(engine.active_watchdogs(), 0);
    let state = state_of(&store, &MonitoringKey::new("t1", FEED))
        .await
        .unwrap();
    assert_eq!(state.max_quiet_period_ms, 0);
}

#[tokio::test]
async fn test_unowned_keys_are_ignored() {
    let (engine, store, _catalog, _writer) = test_engine(fast_config());
    let local = member_for_feed(FEED, false);
    engine.on_topology_changed(members(), &local);

    let metric = ping_metric_id(FEED);
    engine.observe_ping("t1", &metric, Availability::Up).await;
    sleep(Duration::from_millis(50)).await;
    engine.observe_ping("t1", &metric, Availability::Up).await;

    // Another member owns this stream; nothing was tracked locally
    assert!(state_of(&store, &MonitoringKey::new("t1", FEED)).await.is_none());
    assert_eq!(engine.active_watchdogs(), 0);
}

#[tokio::test]
async fn test_forced_backfill_skipped_when_not_responsible() {
    let (engine, _store, catalog, writer) = test_engine(fast_config());
    catalog.register_feed("t1", FEED, vec![]).await;

    let local = member_for_feed(FEED, false);
    engine.on_topology_changed(members(), &local);

    engine.force_backfill(FEED).await;
    sleep(Duration::from_millis(100)).await;

    assert!(writer.writes().await.is_empty());
}

#[tokio::test]
async fn test_stale_watchdog_noops_after_losing_responsibility() {
    let (engine, _store, catalog, writer) = test_engine(fast_config());
    catalog.register_feed("t1", FEED, vec![]).await;
    let metric = ping_metric_id(FEED);

    // Arm while standalone (responsible for everything)
    engine.observe_ping("t1", &metric, Availability::Up).await;
    sleep(Duration::from_millis(100)).await;
    engine.observe_ping("t1", &metric, Availability::Up).await;
    assert_eq!(engine.active_watchdogs(), 1);

    // Responsibility for the key moves to the other member
    let local = member_for_feed(FEED, false);
    engine.on_topology_changed(members(), &local);

    // The stale timer eventually fires, no-ops in the backfill path, and
    // cleans itself up without writing anything
    sleep(Duration::from_millis(800)).await;
    assert!(writer.writes().await.is_empty());
    assert_eq!(engine.active_watchdogs(), 0);
}

#[tokio::test]
async fn test_invalid_topology_keeps_previous_partitioning() {
    let (engine, store, _catalog, _writer) = test_engine(fast_config());
    let metric = ping_metric_id(FEED);

    // View without the local member is rejected; the engine stays
    // standalone and keeps accepting pings for everything
    engine.on_topology_changed(members(), &MemberId::from("not-a-member"));

    engine.observe_ping("t1", &metric, Availability::Up).await;
    assert!(state_of(&store, &MonitoringKey::new("t1", FEED)).await.is_some());
}
