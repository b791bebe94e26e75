//! Engine facade: the entry points invoked by the message transport.

use std::sync::Arc;

use feedwatch_catalog::Catalog;
use feedwatch_store::Store;
use feedwatch_timeseries::{Availability, TimeseriesWriter};
use tracing::{info, trace, warn};

use crate::config::EngineConfig;
use crate::executor::BackfillExecutor;
use crate::jobs::JobMap;
use crate::key::MonitoringKey;
use crate::partitioner::{ClusterPartitioner, MemberId};
use crate::scheduler::WatchdogScheduler;

/// The feed availability backfill engine.
///
/// Composes the cluster partitioner, watchdog scheduler and backfill
/// executor behind the three entry points the transport delivers into:
/// [`observe_ping`](Self::observe_ping),
/// [`force_backfill`](Self::force_backfill) and
/// [`on_topology_changed`](Self::on_topology_changed).
///
/// Every entry point fully contains its own failures; nothing propagates
/// back to the delivering transport.
#[derive(Debug)]
pub struct BackfillEngine<S, C, W>
where
    S: Store,
    C: Catalog,
    W: TimeseriesWriter,
{
    partitioner: Arc<ClusterPartitioner>,
    scheduler: WatchdogScheduler<S, C, W>,
    executor: Arc<BackfillExecutor<S, C, W>>,
    jobs: Arc<JobMap>,
}

impl<S, C, W> BackfillEngine<S, C, W>
where
    S: Store,
    C: Catalog,
    W: TimeseriesWriter,
{
    /// Creates an engine with the default configuration.
    pub fn new(store: S, catalog: C, writer: W) -> Self {
        Self::with_config(store, catalog, writer, EngineConfig::default())
    }

    /// Creates an engine with a custom configuration.
    ///
    /// The engine starts in standalone mode, responsible for every key,
    /// until the first membership view arrives.
    pub fn with_config(store: S, catalog: C, writer: W, config: EngineConfig) -> Self {
        let partitioner = Arc::new(ClusterPartitioner::new());
        let jobs = Arc::new(JobMap::new());
        let executor = Arc::new(BackfillExecutor::new(
            store.clone(),
            catalog,
            writer,
            Arc::clone(&partitioner),
            Arc::clone(&jobs),
        ));
        let scheduler = WatchdogScheduler::new(
            store,
            Arc::clone(&partitioner),
            Arc::clone(&executor),
            Arc::clone(&jobs),
            config,
        );

        Self {
            partitioner,
            scheduler,
            executor,
            jobs,
        }
    }

    /// Delivers one availability observation.
    ///
    /// Only ping observations are acted on: the metric id must carry the
    /// reserved ping prefix and the value must be UP. Everything else is
    /// ignored.
    pub async fn observe_ping(&self, tenant_id: &str, metric_id: &str, value: Availability) {
        if value != Availability::Up {
            trace!("Ignoring non-UP observation for {}", metric_id);
            return;
        }

        let Some(key) = MonitoringKey::from_ping_metric(tenant_id, metric_id) else {
            trace!("Ignoring non-ping metric {}", metric_id);
            return;
        };

        if let Err(e) = self.scheduler.observe_ping(&key).await {
            warn!(
                "Unable to update feed availability for {}: {}. Will try again on next update",
                key, e
            );
        }
    }

    /// Backfills a feed across all of its tenants after an out-of-band
    /// disconnect signal, independent of ping cadence.
    pub async fn force_backfill(&self, feed_id: &str) {
        if let Err(e) = self.executor.force_backfill(feed_id).await {
            warn!("Forced backfill failed for feed {}: {}", feed_id, e);
        }
    }

    /// Applies a new cluster membership view.
    ///
    /// An invalid view (one that does not contain the local member) is
    /// logged and discarded, keeping the previous partitioning. Watchdogs
    /// for keys whose responsibility moved away are not cancelled eagerly;
    /// they no-op on their next responsibility check.
    pub fn on_topology_changed(&self, members: Vec<MemberId>, local_id: &MemberId) {
        // The partitioner logs the rejection; nothing propagates
        let _ = self.partitioner.on_membership_changed(members, local_id);
    }

    /// Whether this instance currently watches the given key.
    #[must_use]
    pub fn is_responsible(&self, key: &MonitoringKey) -> bool {
        self.partitioner.is_responsible(key)
    }

    /// Number of keys with an active watchdog on this instance.
    #[must_use]
    pub fn active_watchdogs(&self) -> usize {
        self.scheduler.active_watchdogs()
    }

    /// Stops all watchdog timers. Pending fire-and-forget writes are left
    /// to complete on their own.
    pub async fn shutdown(&self) {
        info!(
            "Shutting down backfill engine ({} active watchdogs)",
            self.jobs.len()
        );
        self.jobs.cancel_all();
    }
}
