//! Backfill execution: the "mark as down" side effect.

use std::sync::Arc;

use feedwatch_catalog::{Catalog, MonitoringMode};
use feedwatch_store::Store;
use feedwatch_timeseries::{Availability, AvailabilityPoint, AvailabilityWrite, TimeseriesWriter};
use tracing::{debug, error, info, warn};

use crate::error::EngineError;
use crate::jobs::JobMap;
use crate::key::{MonitoringKey, PingState, now_ms, ping_metric_id};
use crate::partitioner::ClusterPartitioner;

/// Synthesizes DOWN/UNKNOWN availability points for a feed presumed
/// offline, and resets the feed's watchdog state so the next valid ping
/// re-arms monitoring from scratch.
#[derive(Debug)]
pub struct BackfillExecutor<S, C, W>
where
    S: Store,
    C: Catalog,
    W: TimeseriesWriter,
{
    store: S,
    catalog: C,
    writer: W,
    partitioner: Arc<ClusterPartitioner>,
    jobs: Arc<JobMap>,
}

impl<S, C, W> BackfillExecutor<S, C, W>
where
    S: Store,
    C: Catalog,
    W: TimeseriesWriter,
{
    pub(crate) fn new(
        store: S,
        catalog: C,
        writer: W,
        partitioner: Arc<ClusterPartitioner>,
        jobs: Arc<JobMap>,
    ) -> Self {
        Self {
            store,
            catalog,
            writer,
            partitioner,
            jobs,
        }
    }

    /// Backfills one ping stream.
    ///
    /// Cancels the key's watchdog job and resets its persisted quiet
    /// period before writing anything: the point of the reset is "stop
    /// re-firing", independent of whether the batch write succeeds.
    /// The batch itself is submitted fire-and-forget; its outcome is
    /// logged from the write task.
    pub async fn backfill(&self, key: &MonitoringKey) -> Result<(), EngineError> {
        // A stale timer on a member that lost this key during a rebalance
        // ends here as a no-op.
        if !self.partitioner.is_responsible(key) {
            debug!("Skipping backfill for {}: no longer responsible", key);
            return Ok(());
        }

        // Only backfill once per silence episode
        self.jobs.cancel(key);
        self.reset_state(key).await?;

        let metrics = match self
            .catalog
            .availability_metrics(key.tenant_id(), key.feed_id())
            .await
        {
            Ok(metrics) => metrics,
            Err(e) => {
                warn!(
                    "Catalog lookup failed for {}: {}. Backfilling ping metric only",
                    key, e
                );
                Vec::new()
            }
        };

        let now = now_ms();
        let mut batch = Vec::with_capacity(metrics.len() + 1);

        // UNKNOWN for remotely monitored metrics, DOWN for the rest
        for metric in metrics {
            let value = match metric.mode {
                MonitoringMode::Remote => Availability::Unknown,
                MonitoringMode::Local => Availability::Down,
            };
            batch.push(AvailabilityWrite::single(
                key.tenant_id(),
                metric.metric_id,
                AvailabilityPoint::new(now, value),
            ));
        }

        // The feed's own ping metric is always marked DOWN
        batch.push(AvailabilityWrite::single(
            key.tenant_id(),
            key.ping_metric_id(),
            AvailabilityPoint::new(now, Availability::Down),
        ));

        let writer = self.writer.clone();
        let key = key.clone();
        let metric_count = batch.len();
        tokio::spawn(async move {
            match writer.write_availability(batch).await {
                Ok(()) => info!("Successful backfill of feed {} ({} metrics)", key, metric_count),
                Err(e) => warn!("Failed to backfill feed {}: {}", key, e),
            }
        });

        Ok(())
    }

    /// Backfills a feed across every tenant it reports into, triggered by
    /// an out-of-band disconnect rather than silence.
    ///
    /// Keys with no prior ping state get a transient default before the
    /// common backfill path runs, so a forced backfill never requires a
    /// pre-existing watchdog.
    pub async fn force_backfill(&self, feed_id: &str) -> Result<(), EngineError> {
        if !self
            .partitioner
            .is_responsible_for_metric(&ping_metric_id(feed_id))
        {
            return Ok(());
        }

        let tenants = self
            .catalog
            .feed_tenants(feed_id)
            .await
            .map_err(|e| EngineError::Catalog(e.to_string()))?;

        if tenants.is_empty() {
            error!("Expected at least one tenant for feed [{}]", feed_id);
            return Ok(());
        }

        // A failure on one tenant must not starve the rest of their DOWN
        // points; contain it and move on.
        for tenant_id in tenants {
            let key = MonitoringKey::new(tenant_id, feed_id);
            info!("Feed {} has been reported down and will be backfilled", key);
            if let Err(e) = self.backfill_tenant(&key).await {
                warn!("Unable to backfill {}: {}", key, e);
            }
        }

        Ok(())
    }

    async fn backfill_tenant(&self, key: &MonitoringKey) -> Result<(), EngineError> {
        self.ensure_state(key).await?;
        self.backfill(key).await
    }

    /// Resets the persisted quiet period to 0, keeping the last update
    /// time. Creates the entry if it does not exist.
    async fn reset_state(&self, key: &MonitoringKey) -> Result<(), EngineError> {
        let mut state = self.read_state_or_default(key).await?;
        state.max_quiet_period_ms = 0;
        self.store
            .put(key.store_key(), state.to_bytes()?)
            .await
            .map_err(|e| EngineError::Store(e.to_string()))
    }

    /// Writes a default state for keys the store has never seen.
    async fn ensure_state(&self, key: &MonitoringKey) -> Result<(), EngineError> {
        let existing = self
            .store
            .get(key.store_key())
            .await
            .map_err(|e| EngineError::Store(e.to_string()))?;
        if existing.is_none() {
            let state = PingState::new(now_ms());
            self.store
                .put(key.store_key(), state.to_bytes()?)
                .await
                .map_err(|e| EngineError::Store(e.to_string()))?;
        }
        Ok(())
    }

    async fn read_state_or_default(&self, key: &MonitoringKey) -> Result<PingState, EngineError> {
        let raw = self
            .store
            .get(key.store_key())
            .await
            .map_err(|e| EngineError::Store(e.to_string()))?;
        Ok(match raw {
            Some(bytes) => PingState::from_bytes(&bytes).unwrap_or_else(|e| {
                warn!("Discarding undecodable ping state for {}: {}", key, e);
                PingState::new(now_ms())
            }),
            None => PingState::new(now_ms()),
        })
    }
}
