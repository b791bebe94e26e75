//! Ping-interval learning and watchdog lifecycle.

use std::sync::Arc;

use feedwatch_catalog::Catalog;
use feedwatch_store::Store;
use feedwatch_timeseries::TimeseriesWriter;
use tokio::sync::Semaphore;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::executor::BackfillExecutor;
use crate::jobs::{JobMap, WatchdogJob};
use crate::key::{MonitoringKey, PingState, now_ms};
use crate::partitioner::ClusterPartitioner;

/// Learns each feed's ping cadence and runs one recurring watchdog check
/// per armed key.
#[derive(Debug)]
pub struct WatchdogScheduler<S, C, W>
where
    S: Store,
    C: Catalog,
    W: TimeseriesWriter,
{
    store: S,
    partitioner: Arc<ClusterPartitioner>,
    executor: Arc<BackfillExecutor<S, C, W>>,
    jobs: Arc<JobMap>,
    config: EngineConfig,
    /// Bounds the number of concurrently executing watchdog checks; the
    /// timers themselves are cheap, the check bodies do store I/O.
    check_permits: Arc<Semaphore>,
}

impl<S, C, W> WatchdogScheduler<S, C, W>
where
    S: Store,
    C: Catalog,
    W: TimeseriesWriter,
{
    pub(crate) fn new(
        store: S,
        partitioner: Arc<ClusterPartitioner>,
        executor: Arc<BackfillExecutor<S, C, W>>,
        jobs: Arc<JobMap>,
        config: EngineConfig,
    ) -> Self {
        let check_permits = Arc::new(Semaphore::new(config.worker_pool_size.max(1)));
        Self {
            store,
            partitioner,
            executor,
            jobs,
            config,
            check_permits,
        }
    }

    /// Records a ping for a key, learning the feed's interval and arming
    /// a watchdog once two pings arrive close enough together.
    ///
    /// Keys owned by another cluster member are ignored. The first-ever
    /// ping only creates unarmed state; the second ping, if it lands
    /// within the configured floor, establishes the cadence and arms the
    /// watchdog; subsequent pings just refresh the last-update time, which
    /// the running watchdog re-reads on its next poll.
    pub async fn observe_ping(&self, key: &MonitoringKey) -> Result<(), EngineError> {
        if !self.partitioner.is_responsible(key) {
            return Ok(());
        }

        let now = now_ms();
        let raw = self
            .store
            .get(key.store_key())
            .await
            .map_err(|e| EngineError::Store(e.to_string()))?;

        let state = match raw {
            None => {
                // First observed ping: start learning, no watchdog yet
                debug!("First ping observed for {}", key);
                PingState::new(now)
            }
            Some(bytes) => {
                let mut state = PingState::from_bytes(&bytes).unwrap_or_else(|e| {
                    warn!("Discarding undecodable ping state for {}: {}", key, e);
                    PingState::new(now)
                });

                if !state.has_watchdog() {
                    // Second ping while unarmed: trust the gap as the ping
                    // interval only if it is within the floor
                    let observed_ms = now.saturating_sub(state.last_update_ms);
                    let floor_ms = self.config.ping_period_floor.as_millis() as u64;

                    if observed_ms > 0 && observed_ms <= floor_ms {
                        let max_quiet_ms =
                            learned_quiet_period(observed_ms, self.config.ping_period_factor);
                        debug!(
                            "Starting watchdog for {} (ping period {}ms, max quiet {}ms)",
                            key, observed_ms, max_quiet_ms
                        );
                        state.max_quiet_period_ms = max_quiet_ms;
                        self.arm_watchdog(key.clone());
                    } else {
                        debug!(
                            "Not arming watchdog for {}: ping gap {}ms exceeds floor {}ms",
                            key, observed_ms, floor_ms
                        );
                    }
                }

                state.last_update_ms = now;
                state
            }
        };

        self.store
            .put(key.store_key(), state.to_bytes()?)
            .await
            .map_err(|e| EngineError::Store(e.to_string()))
    }

    /// Spawns the recurring watchdog check for a key.
    ///
    /// The task polls the shared state at the configured period and fires
    /// a backfill once the quiet time exceeds the key's tolerance. It runs
    /// until cancelled, until its state disappears, or until it fires.
    fn arm_watchdog(&self, key: MonitoringKey) {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let store = self.store.clone();
        let executor = Arc::clone(&self.executor);
        let jobs = Arc::clone(&self.jobs);
        let permits = Arc::clone(&self.check_permits);
        let poll_period = self.config.poll_period;
        let task_key = key.clone();

        tokio::spawn(async move {
            // First check one poll period from now, not immediately
            let start = tokio::time::Instant::now() + poll_period;
            let mut interval = tokio::time::interval_at(start, poll_period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let Ok(_permit) = permits.acquire().await else {
                            break;
                        };
                        if !check_once(&store, &executor, &jobs, &task_key).await {
                            break;
                        }
                    }
                    _ = token.cancelled() => {
                        trace!("Watchdog for {} cancelled", task_key);
                        break;
                    }
                }
            }
        });

        self.jobs.insert(key, WatchdogJob::new(cancel));
    }

    /// Number of keys with an active watchdog on this instance.
    #[must_use]
    pub fn active_watchdogs(&self) -> usize {
        self.jobs.len()
    }
}

/// One watchdog poll tick. Returns `false` when the job should stop.
async fn check_once<S, C, W>(
    store: &S,
    executor: &BackfillExecutor<S, C, W>,
    jobs: &JobMap,
    key: &MonitoringKey,
) -> bool
where
    S: Store,
    C: Catalog,
    W: TimeseriesWriter,
{
    let state = match store.get(key.store_key()).await {
        Ok(Some(bytes)) => match PingState::from_bytes(&bytes) {
            Ok(state) => state,
            Err(e) => {
                warn!("Undecodable ping state for {}: {}. Cancelling watchdog", key, e);
                jobs.cancel(key);
                return false;
            }
        },
        Ok(None) => {
            warn!(
                "Did not find expected ping state. Cancelling watchdog for {}",
                key
            );
            jobs.cancel(key);
            return false;
        }
        Err(e) => {
            // Transient store failure: keep the job, retry next tick
            warn!("Failed to read ping state for {}: {}", key, e);
            return true;
        }
    };

    if !state.has_watchdog() {
        // Someone else already fired and reset this key (e.g. a forced
        // backfill); this timer is stale
        debug!("Quiet period already reset for {}. Cancelling watchdog", key);
        jobs.cancel(key);
        return false;
    }

    let quiet_ms = now_ms().saturating_sub(state.last_update_ms);
    if quiet_ms <= state.max_quiet_period_ms {
        trace!("Feed is reporting: {}", key);
        return true;
    }

    // One-shot backfill per silence episode; the feed must re-learn its
    // interval before being watched again
    info!(
        "Feed {} has not reported for {}ms and will be backfilled",
        key, quiet_ms
    );
    if let Err(e) = executor.backfill(key).await {
        warn!("Backfill failed for {}: {}", key, e);
    }
    // The backfill path normally cancels the job itself, but skips it when
    // responsibility has moved away; remove the entry either way.
    jobs.cancel(key);
    false
}

/// Maximum quiet period learned from an observed ping interval.
fn learned_quiet_period(observed_interval_ms: u64, factor: f64) -> u64 {
    (observed_interval_ms as f64 * factor) as u64
}
