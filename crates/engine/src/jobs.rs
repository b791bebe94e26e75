//! Tracking of live watchdog jobs.
//!
//! One cancellable tokio task per actively-watched key, held in a
//! concurrent map so cancellation and re-arming stay race-free per key.

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::key::MonitoringKey;

/// A live watchdog timer bound to one monitoring key. The timer task is
/// detached; this handle only carries its cancellation token.
#[derive(Debug)]
pub(crate) struct WatchdogJob {
    cancel: CancellationToken,
}

impl WatchdogJob {
    pub(crate) fn new(cancel: CancellationToken) -> Self {
        Self { cancel }
    }

    fn stop(&self) {
        // Cooperative only: a fire in flight cancels its own job, so an
        // abort here could kill the backfill it is part of.
        self.cancel.cancel();
    }
}

/// Map of active watchdog jobs, keyed by monitoring key.
#[derive(Debug, Default)]
pub(crate) struct JobMap {
    jobs: DashMap<MonitoringKey, WatchdogJob>,
}

impl JobMap {
    pub(crate) fn new() -> Self {
        Self {
            jobs: DashMap::new(),
        }
    }

    /// Registers a job for a key, stopping any job it supersedes.
    pub(crate) fn insert(&self, key: MonitoringKey, job: WatchdogJob) {
        if let Some(previous) = self.jobs.insert(key.clone(), job) {
            warn!("Superseding active watchdog job for {}", key);
            previous.stop();
        }
    }

    /// Stops and removes the job for a key, if one is active. Idempotent;
    /// a cancellation racing a concurrent fire is logged, not an error.
    pub(crate) fn cancel(&self, key: &MonitoringKey) {
        match self.jobs.remove(key) {
            Some((_, job)) => {
                job.stop();
                debug!("Cancelled watchdog job for {}", key);
            }
            None => {
                debug!("No watchdog job to cancel for {} (already stopped)", key);
            }
        }
    }

    /// Stops every active job. Used on shutdown.
    pub(crate) fn cancel_all(&self) {
        let keys: Vec<MonitoringKey> = self.jobs.iter().map(|e| e.key().clone()).collect();
        for key in keys {
            self.cancel(&key);
        }
    }

    /// Number of active jobs.
    pub(crate) fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Whether a job is active for the key.
    pub(crate) fn contains(&self, key: &MonitoringKey) -> bool {
        self.jobs.contains_key(key)
    }
}
