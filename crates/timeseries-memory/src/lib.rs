//! Recording in-memory time-series writer for tests.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;

pub use error::Error;

use std::sync::Arc;

use async_trait::async_trait;
use feedwatch_timeseries::{AvailabilityWrite, TimeseriesWriter};
use tokio::sync::Mutex;

/// Time-series writer that records every accepted batch.
#[derive(Clone, Debug, Default)]
pub struct MemoryTimeseries {
    writes: Arc<Mutex<Vec<AvailabilityWrite>>>,
    fail_writes: Arc<Mutex<bool>>,
}

impl MemoryTimeseries {
    /// Creates a new recording writer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all writes accepted so far, flattened across batches.
    pub async fn writes(&self) -> Vec<AvailabilityWrite> {
        self.writes.lock().await.clone()
    }

    /// Makes every subsequent batch fail, to exercise error handling.
    pub async fn fail_writes(&self, fail: bool) {
        *self.fail_writes.lock().await = fail;
    }
}

#[async_trait]
impl TimeseriesWriter for MemoryTimeseries {
    type Error = Error;

    async fn write_availability(&self, batch: Vec<AvailabilityWrite>) -> Result<(), Self::Error> {
        if *self.fail_writes.lock().await {
            return Err(Error);
        }
        self.writes.lock().await.extend(batch);
        Ok(())
    }
}
