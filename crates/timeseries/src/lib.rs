//! Time-series storage contract for availability data points.
//!
//! The engine only ever writes: one batch of synthetic availability points
//! per backfill. Reads, retention, and querying belong to the storage
//! service behind this trait.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

use std::error::Error;
use std::fmt::Debug;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Marker trait for time-series writer errors.
pub trait TimeseriesError: Debug + Error + Send + Sync {}

/// Availability of a monitored resource at a point in time.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum Availability {
    /// The resource is reporting and reachable.
    Up,

    /// The resource is presumed offline.
    Down,

    /// The resource's state cannot be determined (remotely monitored
    /// resources whose feed went silent).
    Unknown,
}

/// One availability observation.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct AvailabilityPoint {
    /// Milliseconds since the UNIX epoch.
    pub timestamp_ms: u64,

    /// Observed (or synthesized) availability.
    pub value: Availability,
}

impl AvailabilityPoint {
    /// Creates a new availability point.
    #[must_use]
    pub const fn new(timestamp_ms: u64, value: Availability) -> Self {
        Self {
            timestamp_ms,
            value,
        }
    }
}

/// A batch entry: points destined for one metric in one tenant.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct AvailabilityWrite {
    /// Tenant owning the metric.
    pub tenant_id: String,

    /// Metric identifier within the tenant.
    pub metric_id: String,

    /// Points to append.
    pub points: Vec<AvailabilityPoint>,
}

impl AvailabilityWrite {
    /// Creates a single-point write for a metric.
    pub fn single<T, M>(tenant_id: T, metric_id: M, point: AvailabilityPoint) -> Self
    where
        T: Into<String>,
        M: Into<String>,
    {
        Self {
            tenant_id: tenant_id.into(),
            metric_id: metric_id.into(),
            points: vec![point],
        }
    }
}

/// Batch writer for availability data points.
#[async_trait]
pub trait TimeseriesWriter: Clone + Debug + Send + Sync + 'static {
    /// The error type returned by writes.
    type Error: TimeseriesError;

    /// Appends all points in the batch. The batch is not atomic; partial
    /// application on failure is allowed (synthetic points are idempotent
    /// for monitoring purposes).
    async fn write_availability(&self, batch: Vec<AvailabilityWrite>) -> Result<(), Self::Error>;
}
