//! Inventory catalog contract.
//!
//! The catalog is the authority on which availability-bearing metrics a
//! feed owns in a tenant, and on which tenants a feed reports into. The
//! engine only reads from it: per-tenant metric lists when synthesizing
//! backfill points, and the tenant set for a feed when a forced backfill
//! arrives without tenant context.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;

pub use error::{CatalogError, CatalogErrorKind};

use std::fmt::Debug;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// How a metric is monitored.
///
/// Remotely monitored metrics cannot be presumed down just because their
/// feed stopped reporting, so they backfill as UNKNOWN rather than DOWN.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub enum MonitoringMode {
    /// Monitored by the feed itself.
    #[default]
    Local,

    /// Monitored on behalf of a remote resource.
    Remote,
}

/// An availability-bearing metric owned by a feed.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct AvailabilityMetric {
    /// Metric identifier, unique within the tenant.
    pub metric_id: String,

    /// Monitoring mode of the metric.
    pub mode: MonitoringMode,
}

impl AvailabilityMetric {
    /// Creates a new availability metric descriptor.
    pub fn new<M: Into<String>>(metric_id: M, mode: MonitoringMode) -> Self {
        Self {
            metric_id: metric_id.into(),
            mode,
        }
    }
}

/// Read-only view of the inventory catalog.
#[async_trait]
pub trait Catalog: Clone + Debug + Send + Sync + 'static {
    /// The error type returned by catalog lookups.
    type Error: CatalogError;

    /// Returns all availability-bearing metrics owned by the feed in the
    /// given tenant.
    async fn availability_metrics(
        &self,
        tenant_id: &str,
        feed_id: &str,
    ) -> Result<Vec<AvailabilityMetric>, Self::Error>;

    /// Returns all tenants the feed currently reports into.
    async fn feed_tenants(&self, feed_id: &str) -> Result<Vec<String>, Self::Error>;
}
