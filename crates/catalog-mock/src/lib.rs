//! Configurable in-memory catalog for tests.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;

pub use error::Error;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use feedwatch_catalog::{AvailabilityMetric, Catalog};
use tokio::sync::RwLock;

/// In-memory catalog whose contents are registered up front by the test.
#[derive(Clone, Debug, Default)]
pub struct MockCatalog {
    // (tenant_id, feed_id) -> metrics owned by the feed in that tenant
    metrics: Arc<RwLock<HashMap<(String, String), Vec<AvailabilityMetric>>>>,
    fail_lookups: Arc<RwLock<bool>>,
}

impl MockCatalog {
    /// Creates an empty mock catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the availability metrics a feed owns in a tenant.
    ///
    /// Registering a feed with an empty metric list still associates the
    /// feed with the tenant for `feed_tenants`.
    pub async fn register_feed(
        &self,
        tenant_id: &str,
        feed_id: &str,
        metrics: Vec<AvailabilityMetric>,
    ) {
        self.metrics
            .write()
            .await
            .insert((tenant_id.to_string(), feed_id.to_string()), metrics);
    }

    /// Makes every subsequent lookup fail, to exercise error handling.
    pub async fn fail_lookups(&self, fail: bool) {
        *self.fail_lookups.write().await = fail;
    }
}

#[async_trait]
impl Catalog for MockCatalog {
    type Error = Error;

    async fn availability_metrics(
        &self,
        tenant_id: &str,
        feed_id: &str,
    ) -> Result<Vec<AvailabilityMetric>, Self::Error> {
        if *self.fail_lookups.read().await {
            return Err(Error::Unavailable("simulated outage".to_string()));
        }

        let metrics = self.metrics.read().await;
        Ok(metrics
            .get(&(tenant_id.to_string(), feed_id.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn feed_tenants(&self, feed_id: &str) -> Result<Vec<String>, Self::Error> {
        if *self.fail_lookups.read().await {
            return Err(Error::Unavailable("simulated outage".to_string()));
        }

        let metrics = self.metrics.read().await;
        let mut tenants: Vec<String> = metrics
            .keys()
            .filter(|(_, feed)| feed == feed_id)
            .map(|(tenant, _)| tenant.clone())
            .collect();
        tenants.sort();
        tenants.dedup();
        Ok(tenants)
    }
}
