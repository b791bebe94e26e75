//! Shared helpers for engine integration tests.

use std::time::Duration;

use feedwatch_catalog_mock::MockCatalog;
use feedwatch_engine::{BackfillEngine, EngineConfig, MonitoringKey, PingState};
use feedwatch_store::Store;
use feedwatch_store_memory::MemoryStore;
use feedwatch_timeseries_memory::MemoryTimeseries;

pub type TestEngine = BackfillEngine<MemoryStore, MockCatalog, MemoryTimeseries>;

/// A configuration with periods short enough to exercise the watchdog
/// lifecycle in a test run: 50ms polls, 1s floor, factor 2.0.
pub fn fast_config() -> EngineConfig {
    EngineConfig {
        poll_period: Duration::from_millis(50),
        worker_pool_size: 4,
        ping_period_factor: 2.0,
        ping_period_floor: Duration::from_secs(1),
    }
}

/// Installs a test logger once; later calls are no-ops.
fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

pub fn test_engine(
    config: EngineConfig,
) -> (TestEngine, MemoryStore, MockCatalog, MemoryTimeseries) {
    init_logging();
    let store = MemoryStore::new();
    let catalog = MockCatalog::new();
    let writer = MemoryTimeseries::new();
    let engine =
        BackfillEngine::with_config(store.clone(), catalog.clone(), writer.clone(), config);
    (engine, store, catalog, writer)
}

/// Reads and decodes the persisted ping state for a key.
pub async fn state_of(store: &MemoryStore, key: &MonitoringKey) -> Option<PingState> {
    store
        .get(key.store_key())
        .await
        .unwrap()
        .map(|bytes| PingState::from_bytes(&bytes).unwrap())
}
