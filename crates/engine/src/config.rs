//! Engine configuration.

use std::time::Duration;

/// Default interval between watchdog re-checks.
const DEFAULT_POLL_PERIOD: Duration = Duration::from_secs(30);

/// Default bound on concurrently executing watchdog checks.
const DEFAULT_WORKER_POOL_SIZE: usize = 10;

/// Default multiplier applied to a feed's learned ping interval.
const DEFAULT_PING_PERIOD_FACTOR: f64 = 2.5;

/// Default maximum gap between the first two pings that is trusted as a
/// real ping interval.
const DEFAULT_PING_PERIOD_FLOOR: Duration = Duration::from_secs(125);

/// Configuration for the backfill engine.
///
/// All options have defaults, so `EngineConfig::default()` is a valid
/// production configuration.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Interval between watchdog re-checks. A dead feed is detected no
    /// later than one poll period past its maximum quiet period.
    pub poll_period: Duration,

    /// Maximum number of watchdog checks running concurrently. For large
    /// inventories this may need to be increased.
    pub worker_pool_size: usize,

    /// Multiplier applied to the learned ping interval to determine the
    /// maximum quiet period before a backfill. A feed pinging every 60s
    /// with a factor of 2.5 is backfilled after 150s of silence.
    pub ping_period_factor: f64,

    /// Feeds that ping less frequently than this are never watched. Two
    /// pings must arrive within this window before a watchdog is armed,
    /// which also protects the interval estimate from restart gaps.
    pub ping_period_floor: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_period: DEFAULT_POLL_PERIOD,
            worker_pool_size: DEFAULT_WORKER_POOL_SIZE,
            ping_period_factor: DEFAULT_PING_PERIOD_FACTOR,
            ping_period_floor: DEFAULT_PING_PERIOD_FLOOR,
        }
    }
}
