//! Feed availability backfill engine.
//!
//! Remote feeds report liveness by periodically writing an UP availability
//! point to a reserved ping metric. This engine watches those pings and
//! synthesizes DOWN/UNKNOWN availability points for a feed's metrics when
//! the feed goes silent or disconnects.
//!
//! A feed's expected ping cadence is never declared out of band; it is
//! learned from the gap between the feed's first two pings. That gap,
//! multiplied by a configured factor, becomes the feed's maximum quiet
//! period. A per-key watchdog task then polls the shared ping state and
//! fires a backfill once the quiet period is exceeded.
//!
//! In a cluster, each ping stream is watched by exactly one member: every
//! member independently computes the same modulo partitioning over the
//! sorted membership list, so no coordination messages are needed.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod config;
mod engine;
mod error;
mod executor;
mod jobs;
mod key;
mod partitioner;
mod scheduler;

pub use config::EngineConfig;
pub use engine::BackfillEngine;
pub use error::EngineError;
pub use executor::BackfillExecutor;
pub use key::{MonitoringKey, PING_METRIC_PREFIX, PingState, ping_metric_id};
pub use partitioner::{ClusterPartitioner, ClusterView, MemberId};
pub use scheduler::WatchdogScheduler;
