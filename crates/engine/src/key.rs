//! Monitoring key and persisted ping state.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Reserved prefix of feed ping metric identifiers. The metric id of a
/// feed's ping stream is the prefix followed by the feed id.
pub const PING_METRIC_PREFIX: &str = "feed-availability-";

/// Returns the ping metric identifier for a feed.
#[must_use]
pub fn ping_metric_id(feed_id: &str) -> String {
    format!("{PING_METRIC_PREFIX}{feed_id}")
}

/// Identifies one watched ping stream: a feed reporting into a tenant.
///
/// A single feed may report into several tenants, producing one key per
/// tenant. Keys are equal iff both tenant and feed match.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct MonitoringKey {
    tenant_id: String,
    feed_id: String,
}

impl MonitoringKey {
    /// Creates a key from a tenant and feed id.
    pub fn new<T: Into<String>, F: Into<String>>(tenant_id: T, feed_id: F) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            feed_id: feed_id.into(),
        }
    }

    /// Derives a key from a tenant and a ping metric identifier.
    ///
    /// Returns `None` if the metric id does not carry the reserved ping
    /// prefix (i.e. the observation is not a feed ping).
    pub fn from_ping_metric(tenant_id: &str, metric_id: &str) -> Option<Self> {
        metric_id
            .strip_prefix(PING_METRIC_PREFIX)
            .map(|feed_id| Self::new(tenant_id, feed_id))
    }

    /// The tenant this ping stream reports into.
    #[must_use]
    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    /// The feed sending the pings.
    #[must_use]
    pub fn feed_id(&self) -> &str {
        &self.feed_id
    }

    /// The ping metric identifier for this key's feed.
    #[must_use]
    pub fn ping_metric_id(&self) -> String {
        ping_metric_id(&self.feed_id)
    }

    /// The key under which this stream's state lives in the shared store.
    #[must_use]
    pub fn store_key(&self) -> String {
        format!("{}/{}", self.tenant_id, self.ping_metric_id())
    }
}

impl fmt::Display for MonitoringKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[tenant={}, feed={}]", self.tenant_id, self.feed_id)
    }
}

/// Per-key ping tracking state, shared across cluster members through the
/// ping-state store.
///
/// `max_quiet_period_ms == 0` means no watchdog is armed: the feed's ping
/// interval is still being learned. The field is set once when the
/// interval is established and reset to 0 when a backfill fires, so a
/// feed must re-establish its cadence before being watched again.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct PingState {
    /// Timestamp of the most recently observed ping (ms since epoch).
    pub last_update_ms: u64,

    /// Silence tolerance before a backfill; 0 while still learning.
    pub max_quiet_period_ms: u64,
}

impl PingState {
    /// Fresh state for a first-ever ping observed at `now_ms`.
    #[must_use]
    pub const fn new(now_ms: u64) -> Self {
        Self {
            last_update_ms: now_ms,
            max_quiet_period_ms: 0,
        }
    }

    /// Whether a watchdog has been armed for this key.
    #[must_use]
    pub const fn has_watchdog(&self) -> bool {
        self.max_quiet_period_ms > 0
    }

    /// Encodes the state for the byte-oriented store.
    pub fn to_bytes(&self) -> Result<Bytes, EngineError> {
        let mut buf = Vec::new();
        ciborium::ser::into_writer(self, &mut buf)
            .map_err(|e| EngineError::Codec(e.to_string()))?;
        Ok(Bytes::from(buf))
    }

    /// Decodes state previously written with [`PingState::to_bytes`].
    pub fn from_bytes(bytes: &Bytes) -> Result<Self, EngineError> {
        ciborium::de::from_reader(bytes.as_ref()).map_err(|e| EngineError::Codec(e.to_string()))
    }
}

/// Current wall-clock time in milliseconds since the UNIX epoch.
pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
