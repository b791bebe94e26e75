//! Error types for engine operations.

use thiserror::Error;

/// Errors raised by the backfill engine.
///
/// None of these escape the public entry points; the facade logs and
/// contains every failure so the delivering transport never sees one.
#[derive(Clone, Debug, Error)]
pub enum EngineError {
    /// Ping-state store error.
    #[error("Store error: {0}")]
    Store(String),

    /// Inventory catalog error.
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// Persisted ping state could not be encoded or decoded.
    #[error("State encoding error: {0}")]
    Codec(String),

    /// A membership view that does not include the local member.
    #[error("Invalid cluster view: {0}")]
    InvalidView(String),
}
