//! Error types for the mock catalog implementation.

use feedwatch_catalog::{CatalogError, CatalogErrorKind};
use thiserror::Error;

/// Error type for the mock catalog implementation.
#[derive(Debug, Error)]
pub enum Error {
    /// The feed is not registered with the mock.
    #[error("Feed not found: {0}")]
    FeedNotFound(String),

    /// Simulated lookup failure.
    #[error("Catalog unavailable: {0}")]
    Unavailable(String),
}

impl CatalogError for Error {
    fn kind(&self) -> CatalogErrorKind {
        match self {
            Self::FeedNotFound(_) => CatalogErrorKind::FeedNotFound,
            Self::Unavailable(_) => CatalogErrorKind::External,
        }
    }
}
