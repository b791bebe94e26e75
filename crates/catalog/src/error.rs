//! Error contract for catalog implementations.

use std::error::Error;
use std::fmt::{self, Debug};

/// Marker trait for catalog errors.
pub trait CatalogError: Debug + Error + Send + Sync {
    /// Returns the kind of this error.
    fn kind(&self) -> CatalogErrorKind;
}

/// The kind of catalog error.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CatalogErrorKind {
    /// The feed is not known to the catalog.
    FeedNotFound,

    /// Error reaching the backing inventory service.
    External,

    /// Other/unknown error.
    Other,
}

impl fmt::Display for CatalogErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}
