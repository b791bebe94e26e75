//! Abstract interface for the shared ping-state cache.
//!
//! The engine keeps one small record per monitored ping stream in a
//! key-value store that is visible to every cluster member. Deployments
//! back this with a replicated cache; tests and standalone deployments use
//! the in-memory implementation.
//!
//! The contract is deliberately weak: last-writer-wins `put`, no
//! compare-and-swap. Partitioning guarantees a single writer per key, so
//! the store itself never has to arbitrate concurrent writers.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

use std::error::Error;
use std::fmt::Debug;

use async_trait::async_trait;
use bytes::Bytes;

/// Marker trait for store errors.
pub trait StoreError: Debug + Error + Send + Sync {}

/// A key-value store with asynchronous operations.
///
/// Reads must see the caller's own prior writes; reads of other members'
/// writes may be stale (a stale read only delays a backfill).
#[async_trait]
pub trait Store: Clone + Debug + Send + Sync + 'static {
    /// The error type returned by store operations.
    type Error: StoreError;

    /// Deletes a key from the store.
    async fn del<K: Into<String> + Send>(&self, key: K) -> Result<(), Self::Error>;

    /// Retrieves the value associated with a key.
    async fn get<K: Into<String> + Send>(&self, key: K) -> Result<Option<Bytes>, Self::Error>;

    /// Retrieves all keys in the store.
    async fn keys(&self) -> Result<Vec<String>, Self::Error>;

    /// Stores a key-value pair, overwriting any previous value.
    async fn put<K: Into<String> + Send>(&self, key: K, bytes: Bytes) -> Result<(), Self::Error>;
}
