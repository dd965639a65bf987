//! Remote store trait definition.

use crate::error::{StoreError, StoreResult};
use crate::path::DocPath;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A key-addressable remote document store.
///
/// Stores hold a JSON tree. They have no knowledge of ledgers, memos or
/// balances; the ledger crate owns all document interpretation.
///
/// # Invariants
///
/// - `read` returns the full subtree at the path, or `None` if nothing is there
/// - `multi_write` applies every update in the batch or none of them
/// - Writing [`Value::Null`] removes the path
/// - `append` returns a fresh child key that sorts after all earlier keys
/// - Stores must be `Send + Sync` so they can back concurrent operations
///
/// # Implementors
///
/// - [`super::MemoryStore`] - For tests and local demos
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Reads the document at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be reached or denies access.
    async fn read(&self, path: &DocPath) -> StoreResult<Option<Value>>;

    /// Replaces the document at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be reached or denies access.
    async fn write(&self, path: &DocPath, value: Value) -> StoreResult<()>;

    /// Applies several writes atomically.
    ///
    /// Used to keep a transaction and the aggregate it contributes to
    /// consistent: either both land or neither does.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch contains overlapping paths, or the store
    /// cannot be reached. On error no update from the batch is visible.
    async fn multi_write(&self, batch: WriteBatch) -> StoreResult<()>;

    /// Appends `value` as a new child of `path` and returns the child key.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be reached or denies access.
    async fn append(&self, path: &DocPath, value: Value) -> StoreResult<String>;

    /// Deletes the document at `path`. Deleting a missing path is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be reached or denies access.
    async fn delete(&self, path: &DocPath) -> StoreResult<()>;
}

#[async_trait]
impl<S: RemoteStore + ?Sized> RemoteStore for Arc<S> {
    async fn read(&self, path: &DocPath) -> StoreResult<Option<Value>> {
        (**self).read(path).await
    }

    async fn write(&self, path: &DocPath, value: Value) -> StoreResult<()> {
        (**self).write(path, value).await
    }

    async fn multi_write(&self, batch: WriteBatch) -> StoreResult<()> {
        (**self).multi_write(batch).await
    }

    async fn append(&self, path: &DocPath, value: Value) -> StoreResult<String> {
        (**self).append(path, value).await
    }

    async fn delete(&self, path: &DocPath) -> StoreResult<()> {
        (**self).delete(path).await
    }
}

/// A set of path updates applied together by [`RemoteStore::multi_write`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    updates: BTreeMap<DocPath, Value>,
}

impl WriteBatch {
    /// Creates an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `path` to `value`. A later update to the same path wins.
    pub fn set(mut self, path: DocPath, value: Value) -> Self {
        self.updates.insert(path, value);
        self
    }

    /// Removes `path` as part of the batch.
    pub fn remove(self, path: DocPath) -> Self {
        self.set(path, Value::Null)
    }

    /// Returns the number of updates.
    pub fn len(&self) -> usize {
        self.updates.len()
    }

    /// Returns true if the batch has no updates.
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    /// Iterates over the updates in path order.
    pub fn iter(&self) -> impl Iterator<Item = (&DocPath, &Value)> {
        self.updates.iter()
    }

    /// Consumes the batch into its updates.
    pub fn into_updates(self) -> BTreeMap<DocPath, Value> {
        self.updates
    }

    /// Checks that no path in the batch is an ancestor of another.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::OverlappingPaths`] naming the first pair found.
    pub fn check_disjoint(&self) -> StoreResult<()> {
        // BTreeMap order puts an ancestor directly before its descendants.
        let paths: Vec<&DocPath> = self.updates.keys().collect();
        for pair in paths.windows(2) {
            if pair[0].contains(pair[1]) {
                return Err(StoreError::OverlappingPaths(
                    pair[0].to_string(),
                    pair[1].to_string(),
                ));
            }
        }
        Ok(())
    }
}
