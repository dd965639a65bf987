//! In-memory document store for testing.

use crate::error::{StoreError, StoreResult};
use crate::path::DocPath;
use crate::store::{RemoteStore, WriteBatch};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::trace;

/// An in-memory document store.
///
/// This store keeps the whole tree in memory and is suitable for:
/// - Unit and integration tests
/// - Local demos that do not need a real backend
///
/// It can simulate an unreachable or flaky remote: [`set_available`]
/// makes every call fail with [`StoreError::Unavailable`], and
/// [`fail_next`] queues errors that the next calls return in order.
///
/// [`set_available`]: MemoryStore::set_available
/// [`fail_next`]: MemoryStore::fail_next
///
/// # Example
///
/// ```rust
/// use memoledger_store::{DocPath, MemoryStore, RemoteStore, StoreError};
/// use serde_json::json;
///
/// let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
/// rt.block_on(async {
///     let store = MemoryStore::new();
///     let path = DocPath::parse("ids").unwrap();
///
///     store.fail_next(StoreError::Timeout);
///     assert!(store.append(&path, json!(1)).await.is_err());
///     assert!(store.append(&path, json!(1)).await.is_ok());
/// });
/// ```
#[derive(Debug)]
pub struct MemoryStore {
    root: RwLock<Value>,
    available: AtomicBool,
    injected: Mutex<VecDeque<StoreError>>,
    next_key: AtomicU64,
    calls: AtomicU64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            root: RwLock::new(Value::Object(Map::new())),
            available: AtomicBool::new(true),
            injected: Mutex::new(VecDeque::new()),
            next_key: AtomicU64::new(1),
            calls: AtomicU64::new(0),
        }
    }
}

impl MemoryStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with `root`.
    ///
    /// Non-object roots are replaced by an empty tree.
    #[must_use]
    pub fn with_root(root: Value) -> Self {
        let root = if root.is_object() {
            root
        } else {
            Value::Object(Map::new())
        };
        Self {
            root: RwLock::new(root),
            ..Self::default()
        }
    }

    /// Returns a copy of the whole tree.
    #[must_use]
    pub fn snapshot(&self) -> Value {
        self.root.read().clone()
    }

    /// Makes the store reachable or unreachable.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Returns true if the store is currently reachable.
    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    /// Makes the next call fail with `error`. Calls queue up.
    pub fn fail_next(&self, error: StoreError) {
        self.injected.lock().push_back(error);
    }

    /// Makes the next `n` calls fail with `error`.
    pub fn fail_times(&self, n: usize, error: StoreError) {
        let mut injected = self.injected.lock();
        injected.extend(std::iter::repeat(error).take(n));
    }

    /// Returns the number of calls made against the store, failed ones included.
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Counts the call and returns any simulated failure.
    fn admit(&self) -> StoreResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.is_available() {
            return Err(StoreError::Unavailable("remote store unreachable".into()));
        }
        if let Some(err) = self.injected.lock().pop_front() {
            return Err(err);
        }
        Ok(())
    }
}

fn lookup<'a>(root: &'a Value, path: &DocPath) -> Option<&'a Value> {
    path.segments()
        .iter()
        .try_fold(root, |node, segment| node.as_object()?.get(segment))
}

/// Sets `value` at `segments` below `node`, creating (or overwriting) parents.
/// A null value removes the key and prunes parents left empty.
fn assign(node: &mut Value, segments: &[String], value: Value) {
    let Some((head, rest)) = segments.split_first() else {
        return;
    };

    if !node.is_object() {
        if value.is_null() {
            return;
        }
        *node = Value::Object(Map::new());
    }
    let Some(map) = node.as_object_mut() else {
        return;
    };

    if rest.is_empty() {
        if value.is_null() {
            map.remove(head);
        } else {
            map.insert(head.clone(), value);
        }
        return;
    }

    if value.is_null() && !map.contains_key(head) {
        return;
    }
    let child = map
        .entry(head.clone())
        .or_insert_with(|| Value::Object(Map::new()));
    assign(child, rest, value);

    if child.as_object().is_some_and(Map::is_empty) {
        map.remove(head);
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn read(&self, path: &DocPath) -> StoreResult<Option<Value>> {
        self.admit()?;
        Ok(lookup(&self.root.read(), path).cloned())
    }

    async fn write(&self, path: &DocPath, value: Value) -> StoreResult<()> {
        self.admit()?;
        assign(&mut self.root.write(), path.segments(), value);
        Ok(())
    }

    async fn multi_write(&self, batch: WriteBatch) -> StoreResult<()> {
        self.admit()?;
        batch.check_disjoint()?;

        // Build the new tree aside and swap it in, so readers never see a
        // partially applied batch.
        let mut root = self.root.write();
        let mut next = root.clone();
        for (path, value) in batch.into_updates() {
            assign(&mut next, path.segments(), value);
        }
        *root = next;
        Ok(())
    }

    async fn append(&self, path: &DocPath, value: Value) -> StoreResult<String> {
        self.admit()?;
        let key = format!("k{:012}", self.next_key.fetch_add(1, Ordering::SeqCst));
        let child = path.child(&key)?;
        assign(&mut self.root.write(), child.segments(), value);
        trace!(path = %path, key = %key, "appended document");
        Ok(key)
    }

    async fn delete(&self, path: &DocPath) -> StoreResult<()> {
        self.admit()?;
        assign(&mut self.root.write(), path.segments(), Value::Null);
        Ok(())
    }
}
