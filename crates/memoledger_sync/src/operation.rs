//! Units of work and the hooks that travel with them.

use crate::error::OperationResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use uuid::Uuid;

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

type RunFn = Arc<dyn Fn() -> BoxFuture<'static, OperationResult<()>> + Send + Sync>;

/// Identifies one coordinated operation across retries and queue passes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(Uuid);

impl OperationId {
    /// Generates a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for OperationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OperationId({})", self.0)
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A synchronous local-state hook: an optimistic update or its rollback.
#[derive(Clone)]
pub struct Hook(Arc<dyn Fn() -> OperationResult<()> + Send + Sync>);

impl Hook {
    /// Wraps a fallible hook.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn() -> OperationResult<()> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Wraps a hook that cannot fail.
    pub fn infallible<F>(f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self(Arc::new(move || {
            f();
            Ok(())
        }))
    }

    pub(crate) fn call(&self) -> OperationResult<()> {
        (self.0)()
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Hook")
    }
}

/// Work run once an operation has failed for good.
#[derive(Clone)]
pub struct Fallback(RunFn);

impl Fallback {
    /// Wraps an async fallback.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = OperationResult<()>> + Send + 'static,
    {
        Self(Arc::new(move || -> BoxFuture<'static, OperationResult<()>> {
            Box::pin(f())
        }))
    }

    pub(crate) async fn invoke(&self) -> OperationResult<()> {
        (self.0)().await
    }
}

impl fmt::Debug for Fallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Fallback")
    }
}

/// Per-call options for [`crate::AtomicOperationCoordinator::execute`].
///
/// An optimistic update is applied before the work runs; the rollback undoes
/// it if the work ultimately fails.
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    pub(crate) optimistic_update: Option<Hook>,
    pub(crate) rollback: Option<Hook>,
}

impl ExecuteOptions {
    /// Options with no local-state hooks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Options with an optimistic update and its rollback.
    pub fn optimistic(update: Hook, rollback: Hook) -> Self {
        Self {
            optimistic_update: Some(update),
            rollback: Some(rollback),
        }
    }

    /// Sets the optimistic update.
    pub fn with_optimistic_update(mut self, update: Hook) -> Self {
        self.optimistic_update = Some(update);
        self
    }

    /// Sets the rollback.
    pub fn with_rollback(mut self, rollback: Hook) -> Self {
        self.rollback = Some(rollback);
        self
    }

    /// Returns true if an optimistic update is configured.
    pub fn is_optimistic(&self) -> bool {
        self.optimistic_update.is_some()
    }
}

/// A deferred unit of work held by the offline queue.
#[derive(Clone)]
pub struct QueuedOperation {
    pub(crate) id: OperationId,
    pub(crate) name: String,
    pub(crate) run: RunFn,
    pub(crate) fallback: Option<Fallback>,
    pub(crate) rollback: Option<Hook>,
    pub(crate) enqueued_at: DateTime<Utc>,
    pub(crate) retry_count: u32,
}

impl QueuedOperation {
    /// Creates a queue entry for re-invocable work.
    pub fn new<F, Fut>(name: impl Into<String>, run: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = OperationResult<()>> + Send + 'static,
    {
        Self {
            id: OperationId::new(),
            name: name.into(),
            run: Arc::new(move || -> BoxFuture<'static, OperationResult<()>> {
                Box::pin(run())
            }),
            fallback: None,
            rollback: None,
            enqueued_at: Utc::now(),
            retry_count: 0,
        }
    }

    /// Sets the id, so a queued entry keeps the id of the call that created it.
    pub fn with_id(mut self, id: OperationId) -> Self {
        self.id = id;
        self
    }

    /// Sets the fallback run when the entry fails for good.
    pub fn with_fallback(mut self, fallback: Fallback) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Sets the rollback run when the entry fails for good.
    pub fn with_rollback(mut self, rollback: Hook) -> Self {
        self.rollback = Some(rollback);
        self
    }

    /// Returns the entry id.
    pub fn id(&self) -> OperationId {
        self.id
    }

    /// Returns the operation name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns how many queue passes have already retried this entry.
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Returns when the entry was queued.
    pub fn enqueued_at(&self) -> DateTime<Utc> {
        self.enqueued_at
    }

    /// Returns the observable part of the entry.
    pub fn summary(&self) -> QueueEntrySummary {
        QueueEntrySummary {
            id: self.id,
            name: self.name.clone(),
            enqueued_at: self.enqueued_at,
            retry_count: self.retry_count,
        }
    }

    pub(crate) fn invoke(&self) -> BoxFuture<'static, OperationResult<()>> {
        (self.run)()
    }
}

impl fmt::Debug for QueuedOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueuedOperation")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("retry_count", &self.retry_count)
            .field("enqueued_at", &self.enqueued_at)
            .finish_non_exhaustive()
    }
}

/// Observable view of a queue entry, as mirrored into coordinator state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntrySummary {
    /// Entry id.
    pub id: OperationId,
    /// Operation name.
    pub name: String,
    /// When the entry was queued.
    pub enqueued_at: DateTime<Utc>,
    /// Queue passes already spent on this entry.
    pub retry_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OperationError;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn operation_ids_are_unique() {
        let a = OperationId::new();
        let b = OperationId::new();
        assert_ne!(a, b);
        assert_eq!(a.to_string().len(), 36);
    }

    #[test]
    fn hooks_report_errors() {
        let ok = Hook::infallible(|| {});
        let failing = Hook::new(|| Err(OperationError::other("cache locked")));
        assert!(ok.call().is_ok());
        assert!(failing.call().is_err());
    }

    #[test]
    fn options_builder() {
        assert!(!ExecuteOptions::new().is_optimistic());
        let options = ExecuteOptions::new().with_optimistic_update(Hook::infallible(|| {}));
        assert!(options.is_optimistic());
        assert!(options.rollback.is_none());
    }

    #[tokio::test]
    async fn queued_operation_is_reinvocable() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let op = QueuedOperation::new("recordSale", move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        op.invoke().await.unwrap();
        op.clone().invoke().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let summary = op.summary();
        assert_eq!(summary.name, "recordSale");
        assert_eq!(summary.retry_count, 0);
        assert_eq!(summary.id, op.id());
    }
}
