//! Scripted units of work and hook counters for coordinator tests.

use memoledger_sync::{BoxFuture, Fallback, Hook, OperationError, OperationResult};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::time::Instant;

/// A re-invocable unit of work that replays a script of outcomes.
///
/// Each call pops the next scripted outcome; once the script is exhausted
/// every call succeeds with the success value. Call instants are recorded on
/// the tokio clock, so paused-time tests can check backoff spacing.
#[derive(Clone)]
pub struct ScriptedOperation<T> {
    outcomes: Arc<Mutex<VecDeque<OperationResult<T>>>>,
    success: T,
    calls: Arc<Mutex<Vec<Instant>>>,
}

impl<T: Clone + Send + Sync + 'static> ScriptedOperation<T> {
    /// Replays `outcomes`, then succeeds with `success`.
    pub fn new(outcomes: Vec<OperationResult<T>>, success: T) -> Self {
        Self {
            outcomes: Arc::new(Mutex::new(outcomes.into())),
            success,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Succeeds on every call.
    pub fn succeeding(success: T) -> Self {
        Self::new(Vec::new(), success)
    }

    /// Fails `n` times with `error`, then succeeds.
    pub fn failing_times(n: usize, error: OperationError, success: T) -> Self {
        Self::new(vec![Err(error); n], success)
    }

    /// Fails with `error` on every call.
    pub fn always_failing(error: OperationError, success: T) -> Self {
        // Comfortably more calls than any retry budget in use.
        Self::failing_times(64, error, success)
    }

    /// Returns the closure to hand to the coordinator.
    pub fn run(
        &self,
    ) -> impl Fn() -> BoxFuture<'static, OperationResult<T>> + Send + Sync + 'static {
        let script = self.clone();
        move || -> BoxFuture<'static, OperationResult<T>> {
            let script = script.clone();
            Box::pin(async move {
                script.calls.lock().push(Instant::now());
                let next = script.outcomes.lock().pop_front();
                next.unwrap_or_else(|| Ok(script.success.clone()))
            })
        }
    }

    /// Returns how many times the work ran.
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Returns each call's offset from `start` in milliseconds.
    pub fn call_offsets_ms(&self, start: Instant) -> Vec<u128> {
        self.calls
            .lock()
            .iter()
            .map(|at| at.duration_since(start).as_millis())
            .collect()
    }
}

/// Counts invocations of hooks and fallbacks built from it.
#[derive(Clone, Default)]
pub struct CallCounter(Arc<AtomicU32>);

impl CallCounter {
    /// Creates a counter at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// A hook that increments the counter.
    pub fn hook(&self) -> Hook {
        let count = Arc::clone(&self.0);
        Hook::infallible(move || {
            count.fetch_add(1, Ordering::SeqCst);
        })
    }

    /// A fallback that increments the counter.
    pub fn fallback(&self) -> Fallback {
        let count = Arc::clone(&self.0);
        Fallback::new(move || {
            let count = Arc::clone(&count);
            async move {
                count.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
    }

    /// Returns the count.
    pub fn get(&self) -> u32 {
        self.0.load(Ordering::SeqCst)
    }
}
