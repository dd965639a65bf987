//! Response-time tracking for completed operations.

use crate::config::PerformanceConfig;
use crate::state::{CoordinatorAction, StateHandle};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Aggregate metrics over every completed operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetrics {
    /// Completed operations.
    pub operation_count: u64,
    /// Running mean response time in milliseconds.
    pub average_response_time_ms: f64,
    /// Slowest response seen, in milliseconds.
    pub max_response_time_ms: u64,
    /// Operations slower than the slow threshold.
    pub slow_operations: u64,
    /// When the last operation completed.
    pub last_operation_time: Option<DateTime<Utc>>,
}

/// Metrics for a single operation name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationStats {
    /// Completed operations.
    pub count: u64,
    /// Mean response time in milliseconds.
    pub average_ms: f64,
    /// Slowest response in milliseconds.
    pub max_ms: u64,
}

#[derive(Debug, Default)]
struct TrackerState {
    metrics: PerformanceMetrics,
    by_name: BTreeMap<String, OperationStats>,
}

/// Folds completed-operation durations into [`PerformanceMetrics`].
pub struct PerformanceTracker {
    config: PerformanceConfig,
    inner: Mutex<TrackerState>,
    state: Arc<dyn StateHandle>,
}

impl PerformanceTracker {
    /// Creates a tracker reporting to `state`.
    pub fn new(config: PerformanceConfig, state: Arc<dyn StateHandle>) -> Self {
        Self {
            config,
            inner: Mutex::new(TrackerState::default()),
            state,
        }
    }

    /// Records one completed operation and returns the updated metrics.
    pub fn record(&self, name: &str, duration: Duration) -> PerformanceMetrics {
        let ms = duration.as_millis() as f64;
        let slow = duration > self.config.slow_threshold;

        let metrics = {
            let mut inner = self.inner.lock();
            let m = &mut inner.metrics;
            let n = m.operation_count as f64;
            m.average_response_time_ms = (m.average_response_time_ms * n + ms) / (n + 1.0);
            m.operation_count += 1;
            m.max_response_time_ms = m.max_response_time_ms.max(ms as u64);
            if slow {
                m.slow_operations += 1;
            }
            m.last_operation_time = Some(Utc::now());
            let metrics = m.clone();

            let stats = inner.by_name.entry(name.to_string()).or_default();
            let n = stats.count as f64;
            stats.average_ms = (stats.average_ms * n + ms) / (n + 1.0);
            stats.count += 1;
            stats.max_ms = stats.max_ms.max(ms as u64);
            metrics
        };

        if duration > self.config.very_slow_threshold {
            warn!(operation = name, duration_ms = ms as u64, "very slow operation");
        } else if slow {
            info!(operation = name, duration_ms = ms as u64, "slow operation");
        }

        self.state
            .dispatch(CoordinatorAction::UpdatePerformanceMetrics(metrics.clone()));
        metrics
    }

    /// Returns the aggregate metrics.
    pub fn metrics(&self) -> PerformanceMetrics {
        self.inner.lock().metrics.clone()
    }

    /// Returns metrics for one operation name.
    pub fn operation_stats(&self, name: &str) -> Option<OperationStats> {
        self.inner.lock().by_name.get(name).cloned()
    }

    /// Returns metrics for every operation name seen so far.
    pub fn all_operation_stats(&self) -> BTreeMap<String, OperationStats> {
        self.inner.lock().by_name.clone()
    }
}

impl std::fmt::Debug for PerformanceTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PerformanceTracker")
            .field("config", &self.config)
            .field("metrics", &self.metrics())
            .finish_non_exhaustive()
    }
}
