//! In-memory holder of the latest weekly grids handed to the presentation layer.

use crate::error::SyncError;
use crate::issues::Issue;
use crate::matrix::AggregationMatrix;
use chrono::{DateTime, Local};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;

/// Result of one completed reload cycle.
#[derive(Debug, Clone)]
pub struct WeeklySnapshot {
    pub generation: u64,
    pub issues: Vec<Issue>,
    pub current_week: AggregationMatrix,
    pub previous_week: AggregationMatrix,
    pub refreshed_at: DateTime<Local>,
}

#[derive(Default)]
struct StoreInner {
    snapshot: Option<WeeklySnapshot>,
    last_error: Option<SyncError>,
    latest_generation: u64,
}

/// Thread-safe slot for the most recent snapshot. Results from a cycle older than the
/// last one published are rejected, so a slow cycle cannot overwrite a fresher one.
#[derive(Clone, Default)]
pub struct SnapshotStore {
    inner: Arc<Mutex<StoreInner>>,
    changed: Arc<Notify>,
}

impl SnapshotStore {
    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Stores `snapshot` unless a newer generation already landed. Returns whether it was kept.
    pub fn publish(&self, snapshot: WeeklySnapshot) -> bool {
        let mut inner = self.lock();
        if snapshot.generation < inner.latest_generation {
            return false;
        }
        inner.latest_generation = snapshot.generation;
        inner.last_error = None;
        inner.snapshot = Some(snapshot);
        drop(inner);
        self.changed.notify_one();
        true
    }

    /// Records a failed cycle. The previous snapshot stays visible alongside the error.
    pub fn record_error(&self, generation: u64, error: SyncError) -> bool {
        let mut inner = self.lock();
        if generation < inner.latest_generation {
            return false;
        }
        inner.latest_generation = generation;
        inner.last_error = Some(error);
        true
    }

    /// Resolves after the next successful publish (or immediately if one happened unobserved).
    pub async fn changed(&self) {
        self.changed.notified().await;
    }

    pub fn snapshot(&self) -> Option<WeeklySnapshot> {
        self.lock().snapshot.clone()
    }

    pub fn last_error(&self) -> Option<SyncError> {
        self.lock().last_error.clone()
    }

    /// Forgets everything shown for the previous account. Generation numbering is kept.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.snapshot = None;
        inner.last_error = None;
    }
}
