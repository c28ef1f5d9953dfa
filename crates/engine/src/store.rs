//! Append-only store of execution records.
//!
//! Records are keyed by id with a secondary index by block id. The store is
//! shared as an `Arc<ExecutionStore>`; its lock is never held across an
//! await, so readers only ever observe whole records.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{BlockStatus, ExecutionRecord, ExecutionStatus};

/// Aggregate history for one block.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockStats {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub running: usize,
    /// `successful / total * 100`, rounded; 0 with no records.
    pub success_rate: u32,
    /// Mean duration of finished records, in milliseconds.
    pub average_duration_ms: Option<i64>,
}

#[derive(Default)]
struct Inner {
    records: HashMap<Uuid, ExecutionRecord>,
    /// Record ids per block, in insertion order.
    by_block: HashMap<String, Vec<Uuid>>,
}

/// Owned store of [`ExecutionRecord`]s.
#[derive(Default)]
pub struct ExecutionStore {
    inner: RwLock<Inner>,
}

impl ExecutionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a record, replacing any record with the same id.
    pub fn insert(&self, record: ExecutionRecord) -> Uuid {
        let id = record.id;
        let mut inner = self.write();
        let block_id = record.block_id.clone();
        if inner.records.insert(id, record).is_none() {
            inner.by_block.entry(block_id).or_default().push(id);
        }
        id
    }

    pub fn get(&self, id: Uuid) -> Option<ExecutionRecord> {
        self.read().records.get(&id).cloned()
    }

    /// Append a log line to a running record.
    pub fn append_log(&self, id: Uuid, message: impl AsRef<str>) -> bool {
        self.write()
            .records
            .get_mut(&id)
            .is_some_and(|record| record.log(message))
    }

    /// Move a running record to its terminal state.
    ///
    /// Returns the updated record, or `None` if the record is missing or
    /// already terminal (for example because it was cancelled meanwhile).
    pub fn finalize(&self, id: Uuid, outcome: Result<Value, String>) -> Option<ExecutionRecord> {
        let mut inner = self.write();
        let record = inner.records.get_mut(&id)?;
        record.finish(outcome).then(|| record.clone())
    }

    /// Records for `block_id`, newest first.
    pub fn records_for_block(&self, block_id: &str) -> Vec<ExecutionRecord> {
        let inner = self.read();
        let mut records: Vec<ExecutionRecord> = inner
            .by_block
            .get(block_id)
            .into_iter()
            .flatten()
            .rev()
            .filter_map(|id| inner.records.get(id).cloned())
            .collect();
        // Stable: equal start times keep newest-inserted first.
        records.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        records
    }

    pub fn latest_for_block(&self, block_id: &str) -> Option<ExecutionRecord> {
        self.records_for_block(block_id).into_iter().next()
    }

    /// Block status as mirrored from its latest record.
    pub fn derived_status(&self, block_id: &str) -> BlockStatus {
        self.latest_for_block(block_id)
            .map_or(BlockStatus::Idle, |record| record.status.into())
    }

    /// Every record currently `running`.
    pub fn running(&self) -> Vec<ExecutionRecord> {
        self.read()
            .records
            .values()
            .filter(|record| record.status == ExecutionStatus::Running)
            .cloned()
            .collect()
    }

    /// Fail every running record with `reason`. Returns the records changed.
    pub fn cancel_running(&self, reason: &str) -> Vec<ExecutionRecord> {
        let mut inner = self.write();
        let cancelled: Vec<ExecutionRecord> = inner
            .records
            .values_mut()
            .filter_map(|record| record.fail(reason).then(|| record.clone()))
            .collect();
        if !cancelled.is_empty() {
            info!(count = cancelled.len(), reason, "running records cancelled");
        }
        cancelled
    }

    /// Remove every record that started before `cutoff`. Returns how many.
    pub fn clear_before(&self, cutoff: DateTime<Utc>) -> usize {
        let mut guard = self.write();
        let inner = &mut *guard;
        let before = inner.records.len();

        inner.records.retain(|_, record| record.start_time >= cutoff);
        let records = &inner.records;
        inner.by_block.retain(|_, ids| {
            ids.retain(|id| records.contains_key(id));
            !ids.is_empty()
        });

        let removed = before - inner.records.len();
        debug!(removed, %cutoff, "pruned execution records");
        removed
    }

    /// Remove every record older than `max_age`.
    pub fn clear_older_than(&self, max_age: Duration) -> usize {
        self.clear_before(Utc::now() - max_age)
    }

    /// Percentage of successful records for `block_id`, rounded; 0 with none.
    pub fn success_rate(&self, block_id: &str) -> u32 {
        self.block_stats(block_id).success_rate
    }

    pub fn block_stats(&self, block_id: &str) -> BlockStats {
        let inner = self.read();
        let mut stats = BlockStats::default();
        let mut duration_ms_total = 0i64;
        let mut finished = 0i64;

        for record in inner
            .by_block
            .get(block_id)
            .into_iter()
            .flatten()
            .filter_map(|id| inner.records.get(id))
        {
            stats.total += 1;
            match record.status {
                ExecutionStatus::Success => stats.successful += 1,
                ExecutionStatus::Error => stats.failed += 1,
                ExecutionStatus::Running => stats.running += 1,
            }
            if let Some(duration) = record.duration() {
                duration_ms_total += duration.num_milliseconds();
                finished += 1;
            }
        }

        if stats.total > 0 {
            stats.success_rate =
                ((stats.successful as f64 / stats.total as f64) * 100.0).round() as u32;
        }
        if finished > 0 {
            stats.average_duration_ms = Some(duration_ms_total / finished);
        }
        stats
    }

    /// Drop all history for `block_id`. Returns how many records went.
    pub fn forget_block(&self, block_id: &str) -> usize {
        let mut inner = self.write();
        let Some(ids) = inner.by_block.remove(block_id) else {
            return 0;
        };
        for id in &ids {
            inner.records.remove(id);
        }
        ids.len()
    }

    /// All records, oldest first.
    pub fn all(&self) -> Vec<ExecutionRecord> {
        let mut records: Vec<ExecutionRecord> = self.read().records.values().cloned().collect();
        records.sort_by(|a, b| a.start_time.cmp(&b.start_time));
        records
    }

    pub fn len(&self) -> usize {
        self.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
