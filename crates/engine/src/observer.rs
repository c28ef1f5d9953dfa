//! Notification hooks for whatever renders execution state.

use crate::models::{Block, BlockStatus, ExecutionRecord};

/// Callbacks invoked by the orchestrator. All methods default to no-ops and
/// must not block; they run inline on the executing task.
pub trait ExecutionObserver: Send + Sync {
    /// A block started executing; `record` is the fresh `running` record.
    fn on_execute(&self, _block: &Block, _record: &ExecutionRecord) {}

    /// A record reached its terminal state.
    fn on_record(&self, _record: &ExecutionRecord) {}

    /// A block was paused or resumed.
    fn on_toggle(&self, _block_id: &str, _status: BlockStatus) {}

    /// A block's history was dropped.
    fn on_delete(&self, _block_id: &str) {}
}
