//! Workflow orchestration.
//!
//! `Orchestrator` is the engine proper:
//! 1. Validates the graph and builds its adjacency map.
//! 2. Picks a start block (explicit, else the first trigger).
//! 3. Walks the graph depth-first, executing each block through its
//!    connector and feeding the block's output to its successors.
//! 4. Records one `ExecutionRecord` per visit in the shared store.
//! 5. Enforces single-flight runs, pause and cancellation.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use connectors::{Connector, ConnectorContext, ConnectorRegistry};
use futures::future::{BoxFuture, FutureExt};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::graph::{build_adjacency, select_start_block, validate_graph, Adjacency};
use crate::models::{Block, BlockStatus, Connection, ExecutionRecord, ExecutionStatus, WorkflowGraph};
use crate::observer::ExecutionObserver;
use crate::policy::TraversalPolicy;
use crate::store::{BlockStats, ExecutionStore};
use crate::EngineError;

const CANCELLED_BY_USER: &str = "cancelled by user";

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tuning knobs for the orchestrator.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Policy used when a run does not choose one.
    pub default_policy: TraversalPolicy,
    /// Upper bound on a single connector call.
    pub block_timeout: Option<Duration>,
    /// Age after which [`Orchestrator::prune_expired`] drops records.
    pub retention_hours: Option<u32>,
}

impl EngineConfig {
    pub fn with_policy(mut self, policy: TraversalPolicy) -> Self {
        self.default_policy = policy;
        self
    }

    pub fn with_block_timeout(mut self, timeout: Duration) -> Self {
        self.block_timeout = Some(timeout);
        self
    }

    pub fn with_retention_hours(mut self, hours: u32) -> Self {
        self.retention_hours = Some(hours);
        self
    }
}

// ---------------------------------------------------------------------------
// Run options and results
// ---------------------------------------------------------------------------

/// Per-run choices.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Start here instead of at the first trigger block.
    pub start_block_id: Option<String>,
    /// Overrides [`EngineConfig::default_policy`].
    pub policy: Option<TraversalPolicy>,
}

/// The result of one workflow run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub run_id: Uuid,
    pub start_block_id: String,
    pub policy: TraversalPolicy,
    /// Records in visit order.
    pub records: Vec<ExecutionRecord>,
    /// Blocks whose failure stopped their branch.
    pub halted: Vec<String>,
    /// Blocks skipped because they were already on the current path.
    pub cycles_skipped: Vec<String>,
    pub cancelled: bool,
}

impl RunSummary {
    /// Block ids in visit order.
    pub fn visited(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.block_id.as_str()).collect()
    }

    /// The first record produced for `block_id`.
    pub fn record_for(&self, block_id: &str) -> Option<&ExecutionRecord> {
        self.records.iter().find(|r| r.block_id == block_id)
    }

    /// `true` when every visited block succeeded and the run was not cancelled.
    pub fn succeeded(&self) -> bool {
        !self.cancelled
            && self
                .records
                .iter()
                .all(|r| r.status == ExecutionStatus::Success)
    }
}

// ---------------------------------------------------------------------------
// Single-flight bookkeeping
// ---------------------------------------------------------------------------

struct ActiveRun {
    id: Uuid,
    cancel: CancellationToken,
    /// `true` while any block of this run is paused.
    pause: watch::Sender<bool>,
}

/// A pause request on one running record.
#[derive(Debug, Clone, Copy)]
struct PauseEntry {
    record_id: Uuid,
    /// `None` for a standalone block call, which never gates a run.
    run_id: Option<Uuid>,
}

/// Releases the active-run slot on drop, but only if it still holds this
/// run. Pause entries registered for the run are dropped either way.
struct RunGuard<'a> {
    orchestrator: &'a Orchestrator,
    run_id: Uuid,
    cancel: CancellationToken,
    pause: watch::Receiver<bool>,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        let mut slot = self.orchestrator.active_slot();
        if slot.as_ref().is_some_and(|run| run.id == self.run_id) {
            *slot = None;
        }

        let mut paused = self.orchestrator.paused();
        let before = paused.len();
        paused.retain(|_, entry| entry.run_id != Some(self.run_id));
        if paused.len() != before {
            debug!(run_id = %self.run_id, released = before - paused.len(), "pauses released with run");
        }
    }
}

/// Mutable state threaded through one traversal.
struct Walk<'g> {
    run_id: Uuid,
    cancel: CancellationToken,
    pause: watch::Receiver<bool>,
    policy: TraversalPolicy,
    adjacency: &'g Adjacency,
    blocks: &'g HashMap<&'g str, &'g Block>,
    /// Blocks on the current path.
    visiting: HashSet<String>,
    summary: RunSummary,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Executes blocks and workflow graphs against a connector registry,
/// recording every attempt in an [`ExecutionStore`].
pub struct Orchestrator {
    registry: ConnectorRegistry,
    store: Arc<ExecutionStore>,
    config: EngineConfig,
    observers: Vec<Arc<dyn ExecutionObserver>>,
    /// Locked before `paused_blocks` whenever both are held.
    active_run: Mutex<Option<ActiveRun>>,
    /// Token for block calls made outside a workflow run.
    manual_cancel: Mutex<CancellationToken>,
    paused_blocks: Mutex<HashMap<String, PauseEntry>>,
}

impl Orchestrator {
    /// Create a new orchestrator around `registry`, writing to `store`.
    pub fn new(registry: ConnectorRegistry, store: Arc<ExecutionStore>, config: EngineConfig) -> Self {
        Self {
            registry,
            store,
            config,
            observers: Vec::new(),
            active_run: Mutex::new(None),
            manual_cancel: Mutex::new(CancellationToken::new()),
            paused_blocks: Mutex::new(HashMap::new()),
        }
    }

    /// Attach an observer. Observers are called in registration order.
    pub fn with_observer(mut self, observer: Arc<dyn ExecutionObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn registry(&self) -> &ConnectorRegistry {
        &self.registry
    }

    pub fn store(&self) -> &Arc<ExecutionStore> {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Register (or replace) the connector for its application.
    pub fn register_connector(&self, connector: Arc<dyn Connector>) {
        self.registry.register(connector);
    }

    fn active_slot(&self) -> MutexGuard<'_, Option<ActiveRun>> {
        self.active_run
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn paused(&self) -> MutexGuard<'_, HashMap<String, PauseEntry>> {
        self.paused_blocks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, event: impl Fn(&dyn ExecutionObserver)) {
        for observer in &self.observers {
            event(observer.as_ref());
        }
    }

    // -----------------------------------------------------------------------
    // Single block
    // -----------------------------------------------------------------------

    /// Execute one block outside of a workflow run.
    ///
    /// Never fails: every error is captured in the returned record.
    #[instrument(skip(self, block, input), fields(block_id = %block.id))]
    pub async fn execute_block(&self, block: &Block, input: Option<Value>) -> ExecutionRecord {
        let cancel = self
            .manual_cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        self.run_block(block, input, None, &cancel).await
    }

    async fn run_block(
        &self,
        block: &Block,
        input: Option<Value>,
        run_id: Option<Uuid>,
        cancel: &CancellationToken,
    ) -> ExecutionRecord {
        let record = ExecutionRecord::start(&block.id, run_id, input.clone());
        let record_id = record.id;
        let mut fallback = record.clone();
        self.notify(|o| o.on_execute(block, &record));
        self.store.insert(record);

        info!(
            block_id = %block.id,
            application = %block.application,
            operation = %block.action.operation,
            "block started"
        );

        let ctx = ConnectorContext {
            block_id: block.id.clone(),
            run_id,
            cancel: cancel.clone(),
        };
        let outcome = match self.invoke(block, input, &ctx).await {
            Ok(output) => {
                info!(block_id = %block.id, "block succeeded");
                Ok(output)
            }
            Err(err) => {
                warn!(block_id = %block.id, error = %err, "block failed");
                Err(err.to_string())
            }
        };

        let finished = match self.store.finalize(record_id, outcome.clone()) {
            Some(done) => {
                self.notify(|o| o.on_record(&done));
                done
            }
            // Already terminal (cancelled meanwhile) or pruned.
            None => self.store.get(record_id).unwrap_or_else(|| {
                debug!(block_id = %block.id, "record left the store before finishing");
                fallback.finish(outcome);
                fallback
            }),
        };

        if run_id.is_none() {
            self.release_standalone_pause(&block.id, record_id);
        }
        finished
    }

    /// Drop the pause on a standalone call once its record is terminal.
    fn release_standalone_pause(&self, block_id: &str, record_id: Uuid) {
        let released = {
            let mut paused = self.paused();
            let owned = paused
                .get(block_id)
                .is_some_and(|entry| entry.record_id == record_id && entry.run_id.is_none());
            owned && paused.remove(block_id).is_some()
        };
        if released {
            debug!(block_id, "standalone call finished while paused");
            self.notify(|o| o.on_toggle(block_id, self.block_status(block_id)));
        }
    }

    async fn invoke(
        &self,
        block: &Block,
        input: Option<Value>,
        ctx: &ConnectorContext,
    ) -> Result<Value, EngineError> {
        let connector = self.registry.lookup(&block.application)?;
        let action = &block.action;

        if !connector.validate(&action.operation, &action.config) {
            return Err(EngineError::InvalidConfiguration {
                application: block.application.to_string(),
                operation: action.operation.clone(),
            });
        }

        let call = connector.execute(&action.operation, &action.config, input, ctx);
        let call = async {
            match self.config.block_timeout {
                Some(limit) => match tokio::time::timeout(limit, call).await {
                    Ok(result) => result.map_err(EngineError::from),
                    Err(_) => Err(EngineError::Timeout(limit)),
                },
                None => call.await.map_err(EngineError::from),
            }
        };

        tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => Err(EngineError::Cancelled),
            result = call => result,
        }
    }

    // -----------------------------------------------------------------------
    // Workflow runs
    // -----------------------------------------------------------------------

    /// Run the workflow from `start_block_id` (or the first trigger) with the
    /// configured default policy.
    ///
    /// # Errors
    /// Workflow-level errors only; see [`EngineError::is_workflow_level`].
    pub async fn execute_workflow(
        &self,
        blocks: &[Block],
        connections: &[Connection],
        start_block_id: Option<&str>,
    ) -> Result<RunSummary, EngineError> {
        let options = RunOptions {
            start_block_id: start_block_id.map(str::to_owned),
            policy: None,
        };
        self.execute_workflow_with(blocks, connections, options).await
    }

    /// [`Orchestrator::execute_workflow`] for a `{blocks, connections}` payload.
    pub async fn execute_graph(
        &self,
        graph: &WorkflowGraph,
        options: RunOptions,
    ) -> Result<RunSummary, EngineError> {
        self.execute_workflow_with(&graph.blocks, &graph.connections, options)
            .await
    }

    /// Run the workflow with explicit [`RunOptions`].
    #[instrument(skip_all, fields(blocks = blocks.len(), connections = connections.len()))]
    pub async fn execute_workflow_with(
        &self,
        blocks: &[Block],
        connections: &[Connection],
        options: RunOptions,
    ) -> Result<RunSummary, EngineError> {
        let guard = self.begin_run()?;

        validate_graph(blocks, connections)?;
        let adjacency = build_adjacency(blocks, connections);
        let start = select_start_block(blocks, options.start_block_id.as_deref())?;
        let policy = options.policy.unwrap_or(self.config.default_policy);
        let by_id: HashMap<&str, &Block> = blocks.iter().map(|b| (b.id.as_str(), b)).collect();

        info!(run_id = %guard.run_id, start = %start.id, ?policy, "workflow run started");

        let mut walk = Walk {
            run_id: guard.run_id,
            cancel: guard.cancel.clone(),
            pause: guard.pause.clone(),
            policy,
            adjacency: &adjacency,
            blocks: &by_id,
            visiting: HashSet::new(),
            summary: RunSummary {
                run_id: guard.run_id,
                start_block_id: start.id.clone(),
                policy,
                records: Vec::new(),
                halted: Vec::new(),
                cycles_skipped: Vec::new(),
                cancelled: false,
            },
        };

        self.visit(&mut walk, start, None).await;

        let mut summary = walk.summary;
        summary.cancelled = walk.cancel.is_cancelled();
        info!(
            run_id = %summary.run_id,
            visited = summary.records.len(),
            cancelled = summary.cancelled,
            "workflow run finished"
        );
        drop(guard);
        Ok(summary)
    }

    fn begin_run(&self) -> Result<RunGuard<'_>, EngineError> {
        let mut active = self.active_slot();
        if let Some(run) = active.as_ref() {
            warn!(active_run = %run.id, "refusing to start a second workflow run");
            return Err(EngineError::AlreadyRunning);
        }

        let (pause, pause_rx) = watch::channel(false);
        let run = ActiveRun {
            id: Uuid::new_v4(),
            cancel: CancellationToken::new(),
            pause,
        };
        let guard = RunGuard {
            orchestrator: self,
            run_id: run.id,
            cancel: run.cancel.clone(),
            pause: pause_rx,
        };
        *active = Some(run);
        Ok(guard)
    }

    /// Depth-first visit of `block` and, unless its branch halts, of each
    /// successor in connection order.
    fn visit<'a, 'g: 'a>(
        &'a self,
        walk: &'a mut Walk<'g>,
        block: &'g Block,
        input: Option<Value>,
    ) -> BoxFuture<'a, ()> {
        async move {
            if walk.cancel.is_cancelled()
                || !wait_until_resumed(&mut walk.pause, &walk.cancel).await
            {
                return;
            }
            if !walk.visiting.insert(block.id.clone()) {
                warn!(block_id = %block.id, "cycle detected, skipping re-entry");
                walk.summary.cycles_skipped.push(block.id.clone());
                return;
            }

            let record = self
                .run_block(block, input, Some(walk.run_id), &walk.cancel)
                .await;
            let halts = walk.policy.halts_after(block.block_type, record.status);
            let output = record.output.clone();
            walk.summary.records.push(record);

            if halts {
                info!(block_id = %block.id, "branch halted after failure");
                walk.summary.halted.push(block.id.clone());
            } else {
                let adjacency = walk.adjacency;
                let blocks = walk.blocks;
                for next_id in adjacency.get(&block.id).into_iter().flatten() {
                    if let Some(next) = blocks.get(next_id.as_str()).copied() {
                        self.visit(walk, next, output.clone()).await;
                    }
                }
            }

            walk.visiting.remove(&block.id);
        }
        .boxed()
    }

    /// `true` while a workflow run holds the single-flight slot.
    pub fn is_running(&self) -> bool {
        self.active_slot().is_some()
    }

    // -----------------------------------------------------------------------
    // Control operations
    // -----------------------------------------------------------------------

    /// Pause `block_id` while its latest record is running. The in-flight
    /// call completes. If the record belongs to the active run, that run
    /// starts no further block until every paused block of it is resumed;
    /// a standalone call is only marked paused until it finishes.
    /// Returns `false` if the block is not running or already paused.
    pub fn pause_execution(&self, block_id: &str) -> bool {
        let active = self.active_slot();
        let mut paused = self.paused();
        if paused.contains_key(block_id) {
            return false;
        }
        let Some(record) = self
            .store
            .latest_for_block(block_id)
            .filter(|r| r.status == ExecutionStatus::Running)
        else {
            return false;
        };

        let run = match record.run_id {
            None => None,
            Some(run_id) => match active.as_ref().filter(|run| run.id == run_id) {
                Some(run) => Some(run),
                // A run that has already been released.
                None => return false,
            },
        };
        paused.insert(
            block_id.to_owned(),
            PauseEntry {
                record_id: record.id,
                run_id: record.run_id,
            },
        );
        if let Some(run) = run {
            run.pause.send_replace(true);
        }
        drop(paused);
        drop(active);

        info!(block_id, run_id = ?record.run_id, "execution paused");
        self.notify(|o| o.on_toggle(block_id, BlockStatus::Paused));
        true
    }

    /// Undo [`Orchestrator::pause_execution`]. Returns `false` if the block
    /// was not paused.
    pub fn resume_execution(&self, block_id: &str) -> bool {
        {
            let active = self.active_slot();
            let mut paused = self.paused();
            let Some(entry) = paused.remove(block_id) else {
                return false;
            };
            if let Some(run) = active.as_ref().filter(|run| Some(run.id) == entry.run_id) {
                let still_paused = paused.values().any(|e| e.run_id == Some(run.id));
                run.pause.send_replace(still_paused);
            }
        }

        info!(block_id, "execution resumed");
        self.notify(|o| o.on_toggle(block_id, self.block_status(block_id)));
        true
    }

    /// Cancel the active run and every manual block call, fail every running
    /// record with "cancelled by user" and release the single-flight slot.
    /// Returns the number of records cancelled.
    pub fn cancel_all_executions(&self) -> usize {
        let active = self.active_slot().take();
        if let Some(run) = active {
            info!(run_id = %run.id, "cancelling workflow run");
            run.cancel.cancel();
        }

        {
            let mut manual = self
                .manual_cancel
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            manual.cancel();
            *manual = CancellationToken::new();
        }

        self.paused().clear();

        let cancelled = self.store.cancel_running(CANCELLED_BY_USER);
        for record in &cancelled {
            self.notify(|o| o.on_record(record));
        }
        cancelled.len()
    }

    // -----------------------------------------------------------------------
    // History & statistics
    // -----------------------------------------------------------------------

    /// Records for `block_id`, newest first.
    pub fn get_execution_logs(&self, block_id: &str) -> Vec<ExecutionRecord> {
        self.store.records_for_block(block_id)
    }

    /// Remove every record that started more than `older_than_hours` ago.
    pub fn clear_old_executions(&self, older_than_hours: u32) -> usize {
        let removed = self
            .store
            .clear_older_than(ChronoDuration::hours(i64::from(older_than_hours)));
        info!(removed, older_than_hours, "old executions cleared");
        removed
    }

    /// Apply [`EngineConfig::retention_hours`], if set.
    pub fn prune_expired(&self) -> usize {
        self.config
            .retention_hours
            .map_or(0, |hours| self.clear_old_executions(hours))
    }

    pub fn success_rate(&self, block_id: &str) -> u32 {
        self.store.success_rate(block_id)
    }

    pub fn block_stats(&self, block_id: &str) -> BlockStats {
        self.store.block_stats(block_id)
    }

    /// Derived status: `paused` while a pause on the block is in effect,
    /// else the latest record's status.
    pub fn block_status(&self, block_id: &str) -> BlockStatus {
        if self.paused().contains_key(block_id) {
            BlockStatus::Paused
        } else {
            self.store.derived_status(block_id)
        }
    }

    /// Write the derived status into each block's `status` field.
    pub fn refresh_status(&self, blocks: &mut [Block]) {
        for block in blocks {
            block.status = self.block_status(&block.id);
        }
    }

    /// Drop all history for a deleted block.
    pub fn forget_block(&self, block_id: &str) -> usize {
        let removed = self.store.forget_block(block_id);
        self.notify(|o| o.on_delete(block_id));
        removed
    }
}

/// Wait while `gate` reports a pause. `false` if cancelled meanwhile.
async fn wait_until_resumed(gate: &mut watch::Receiver<bool>, cancel: &CancellationToken) -> bool {
    loop {
        let paused = *gate.borrow_and_update();
        if !paused {
            return true;
        }
        debug!("run paused, waiting for resume");
        tokio::select! {
            _ = cancel.cancelled() => return false,
            changed = gate.changed() => {
                if changed.is_err() {
                    return !cancel.is_cancelled();
                }
            }
        }
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .field("records", &self.store.len())
            .field("running", &self.is_running())
            .finish()
    }
}
