//! Core domain models for the workflow engine.
//!
//! These types are the source of truth for what a workflow graph and its
//! execution history look like in memory. Field names serialise in
//! camelCase to match the `{blocks, connections}` payload produced by the
//! canvas.

use chrono::{DateTime, SecondsFormat, Utc};
use connectors::{Application, Config};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Block
// ---------------------------------------------------------------------------

/// The role a block plays in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockType {
    /// Valid start node; needs no inbound edge.
    Trigger,
    /// Pass-through compute step.
    Action,
    /// Its failure can halt the branch below it.
    Condition,
    /// Pass-through compute step.
    Transformer,
}

/// Display status of a block. Derived from its latest execution record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockStatus {
    #[default]
    Idle,
    Running,
    Success,
    Error,
    Paused,
}

impl From<ExecutionStatus> for BlockStatus {
    fn from(status: ExecutionStatus) -> Self {
        match status {
            ExecutionStatus::Running => Self::Running,
            ExecutionStatus::Success => Self::Success,
            ExecutionStatus::Error => Self::Error,
        }
    }
}

/// The operation a block performs and its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockAction {
    pub operation: String,
    #[serde(default)]
    pub config: Config,
    #[serde(default)]
    pub description: String,
}

/// A workflow node bound to one application and operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    /// Unique within a graph; assigned by the caller.
    pub id: String,
    pub block_type: BlockType,
    /// Selects the connector that executes this block.
    pub application: Application,
    pub action: BlockAction,
    /// Not authoritative; see [`crate::Orchestrator::refresh_status`].
    #[serde(default)]
    pub status: BlockStatus,
}

impl Block {
    /// Convenience constructor; config starts empty.
    pub fn new(
        id: impl Into<String>,
        block_type: BlockType,
        application: impl Into<Application>,
        operation: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            block_type,
            application: application.into(),
            action: BlockAction {
                operation: operation.into(),
                config: Config::new(),
                description: String::new(),
            },
            status: BlockStatus::Idle,
        }
    }

    /// Replace the action config with the fields of `config` (a JSON object).
    pub fn with_config(mut self, config: Value) -> Self {
        self.action.config = match config {
            Value::Object(map) => map,
            _ => Config::new(),
        };
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.action.description = description.into();
        self
    }

    pub fn is_trigger(&self) -> bool {
        self.block_type == BlockType::Trigger
    }
}

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

/// Directed edge carrying the source block's output to the target's input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub id: String,
    pub source_block_id: String,
    pub target_block_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
}

impl Connection {
    /// Edge from `source` to `target` with a derived id.
    pub fn between(source: impl Into<String>, target: impl Into<String>) -> Self {
        let source = source.into();
        let target = target.into();
        Self {
            id: format!("{source}->{target}"),
            source_block_id: source,
            target_block_id: target,
            source_handle: None,
            target_handle: None,
        }
    }
}

/// The `{blocks, connections}` payload a canvas hands to the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowGraph {
    pub blocks: Vec<Block>,
    #[serde(default)]
    pub connections: Vec<Connection>,
}

// ---------------------------------------------------------------------------
// ExecutionRecord
// ---------------------------------------------------------------------------

/// Lifecycle of one execution attempt: `running` → `success` | `error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Running,
    Success,
    Error,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// One attempt to run one block.
///
/// Created `running`, transitions exactly once to a terminal status and is
/// immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRecord {
    pub id: Uuid,
    pub block_id: String,
    /// The workflow run this attempt belonged to; `None` for manual runs.
    pub run_id: Option<Uuid>,
    pub status: ExecutionStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub input: Option<Value>,
    pub output: Option<Value>,
    pub error: Option<String>,
    /// Timestamped, append-only.
    pub logs: Vec<String>,
}

impl ExecutionRecord {
    /// A new `running` record with a "start" log line.
    pub fn start(block_id: impl Into<String>, run_id: Option<Uuid>, input: Option<Value>) -> Self {
        let mut record = Self {
            id: Uuid::new_v4(),
            block_id: block_id.into(),
            run_id,
            status: ExecutionStatus::Running,
            start_time: Utc::now(),
            end_time: None,
            input,
            output: None,
            error: None,
            logs: Vec::new(),
        };
        record.log("start");
        record
    }

    /// Append a log line. Ignored once the record is terminal.
    pub fn log(&mut self, message: impl AsRef<str>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.logs.push(format!(
            "[{}] {}",
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            message.as_ref()
        ));
        true
    }

    /// Transition to `success`. Returns `false` if already terminal.
    pub fn succeed(&mut self, output: Value) -> bool {
        if !self.log("success") {
            return false;
        }
        self.output = Some(output);
        self.status = ExecutionStatus::Success;
        self.end_time = Some(Utc::now());
        true
    }

    /// Transition to `error`. Returns `false` if already terminal.
    pub fn fail(&mut self, error: impl Into<String>) -> bool {
        let error = error.into();
        if !self.log(format!("error: {error}")) {
            return false;
        }
        self.error = Some(error);
        self.status = ExecutionStatus::Error;
        self.end_time = Some(Utc::now());
        true
    }

    /// Apply an outcome: `Ok(output)` succeeds, `Err(message)` fails.
    pub fn finish(&mut self, outcome: Result<Value, String>) -> bool {
        match outcome {
            Ok(output) => self.succeed(output),
            Err(message) => self.fail(message),
        }
    }

    /// Wall time between start and end; `None` while running.
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.end_time.map(|end| end - self.start_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_transitions_exactly_once() {
        let mut record = ExecutionRecord::start("a", None, None);
        assert_eq!(record.status, ExecutionStatus::Running);
        assert_eq!(record.logs.len(), 1);

        assert!(record.succeed(json!({ "ok": true })));
        assert_eq!(record.status, ExecutionStatus::Success);
        assert!(record.end_time.is_some());

        assert!(!record.fail("late failure"));
        assert!(!record.log("late log"));
        assert_eq!(record.status, ExecutionStatus::Success);
        assert!(record.error.is_none());
        assert_eq!(record.logs.len(), 2);
    }

    #[test]
    fn failed_record_logs_the_message() {
        let mut record = ExecutionRecord::start("a", None, Some(json!(1)));
        assert!(record.fail("boom"));
        assert_eq!(record.error.as_deref(), Some("boom"));
        assert!(record.logs.last().is_some_and(|l| l.ends_with("error: boom")));
        assert!(record.output.is_none());
    }

    #[test]
    fn graph_payload_deserialises_from_canvas_json() {
        let payload = json!({
            "blocks": [
                {
                    "id": "t1",
                    "blockType": "trigger",
                    "application": "webhook",
                    "action": { "operation": "receive", "config": { "path": "orders" } }
                },
                {
                    "id": "n1",
                    "blockType": "action",
                    "application": "notes-service",
                    "action": {
                        "operation": "create_page",
                        "config": { "database_id": "db", "title": "Order" },
                        "description": "file the order"
                    },
                    "status": "success"
                }
            ],
            "connections": [
                { "id": "c1", "sourceBlockId": "t1", "targetBlockId": "n1", "sourceHandle": "out" }
            ]
        });

        let graph: WorkflowGraph = serde_json::from_value(payload).expect("valid payload");
        assert_eq!(graph.blocks.len(), 2);
        assert_eq!(graph.blocks[0].block_type, BlockType::Trigger);
        assert_eq!(graph.blocks[0].status, BlockStatus::Idle);
        assert_eq!(graph.blocks[1].application, Application::NotesService);
        assert_eq!(graph.connections[0].source_handle.as_deref(), Some("out"));
        assert_eq!(graph.connections[0].target_handle, None);
    }

    #[test]
    fn block_status_mirrors_execution_status() {
        assert_eq!(BlockStatus::from(ExecutionStatus::Running), BlockStatus::Running);
        assert_eq!(BlockStatus::from(ExecutionStatus::Error), BlockStatus::Error);
    }
}
