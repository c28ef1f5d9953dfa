//! Engine-level error types.

use std::time::Duration;

use connectors::{ConnectorError, RegistryError};
use thiserror::Error;

/// Errors produced by the workflow engine.
///
/// Block-level variants are captured into the block's execution record and
/// never unwind to the workflow caller. Workflow-level variants are returned
/// from [`crate::Orchestrator::execute_workflow`] before any record exists.
#[derive(Debug, Error)]
pub enum EngineError {
    // ------ Block-level errors ------

    /// No connector is registered for the block's application.
    #[error("no connector registered for application '{0}'")]
    ConnectorNotFound(String),

    /// The connector rejected the block's operation/config pair.
    #[error("invalid configuration for operation '{operation}' on '{application}'")]
    InvalidConfiguration {
        application: String,
        operation: String,
    },

    /// The connector failed while executing.
    #[error(transparent)]
    Execution(#[from] ConnectorError),

    /// The connector did not answer within the configured block timeout.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The call was cancelled before the connector answered.
    #[error("cancelled by user")]
    Cancelled,

    // ------ Workflow-level errors ------

    /// No trigger block and no explicit start block.
    #[error("workflow has no trigger block and no start block was given")]
    NoStartNode,

    /// The explicit start block is not part of the graph.
    #[error("start block '{0}' is not part of the workflow")]
    StartBlockNotFound(String),

    /// Another workflow run is in progress on this engine.
    #[error("a workflow run is already in progress")]
    AlreadyRunning,

    /// Two or more blocks share the same ID.
    #[error("duplicate block ID: '{0}'")]
    DuplicateBlockId(String),

    /// A connection references a block ID that doesn't exist in the graph.
    #[error("connection '{connection_id}' references unknown block '{block_id}' ({side} side)")]
    UnknownBlockReference {
        connection_id: String,
        block_id: String,
        side: &'static str,
    },
}

impl EngineError {
    /// `true` for errors that reject a whole workflow run.
    pub fn is_workflow_level(&self) -> bool {
        matches!(
            self,
            Self::NoStartNode
                | Self::StartBlockNotFound(_)
                | Self::AlreadyRunning
                | Self::DuplicateBlockId(_)
                | Self::UnknownBlockReference { .. }
        )
    }
}

impl From<RegistryError> for EngineError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound(application) => Self::ConnectorNotFound(application),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connector_failure_message_is_passed_through() {
        let err = EngineError::from(ConnectorError::execution("quota exceeded"));
        assert_eq!(err.to_string(), "quota exceeded");
        assert!(!err.is_workflow_level());
    }

    #[test]
    fn registry_miss_becomes_connector_not_found() {
        let err = EngineError::from(RegistryError::NotFound("crm".into()));
        assert!(matches!(err, EngineError::ConnectorNotFound(ref app) if app == "crm"));
        assert_eq!(err.to_string(), "no connector registered for application 'crm'");
    }

    #[test]
    fn workflow_level_errors_are_flagged() {
        assert!(EngineError::AlreadyRunning.is_workflow_level());
        assert!(EngineError::NoStartNode.is_workflow_level());
        assert!(!EngineError::Cancelled.is_workflow_level());
    }
}
