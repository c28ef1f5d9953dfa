//! What a failed block means for the blocks below it.

use serde::{Deserialize, Serialize};

use crate::models::{BlockType, ExecutionStatus};

/// Traversal policy for one workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraversalPolicy {
    /// Only a failed `condition` block stops its branch. Other failures
    /// continue downstream with no input.
    #[default]
    ContinueOnError,
    /// Any failed block stops its branch.
    HaltOnError,
}

impl TraversalPolicy {
    /// Whether the successors of a `block_type` block that finished with
    /// `status` should be skipped.
    pub fn halts_after(&self, block_type: BlockType, status: ExecutionStatus) -> bool {
        if status != ExecutionStatus::Error {
            return false;
        }
        match self {
            Self::ContinueOnError => block_type == BlockType::Condition,
            Self::HaltOnError => true,
        }
    }
}

impl std::str::FromStr for TraversalPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "continue" | "continue_on_error" => Ok(Self::ContinueOnError),
            "halt" | "halt_on_error" => Ok(Self::HaltOnError),
            other => Err(format!("unknown traversal policy: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn continue_on_error_only_halts_failed_conditions() {
        let policy = TraversalPolicy::ContinueOnError;
        assert!(policy.halts_after(BlockType::Condition, ExecutionStatus::Error));
        assert!(!policy.halts_after(BlockType::Action, ExecutionStatus::Error));
        assert!(!policy.halts_after(BlockType::Transformer, ExecutionStatus::Error));
        assert!(!policy.halts_after(BlockType::Condition, ExecutionStatus::Success));
    }

    #[test]
    fn halt_on_error_halts_any_failure() {
        let policy = TraversalPolicy::HaltOnError;
        assert!(policy.halts_after(BlockType::Action, ExecutionStatus::Error));
        assert!(policy.halts_after(BlockType::Trigger, ExecutionStatus::Error));
        assert!(!policy.halts_after(BlockType::Action, ExecutionStatus::Success));
    }

    #[test]
    fn parses_cli_names() {
        assert_eq!("halt".parse(), Ok(TraversalPolicy::HaltOnError));
        assert_eq!("continue_on_error".parse(), Ok(TraversalPolicy::ContinueOnError));
        assert!("sometimes".parse::<TraversalPolicy>().is_err());
    }
}
