//! `engine` crate: workflow models, graph validation, execution history and
//! the orchestrator that runs blocks through their connectors.

pub mod models;
pub mod error;
pub mod graph;
pub mod policy;
pub mod store;
pub mod observer;
pub mod orchestrator;

pub use models::{
    Block, BlockAction, BlockStatus, BlockType, Connection, ExecutionRecord, ExecutionStatus,
    WorkflowGraph,
};
pub use error::EngineError;
pub use graph::{build_adjacency, find_cycle, select_start_block, validate_graph, Adjacency};
pub use policy::TraversalPolicy;
pub use store::{BlockStats, ExecutionStore};
pub use observer::ExecutionObserver;
pub use orchestrator::{EngineConfig, Orchestrator, RunOptions, RunSummary};
