//! Graph construction and validation, run before executing a workflow.
//!
//! Rules enforced by [`validate_graph`]:
//! 1. Block IDs must be unique within the graph.
//! 2. Every connection must reference existing blocks (both ends).
//!
//! Cycles are allowed in the input; the orchestrator guards against them
//! while walking. [`find_cycle`] reports one for diagnostics.

use std::collections::{HashMap, HashSet};

use crate::models::{Block, Connection};
use crate::EngineError;

/// `blockId → successor blockIds`, in connection order.
pub type Adjacency = HashMap<String, Vec<String>>;

/// Build the adjacency map: every block starts with an empty successor list,
/// then each connection appends its target to its source's list.
pub fn build_adjacency(blocks: &[Block], connections: &[Connection]) -> Adjacency {
    let mut adjacency: Adjacency = blocks
        .iter()
        .map(|block| (block.id.clone(), Vec::new()))
        .collect();

    for connection in connections {
        adjacency
            .entry(connection.source_block_id.clone())
            .or_default()
            .push(connection.target_block_id.clone());
    }

    adjacency
}

/// Check block ID uniqueness and connection endpoints.
///
/// # Errors
/// - [`EngineError::DuplicateBlockId`] if two blocks share an ID.
/// - [`EngineError::UnknownBlockReference`] if a connection references a missing block.
pub fn validate_graph(blocks: &[Block], connections: &[Connection]) -> Result<(), EngineError> {
    let mut seen: HashSet<&str> = HashSet::with_capacity(blocks.len());
    for block in blocks {
        if !seen.insert(block.id.as_str()) {
            return Err(EngineError::DuplicateBlockId(block.id.clone()));
        }
    }

    for connection in connections {
        for (block_id, side) in [
            (&connection.source_block_id, "source"),
            (&connection.target_block_id, "target"),
        ] {
            if !seen.contains(block_id.as_str()) {
                return Err(EngineError::UnknownBlockReference {
                    connection_id: connection.id.clone(),
                    block_id: block_id.clone(),
                    side,
                });
            }
        }
    }

    Ok(())
}

/// Pick the start block: the explicit `start_block_id` if given, else the
/// first trigger block in list order.
///
/// # Errors
/// - [`EngineError::StartBlockNotFound`] if the explicit ID names no block.
/// - [`EngineError::NoStartNode`] if there is no trigger block.
pub fn select_start_block<'a>(
    blocks: &'a [Block],
    start_block_id: Option<&str>,
) -> Result<&'a Block, EngineError> {
    match start_block_id {
        Some(id) => blocks
            .iter()
            .find(|block| block.id == id)
            .ok_or_else(|| EngineError::StartBlockNotFound(id.to_owned())),
        None => blocks
            .iter()
            .find(|block| block.is_trigger())
            .ok_or(EngineError::NoStartNode),
    }
}

/// Return one cycle as a path that starts and ends on the same block, or
/// `None` if the graph is acyclic.
pub fn find_cycle(blocks: &[Block], connections: &[Connection]) -> Option<Vec<String>> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unseen,
        OnPath,
        Done,
    }

    fn walk<'a>(
        id: &'a str,
        adjacency: &'a Adjacency,
        marks: &mut HashMap<&'a str, Mark>,
        path: &mut Vec<&'a str>,
    ) -> Option<Vec<String>> {
        marks.insert(id, Mark::OnPath);
        path.push(id);

        for next in adjacency.get(id).into_iter().flatten() {
            match marks.get(next.as_str()).copied().unwrap_or(Mark::Unseen) {
                Mark::OnPath => {
                    let from = path.iter().position(|p| *p == next.as_str()).unwrap_or(0);
                    let mut cycle: Vec<String> = path[from..].iter().map(|p| (*p).to_owned()).collect();
                    cycle.push(next.clone());
                    return Some(cycle);
                }
                Mark::Unseen => {
                    if let Some(cycle) = walk(next, adjacency, marks, path) {
                        return Some(cycle);
                    }
                }
                Mark::Done => {}
            }
        }

        path.pop();
        marks.insert(id, Mark::Done);
        None
    }

    let adjacency = build_adjacency(blocks, connections);
    let mut marks: HashMap<&str, Mark> = HashMap::new();

    for block in blocks {
        if marks.get(block.id.as_str()).copied().unwrap_or(Mark::Unseen) == Mark::Unseen {
            let mut path = Vec::new();
            if let Some(cycle) = walk(&block.id, &adjacency, &mut marks, &mut path) {
                return Some(cycle);
            }
        }
    }
    None
}

// ============================================================
// Unit tests
// ============================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BlockType;

    fn block(id: &str, block_type: BlockType) -> Block {
        Block::new(id, block_type, "mock", "mock")
    }

    fn edge(from: &str, to: &str) -> Connection {
        Connection::between(from, to)
    }

    #[test]
    fn adjacency_keeps_connection_order_and_isolated_blocks() {
        // A → C, A → B, D alone
        let blocks = vec![
            block("a", BlockType::Trigger),
            block("b", BlockType::Action),
            block("c", BlockType::Action),
            block("d", BlockType::Action),
        ];
        let adjacency = build_adjacency(&blocks, &[edge("a", "c"), edge("a", "b")]);

        assert_eq!(adjacency["a"], vec!["c", "b"]);
        assert!(adjacency["b"].is_empty());
        assert!(adjacency["d"].is_empty());
        assert_eq!(adjacency.len(), 4);
    }

    #[test]
    fn duplicate_block_id_is_rejected() {
        let blocks = vec![block("a", BlockType::Trigger), block("a", BlockType::Action)];
        assert!(matches!(
            validate_graph(&blocks, &[]),
            Err(EngineError::DuplicateBlockId(id)) if id == "a"
        ));
    }

    #[test]
    fn connection_referencing_missing_block_is_rejected() {
        let blocks = vec![block("a", BlockType::Trigger)];
        assert!(matches!(
            validate_graph(&blocks, &[edge("a", "ghost")]),
            Err(EngineError::UnknownBlockReference { block_id, side: "target", .. }) if block_id == "ghost"
        ));
    }

    #[test]
    fn start_block_defaults_to_first_trigger() {
        let blocks = vec![
            block("x", BlockType::Action),
            block("t1", BlockType::Trigger),
            block("t2", BlockType::Trigger),
        ];
        assert_eq!(select_start_block(&blocks, None).map(|b| b.id.as_str()).ok(), Some("t1"));
        assert_eq!(select_start_block(&blocks, Some("x")).map(|b| b.id.as_str()).ok(), Some("x"));
        assert!(matches!(
            select_start_block(&blocks, Some("nope")),
            Err(EngineError::StartBlockNotFound(_))
        ));
        assert!(matches!(
            select_start_block(&blocks[..1], None),
            Err(EngineError::NoStartNode)
        ));
    }

    #[test]
    fn cycle_is_reported_as_closed_path() {
        // A → B → C → B
        let blocks = vec![
            block("a", BlockType::Trigger),
            block("b", BlockType::Action),
            block("c", BlockType::Action),
        ];
        let cycle = find_cycle(&blocks, &[edge("a", "b"), edge("b", "c"), edge("c", "b")]);
        assert_eq!(cycle, Some(vec!["b".to_string(), "c".to_string(), "b".to_string()]));
    }

    #[test]
    fn diamond_is_not_a_cycle() {
        let blocks = vec![
            block("a", BlockType::Trigger),
            block("b", BlockType::Action),
            block("c", BlockType::Action),
            block("d", BlockType::Action),
        ];
        let edges = [edge("a", "b"), edge("a", "c"), edge("b", "d"), edge("c", "d")];
        assert_eq!(find_cycle(&blocks, &edges), None);
    }
}
