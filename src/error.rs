//! Error types for the diff engine
//!
//! Configuration errors are rejected at the entry of every matching call and
//! structural violations indicate a bug in whatever built the graph. Neither
//! produces a partial result. Inputs that simply cannot be matched are not
//! errors, and neither is hitting a resource bound (see
//! [`MatchResult::truncated`](crate::matcher::MatchResult::truncated)).

use crate::graph::NodeId;
use thiserror::Error;

/// Errors raised by graph construction and matching
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiffError {
    #[error("skip cost must be positive")]
    NonPositiveSkipCost,

    #[error("invalid chunk size bounds {min}..={max}: need 2 <= min <= max")]
    InvalidChunkBounds { min: usize, max: usize },

    #[error("invalid limit: {0}")]
    InvalidLimit(String),

    #[error("node {id} out of range (graph has {len} nodes)")]
    NodeOutOfRange { id: NodeId, len: usize },

    #[error("child {child} of node {parent} would create a back edge")]
    BackEdge { parent: NodeId, child: NodeId },

    #[error("node {child} has two parents: {first} and {second}")]
    MultipleParents {
        child: NodeId,
        first: NodeId,
        second: NodeId,
    },

    #[error("unbalanced trace: {0}")]
    UnbalancedTrace(String),
}

pub type Result<T> = std::result::Result<T, DiffError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            DiffError::NodeOutOfRange { id: 7, len: 3 }.to_string(),
            "node 7 out of range (graph has 3 nodes)"
        );
        assert_eq!(
            DiffError::InvalidChunkBounds { min: 1, max: 8 }.to_string(),
            "invalid chunk size bounds 1..=8: need 2 <= min <= max"
        );
        assert!(DiffError::UnbalancedTrace("2 steps still open".into())
            .to_string()
            .contains("2 steps still open"));
    }
}
