// Structural alignment of two execution step trees
//
// Two strategies share the same result type:
//
// - flat: memoized DP over the full preorder listings of both trees, with
//   O(1) subtree skips via the next-depth-drop index.
// - hierarchical: level by level. Children that carry the same label the same
//   number of times on both sides are paired up front (anchors); the gaps
//   between anchors are aligned by a DP that understands repeated runs, and
//   every matched pair with children is aligned one level down.
//
// Both run on explicit worklists, so native stack depth does not grow with
// the length of the traces. Memo tables live for one call only.

mod config;
mod dynamic;
mod flat;
mod hierarchical;

pub use config::{
    MatchConfig, MatchLimits, DEFAULT_DISTANCE_BOUND, DEFAULT_MAX_DP_STATES,
    DEFAULT_MAX_NESTING_DEPTH,
};
pub use flat::match_graphs;
pub use hierarchical::match_graphs_hierarchical;

use crate::graph::NodeId;
use serde::{Deserialize, Serialize};

/// A node of graph A matched to a node of graph B
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodePair {
    pub a: NodeId,
    pub b: NodeId,
}

impl NodePair {
    pub fn new(a: NodeId, b: NodeId) -> Self {
        NodePair { a, b }
    }

    /// The same pair seen from the other graph
    pub fn reversed(self) -> Self {
        NodePair { a: self.b, b: self.a }
    }
}

impl From<(NodeId, NodeId)> for NodePair {
    fn from((a, b): (NodeId, NodeId)) -> Self {
        NodePair { a, b }
    }
}

/// Outcome of one matching call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Sum of match costs and skip costs of the chosen alignment
    pub total_cost: u64,

    /// Matched pairs in ascending order of the A node
    pub pairs: Vec<NodePair>,

    /// A resource limit fired; the alignment is valid but may be suboptimal
    pub truncated: bool,
}

impl MatchResult {
    pub(crate) fn unmatched(total_cost: u64) -> Self {
        MatchResult {
            total_cost,
            pairs: Vec::new(),
            truncated: false,
        }
    }

    /// Pairs as plain `(a, b)` tuples
    pub fn pair_tuples(&self) -> Vec<(NodeId, NodeId)> {
        self.pairs.iter().map(|p| (p.a, p.b)).collect()
    }

    /// The same result seen from the other graph
    pub fn reversed(&self) -> MatchResult {
        let mut pairs: Vec<NodePair> = self.pairs.iter().map(|p| p.reversed()).collect();
        pairs.sort();
        MatchResult {
            total_cost: self.total_cost,
            pairs,
            truncated: self.truncated,
        }
    }
}
