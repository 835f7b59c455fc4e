//! Caller-supplied cost and label functions
//!
//! A [`CostFunction`] scores one node of tree A against one node of tree B:
//! `0` means identical, larger is worse, and [`UNMATCHABLE`] forbids the pair.
//! A [`LabelFunction`] supplies the opaque key the repetition and anchor
//! layers compare; it never replaces the cost function. Both are implemented
//! for plain closures.
//!
//! ```
//! use execdiff::cost::{CostFunction, LabelFunction, Side, UNMATCHABLE};
//!
//! let names_a = ["main", "read"];
//! let names_b = ["main", "write"];
//! let cost = |a: usize, b: usize| if names_a[a] == names_b[b] { 0 } else { UNMATCHABLE };
//! let label = |node: usize, side: Side| match side {
//!     Side::A => names_a[node].to_string(),
//!     Side::B => names_b[node].to_string(),
//! };
//!
//! assert_eq!(cost.cost(0, 0), 0);
//! assert_eq!(cost.cost(1, 1), UNMATCHABLE);
//! assert_eq!(label.label(1, Side::B), "write");
//! ```

use crate::graph::NodeId;
use serde::{Deserialize, Serialize};

/// Reserved cost meaning "these two nodes never match"
pub const UNMATCHABLE: u64 = u64::MAX;

/// Which of the two compared graphs a node belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    A,
    B,
}

impl Side {
    pub fn other(self) -> Side {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }
}

/// Matching cost of a node of A against a node of B
///
/// Implementations must be deterministic.
pub trait CostFunction {
    fn cost(&self, a: NodeId, b: NodeId) -> u64;
}

impl<F> CostFunction for F
where
    F: Fn(NodeId, NodeId) -> u64,
{
    fn cost(&self, a: NodeId, b: NodeId) -> u64 {
        self(a, b)
    }
}

/// Repetition/anchor label of a node; an empty label is never used as a
/// repetition or anchor unit
pub trait LabelFunction {
    fn label(&self, node: NodeId, side: Side) -> String;
}

impl<F> LabelFunction for F
where
    F: Fn(NodeId, Side) -> String,
{
    fn label(&self, node: NodeId, side: Side) -> String {
        self(node, side)
    }
}

/// Add two costs, keeping [`UNMATCHABLE`] absorbing
pub(crate) fn add(a: u64, b: u64) -> u64 {
    if a == UNMATCHABLE || b == UNMATCHABLE {
        UNMATCHABLE
    } else {
        a.saturating_add(b).min(UNMATCHABLE - 1)
    }
}

/// `per_node * count` without overflowing into the sentinel
pub(crate) fn times(per_node: u64, count: usize) -> u64 {
    per_node
        .saturating_mul(count as u64)
        .min(UNMATCHABLE - 1)
}
