//! Preorder traversal with depth tracking
//!
//! [`PreorderIter`] walks a [`Graph`] lazily, depth-first and left-to-right,
//! yielding `(node, depth)` with roots at depth 0. [`Preorder`] materializes the
//! full listing once and adds the index the flat matcher needs to skip a whole
//! subtree in O(1):
//!
//! ```text
//! position        0  1  2  3  4  5
//! depth           0  1  2  2  1  2
//! next_depth_drop 6  6  4  4  6  6
//! ```
//!
//! `next_depth_drop[i]` is the smallest `j > i` with `depth[j] < depth[i]`, or
//! the listing length when there is none. It is computed in one backward pass
//! with a monotonic stack (nearest strictly-smaller value to the right).

use crate::graph::{Graph, NodeId};

/// Lazy preorder iterator over every root of a graph
pub struct PreorderIter<'g> {
    graph: &'g Graph,
    stack: Vec<(NodeId, usize)>,
    depth: usize,
}

impl<'g> PreorderIter<'g> {
    pub fn new(graph: &'g Graph) -> Self {
        let mut stack: Vec<(NodeId, usize)> = graph.roots().into_iter().map(|r| (r, 0)).collect();
        stack.reverse();
        PreorderIter {
            graph,
            stack,
            depth: 0,
        }
    }

    /// Depth of the node most recently yielded
    pub fn depth(&self) -> usize {
        self.depth
    }
}

impl Iterator for PreorderIter<'_> {
    type Item = (NodeId, usize);

    fn next(&mut self) -> Option<Self::Item> {
        let (node, depth) = self.stack.pop()?;
        self.depth = depth;
        for &child in self.graph.children(node).iter().rev() {
            self.stack.push((child, depth + 1));
        }
        Some((node, depth))
    }
}

/// Materialized preorder listing of a graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preorder {
    nodes: Vec<NodeId>,
    depths: Vec<usize>,
    next_depth_drop: Vec<usize>,
    positions: Vec<usize>,
}

impl Preorder {
    pub fn new(graph: &Graph) -> Self {
        let mut nodes = Vec::with_capacity(graph.len());
        let mut depths = Vec::with_capacity(graph.len());
        for (node, depth) in graph.preorder() {
            nodes.push(node);
            depths.push(depth);
        }

        let len = nodes.len();
        let mut next_depth_drop = vec![len; len];
        let mut stack: Vec<usize> = Vec::new();
        for i in (0..len).rev() {
            while let Some(&top) = stack.last() {
                if depths[top] >= depths[i] {
                    stack.pop();
                } else {
                    break;
                }
            }
            if let Some(&top) = stack.last() {
                next_depth_drop[i] = top;
            }
            stack.push(i);
        }

        let mut positions = vec![0; graph.len()];
        for (pos, &node) in nodes.iter().enumerate() {
            positions[node] = pos;
        }

        Preorder {
            nodes,
            depths,
            next_depth_drop,
            positions,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node at a traversal position
    pub fn node(&self, pos: usize) -> NodeId {
        self.nodes[pos]
    }

    pub fn depth(&self, pos: usize) -> usize {
        self.depths[pos]
    }

    pub fn next_depth_drop(&self, pos: usize) -> usize {
        self.next_depth_drop[pos]
    }

    /// Traversal position of a node
    pub fn position(&self, node: NodeId) -> usize {
        self.positions[node]
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }
}
