//! Arena storage for execution step trees
//!
//! A [`Graph`] owns a dense vector of [`Node`]s indexed by [`NodeId`]. Ids are
//! assigned in creation order and never reused. The only ways to grow a graph
//! are [`Graph::create_node`] (a new root) and [`Graph::create_child`] (a new
//! node appended under an existing one), so every child id is strictly larger
//! than its parent's id and no node can become its own descendant.
//!
//! ```text
//!   create_node()        -> 0          0
//!   create_child(0)      -> 1          ├─ 1
//!   create_child(1)      -> 2          │  └─ 2
//!   create_child(0)      -> 3          └─ 3
//! ```
//!
//! Graphs handed over as raw child lists (e.g. from another recorder) go through
//! [`Graph::from_children`], which rejects anything that is not a forest in
//! creation order.
//!
//! # Example
//!
//! ```
//! use execdiff::graph::Graph;
//!
//! # fn main() -> execdiff::error::Result<()> {
//! let mut graph = Graph::new();
//! let root = graph.create_node().id();
//! let child = graph.create_child(root)?;
//! let grandchild = graph.create_child(child)?;
//!
//! assert_eq!(graph.len(), 3);
//! assert_eq!(graph.node(root).children(), &[child]);
//! assert_eq!(graph.parent(grandchild), Some(child));
//! assert_eq!(graph.subtree_sizes(), vec![3, 2, 1]);
//! # Ok(())
//! # }
//! ```

use crate::error::{DiffError, Result};
use crate::preorder::PreorderIter;

/// Dense, creation-ordered node identifier
pub type NodeId = usize;

/// One execution step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    id: NodeId,
    children: Vec<NodeId>,
}

impl Node {
    fn new(id: NodeId) -> Self {
        Node {
            id,
            children: Vec::new(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Ordered child ids
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Arena of nodes forming one tree (node 0 is the root) or a forest of
/// independent roots
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Graph {
    nodes: Vec<Node>,
    parents: Vec<Option<NodeId>>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Graph {
            nodes: Vec::with_capacity(capacity),
            parents: Vec::with_capacity(capacity),
        }
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Append a new parentless node and return it
    pub fn create_node(&mut self) -> &mut Node {
        let id = self.nodes.len();
        self.nodes.push(Node::new(id));
        self.parents.push(None);
        &mut self.nodes[id]
    }

    /// Append a new node as the last child of `parent`
    ///
    /// # Errors
    ///
    /// Returns [`DiffError::NodeOutOfRange`] if `parent` does not exist.
    pub fn create_child(&mut self, parent: NodeId) -> Result<NodeId> {
        if parent >= self.nodes.len() {
            return Err(DiffError::NodeOutOfRange {
                id: parent,
                len: self.nodes.len(),
            });
        }
        let id = self.nodes.len();
        self.nodes.push(Node::new(id));
        self.parents.push(Some(parent));
        self.nodes[parent].children.push(id);
        Ok(id)
    }

    /// Look up a node
    ///
    /// # Panics
    ///
    /// Panics if `id >= self.len()`.
    pub fn node(&self, id: NodeId) -> &Node {
        match self.nodes.get(id) {
            Some(node) => node,
            None => panic!(
                "node {} out of range (graph has {} nodes)",
                id,
                self.nodes.len()
            ),
        }
    }

    /// Look up a node without panicking
    pub fn try_node(&self, id: NodeId) -> Result<&Node> {
        self.nodes.get(id).ok_or(DiffError::NodeOutOfRange {
            id,
            len: self.nodes.len(),
        })
    }

    /// Ordered children of `id` (panics like [`Graph::node`])
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).children()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.parents.get(id).copied().flatten()
    }

    /// Number of ancestors of `id`; roots are at depth 0
    pub fn depth(&self, id: NodeId) -> usize {
        std::iter::successors(self.parent(id), |&node| self.parent(node)).count()
    }

    /// Parentless nodes in creation order
    pub fn roots(&self) -> Vec<NodeId> {
        self.parents
            .iter()
            .enumerate()
            .filter(|(_, parent)| parent.is_none())
            .map(|(id, _)| id)
            .collect()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    /// Lazy depth-first, left-to-right traversal over every root
    pub fn preorder(&self) -> PreorderIter<'_> {
        PreorderIter::new(self)
    }

    /// Number of nodes in the subtree rooted at each node (including itself)
    ///
    /// Children always have larger ids than their parent, so a single reverse
    /// sweep over the arena is enough.
    pub fn subtree_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![1usize; self.nodes.len()];
        for id in (0..self.nodes.len()).rev() {
            if let Some(parent) = self.parents[id] {
                sizes[parent] += sizes[id];
            }
        }
        sizes
    }

    /// Build a graph from raw child lists, indexed by node id
    ///
    /// # Errors
    ///
    /// - [`DiffError::NodeOutOfRange`] if a child id is not in the arena
    /// - [`DiffError::BackEdge`] if a child id is not larger than its parent's
    ///   (the only way a raw list could encode a cycle)
    /// - [`DiffError::MultipleParents`] if a node is listed under two parents
    pub fn from_children(children: Vec<Vec<NodeId>>) -> Result<Self> {
        let len = children.len();
        let mut parents: Vec<Option<NodeId>> = vec![None; len];

        for (parent, kids) in children.iter().enumerate() {
            for &child in kids {
                if child >= len {
                    return Err(DiffError::NodeOutOfRange { id: child, len });
                }
                if child <= parent {
                    return Err(DiffError::BackEdge { parent, child });
                }
                if let Some(first) = parents[child] {
                    return Err(DiffError::MultipleParents {
                        child,
                        first,
                        second: parent,
                    });
                }
                parents[child] = Some(parent);
            }
        }

        let nodes = children
            .into_iter()
            .enumerate()
            .map(|(id, children)| Node { id, children })
            .collect();

        Ok(Graph { nodes, parents })
    }
}
