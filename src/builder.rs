//! Stack-structured construction of step trees
//!
//! Recorders report steps as they happen: a step is entered, may receive
//! properties and nested steps, and is left again. [`StepTreeBuilder`] mirrors
//! that call stack. A new node is always appended under the step on top of
//! the stack (or as a new root when the stack is empty), so the result is a
//! forest in creation order and a back edge cannot be expressed at all.
//!
//! ```text
//! enter main          0 main
//!   enter read        ├─ 1 read
//!   leave             │
//!   enter write       └─ 2 write
//!     enter flush        └─ 3 flush
//!     leave
//!   leave
//! leave
//! ```
//!
//! # Example
//!
//! ```
//! use execdiff::builder::StepTreeBuilder;
//! use execdiff::intern::Interner;
//!
//! # fn main() -> execdiff::error::Result<()> {
//! let mut interner = Interner::new();
//! let mut builder = StepTreeBuilder::new(&mut interner);
//! builder.enter("main")?;
//! builder.enter("read")?;
//! builder.set_property("fd", 3i64)?;
//! builder.leave()?;
//! builder.leave()?;
//! let tree = builder.finish()?;
//!
//! assert_eq!(tree.graph.len(), 2);
//! assert_eq!(tree.graph.children(0), &[1]);
//! assert_eq!(interner.resolve(tree.names[1]), Some("read"));
//! # Ok(())
//! # }
//! ```

use crate::error::{DiffError, Result};
use crate::graph::{Graph, NodeId};
use crate::intern::{Interner, Quark};
use crate::property::{PropertyMap, PropertyValue};

/// A finished tree with its per-node data, indexed by [`NodeId`]
#[derive(Debug, Clone, Default)]
pub struct StepTree {
    pub graph: Graph,
    pub names: Vec<Quark>,
    pub properties: Vec<PropertyMap>,
}

impl StepTree {
    pub fn len(&self) -> usize {
        self.graph.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }
}

pub struct StepTreeBuilder<'i> {
    interner: &'i mut Interner,
    tree: StepTree,
    stack: Vec<NodeId>,
}

impl<'i> StepTreeBuilder<'i> {
    pub fn new(interner: &'i mut Interner) -> Self {
        StepTreeBuilder {
            interner,
            tree: StepTree::default(),
            stack: Vec::new(),
        }
    }

    /// Open a step nested in the current one
    pub fn enter(&mut self, name: &str) -> Result<NodeId> {
        let id = match self.stack.last() {
            Some(&parent) => self.tree.graph.create_child(parent)?,
            None => self.tree.graph.create_node().id(),
        };
        self.tree.names.push(self.interner.intern(name));
        self.tree.properties.push(PropertyMap::new());
        self.stack.push(id);
        Ok(id)
    }

    /// Attach a property to the step currently open
    pub fn set_property(&mut self, key: &str, value: impl Into<PropertyValue>) -> Result<()> {
        let Some(&current) = self.stack.last() else {
            return Err(DiffError::UnbalancedTrace(format!(
                "property '{key}' set outside of any step"
            )));
        };
        self.tree.properties[current].insert(key.to_string(), value.into());
        Ok(())
    }

    /// Close the step currently open
    pub fn leave(&mut self) -> Result<NodeId> {
        self.stack
            .pop()
            .ok_or_else(|| DiffError::UnbalancedTrace("leave without a matching enter".to_string()))
    }

    /// Number of steps currently open
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Hand over the tree; every entered step must have been left
    pub fn finish(self) -> Result<StepTree> {
        if !self.stack.is_empty() {
            return Err(DiffError::UnbalancedTrace(format!(
                "{} step(s) still open at end of trace",
                self.stack.len()
            )));
        }
        Ok(self.tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builds_nested_steps() {
        let mut interner = Interner::new();
        let mut builder = StepTreeBuilder::new(&mut interner);
        let main = builder.enter("main").unwrap();
        let read = builder.enter("read").unwrap();
        builder.leave().unwrap();
        let write = builder.enter("write").unwrap();
        let flush = builder.enter("flush").unwrap();
        assert_eq!(builder.depth(), 3);
        builder.leave().unwrap();
        builder.leave().unwrap();
        builder.leave().unwrap();
        let tree = builder.finish().unwrap();

        assert_eq!(tree.len(), 4);
        assert_eq!(tree.graph.children(main), &[read, write]);
        assert_eq!(tree.graph.children(write), &[flush]);
        assert_eq!(tree.graph.roots(), vec![main]);
    }

    #[test]
    fn test_sequential_roots() {
        let mut interner = Interner::new();
        let mut builder = StepTreeBuilder::new(&mut interner);
        builder.enter("task").unwrap();
        builder.leave().unwrap();
        builder.enter("task").unwrap();
        builder.leave().unwrap();
        let tree = builder.finish().unwrap();

        assert_eq!(tree.graph.roots(), vec![0, 1]);
        assert_eq!(tree.names[0], tree.names[1]);
    }

    #[test]
    fn test_properties_go_to_open_step() {
        let mut interner = Interner::new();
        let mut builder = StepTreeBuilder::new(&mut interner);
        builder.enter("open").unwrap();
        builder.set_property("path", "/etc/hosts").unwrap();
        builder.enter("stat").unwrap();
        builder.set_property("ret", 0i64).unwrap();
        builder.leave().unwrap();
        builder.set_property("fd", 3i64).unwrap();
        builder.leave().unwrap();
        let tree = builder.finish().unwrap();

        assert_eq!(tree.properties[0].len(), 2);
        assert_eq!(tree.properties[0]["fd"], PropertyValue::Int(3));
        assert_eq!(tree.properties[1]["ret"], PropertyValue::Int(0));
    }

    #[test]
    fn test_leave_on_empty_stack() {
        let mut interner = Interner::new();
        let mut builder = StepTreeBuilder::new(&mut interner);
        assert!(matches!(builder.leave(), Err(DiffError::UnbalancedTrace(_))));
    }

    #[test]
    fn test_property_outside_step() {
        let mut interner = Interner::new();
        let mut builder = StepTreeBuilder::new(&mut interner);
        assert!(builder.set_property("x", true).is_err());
    }

    #[test]
    fn test_finish_with_open_steps() {
        let mut interner = Interner::new();
        let mut builder = StepTreeBuilder::new(&mut interner);
        builder.enter("main").unwrap();
        let err = builder.finish().unwrap_err();
        assert_eq!(
            err,
            DiffError::UnbalancedTrace("1 step(s) still open at end of trace".to_string())
        );
    }

    #[test]
    fn test_interner_shared_across_builders() {
        let mut interner = Interner::new();
        let first = {
            let mut builder = StepTreeBuilder::new(&mut interner);
            builder.enter("poll").unwrap();
            builder.leave().unwrap();
            builder.finish().unwrap()
        };
        let second = {
            let mut builder = StepTreeBuilder::new(&mut interner);
            builder.enter("poll").unwrap();
            builder.leave().unwrap();
            builder.finish().unwrap()
        };
        assert_eq!(first.names[0], second.names[0]);
        assert_eq!(interner.len(), 1);
    }
}
