//! Cost and label functions over step traces
//!
//! Two steps are compared by name and by properties:
//!
//! | names | properties (ignored keys removed) | cost            |
//! |-------|-----------------------------------|-----------------|
//! | equal | equal                             | 0               |
//! | equal | different                         | `mismatch_cost` |
//! | differ| any                               | `UNMATCHABLE`   |
//!
//! Labels are structural digests of whole subtrees: `name#<fnv64 hex>` over
//! the step name, its compared properties and the digests of its children in
//! order. Two steps share a label only if their subtrees are identical, which
//! is what the anchor and repetition layers of the hierarchical matcher need.
//! Timestamps and similar per-run noise go in the ignore list, otherwise no
//! two loop iterations would ever share a label.

use crate::cost::{CostFunction, LabelFunction, Side, UNMATCHABLE};
use crate::graph::NodeId;
use crate::intern::Quark;
use crate::property::{PropertyMap, PropertyValue};
use crate::step_trace::StepTrace;
use fnv::FnvHasher;
use regex::RegexSet;
use std::hash::Hasher;

/// Property keys left out of comparisons and digests
#[derive(Debug, Clone)]
pub struct PropertyFilter {
    ignore: RegexSet,
}

impl Default for PropertyFilter {
    fn default() -> Self {
        PropertyFilter {
            ignore: RegexSet::empty(),
        }
    }
}

impl PropertyFilter {
    /// Ignore every key matching one of `patterns`
    pub fn new<I, S>(patterns: I) -> std::result::Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Ok(PropertyFilter {
            ignore: RegexSet::new(patterns)?,
        })
    }

    pub fn keeps(&self, key: &str) -> bool {
        !self.ignore.is_match(key)
    }

    fn compared<'p>(&'p self, map: &'p PropertyMap) -> impl Iterator<Item = (&'p String, &'p PropertyValue)> {
        map.iter().filter(move |(key, _)| self.keeps(key))
    }

    /// Whether two maps agree on every compared key
    pub fn same(&self, left: &PropertyMap, right: &PropertyMap) -> bool {
        self.compared(left).eq(self.compared(right))
    }
}

/// Cost and label function for a pair of step traces
pub struct StepCostModel<'t> {
    a: &'t StepTrace,
    b: &'t StepTrace,
    /// B's name quarks translated into A's interner
    names_b: Vec<Option<Quark>>,
    mismatch_cost: u64,
    filter: PropertyFilter,
    labels_a: Vec<String>,
    labels_b: Vec<String>,
}

impl<'t> StepCostModel<'t> {
    pub fn new(
        a: &'t StepTrace,
        b: &'t StepTrace,
        mismatch_cost: u64,
        filter: PropertyFilter,
    ) -> Self {
        let names_b = b
            .names
            .iter()
            .map(|&quark| {
                b.interner
                    .resolve(quark)
                    .and_then(|name| a.interner.get(name))
            })
            .collect();
        let labels_a = subtree_labels(a, &filter);
        let labels_b = subtree_labels(b, &filter);

        StepCostModel {
            a,
            b,
            names_b,
            mismatch_cost,
            filter,
            labels_a,
            labels_b,
        }
    }

    pub fn same_name(&self, a: NodeId, b: NodeId) -> bool {
        self.names_b[b] == Some(self.a.names[a])
    }

    pub fn labels(&self, side: Side) -> &[String] {
        match side {
            Side::A => &self.labels_a,
            Side::B => &self.labels_b,
        }
    }
}

impl CostFunction for StepCostModel<'_> {
    fn cost(&self, a: NodeId, b: NodeId) -> u64 {
        if !self.same_name(a, b) {
            return UNMATCHABLE;
        }
        if self
            .filter
            .same(self.a.properties(a), self.b.properties(b))
        {
            0
        } else {
            self.mismatch_cost
        }
    }
}

impl LabelFunction for StepCostModel<'_> {
    fn label(&self, node: NodeId, side: Side) -> String {
        self.labels(side)[node].clone()
    }
}

/// Structural digest label of every subtree of a trace
///
/// Children always have larger ids than their parent, so one reverse sweep
/// sees every child digest before its parent's.
pub fn subtree_labels(trace: &StepTrace, filter: &PropertyFilter) -> Vec<String> {
    let len = trace.len();
    let mut digests = vec![0u64; len];

    for node in (0..len).rev() {
        let mut hasher = FnvHasher::default();
        let name = trace.name(node);
        hasher.write_usize(name.len());
        hasher.write(name.as_bytes());
        for (key, value) in filter.compared(trace.properties(node)) {
            hasher.write_usize(key.len());
            hasher.write(key.as_bytes());
            value.feed(&mut hasher);
        }
        let children = trace.graph.children(node);
        hasher.write_usize(children.len());
        for &child in children {
            hasher.write_u64(digests[child]);
        }
        digests[node] = hasher.finish();
    }

    (0..len)
        .map(|node| format!("{}#{:016x}", trace.name(node), digests[node]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step_trace::TraceEvent;

    fn enter(name: &str, props: &[(&str, i64)]) -> TraceEvent {
        TraceEvent::Enter {
            name: name.to_string(),
            properties: props
                .iter()
                .map(|(k, v)| (k.to_string(), PropertyValue::Int(*v)))
                .collect(),
        }
    }

    fn trace(events: Vec<TraceEvent>) -> StepTrace {
        StepTrace::from_events(events).unwrap()
    }

    #[test]
    fn test_cost_table() {
        let a = trace(vec![
            enter("read", &[("fd", 3)]),
            TraceEvent::Leave,
            enter("read", &[("fd", 3)]),
            TraceEvent::Leave,
        ]);
        let b = trace(vec![
            enter("read", &[("fd", 3)]),
            TraceEvent::Leave,
            enter("read", &[("fd", 4)]),
            TraceEvent::Leave,
            enter("write", &[("fd", 3)]),
            TraceEvent::Leave,
        ]);
        let model = StepCostModel::new(&a, &b, 5, PropertyFilter::default());

        assert_eq!(model.cost(0, 0), 0);
        assert_eq!(model.cost(1, 1), 5);
        assert_eq!(model.cost(0, 2), UNMATCHABLE);
    }

    #[test]
    fn test_names_compared_across_interners() {
        // "write" is interned first in A and second in B
        let a = trace(vec![enter("write", &[]), TraceEvent::Leave]);
        let b = trace(vec![
            enter("read", &[]),
            TraceEvent::Leave,
            enter("write", &[]),
            TraceEvent::Leave,
        ]);
        let model = StepCostModel::new(&a, &b, 1, PropertyFilter::default());
        assert!(model.same_name(0, 1));
        assert!(!model.same_name(0, 0));
    }

    #[test]
    fn test_ignored_properties() {
        let a = trace(vec![enter("poll", &[("ts", 100), ("ret", 0)]), TraceEvent::Leave]);
        let b = trace(vec![enter("poll", &[("ts", 250), ("ret", 0)]), TraceEvent::Leave]);

        let strict = StepCostModel::new(&a, &b, 7, PropertyFilter::default());
        assert_eq!(strict.cost(0, 0), 7);

        let filter = PropertyFilter::new(["^ts$"]).unwrap();
        let relaxed = StepCostModel::new(&a, &b, 7, filter);
        assert_eq!(relaxed.cost(0, 0), 0);
        assert_eq!(relaxed.label(0, Side::A), relaxed.label(0, Side::B));
    }

    #[test]
    fn test_labels_are_structural() {
        // main -> {f -> {g}, f -> {g}, f -> {h}}
        let t = trace(vec![
            enter("main", &[]),
            enter("f", &[]),
            enter("g", &[]),
            TraceEvent::Leave,
            TraceEvent::Leave,
            enter("f", &[]),
            enter("g", &[]),
            TraceEvent::Leave,
            TraceEvent::Leave,
            enter("f", &[]),
            enter("h", &[]),
            TraceEvent::Leave,
            TraceEvent::Leave,
            TraceEvent::Leave,
        ]);
        let labels = subtree_labels(&t, &PropertyFilter::default());

        assert_eq!(labels[1], labels[3]);
        assert_ne!(labels[1], labels[5]);
        assert!(labels[1].starts_with("f#"));
        assert_eq!(labels[0].len(), "main#".len() + 16);
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(PropertyFilter::new(["("]).is_err());
    }

    #[test]
    fn test_filter_keeps() {
        let filter = PropertyFilter::new(["^ts", "_ns$"]).unwrap();
        assert!(!filter.keeps("ts"));
        assert!(!filter.keeps("elapsed_ns"));
        assert!(filter.keeps("ret"));
    }
}
