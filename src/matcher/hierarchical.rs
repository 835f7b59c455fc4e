// Hierarchical matcher: level-by-level alignment with anchors
//
//   level (sibling sequences of A and B)
//     1. anchors: labels occurring equally often on both sides, paired in
//        order, reduced to the longest non-crossing subset
//     2. canonicalize both sequences (repeated runs)
//     3. gap DP before, between and after anchors
//     4. every matched pair with children on both sides: repeat one level down
//
// Alignments of child sequences are memoized per node pair, so the gap DP can
// price a candidate pair (node cost + children) as often as it likes. Native
// recursion only follows tree depth and is capped by `max_nesting_depth`.

use super::dynamic::{align_gap, Gap, PairScorer};
use super::{MatchConfig, MatchResult, NodePair};
use crate::canonical::{canonicalize, CanonicalNode};
use crate::cost::{self, CostFunction, LabelFunction, Side, UNMATCHABLE};
use crate::error::Result;
use crate::graph::{Graph, NodeId};
use crate::repetition::RepetitionTable;
use fnv::FnvHashMap;
use std::rc::Rc;

/// Direct child pairs of one matched pair and what aligning them cost
#[derive(Debug, Clone)]
struct ChildAlignment {
    cost: u64,
    pairs: Vec<NodePair>,
}

/// Per-call input that outlives every borrow of the matcher itself
struct Inputs<'m, C: ?Sized> {
    graph_a: &'m Graph,
    graph_b: &'m Graph,
    labels_a: &'m [String],
    labels_b: &'m [String],
    sizes_a: &'m [usize],
    sizes_b: &'m [usize],
    cost_fn: &'m C,
}

struct HierarchicalMatcher<'m, C: ?Sized> {
    input: Inputs<'m, C>,
    config: MatchConfig,
    units_a: FnvHashMap<Option<NodeId>, Rc<[CanonicalNode]>>,
    units_b: FnvHashMap<Option<NodeId>, Rc<[CanonicalNode]>>,
    children: FnvHashMap<NodePair, ChildAlignment>,
    states: usize,
    truncated: bool,
}

impl<'m, C: CostFunction + ?Sized> HierarchicalMatcher<'m, C> {
    fn siblings(&self, side: Side, owner: Option<NodeId>) -> Vec<NodeId> {
        let graph = match side {
            Side::A => self.input.graph_a,
            Side::B => self.input.graph_b,
        };
        match owner {
            Some(node) => graph.children(node).to_vec(),
            None => graph.roots(),
        }
    }

    fn units(&mut self, side: Side, owner: Option<NodeId>, seq: &[NodeId]) -> Rc<[CanonicalNode]> {
        let (cache, labels) = match side {
            Side::A => (&mut self.units_a, self.input.labels_a),
            Side::B => (&mut self.units_b, self.input.labels_b),
        };
        if let Some(units) = cache.get(&owner) {
            return Rc::clone(units);
        }

        let seq_labels: Vec<&str> = seq.iter().map(|&node| labels[node].as_str()).collect();
        let units: Rc<[CanonicalNode]> =
            match RepetitionTable::build(&seq_labels, self.config.min_chunk, self.config.max_chunk)
            {
                Ok(table) => canonicalize(&table, seq.len()).into(),
                // chunk bounds are validated on entry
                Err(_) => (0..seq.len()).map(CanonicalNode::literal).collect(),
            };
        cache.insert(owner, Rc::clone(&units));
        units
    }

    fn children_cost(&mut self, a: NodeId, b: NodeId, depth: usize) -> u64 {
        let leaf_a = self.input.graph_a.node(a).is_leaf();
        let leaf_b = self.input.graph_b.node(b).is_leaf();
        if leaf_a && leaf_b {
            return 0;
        }

        let descendants = (self.input.sizes_a[a] - 1) + (self.input.sizes_b[b] - 1);
        if leaf_a || leaf_b {
            return cost::times(self.config.skip_cost, descendants);
        }
        if depth + 1 > self.config.limits.max_nesting_depth {
            self.truncate("max_nesting_depth");
            return cost::times(self.config.skip_cost, descendants);
        }

        let key = NodePair::new(a, b);
        if let Some(known) = self.children.get(&key) {
            return known.cost;
        }

        let (cost, pairs) = self.align_level(Some(a), Some(b), depth + 1);
        self.children.insert(key, ChildAlignment { cost, pairs });
        cost
    }

    fn align_level(
        &mut self,
        owner_a: Option<NodeId>,
        owner_b: Option<NodeId>,
        depth: usize,
    ) -> (u64, Vec<NodePair>) {
        let seq_a = self.siblings(Side::A, owner_a);
        let seq_b = self.siblings(Side::B, owner_b);
        let anchors = find_anchors(&seq_a, &seq_b, self.input.labels_a, self.input.labels_b);
        let units_a = self.units(Side::A, owner_a, &seq_a);
        let units_b = self.units(Side::B, owner_b, &seq_b);

        tracing::trace!(
            depth,
            len_a = seq_a.len(),
            len_b = seq_b.len(),
            anchors = anchors.len(),
            "aligning level"
        );

        let mut total = 0;
        let mut pairs = Vec::new();
        let (mut start_a, mut start_b) = (0, 0);

        let bounds = anchors
            .iter()
            .map(|&(ia, ib)| (ia, ib, true))
            .chain(std::iter::once((seq_a.len(), seq_b.len(), false)));

        for (end_a, end_b, is_anchor) in bounds {
            let gap_a = Gap::new(
                &seq_a[start_a..end_a],
                start_a,
                &units_a,
                self.input.labels_a,
                self.input.sizes_a,
            );
            let gap_b = Gap::new(
                &seq_b[start_b..end_b],
                start_b,
                &units_b,
                self.input.labels_b,
                self.input.sizes_b,
            );
            let config = self.config;
            let gap = align_gap(self, &gap_a, &gap_b, depth, &config);
            total = cost::add(total, gap.cost);
            pairs.extend(gap.pairs);

            if is_anchor {
                let (a, b) = (seq_a[end_a], seq_b[end_b]);
                total = cost::add(total, self.children_cost(a, b, depth));
                pairs.push(NodePair::new(a, b));
                start_a = end_a + 1;
                start_b = end_b + 1;
            }
        }

        (total, pairs)
    }

    /// Top-level pairs plus every memoized child alignment below them
    fn expand(&self, top: Vec<NodePair>) -> Vec<NodePair> {
        let mut pairs = Vec::with_capacity(top.len());
        let mut stack = top;
        while let Some(pair) = stack.pop() {
            if let Some(below) = self.children.get(&pair) {
                stack.extend_from_slice(&below.pairs);
            }
            pairs.push(pair);
        }
        pairs.sort();
        pairs
    }
}

impl<C: CostFunction + ?Sized> PairScorer for HierarchicalMatcher<'_, C> {
    fn subtree_cost(&mut self, a: NodeId, b: NodeId, depth: usize) -> u64 {
        let own = self.input.cost_fn.cost(a, b);
        if own == UNMATCHABLE {
            return UNMATCHABLE;
        }
        cost::add(own, self.children_cost(a, b, depth))
    }

    fn states_exhausted(&self) -> bool {
        self.states >= self.config.limits.max_dp_states
    }

    fn record_state(&mut self) {
        self.states += 1;
    }

    fn truncate(&mut self, limit: &'static str) {
        if !self.truncated {
            tracing::warn!(
                limit,
                states = self.states,
                "hierarchical matching hit a resource bound, result may be suboptimal"
            );
        }
        self.truncated = true;
    }
}

/// Positional pairs of labels that occur equally often on both sides
///
/// Returned in A order with strictly increasing B indices: crossing
/// candidates are reduced to a longest increasing subsequence.
fn find_anchors(
    seq_a: &[NodeId],
    seq_b: &[NodeId],
    labels_a: &[String],
    labels_b: &[String],
) -> Vec<(usize, usize)> {
    let mut by_label_b: FnvHashMap<&str, Vec<usize>> = FnvHashMap::default();
    for (ib, &node) in seq_b.iter().enumerate() {
        let label = labels_b[node].as_str();
        if !label.is_empty() {
            by_label_b.entry(label).or_default().push(ib);
        }
    }

    let mut count_a: FnvHashMap<&str, usize> = FnvHashMap::default();
    for &node in seq_a {
        let label = labels_a[node].as_str();
        if !label.is_empty() {
            *count_a.entry(label).or_default() += 1;
        }
    }

    let mut seen: FnvHashMap<&str, usize> = FnvHashMap::default();
    let mut candidates = Vec::new();
    for (ia, &node) in seq_a.iter().enumerate() {
        let label = labels_a[node].as_str();
        let Some(positions) = by_label_b.get(label) else {
            continue;
        };
        if count_a.get(label) != Some(&positions.len()) {
            continue;
        }
        let rank = seen.entry(label).or_default();
        candidates.push((ia, positions[*rank]));
        *rank += 1;
    }

    longest_increasing(&candidates)
}

/// Longest subsequence of `pairs` (sorted by `.0`) with strictly increasing `.1`
fn longest_increasing(pairs: &[(usize, usize)]) -> Vec<(usize, usize)> {
    // tails[k]: index into `pairs` ending the best subsequence of length k + 1
    let mut tails: Vec<usize> = Vec::new();
    let mut prev: Vec<Option<usize>> = vec![None; pairs.len()];

    for (idx, &(_, b)) in pairs.iter().enumerate() {
        let slot = tails.partition_point(|&t| pairs[t].1 < b);
        if slot > 0 {
            prev[idx] = Some(tails[slot - 1]);
        }
        if slot == tails.len() {
            tails.push(idx);
        } else {
            tails[slot] = idx;
        }
    }

    let mut chain = Vec::with_capacity(tails.len());
    let mut cursor = tails.last().copied();
    while let Some(idx) = cursor {
        chain.push(pairs[idx]);
        cursor = prev[idx];
    }
    chain.reverse();
    chain
}

/// Align two graphs level by level, anchoring on labels first
///
/// `label_fn` supplies the keys for anchor and repetition detection; an empty
/// label never anchors and never takes part in a repeated run. Every pair is
/// still priced by `cost_fn`, except anchors, whose own cost is taken as 0.
///
/// # Errors
///
/// Fails fast on an invalid [`MatchConfig`].
///
/// # Example
///
/// ```
/// use execdiff::cost::Side;
/// use execdiff::graph::Graph;
/// use execdiff::matcher::{match_graphs_hierarchical, MatchConfig};
///
/// # fn main() -> execdiff::error::Result<()> {
/// // five roots A B A B Z against three roots A B Z
/// let a = Graph::from_children(vec![vec![]; 5])?;
/// let b = Graph::from_children(vec![vec![]; 3])?;
/// let chars_a = ['A', 'B', 'A', 'B', 'Z'];
/// let chars_b = ['A', 'B', 'Z'];
/// let cost = |x: usize, y: usize| if chars_a[x] == chars_b[y] { 0 } else { 2 };
/// let label = |node: usize, side: Side| match side {
///     Side::A => chars_a[node].to_string(),
///     Side::B => chars_b[node].to_string(),
/// };
///
/// let result = match_graphs_hierarchical(&a, &b, &cost, &label, &MatchConfig::with_skip_cost(1000))?;
/// assert_eq!(result.total_cost, 2);
/// assert_eq!(result.pair_tuples(), vec![(0, 0), (1, 1), (4, 2)]);
/// # Ok(())
/// # }
/// ```
pub fn match_graphs_hierarchical<C, L>(
    graph_a: &Graph,
    graph_b: &Graph,
    cost_fn: &C,
    label_fn: &L,
    config: &MatchConfig,
) -> Result<MatchResult>
where
    C: CostFunction + ?Sized,
    L: LabelFunction + ?Sized,
{
    config.validate()?;

    if graph_a.is_empty() || graph_b.is_empty() {
        let left = graph_a.len() + graph_b.len();
        return Ok(MatchResult::unmatched(cost::times(config.skip_cost, left)));
    }

    let labels_a: Vec<String> = (0..graph_a.len())
        .map(|node| label_fn.label(node, Side::A))
        .collect();
    let labels_b: Vec<String> = (0..graph_b.len())
        .map(|node| label_fn.label(node, Side::B))
        .collect();
    let sizes_a = graph_a.subtree_sizes();
    let sizes_b = graph_b.subtree_sizes();

    let mut matcher = HierarchicalMatcher {
        input: Inputs {
            graph_a,
            graph_b,
            labels_a: &labels_a,
            labels_b: &labels_b,
            sizes_a: &sizes_a,
            sizes_b: &sizes_b,
            cost_fn,
        },
        config: *config,
        units_a: FnvHashMap::default(),
        units_b: FnvHashMap::default(),
        children: FnvHashMap::default(),
        states: 0,
        truncated: false,
    };

    let (total_cost, top) = matcher.align_level(None, None, 0);
    let pairs = matcher.expand(top);

    tracing::debug!(
        nodes_a = graph_a.len(),
        nodes_b = graph_b.len(),
        states = matcher.states,
        child_alignments = matcher.children.len(),
        pairs = pairs.len(),
        total_cost,
        truncated = matcher.truncated,
        "hierarchical matching finished"
    );

    Ok(MatchResult {
        total_cost,
        pairs,
        truncated: matcher.truncated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_longest_increasing_drops_crossing() {
        let pairs = [(0, 2), (1, 0), (2, 1), (3, 3)];
        assert_eq!(longest_increasing(&pairs), vec![(1, 0), (2, 1), (3, 3)]);
    }

    #[test]
    fn test_longest_increasing_empty() {
        assert!(longest_increasing(&[]).is_empty());
    }

    #[test]
    fn test_anchors_need_equal_counts() {
        let labels_a: Vec<String> = ["x", "y", "y", "", "z"].iter().map(|s| s.to_string()).collect();
        let labels_b: Vec<String> = ["y", "x", "", "z"].iter().map(|s| s.to_string()).collect();
        let anchors = find_anchors(&[0, 1, 2, 3, 4], &[0, 1, 2, 3], &labels_a, &labels_b);
        // "y" appears twice in A but once in B, "" never anchors
        assert_eq!(anchors, vec![(0, 1), (4, 3)]);
    }

    #[test]
    fn test_anchors_pair_repeated_labels_in_order() {
        let labels_a: Vec<String> = ["p", "q", "p"].iter().map(|s| s.to_string()).collect();
        let labels_b: Vec<String> = ["p", "p", "q"].iter().map(|s| s.to_string()).collect();
        let anchors = find_anchors(&[0, 1, 2], &[0, 1, 2], &labels_a, &labels_b);
        // candidates (0,0) (1,2) (2,1); (1,2) crosses (2,1)
        assert_eq!(anchors, vec![(0, 0), (2, 1)]);
    }
}
