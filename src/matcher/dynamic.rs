// Repetition-aware alignment of one gap between anchors
//
// Elements of a gap are sibling subtrees. State (i, j) = "align A[i..] with
// B[j..]" over positions relative to the gap. Per state:
//
//   collapse  a repeated run on one side against copies of the same chunk on
//             the other: shared copies matched positionally, surplus copies
//             charged repeat_skip_cost per node
//   match     A[i] ~ B[j] (cost includes their children)      -> (i + 1, j + 1)
//   skip A    whole subtree of A[i]                            -> (i + 1, j)
//   skip B    whole subtree of B[j]                            -> (i, j + 1)
//
// A collapse whose matched pairs all cost 0 competes only with the zero cost
// match, and a zero cost match with no collapse is taken outright. Otherwise
// the cheapest option wins, ties in the order listed.

use super::{MatchConfig, NodePair};
use crate::canonical::CanonicalNode;
use crate::cost::{self, UNMATCHABLE};
use crate::graph::NodeId;
use fnv::FnvHashMap;

/// Services the gap DP needs from the level-by-level driver
pub(super) trait PairScorer {
    /// Cost of matching two sibling subtrees, children included
    fn subtree_cost(&mut self, a: NodeId, b: NodeId, depth: usize) -> u64;

    /// Whether the per-call state budget is spent
    fn states_exhausted(&self) -> bool;

    fn record_state(&mut self);

    /// Note that a resource limit changed the result
    fn truncate(&mut self, limit: &'static str);
}

/// A repeated run starting at some gap position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct Run {
    pub chunk: usize,
    pub copies: usize,
}

/// One side of a gap
pub(super) struct Gap<'s> {
    nodes: &'s [NodeId],
    labels: &'s [String],
    sizes: &'s [usize],
    runs: Vec<Option<Run>>,
}

impl<'s> Gap<'s> {
    /// `nodes` is the gap slice, `offset` its start in the full sibling
    /// sequence the canonical `units` were computed for. Only runs lying
    /// entirely inside the gap are kept.
    pub fn new(
        nodes: &'s [NodeId],
        offset: usize,
        units: &[CanonicalNode],
        labels: &'s [String],
        sizes: &'s [usize],
    ) -> Self {
        let end = offset + nodes.len();
        let mut runs = vec![None; nodes.len()];
        for unit in units {
            if !unit.is_literal() && unit.pos >= offset && unit.end() <= end {
                runs[unit.pos - offset] = Some(Run {
                    chunk: unit.chunk_size,
                    copies: unit.num_repetitions,
                });
            }
        }
        Gap {
            nodes,
            labels,
            sizes,
            runs,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn label(&self, pos: usize) -> &str {
        &self.labels[self.nodes[pos]]
    }

    fn size(&self, pos: usize) -> usize {
        self.sizes[self.nodes[pos]]
    }

    /// Suffix sums of subtree sizes, one extra slot for the end
    fn remaining_sizes(&self) -> Vec<usize> {
        let mut suffix = vec![0; self.len() + 1];
        for pos in (0..self.len()).rev() {
            suffix[pos] = suffix[pos + 1] + self.size(pos);
        }
        suffix
    }

    /// Back-to-back copies of `other[other_pos..other_pos + chunk]` starting at `pos`
    fn copies_of(&self, pos: usize, other: &Gap<'_>, other_pos: usize, chunk: usize) -> usize {
        let mut copies = 0;
        while pos + (copies + 1) * chunk <= self.len()
            && (0..chunk).all(|e| {
                self.label(pos + copies * chunk + e) == other.label(other_pos + e)
            })
        {
            copies += 1;
        }
        copies
    }
}

/// Pairs chosen for a gap and their cost
#[derive(Debug, Default)]
pub(super) struct GapAlignment {
    pub cost: u64,
    pub pairs: Vec<NodePair>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Collapse {
    chunk: usize,
    copies_a: usize,
    copies_b: usize,
}

impl Collapse {
    fn coverage(&self) -> usize {
        self.chunk * (self.copies_a + self.copies_b)
    }

    fn shared(&self) -> usize {
        self.chunk * self.copies_a.min(self.copies_b)
    }
}

#[derive(Debug, Clone, Copy)]
struct PricedCollapse {
    collapse: Collapse,
    matched: u64,
    surplus: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Collapse(Collapse),
    Match,
    SkipA,
    SkipB,
    /// Everything left is skipped
    Rest,
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    cost: u64,
    step: Step,
}

struct GapDp<'g, 's, S: ?Sized> {
    a: &'g Gap<'s>,
    b: &'g Gap<'s>,
    scorer: &'g mut S,
    depth: usize,
    skip_cost: u64,
    repeat_skip_cost: u64,
    band: usize,
    remaining_a: Vec<usize>,
    remaining_b: Vec<usize>,
    memo: FnvHashMap<(usize, usize), Entry>,
    pair_costs: FnvHashMap<(usize, usize), u64>,
    collapses: FnvHashMap<(usize, usize), Option<PricedCollapse>>,
}

impl<S: PairScorer + ?Sized> GapDp<'_, '_, S> {
    fn is_terminal(&self, i: usize, j: usize) -> bool {
        i >= self.a.len() || j >= self.b.len()
    }

    fn remaining_cost(&self, i: usize, j: usize) -> u64 {
        let left = self.remaining_a[i.min(self.a.len())] + self.remaining_b[j.min(self.b.len())];
        cost::times(self.skip_cost, left)
    }

    fn resolved(&self, i: usize, j: usize) -> Option<u64> {
        if self.is_terminal(i, j) {
            return Some(self.remaining_cost(i, j));
        }
        self.memo.get(&(i, j)).map(|entry| entry.cost)
    }

    fn pair_cost(&mut self, i: usize, j: usize) -> u64 {
        if let Some(&known) = self.pair_costs.get(&(i, j)) {
            return known;
        }
        let value = self
            .scorer
            .subtree_cost(self.a.nodes[i], self.b.nodes[j], self.depth);
        self.pair_costs.insert((i, j), value);
        value
    }

    fn collapse_candidate(&self, i: usize, j: usize) -> Option<Collapse> {
        let from_a = self.a.runs[i].and_then(|run| {
            let copies_b = self.b.copies_of(j, self.a, i, run.chunk);
            (copies_b > 0).then_some(Collapse {
                chunk: run.chunk,
                copies_a: run.copies,
                copies_b,
            })
        });
        let from_b = self.b.runs[j].and_then(|run| {
            let copies_a = self.a.copies_of(i, self.b, j, run.chunk);
            (copies_a > 0).then_some(Collapse {
                chunk: run.chunk,
                copies_a,
                copies_b: run.copies,
            })
        });

        match (from_a, from_b) {
            (Some(x), Some(y)) => {
                let prefer_b = y.coverage() > x.coverage()
                    || (y.coverage() == x.coverage() && y.chunk < x.chunk);
                Some(if prefer_b { y } else { x })
            }
            (x, y) => x.or(y),
        }
    }

    fn collapse(&mut self, i: usize, j: usize) -> Option<PricedCollapse> {
        if let Some(&known) = self.collapses.get(&(i, j)) {
            return known;
        }

        let priced = self.collapse_candidate(i, j).and_then(|collapse| {
            let shared = collapse.shared();
            let mut matched = 0;
            for offset in 0..shared {
                let pair = self.pair_cost(i + offset, j + offset);
                if pair == UNMATCHABLE {
                    return None;
                }
                matched = cost::add(matched, pair);
            }

            let end_a = i + collapse.chunk * collapse.copies_a;
            let end_b = j + collapse.chunk * collapse.copies_b;
            let surplus_nodes = (self.remaining_a[i + shared] - self.remaining_a[end_a])
                + (self.remaining_b[j + shared] - self.remaining_b[end_b]);

            Some(PricedCollapse {
                collapse,
                matched,
                surplus: cost::times(self.repeat_skip_cost, surplus_nodes),
            })
        });

        self.collapses.insert((i, j), priced);
        priced
    }

    fn next(&self, i: usize, j: usize, step: Step) -> (usize, usize) {
        match step {
            Step::Collapse(c) => (i + c.chunk * c.copies_a, j + c.chunk * c.copies_b),
            Step::Match => (i + 1, j + 1),
            Step::SkipA => (i + 1, j),
            Step::SkipB => (i, j + 1),
            Step::Rest => (self.a.len(), self.b.len()),
        }
    }

    fn step_cost(&mut self, i: usize, j: usize, step: Step) -> u64 {
        match step {
            Step::Collapse(_) => self
                .collapse(i, j)
                .map_or(UNMATCHABLE, |p| cost::add(p.matched, p.surplus)),
            Step::Match => self.pair_cost(i, j),
            Step::SkipA => cost::times(self.skip_cost, self.a.size(i)),
            Step::SkipB => cost::times(self.skip_cost, self.b.size(j)),
            Step::Rest => self.remaining_cost(i, j),
        }
    }

    /// Options explored at (i, j), in tie-break order
    fn options(&mut self, i: usize, j: usize) -> ([Step; 4], usize) {
        let collapse = self.collapse(i, j);
        let match_cost = self.pair_cost(i, j);

        let mut options = [Step::Rest; 4];
        let mut count = 0;
        let mut push = |step| {
            options[count] = step;
            count += 1;
        };

        match collapse {
            // matched == 0 implies match_cost == 0
            Some(priced) if priced.matched == 0 => {
                push(Step::Collapse(priced.collapse));
                push(Step::Match);
            }
            _ if match_cost == 0 => push(Step::Match),
            _ => {
                if match_cost != UNMATCHABLE {
                    push(Step::Match);
                }
                if let Some(priced) = collapse {
                    push(Step::Collapse(priced.collapse));
                }
                push(Step::SkipA);
                push(Step::SkipB);
            }
        }

        (options, count)
    }

    fn settle_rest(&mut self, i: usize, j: usize, limit: &'static str) {
        self.scorer.truncate(limit);
        let entry = Entry {
            cost: self.remaining_cost(i, j),
            step: Step::Rest,
        };
        self.memo.insert((i, j), entry);
        self.scorer.record_state();
    }

    fn solve(&mut self) -> u64 {
        let mut stack: Vec<(usize, usize)> = vec![(0, 0)];

        while let Some(&(i, j)) = stack.last() {
            if self.resolved(i, j).is_some() {
                stack.pop();
                continue;
            }
            if i.abs_diff(j) > self.band {
                self.settle_rest(i, j, "distance_bound");
                stack.pop();
                continue;
            }
            if self.scorer.states_exhausted() {
                self.settle_rest(i, j, "max_dp_states");
                stack.pop();
                continue;
            }

            let (options, count) = self.options(i, j);
            let mut pending = false;
            for &step in &options[..count] {
                let (ni, nj) = self.next(i, j, step);
                if self.resolved(ni, nj).is_none() {
                    stack.push((ni, nj));
                    pending = true;
                }
            }
            if pending {
                continue;
            }

            let mut best: Option<Entry> = None;
            for &step in &options[..count] {
                let (ni, nj) = self.next(i, j, step);
                let rest = self.resolved(ni, nj).unwrap_or(UNMATCHABLE);
                let total = cost::add(self.step_cost(i, j, step), rest);
                if best.map_or(true, |current| total < current.cost) {
                    best = Some(Entry { cost: total, step });
                }
            }

            let entry = best.unwrap_or(Entry {
                cost: self.remaining_cost(i, j),
                step: Step::Rest,
            });
            self.memo.insert((i, j), entry);
            self.scorer.record_state();
            stack.pop();
        }

        self.resolved(0, 0).unwrap_or(UNMATCHABLE)
    }

    fn alignment(&self) -> Vec<NodePair> {
        let mut pairs = Vec::new();
        let (mut i, mut j) = (0, 0);
        while !self.is_terminal(i, j) {
            let Some(entry) = self.memo.get(&(i, j)) else {
                break;
            };
            match entry.step {
                Step::Collapse(collapse) => {
                    for offset in 0..collapse.shared() {
                        pairs.push(NodePair::new(
                            self.a.nodes[i + offset],
                            self.b.nodes[j + offset],
                        ));
                    }
                }
                Step::Match => pairs.push(NodePair::new(self.a.nodes[i], self.b.nodes[j])),
                Step::SkipA | Step::SkipB => {}
                Step::Rest => break,
            }
            (i, j) = self.next(i, j, entry.step);
        }
        pairs
    }
}

/// Align two gaps of sibling subtrees at tree level `depth`
pub(super) fn align_gap<S>(
    scorer: &mut S,
    a: &Gap<'_>,
    b: &Gap<'_>,
    depth: usize,
    config: &MatchConfig,
) -> GapAlignment
where
    S: PairScorer + ?Sized,
{
    if a.is_empty() || b.is_empty() {
        let left = a.remaining_sizes()[0] + b.remaining_sizes()[0];
        return GapAlignment {
            cost: cost::times(config.skip_cost, left),
            pairs: Vec::new(),
        };
    }

    let mut dp = GapDp {
        a,
        b,
        scorer,
        depth,
        skip_cost: config.skip_cost,
        repeat_skip_cost: config.repeat_skip_cost,
        band: config
            .limits
            .distance_bound
            .saturating_add(a.len().abs_diff(b.len())),
        remaining_a: a.remaining_sizes(),
        remaining_b: b.remaining_sizes(),
        memo: FnvHashMap::default(),
        pair_costs: FnvHashMap::default(),
        collapses: FnvHashMap::default(),
    };

    let cost = dp.solve();
    let pairs = dp.alignment();

    tracing::trace!(
        depth,
        len_a = a.len(),
        len_b = b.len(),
        states = dp.memo.len(),
        cost,
        "gap aligned"
    );

    GapAlignment { cost, pairs }
}
