// Flat matcher: memoized alignment of two preorder listings
//
// State (i, j) = "align A from preorder position i with B from position j".
// Three choices per state:
//
//   match   A[i] ~ B[j]   (equal depth, finite cost)   -> (i + 1, j + 1)
//   skip A  subtree of A[i] if it is deeper than B[j],
//           else the single node                        -> (next_a, j)
//   skip B  symmetric                                   -> (i, next_b)
//
// Reaching the end of either listing charges skip cost for everything left on
// the other side. A zero-cost match is taken without exploring the skips,
// which keeps identical stretches of two traces linear.
//
// Ties never look at which graph came first. Lower cost wins, then more
// matched pairs, then the match over either skip. Between two skips the one
// leaving fewer nodes unmatched wins, then the skip on the side that is
// behind (i < j skips A). A tie left on the diagonal (i == j) is marked; the
// listings are then aligned the other way round as well and
// `settle_mirror_tie` picks between the two alignments.
//
// The memo table is keyed by node ids and records the chosen successor state,
// so the alignment is read back by following keys from (0, 0).

use super::{MatchConfig, MatchLimits, MatchResult, NodePair};
use crate::cost::{self, CostFunction, UNMATCHABLE};
use crate::error::Result;
use crate::graph::{Graph, NodeId};
use crate::preorder::Preorder;
use fnv::FnvHashMap;
use std::cmp::{Ordering, Reverse};

#[derive(Debug, Clone, Copy)]
struct SubtreeCost {
    cost: u64,
    /// Matched pairs from this state to the end of the alignment
    pairs: usize,
    /// Successor state, `None` once either listing is exhausted
    next_match: Option<NodePair>,
    /// Whether this state's own pair is part of the alignment
    is_matching: bool,
}

/// Value of the alignment that starts at some state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Score {
    cost: u64,
    pairs: usize,
}

impl Score {
    const UNREACHABLE: Score = Score {
        cost: UNMATCHABLE,
        pairs: 0,
    };

    /// Smaller is better
    fn rank(self) -> (u64, Reverse<usize>) {
        (self.cost, Reverse(self.pairs))
    }

    fn after(self, cost: u64, pairs: usize) -> Score {
        Score {
            cost: cost::add(cost, self.cost),
            pairs: self.pairs + pairs,
        }
    }

    fn entry(self, next_match: Option<NodePair>, is_matching: bool) -> SubtreeCost {
        SubtreeCost {
            cost: self.cost,
            pairs: self.pairs,
            next_match,
            is_matching,
        }
    }
}

struct FlatMatcher<'p, C: ?Sized> {
    a: &'p Preorder,
    b: &'p Preorder,
    cost_fn: &'p C,
    skip_cost: u64,
    limits: MatchLimits,
    cache: FnvHashMap<NodePair, SubtreeCost>,
    truncated: bool,
    mirror_tie: bool,
}

impl<'p, C: CostFunction + ?Sized> FlatMatcher<'p, C> {
    fn new(a: &'p Preorder, b: &'p Preorder, cost_fn: &'p C, config: &MatchConfig) -> Self {
        FlatMatcher {
            a,
            b,
            cost_fn,
            skip_cost: config.skip_cost,
            limits: config.limits,
            cache: FnvHashMap::default(),
            truncated: false,
            mirror_tie: false,
        }
    }

    fn key(&self, i: usize, j: usize) -> NodePair {
        NodePair::new(self.a.node(i), self.b.node(j))
    }

    fn is_terminal(&self, i: usize, j: usize) -> bool {
        i >= self.a.len() || j >= self.b.len()
    }

    fn remaining_cost(&self, i: usize, j: usize) -> u64 {
        let left = (self.a.len() - i) + (self.b.len() - j);
        cost::times(self.skip_cost, left)
    }

    fn resolved(&self, i: usize, j: usize) -> Option<Score> {
        if self.is_terminal(i, j) {
            return Some(Score {
                cost: self.remaining_cost(i, j),
                pairs: 0,
            });
        }
        self.cache.get(&self.key(i, j)).map(|entry| Score {
            cost: entry.cost,
            pairs: entry.pairs,
        })
    }

    fn successor(&self, i: usize, j: usize) -> Option<NodePair> {
        if self.is_terminal(i, j) {
            None
        } else {
            Some(self.key(i, j))
        }
    }

    /// Successor position and number of A nodes left behind by skipping A[i]
    fn skip_a(&self, i: usize, j: usize) -> (usize, usize) {
        if self.a.depth(i) > self.b.depth(j) {
            let next = self.a.next_depth_drop(i);
            (next, next - i)
        } else {
            (i + 1, 1)
        }
    }

    fn skip_b(&self, i: usize, j: usize) -> (usize, usize) {
        if self.b.depth(j) > self.a.depth(i) {
            let next = self.b.next_depth_drop(j);
            (next, next - j)
        } else {
            (j + 1, 1)
        }
    }

    fn out_of_bounds(&self, i: usize, j: usize) -> bool {
        i.abs_diff(j) > self.limits.distance_bound
            || self.cache.len() >= self.limits.max_dp_states
    }

    /// Whether skipping on the A side beats skipping on the B side
    fn prefers_skip_a(
        &mut self,
        i: usize,
        j: usize,
        via_a: Score,
        via_b: Score,
        skipped: (usize, usize),
    ) -> bool {
        let order = via_a
            .rank()
            .cmp(&via_b.rank())
            .then(skipped.0.cmp(&skipped.1))
            .then(i.cmp(&j));
        if order == Ordering::Equal {
            self.mirror_tie = true;
        }
        order != Ordering::Greater
    }

    fn solve(&mut self) -> u64 {
        let mut stack: Vec<(usize, usize)> = vec![(0, 0)];

        while let Some(&(i, j)) = stack.last() {
            if self.resolved(i, j).is_some() {
                stack.pop();
                continue;
            }

            let key = self.key(i, j);

            if self.out_of_bounds(i, j) {
                if !self.truncated {
                    tracing::warn!(
                        pos_a = i,
                        pos_b = j,
                        states = self.cache.len(),
                        "flat matching hit a resource bound, result may be suboptimal"
                    );
                }
                self.truncated = true;
                let entry = Score {
                    cost: self.remaining_cost(i, j),
                    pairs: 0,
                }
                .entry(None, false);
                self.cache.insert(key, entry);
                stack.pop();
                continue;
            }

            let match_cost = if self.a.depth(i) == self.b.depth(j) {
                self.cost_fn.cost(key.a, key.b)
            } else {
                UNMATCHABLE
            };
            let (next_a, skipped_a) = self.skip_a(i, j);
            let (next_b, skipped_b) = self.skip_b(i, j);

            let mut pending = false;
            if match_cost != UNMATCHABLE && self.resolved(i + 1, j + 1).is_none() {
                stack.push((i + 1, j + 1));
                pending = true;
            }
            if match_cost != 0 {
                if self.resolved(next_a, j).is_none() {
                    stack.push((next_a, j));
                    pending = true;
                }
                if self.resolved(i, next_b).is_none() {
                    stack.push((i, next_b));
                    pending = true;
                }
            }
            if pending {
                continue;
            }

            let via_match = match self.resolved(i + 1, j + 1) {
                Some(rest) if match_cost != UNMATCHABLE => rest.after(match_cost, 1),
                _ => Score::UNREACHABLE,
            };

            let entry = if match_cost == 0 {
                via_match.entry(self.successor(i + 1, j + 1), true)
            } else {
                let via_skip_a = self
                    .resolved(next_a, j)
                    .unwrap_or(Score::UNREACHABLE)
                    .after(cost::times(self.skip_cost, skipped_a), 0);
                let via_skip_b = self
                    .resolved(i, next_b)
                    .unwrap_or(Score::UNREACHABLE)
                    .after(cost::times(self.skip_cost, skipped_b), 0);

                if via_match.cost != UNMATCHABLE
                    && via_match.rank() <= via_skip_a.rank().min(via_skip_b.rank())
                {
                    via_match.entry(self.successor(i + 1, j + 1), true)
                } else if self.prefers_skip_a(
                    i,
                    j,
                    via_skip_a,
                    via_skip_b,
                    (skipped_a, skipped_b),
                ) {
                    via_skip_a.entry(self.successor(next_a, j), false)
                } else {
                    via_skip_b.entry(self.successor(i, next_b), false)
                }
            };

            self.cache.insert(key, entry);
            stack.pop();
        }

        self.resolved(0, 0).map_or(UNMATCHABLE, |score| score.cost)
    }

    fn alignment(&self) -> Vec<NodePair> {
        let mut pairs = Vec::new();
        let mut state = self.successor(0, 0);
        while let Some(key) = state {
            let Some(entry) = self.cache.get(&key) else {
                break;
            };
            if entry.is_matching {
                pairs.push(key);
            }
            state = entry.next_match;
        }
        pairs.sort();
        pairs
    }
}

/// One pass of the DP over a fixed orientation
struct Pass {
    total_cost: u64,
    pairs: Vec<NodePair>,
    truncated: bool,
    mirror_tie: bool,
    states: usize,
}

fn run_pass<C>(a: &Preorder, b: &Preorder, cost_fn: &C, config: &MatchConfig) -> Pass
where
    C: CostFunction + ?Sized,
{
    let mut matcher = FlatMatcher::new(a, b, cost_fn, config);
    let total_cost = matcher.solve();
    Pass {
        total_cost,
        pairs: matcher.alignment(),
        truncated: matcher.truncated,
        mirror_tie: matcher.mirror_tie,
        states: matcher.cache.len(),
    }
}

fn mirrored(pairs: &[NodePair]) -> Vec<NodePair> {
    let mut out: Vec<NodePair> = pairs.iter().map(|p| p.reversed()).collect();
    out.sort();
    out
}

/// The smaller of an alignment and its mirror image
fn mirror_key(pairs: &[NodePair]) -> Vec<NodePair> {
    let flipped = mirrored(pairs);
    if flipped.as_slice() < pairs {
        flipped
    } else {
        pairs.to_vec()
    }
}

/// Positions (p, q), p < q, within the band and at equal depth
fn band_positions<'p>(
    a: &'p Preorder,
    b: &'p Preorder,
    band: usize,
) -> impl Iterator<Item = (usize, usize)> + 'p {
    (0..a.len()).flat_map(move |p| {
        let end = b.len().min(p.saturating_add(band).saturating_add(1));
        (p + 1..end)
            .filter(move |&q| a.depth(p) == b.depth(q))
            .map(move |q| (p, q))
    })
}

/// Choose between the forward alignment and the backward one (already
/// mirrored into A/B order) so that swapping the graphs mirrors the choice.
///
/// Both alignments are optimal. When they are mirror images of each other the
/// graphs themselves decide: first their preorder depth profiles, then the
/// costs of the pairs against the costs of the mirrored pairs, then the same
/// over every equal-depth position pair in the band. Graphs that agree on all
/// of these look the same from either side and get the same pairs either way.
fn settle_mirror_tie<C>(
    forward: Vec<NodePair>,
    backward: Vec<NodePair>,
    a: &Preorder,
    b: &Preorder,
    cost_fn: &C,
    band: usize,
) -> Vec<NodePair>
where
    C: CostFunction + ?Sized,
{
    match mirror_key(&forward).cmp(&mirror_key(&backward)) {
        Ordering::Less => return forward,
        Ordering::Greater => return backward,
        Ordering::Equal if forward == backward => return forward,
        Ordering::Equal => {}
    }

    let (low, high) = if forward <= backward {
        (forward, backward)
    } else {
        (backward, forward)
    };

    let depths_a = (0..a.len()).map(|p| a.depth(p));
    let depths_b = (0..b.len()).map(|q| b.depth(q));
    let order = depths_a
        .cmp(depths_b)
        .then_with(|| {
            let straight = low.iter().map(|p| cost_fn.cost(p.a, p.b));
            let crossed = low.iter().map(|p| cost_fn.cost(p.b, p.a));
            straight.cmp(crossed)
        })
        .then_with(|| {
            let straight =
                band_positions(a, b, band).map(|(p, q)| cost_fn.cost(a.node(p), b.node(q)));
            let crossed =
                band_positions(a, b, band).map(|(p, q)| cost_fn.cost(a.node(q), b.node(p)));
            straight.cmp(crossed)
        });

    tracing::debug!(?order, pairs = low.len(), "settled a mirrored flat alignment tie");
    if order == Ordering::Greater {
        high
    } else {
        low
    }
}

/// Align the full preorder listings of two graphs
///
/// Returns the total cost (match costs plus `skip_cost` per unmatched node)
/// and the matched pairs in ascending order of the A node.
///
/// Swapping the graphs, with the cost function's arguments swapped to match,
/// gives the same cost and the mirrored pairs. The one exception is a pair of
/// graphs with the same shape where `cost(A[p], B[q]) == cost(A[q], B[p])` for
/// all preorder positions p and q; both calls then return the same pairs.
///
/// # Errors
///
/// Fails fast on an invalid [`MatchConfig`]; no partial result is produced.
///
/// # Example
///
/// ```
/// use execdiff::graph::Graph;
/// use execdiff::matcher::{match_graphs, MatchConfig};
///
/// # fn main() -> execdiff::error::Result<()> {
/// // a -> b -> c   versus   a -> b -> {d, c}
/// let a = Graph::from_children(vec![vec![1], vec![2], vec![]])?;
/// let b = Graph::from_children(vec![vec![1], vec![2, 3], vec![], vec![]])?;
/// let chars_a = ['a', 'b', 'c'];
/// let chars_b = ['a', 'b', 'd', 'c'];
/// let cost = |x: usize, y: usize| if chars_a[x] == chars_b[y] { 0 } else { 3 };
///
/// let result = match_graphs(&a, &b, &cost, &MatchConfig::with_skip_cost(2))?;
/// assert_eq!(result.total_cost, 2);
/// assert_eq!(result.pair_tuples(), vec![(0, 0), (1, 1), (2, 3)]);
/// # Ok(())
/// # }
/// ```
pub fn match_graphs<C>(
    graph_a: &Graph,
    graph_b: &Graph,
    cost_fn: &C,
    config: &MatchConfig,
) -> Result<MatchResult>
where
    C: CostFunction + ?Sized,
{
    config.validate()?;

    if graph_a.is_empty() || graph_b.is_empty() {
        let left = graph_a.len() + graph_b.len();
        return Ok(MatchResult::unmatched(cost::times(config.skip_cost, left)));
    }

    let a = Preorder::new(graph_a);
    let b = Preorder::new(graph_b);

    let forward = run_pass(&a, &b, cost_fn, config);
    let mut pairs = forward.pairs;
    let mut states = forward.states;

    if forward.mirror_tie && !forward.truncated {
        let swapped = |y: NodeId, x: NodeId| cost_fn.cost(x, y);
        let backward = run_pass(&b, &a, &swapped, config);
        states += backward.states;
        if !backward.truncated {
            pairs = settle_mirror_tie(
                pairs,
                mirrored(&backward.pairs),
                &a,
                &b,
                cost_fn,
                config.limits.distance_bound,
            );
        }
    }

    tracing::debug!(
        nodes_a = graph_a.len(),
        nodes_b = graph_b.len(),
        states,
        pairs = pairs.len(),
        total_cost = forward.total_cost,
        truncated = forward.truncated,
        "flat matching finished"
    );

    Ok(MatchResult {
        total_cost: forward.total_cost,
        pairs,
        truncated: forward.truncated,
    })
}
