//! Trace comparison driver
//!
//! Ties the pieces together for two loaded [`StepTrace`]s:
//!
//! ```text
//! StepTrace A ─┐                      ┌─ flat          ─┐
//!              ├─ StepCostModel ──────┤                 ├─ DiffReport
//! StepTrace B ─┘  (cost + labels)     └─ hierarchical  ─┘
//! ```
//!
//! Each comparison is independent: it owns its memo tables and shares nothing
//! mutable with other comparisons. [`compare_many`] therefore runs a batch of
//! comparisons on a pool of worker threads, one comparison per worker at a
//! time. Workers get a large stack because the hierarchical matcher recurses
//! once per tree level.

use crate::config::DiffConfig;
use crate::cost::Side;
use crate::graph::NodeId;
use crate::matcher::{match_graphs, match_graphs_hierarchical, NodePair};
use crate::step_model::StepCostModel;
use crate::step_trace::StepTrace;
use anyhow::{anyhow, Result};
use clap::ValueEnum;
use crossbeam::channel;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::thread;

/// Stack size of comparison worker threads
pub const WORKER_STACK_SIZE: usize = 64 * 1024 * 1024;

/// Matcher used for a comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Align full preorder listings
    Flat,
    /// Align level by level with anchors and loop collapsing
    #[default]
    Hierarchical,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Flat => write!(f, "flat"),
            Strategy::Hierarchical => write!(f, "hierarchical"),
        }
    }
}

/// Result of comparing two traces
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffReport {
    pub strategy: Strategy,
    pub total_cost: u64,
    pub nodes_a: usize,
    pub nodes_b: usize,
    /// A resource limit fired; the alignment may be suboptimal
    pub truncated: bool,
    /// Matched steps in ascending order of the A step
    pub pairs: Vec<NodePair>,
}

impl DiffReport {
    pub fn matched_count(&self) -> usize {
        self.pairs.len()
    }

    /// Steps of A without a counterpart in B
    pub fn unmatched_a(&self) -> Vec<NodeId> {
        self.unmatched(Side::A)
    }

    /// Steps of B without a counterpart in A
    pub fn unmatched_b(&self) -> Vec<NodeId> {
        self.unmatched(Side::B)
    }

    fn unmatched(&self, side: Side) -> Vec<NodeId> {
        let len = match side {
            Side::A => self.nodes_a,
            Side::B => self.nodes_b,
        };
        let mut matched = vec![false; len];
        for pair in &self.pairs {
            let node = match side {
                Side::A => pair.a,
                Side::B => pair.b,
            };
            matched[node] = true;
        }
        (0..len).filter(|&node| !matched[node]).collect()
    }

    /// Share of steps that found a counterpart, in `[0, 1]`
    ///
    /// Two empty traces are identical.
    pub fn similarity(&self) -> f64 {
        let total = self.nodes_a + self.nodes_b;
        if total == 0 {
            return 1.0;
        }
        (2 * self.matched_count()) as f64 / total as f64
    }
}

/// Compare two traces on the calling thread
pub fn diff_traces(a: &StepTrace, b: &StepTrace, config: &DiffConfig) -> Result<DiffReport> {
    let matching = config.match_config();
    let model = StepCostModel::new(a, b, config.mismatch_cost, config.property_filter()?);

    tracing::info!(
        strategy = %config.strategy,
        steps_a = a.len(),
        steps_b = b.len(),
        "comparing traces"
    );

    let result = match config.strategy {
        Strategy::Flat => match_graphs(&a.graph, &b.graph, &model, &matching)?,
        Strategy::Hierarchical => {
            match_graphs_hierarchical(&a.graph, &b.graph, &model, &model, &matching)?
        }
    };

    if result.truncated {
        tracing::warn!("comparison hit a resource limit; the diff is best-effort");
    }

    Ok(DiffReport {
        strategy: config.strategy,
        total_cost: result.total_cost,
        nodes_a: a.len(),
        nodes_b: b.len(),
        truncated: result.truncated,
        pairs: result.pairs,
    })
}

/// Compare two traces on a worker thread with a large stack
pub fn compare_traces(a: &StepTrace, b: &StepTrace, config: &DiffConfig) -> Result<DiffReport> {
    let mut reports = compare_many(&[(a, b)], config, 1);
    reports
        .pop()
        .unwrap_or_else(|| Err(anyhow!("comparison produced no report")))
}

/// Compare independent trace pairs on up to `workers` threads
///
/// Reports come back in input order. `workers == 0` uses the available
/// parallelism.
pub fn compare_many(
    jobs: &[(&StepTrace, &StepTrace)],
    config: &DiffConfig,
    workers: usize,
) -> Vec<Result<DiffReport>> {
    let workers = match workers {
        0 => thread::available_parallelism().map_or(1, |n| n.get()),
        n => n,
    }
    .min(jobs.len())
    .max(1);

    let (job_tx, job_rx) = channel::unbounded::<usize>();
    let (report_tx, report_rx) = channel::unbounded::<(usize, Result<DiffReport>)>();
    for index in 0..jobs.len() {
        // the receiver is alive until the scope ends
        let _ = job_tx.send(index);
    }
    drop(job_tx);

    let outcome = crossbeam::scope(|scope| {
        for worker in 0..workers {
            let job_rx = job_rx.clone();
            let report_tx = report_tx.clone();
            let spawned = scope
                .builder()
                .name(format!("execdiff-worker-{worker}"))
                .stack_size(WORKER_STACK_SIZE)
                .spawn(move |_| {
                    for index in job_rx.iter() {
                        let (a, b) = jobs[index];
                        let report = diff_traces(a, b, config);
                        if report_tx.send((index, report)).is_err() {
                            break;
                        }
                    }
                });
            if let Err(err) = spawned {
                tracing::warn!(worker, error = %err, "failed to spawn comparison worker");
            }
        }
    });
    drop(report_tx);

    let mut reports: Vec<Option<Result<DiffReport>>> = (0..jobs.len()).map(|_| None).collect();
    for (index, report) in report_rx.iter() {
        reports[index] = Some(report);
    }

    let panicked = outcome.is_err();
    reports
        .into_iter()
        .map(|slot| {
            slot.unwrap_or_else(|| {
                Err(if panicked {
                    anyhow!("comparison worker panicked")
                } else {
                    anyhow!("no comparison worker could be started")
                })
            })
        })
        .collect()
}
