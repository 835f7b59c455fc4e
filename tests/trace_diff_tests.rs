//! End-to-end trace comparisons: loading, cost model, both strategies

mod utils;

use execdiff::config::DiffConfig;
use execdiff::diff::{compare_many, compare_traces, diff_traces, Strategy};
use execdiff::property::{PropertyMap, PropertyValue};
use execdiff::step_trace::{StepTrace, TraceEvent};
use utils::{polling_run, write_json, write_ndjson};

fn with_strategy(strategy: Strategy) -> DiffConfig {
    DiffConfig {
        strategy,
        ..DiffConfig::default()
    }
}

fn enter_with(name: &str, props: &[(&str, i64)]) -> TraceEvent {
    let properties: PropertyMap = props
        .iter()
        .map(|(key, value)| (key.to_string(), PropertyValue::Int(*value)))
        .collect();
    TraceEvent::Enter {
        name: name.to_string(),
        properties,
    }
}

/// `main -> {poll{ts}, ...}` with one timestamp per poll
fn timestamped_polls(timestamps: &[i64]) -> StepTrace {
    let mut events = vec![TraceEvent::enter("main")];
    for &ts in timestamps {
        events.push(enter_with("poll", &[("ts", ts), ("ret", 0)]));
        events.push(TraceEvent::Leave);
    }
    events.push(TraceEvent::Leave);
    StepTrace::from_events(events).unwrap()
}

fn deep_chain(depth: usize) -> StepTrace {
    let mut events = Vec::with_capacity(depth * 2);
    for level in 0..depth {
        events.push(TraceEvent::enter(if level % 2 == 0 { "call" } else { "ret" }));
    }
    events.extend(std::iter::repeat(TraceEvent::Leave).take(depth));
    StepTrace::from_events(events).unwrap()
}

#[test]
fn test_polling_runs_both_strategies() {
    let a = StepTrace::from_events(polling_run(5)).unwrap();
    let b = StepTrace::from_events(polling_run(3)).unwrap();
    assert_eq!(a.len(), 18);
    assert_eq!(b.len(), 12);

    for strategy in [Strategy::Flat, Strategy::Hierarchical] {
        let report = compare_traces(&a, &b, &with_strategy(strategy)).unwrap();
        assert_eq!(report.total_cost, 6, "{strategy}");
        assert_eq!(report.matched_count(), 12, "{strategy}");
        assert_eq!(report.unmatched_a().len(), 6, "{strategy}");
        assert!(report.unmatched_b().is_empty(), "{strategy}");
        assert!(!report.truncated, "{strategy}");
    }
}

#[test]
fn test_property_mismatch_costs_less_than_skipping() {
    let a = StepTrace::from_events(vec![
        TraceEvent::enter("main"),
        enter_with("read", &[("fd", 3)]),
        TraceEvent::Leave,
        TraceEvent::Leave,
    ])
    .unwrap();
    let b = StepTrace::from_events(vec![
        TraceEvent::enter("main"),
        enter_with("read", &[("fd", 4)]),
        TraceEvent::Leave,
        TraceEvent::Leave,
    ])
    .unwrap();

    for strategy in [Strategy::Flat, Strategy::Hierarchical] {
        let report = diff_traces(&a, &b, &with_strategy(strategy)).unwrap();
        assert_eq!(report.total_cost, 1, "{strategy}");
        assert_eq!(report.matched_count(), 2, "{strategy}");
    }
}

#[test]
fn test_ignored_timestamps() {
    let a = timestamped_polls(&[10, 20, 30]);
    let b = timestamped_polls(&[110, 120, 130]);

    let strict = diff_traces(&a, &b, &DiffConfig::default()).unwrap();
    assert_eq!(strict.total_cost, 3);

    let relaxed_config = DiffConfig {
        ignore_properties: vec!["^ts$".to_string()],
        ..DiffConfig::default()
    };
    let relaxed = diff_traces(&a, &b, &relaxed_config).unwrap();
    assert_eq!(relaxed.total_cost, 0);
    assert_eq!(relaxed.matched_count(), 4);
}

#[test]
fn test_json_and_ndjson_load_the_same_trace() {
    let dir = tempfile::tempdir().unwrap();
    let events = polling_run(4);
    let json = StepTrace::from_file(write_json(dir.path(), "run.json", &events)).unwrap();
    let ndjson = StepTrace::from_file(write_ndjson(dir.path(), "run.jsonl", &events)).unwrap();

    assert_eq!(json.len(), ndjson.len());
    let report = compare_traces(&json, &ndjson, &DiffConfig::default()).unwrap();
    assert_eq!(report.total_cost, 0);
    assert_eq!(report.similarity(), 1.0);
}

#[test]
fn test_compare_many_default_workers() {
    let base = StepTrace::from_events(polling_run(4)).unwrap();
    let variants: Vec<StepTrace> = (1..=4)
        .map(|iterations| StepTrace::from_events(polling_run(iterations)).unwrap())
        .collect();
    let jobs: Vec<(&StepTrace, &StepTrace)> = variants.iter().map(|v| (&base, v)).collect();

    let reports = compare_many(&jobs, &DiffConfig::default(), 0);
    let costs: Vec<u64> = reports
        .into_iter()
        .map(|report| report.unwrap().total_cost)
        .collect();
    assert_eq!(costs, vec![9, 6, 3, 0]);
}

#[test]
fn test_deep_chain_flat() {
    let a = deep_chain(20_000);
    let report = compare_traces(&a, &a, &with_strategy(Strategy::Flat)).unwrap();
    assert_eq!(report.total_cost, 0);
    assert_eq!(report.matched_count(), 20_000);
    assert!(!report.truncated);
}

#[test]
fn test_deep_chain_hierarchical_hits_nesting_cap() {
    let a = deep_chain(5_000);
    let report = compare_traces(&a, &a, &DiffConfig::default()).unwrap();
    assert!(report.truncated);
    assert!(report.matched_count() < 5_000);
    assert_eq!(
        report.total_cost,
        (2 * (5_000 - report.matched_count())) as u64
    );
}

#[test]
fn test_empty_trace_against_run() {
    let empty = StepTrace::from_events(Vec::new()).unwrap();
    let run = StepTrace::from_events(polling_run(2)).unwrap();

    for strategy in [Strategy::Flat, Strategy::Hierarchical] {
        let report = diff_traces(&empty, &run, &with_strategy(strategy)).unwrap();
        assert_eq!(report.total_cost, run.len() as u64, "{strategy}");
        assert!(report.pairs.is_empty());
        assert_eq!(report.similarity(), 0.0);
    }
}
