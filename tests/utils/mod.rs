// Shared helpers for integration tests: step trace documents on disk

#![allow(dead_code)]

use execdiff::step_trace::TraceEvent;
use std::fs;
use std::path::{Path, PathBuf};

/// `main` with one leaf step per name
pub fn flat_run(names: &[&str]) -> Vec<TraceEvent> {
    let mut events = vec![TraceEvent::enter("main")];
    for name in names {
        events.push(TraceEvent::enter(name));
        events.push(TraceEvent::Leave);
    }
    events.push(TraceEvent::Leave);
    events
}

/// `main -> {setup, (poll -> {check, sleep}) x iterations, teardown}`
pub fn polling_run(iterations: usize) -> Vec<TraceEvent> {
    let mut events = vec![
        TraceEvent::enter("main"),
        TraceEvent::enter("setup"),
        TraceEvent::Leave,
    ];
    for _ in 0..iterations {
        events.push(TraceEvent::enter("poll"));
        events.push(TraceEvent::enter("check"));
        events.push(TraceEvent::Leave);
        events.push(TraceEvent::enter("sleep"));
        events.push(TraceEvent::Leave);
        events.push(TraceEvent::Leave);
    }
    events.push(TraceEvent::enter("teardown"));
    events.push(TraceEvent::Leave);
    events.push(TraceEvent::Leave);
    events
}

/// Write events as a `{"events": [...]}` document
pub fn write_json(dir: &Path, file: &str, events: &[TraceEvent]) -> PathBuf {
    let path = dir.join(file);
    let document = serde_json::json!({ "events": events });
    fs::write(&path, serde_json::to_string(&document).unwrap()).unwrap();
    path
}

/// Write events one per line
pub fn write_ndjson(dir: &Path, file: &str, events: &[TraceEvent]) -> PathBuf {
    let path = dir.join(file);
    let lines: Vec<String> = events
        .iter()
        .map(|event| serde_json::to_string(event).unwrap())
        .collect();
    fs::write(&path, lines.join("\n")).unwrap();
    path
}
