//! Step trace files
//!
//! A step trace is the flat list of enter/leave events a recorder produced for
//! one execution. Flat events keep the file format independent of tree depth:
//!
//! ```json
//! {"events": [
//!   {"type": "enter", "name": "main"},
//!   {"type": "enter", "name": "open", "properties": {"path": "/etc/hosts"}},
//!   {"type": "leave"},
//!   {"type": "leave"}
//! ]}
//! ```
//!
//! The same events may also be stored one per line (`.ndjson` / `.jsonl`).
//! Loading replays the events through a
//! [`StepTreeBuilder`](crate::builder::StepTreeBuilder).

use crate::builder::StepTreeBuilder;
use crate::error::Result;
use crate::graph::{Graph, NodeId};
use crate::intern::{Interner, Quark};
use crate::property::PropertyMap;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// One recorded event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TraceEvent {
    Enter {
        name: String,
        #[serde(default, skip_serializing_if = "PropertyMap::is_empty")]
        properties: PropertyMap,
    },
    Leave,
}

impl TraceEvent {
    pub fn enter(name: &str) -> Self {
        TraceEvent::Enter {
            name: name.to_string(),
            properties: PropertyMap::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TraceDocument {
    events: Vec<TraceEvent>,
}

/// A loaded execution: step tree, per-node names and properties, and the
/// interner the names were issued by
#[derive(Debug, Clone)]
pub struct StepTrace {
    pub graph: Graph,
    pub names: Vec<Quark>,
    pub properties: Vec<PropertyMap>,
    pub interner: Interner,
}

impl StepTrace {
    /// Replay events into a new trace with its own interner
    pub fn from_events<I>(events: I) -> Result<Self>
    where
        I: IntoIterator<Item = TraceEvent>,
    {
        let mut interner = Interner::new();
        let mut builder = StepTreeBuilder::new(&mut interner);

        for event in events {
            match event {
                TraceEvent::Enter { name, properties } => {
                    builder.enter(&name)?;
                    for (key, value) in properties {
                        builder.set_property(&key, value)?;
                    }
                }
                TraceEvent::Leave => {
                    builder.leave()?;
                }
            }
        }

        let tree = builder.finish()?;
        Ok(StepTrace {
            graph: tree.graph,
            names: tree.names,
            properties: tree.properties,
            interner,
        })
    }

    /// Parse a `{"events": [...]}` document
    pub fn from_json_str(content: &str) -> anyhow::Result<Self> {
        let document: TraceDocument =
            serde_json::from_str(content).context("Failed to parse step trace JSON")?;
        Ok(Self::from_events(document.events)?)
    }

    /// Parse one event per line; blank lines are ignored
    pub fn from_ndjson_str(content: &str) -> anyhow::Result<Self> {
        let mut events = Vec::new();
        for (number, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let event: TraceEvent = serde_json::from_str(line)
                .with_context(|| format!("Failed to parse event on line {}", number + 1))?;
            events.push(event);
        }
        Ok(Self::from_events(events)?)
    }

    /// Load a trace file, choosing the format by extension
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let line_delimited = matches!(
            path.extension().and_then(|ext| ext.to_str()),
            Some("ndjson" | "jsonl")
        );
        let trace = if line_delimited {
            Self::from_ndjson_str(&content)
        } else {
            Self::from_json_str(&content)
        };
        let trace = trace.with_context(|| format!("Invalid step trace {}", path.display()))?;

        tracing::debug!(
            path = %path.display(),
            steps = trace.len(),
            distinct_names = trace.interner.len(),
            "loaded step trace"
        );
        Ok(trace)
    }

    pub fn len(&self) -> usize {
        self.graph.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }

    /// Step name of a node
    pub fn name(&self, node: NodeId) -> &str {
        self.interner.resolve(self.names[node]).unwrap_or_default()
    }

    pub fn properties(&self, node: NodeId) -> &PropertyMap {
        &self.properties[node]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DiffError;
    use crate::property::PropertyValue;

    const SAMPLE: &str = r#"{"events": [
        {"type": "enter", "name": "main"},
        {"type": "enter", "name": "open", "properties": {"path": "/etc/hosts", "ret": 3}},
        {"type": "leave"},
        {"type": "enter", "name": "close"},
        {"type": "leave"},
        {"type": "leave"}
    ]}"#;

    #[test]
    fn test_from_json_str() {
        let trace = StepTrace::from_json_str(SAMPLE).unwrap();
        assert_eq!(trace.len(), 3);
        assert_eq!(trace.name(0), "main");
        assert_eq!(trace.name(1), "open");
        assert_eq!(trace.graph.children(0), &[1, 2]);
        assert_eq!(trace.properties(1)["ret"], PropertyValue::Int(3));
        assert!(trace.properties(2).is_empty());
    }

    #[test]
    fn test_from_ndjson_str() {
        let content = "{\"type\":\"enter\",\"name\":\"a\"}\n\n{\"type\":\"leave\"}\n{\"type\":\"enter\",\"name\":\"b\"}\n{\"type\":\"leave\"}\n";
        let trace = StepTrace::from_ndjson_str(content).unwrap();
        assert_eq!(trace.graph.roots(), vec![0, 1]);
        assert_eq!(trace.name(1), "b");
    }

    #[test]
    fn test_ndjson_error_names_line() {
        let content = "{\"type\":\"enter\",\"name\":\"a\"}\nnot json\n";
        let err = StepTrace::from_ndjson_str(content).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_unbalanced_events() {
        let err = StepTrace::from_events(vec![TraceEvent::enter("main")]).unwrap_err();
        assert!(matches!(err, DiffError::UnbalancedTrace(_)));

        let err = StepTrace::from_events(vec![TraceEvent::Leave]).unwrap_err();
        assert!(matches!(err, DiffError::UnbalancedTrace(_)));
    }

    #[test]
    fn test_unknown_event_type_rejected() {
        assert!(StepTrace::from_json_str(r#"{"events": [{"type": "jump"}]}"#).is_err());
    }

    #[test]
    fn test_empty_trace() {
        let trace = StepTrace::from_json_str(r#"{"events": []}"#).unwrap();
        assert!(trace.is_empty());
    }

    #[test]
    fn test_event_serialization_omits_empty_properties() {
        let json = serde_json::to_string(&TraceEvent::enter("poll")).unwrap();
        assert_eq!(json, r#"{"type":"enter","name":"poll"}"#);
    }

    #[test]
    fn test_from_file_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let json_path = dir.path().join("run.json");
        fs::write(&json_path, SAMPLE).unwrap();
        assert_eq!(StepTrace::from_file(&json_path).unwrap().len(), 3);

        let ndjson_path = dir.path().join("run.ndjson");
        fs::write(
            &ndjson_path,
            "{\"type\":\"enter\",\"name\":\"x\"}\n{\"type\":\"leave\"}\n",
        )
        .unwrap();
        assert_eq!(StepTrace::from_file(&ndjson_path).unwrap().len(), 1);

        assert!(StepTrace::from_file(dir.path().join("missing.json")).is_err());
    }
}
