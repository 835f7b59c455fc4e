//! Per-step properties
//!
//! Trace recorders attach arbitrary fields to a step (pid, return value, file
//! name, nested argument structs). They are kept as a plain tagged union that
//! deserializes directly from JSON values:
//!
//! ```text
//! null -> Null    true -> Bool    -3 -> Int    2^63 -> Uint    1.5 -> Float
//! "x"  -> Str     [..] -> Array   {..} -> Map
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::hash::Hasher;

/// Properties of one step, ordered by key
pub type PropertyMap = BTreeMap<String, PropertyValue>;

/// A single property value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Str(String),
    Array(Vec<PropertyValue>),
    Map(BTreeMap<String, PropertyValue>),
}

impl PropertyValue {
    pub fn is_null(&self) -> bool {
        matches!(self, PropertyValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            PropertyValue::Int(v) => Some(v),
            PropertyValue::Uint(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }

    /// Feed a type-tagged encoding of the value into `state`
    ///
    /// Floats are hashed by bit pattern, so `0.0` and `-0.0` differ.
    pub fn feed<H: Hasher>(&self, state: &mut H) {
        match self {
            PropertyValue::Null => state.write_u8(0),
            PropertyValue::Bool(v) => {
                state.write_u8(1);
                state.write_u8(u8::from(*v));
            }
            PropertyValue::Int(v) => {
                state.write_u8(2);
                state.write_i64(*v);
            }
            PropertyValue::Uint(v) => {
                state.write_u8(3);
                state.write_u64(*v);
            }
            PropertyValue::Float(v) => {
                state.write_u8(4);
                state.write_u64(v.to_bits());
            }
            PropertyValue::Str(v) => {
                state.write_u8(5);
                state.write_usize(v.len());
                state.write(v.as_bytes());
            }
            PropertyValue::Array(items) => {
                state.write_u8(6);
                state.write_usize(items.len());
                for item in items {
                    item.feed(state);
                }
            }
            PropertyValue::Map(entries) => {
                state.write_u8(7);
                state.write_usize(entries.len());
                for (key, value) in entries {
                    state.write_usize(key.len());
                    state.write(key.as_bytes());
                    value.feed(state);
                }
            }
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Null => write!(f, "null"),
            PropertyValue::Bool(v) => write!(f, "{v}"),
            PropertyValue::Int(v) => write!(f, "{v}"),
            PropertyValue::Uint(v) => write!(f, "{v}"),
            PropertyValue::Float(v) => write!(f, "{v}"),
            PropertyValue::Str(v) => write!(f, "{v:?}"),
            PropertyValue::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            PropertyValue::Map(entries) => {
                write!(f, "{{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        PropertyValue::Bool(v)
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        PropertyValue::Int(v)
    }
}

impl From<u64> for PropertyValue {
    fn from(v: u64) -> Self {
        PropertyValue::Uint(v)
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        PropertyValue::Float(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        PropertyValue::Str(v.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        PropertyValue::Str(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fnv::FnvHasher;

    fn digest(value: &PropertyValue) -> u64 {
        let mut hasher = FnvHasher::default();
        value.feed(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_deserialize_scalars() {
        let map: PropertyMap = serde_json::from_str(
            r#"{"pid": 42, "ret": -1, "big": 18446744073709551615, "ratio": 0.5,
                "path": "/tmp/x", "ok": true, "none": null}"#,
        )
        .unwrap();

        assert_eq!(map["pid"], PropertyValue::Int(42));
        assert_eq!(map["ret"], PropertyValue::Int(-1));
        assert_eq!(map["big"], PropertyValue::Uint(u64::MAX));
        assert_eq!(map["ratio"], PropertyValue::Float(0.5));
        assert_eq!(map["path"].as_str(), Some("/tmp/x"));
        assert_eq!(map["ok"], PropertyValue::Bool(true));
        assert!(map["none"].is_null());
    }

    #[test]
    fn test_deserialize_nested() {
        let value: PropertyValue =
            serde_json::from_str(r#"{"args": [1, "two", {"three": 3}]}"#).unwrap();
        let PropertyValue::Map(entries) = value else {
            panic!("expected a map");
        };
        let PropertyValue::Array(items) = &entries["args"] else {
            panic!("expected an array");
        };
        assert_eq!(items.len(), 3);
        assert_eq!(items[1], PropertyValue::from("two"));
    }

    #[test]
    fn test_display() {
        let value = PropertyValue::Array(vec![
            PropertyValue::Int(1),
            PropertyValue::from("a"),
            PropertyValue::Null,
        ]);
        assert_eq!(value.to_string(), r#"[1, "a", null]"#);
    }

    #[test]
    fn test_feed_distinguishes_types() {
        assert_ne!(
            digest(&PropertyValue::Int(1)),
            digest(&PropertyValue::Uint(1))
        );
        assert_ne!(
            digest(&PropertyValue::from("1")),
            digest(&PropertyValue::Int(1))
        );
        assert_eq!(
            digest(&PropertyValue::from("same")),
            digest(&PropertyValue::from("same"))
        );
    }

    #[test]
    fn test_as_i64() {
        assert_eq!(PropertyValue::Uint(7).as_i64(), Some(7));
        assert_eq!(PropertyValue::Uint(u64::MAX).as_i64(), None);
        assert_eq!(PropertyValue::Bool(true).as_i64(), None);
    }
}
