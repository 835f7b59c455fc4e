//! Caller-owned string interning
//!
//! Step names repeat heavily in execution traces (the same handful of
//! functions per loop iteration). An [`Interner`] maps each distinct string to
//! a small [`Quark`] once; graphs and cost models then compare quarks instead
//! of strings. There is no process-wide table: whoever builds a trace owns its
//! interner and passes it by reference.
//!
//! ```
//! use execdiff::intern::Interner;
//!
//! let mut interner = Interner::new();
//! let read = interner.intern("read");
//! assert_eq!(interner.intern("read"), read);
//! assert_eq!(interner.resolve(read), Some("read"));
//! assert_eq!(interner.len(), 1);
//! ```

use fnv::FnvHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Handle to an interned string, valid for the interner that issued it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Quark(u32);

impl Quark {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Quark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Interner {
    strings: Vec<String>,
    lookup: FnvHashMap<String, Quark>,
}

impl Interner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Quark for `value`, allocating one on first sight
    pub fn intern(&mut self, value: &str) -> Quark {
        if let Some(&quark) = self.lookup.get(value) {
            return quark;
        }
        let quark = Quark(self.strings.len() as u32);
        self.strings.push(value.to_string());
        self.lookup.insert(value.to_string(), quark);
        quark
    }

    /// Quark for `value` if it was interned before
    pub fn get(&self, value: &str) -> Option<Quark> {
        self.lookup.get(value).copied()
    }

    pub fn resolve(&self, quark: Quark) -> Option<&str> {
        self.strings.get(quark.index()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}
