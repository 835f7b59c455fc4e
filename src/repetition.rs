//! Repetition detection over sibling label sequences
//!
//! Execution traces are dominated by loops: a polling thread produces the same
//! handful of steps thousands of times. Before aligning two sibling sequences
//! the engine finds maximal runs of a fixed-size chunk repeated back to back,
//! one chunk size at a time, so the matcher can treat a whole loop as a single
//! unit.
//!
//! # Algorithm
//!
//! For chunk size `k`, scan `i` from `k` while `i + k <= len`. When the window
//! ending at `i` equals the window starting at `i`, a run begins at `i - k`.
//! Extend it one chunk at a time until the next window differs, record
//! `(start, count)` and resume the scan right after the run so overlapping
//! runs are never reported twice.
//!
//! ```text
//! labels   p  a  b  a  b  a  b  q
//! index    0  1  2  3  4  5  6  7
//! k = 2    .  [a  b][a  b][a  b] .    -> {1: 3}
//! ```
//!
//! Chunk size 1 is never scanned (ordinary 1:1 matching already handles it) and
//! an empty label never takes part in a repetition.
//!
//! # Example
//!
//! ```
//! use execdiff::repetition::find_repetitions;
//!
//! let labels = ["p", "a", "b", "a", "b", "a", "b", "q"];
//! let runs = find_repetitions(&labels, 2);
//!
//! assert_eq!(runs.len(), 1);
//! assert_eq!(runs.get(&1), Some(&3));
//! ```

use crate::error::{DiffError, Result};
use std::collections::BTreeMap;
use std::ops::RangeInclusive;

/// Smallest chunk size scanned by default
pub const DEFAULT_MIN_CHUNK: usize = 2;

/// Largest chunk size scanned by default
pub const DEFAULT_MAX_CHUNK: usize = 8;

/// Start index -> number of back-to-back copies, for one chunk size
pub type RepetitionMap = BTreeMap<usize, usize>;

/// `chunk_size` elements starting at `start_index`, repeated
/// `num_repetitions` times
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Repetition {
    pub start_index: usize,
    pub chunk_size: usize,
    pub num_repetitions: usize,
}

impl Repetition {
    /// Number of original elements covered by the run
    pub fn covered_len(&self) -> usize {
        self.chunk_size * self.num_repetitions
    }
}

fn windows_equal<L: AsRef<str>>(labels: &[L], a: usize, b: usize, k: usize) -> bool {
    (0..k).all(|offset| {
        let left = labels[a + offset].as_ref();
        !left.is_empty() && left == labels[b + offset].as_ref()
    })
}

/// Find maximal back-to-back runs of `chunk_size`-element chunks
///
/// Returns an empty map when `chunk_size < 2`.
pub fn find_repetitions<L: AsRef<str>>(labels: &[L], chunk_size: usize) -> RepetitionMap {
    let mut runs = RepetitionMap::new();
    let k = chunk_size;
    if k < 2 {
        return runs;
    }

    let len = labels.len();
    let mut i = k;
    while i + k <= len {
        if windows_equal(labels, i - k, i, k) {
            let start = i - k;
            let mut count = 2;
            while start + (count + 1) * k <= len
                && windows_equal(labels, start, start + count * k, k)
            {
                count += 1;
            }
            runs.insert(start, count);
            i = start + count * k;
        } else {
            i += 1;
        }
    }

    runs
}

/// Repetition maps for every chunk size in a range
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepetitionTable {
    min_chunk: usize,
    maps: Vec<RepetitionMap>,
}

impl RepetitionTable {
    /// Scan `labels` once per chunk size in `min_chunk..=max_chunk`
    ///
    /// # Errors
    ///
    /// Returns [`DiffError::InvalidChunkBounds`] unless `2 <= min_chunk <= max_chunk`.
    pub fn build<L: AsRef<str>>(labels: &[L], min_chunk: usize, max_chunk: usize) -> Result<Self> {
        validate_chunk_bounds(min_chunk, max_chunk)?;
        let maps = (min_chunk..=max_chunk)
            .map(|k| find_repetitions(labels, k))
            .collect();
        Ok(RepetitionTable { min_chunk, maps })
    }

    pub fn chunk_sizes(&self) -> RangeInclusive<usize> {
        self.min_chunk..=self.min_chunk + self.maps.len() - 1
    }

    /// Repetition count of the run of `chunk_size` starting at `start`, if any
    pub fn at(&self, chunk_size: usize, start: usize) -> Option<usize> {
        let slot = chunk_size.checked_sub(self.min_chunk)?;
        self.maps.get(slot)?.get(&start).copied()
    }

    /// Every recorded run, ordered by chunk size then start index
    pub fn repetitions(&self) -> impl Iterator<Item = Repetition> + '_ {
        self.maps.iter().enumerate().flat_map(move |(slot, map)| {
            map.iter().map(move |(&start_index, &num_repetitions)| Repetition {
                start_index,
                chunk_size: self.min_chunk + slot,
                num_repetitions,
            })
        })
    }
}

pub(crate) fn validate_chunk_bounds(min_chunk: usize, max_chunk: usize) -> Result<()> {
    if min_chunk < 2 || min_chunk > max_chunk {
        return Err(DiffError::InvalidChunkBounds {
            min: min_chunk,
            max: max_chunk,
        });
    }
    Ok(())
}
