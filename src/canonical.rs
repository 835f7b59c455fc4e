//! Canonical (loop-compressed) form of a sibling sequence
//!
//! The per-chunk-size repetition maps overlap: `abababab` is four copies of
//! `ab` and also two copies of `abab`. The canonicalizer walks the sequence
//! once and, at every position, keeps the option that covers the most original
//! elements. Ties go to the smaller chunk size because sizes are scanned in
//! ascending order and only a strict improvement replaces the current best.
//!
//! ```text
//! labels     s  a  b  c  a  b  c  a  b  c  t
//! canonical  L  [abc x3             ]     L
//!            pos 0, chunk 0            (literal)
//!            pos 1, chunk 3, reps 3
//!            pos 10, chunk 0           (literal)
//! ```
//!
//! The emitted units partition `0..len` exactly once: the sum of their covered
//! lengths equals the sequence length.

use crate::error::Result;
use crate::repetition::RepetitionTable;

/// One unit of a canonical sequence
///
/// `pos` indexes the original sequence. `chunk_size == 0` marks a literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanonicalNode {
    pub pos: usize,
    pub chunk_size: usize,
    pub num_repetitions: usize,
}

impl CanonicalNode {
    pub fn literal(pos: usize) -> Self {
        CanonicalNode {
            pos,
            chunk_size: 0,
            num_repetitions: 1,
        }
    }

    pub fn is_literal(&self) -> bool {
        self.chunk_size == 0
    }

    /// Number of original elements this unit stands for
    pub fn covered_len(&self) -> usize {
        if self.is_literal() {
            1
        } else {
            self.chunk_size * self.num_repetitions
        }
    }

    /// One past the last original index covered
    pub fn end(&self) -> usize {
        self.pos + self.covered_len()
    }
}

/// Merge a repetition table for a sequence of `len` elements into canonical units
pub fn canonicalize(table: &RepetitionTable, len: usize) -> Vec<CanonicalNode> {
    let mut units = Vec::new();
    let mut i = 0;

    while i < len {
        let mut best: Option<CanonicalNode> = None;
        for chunk_size in table.chunk_sizes() {
            if let Some(num_repetitions) = table.at(chunk_size, i) {
                let candidate = CanonicalNode {
                    pos: i,
                    chunk_size,
                    num_repetitions,
                };
                let better = match best {
                    Some(current) => candidate.covered_len() > current.covered_len(),
                    None => true,
                };
                if better {
                    best = Some(candidate);
                }
            }
        }

        let unit = best.unwrap_or_else(|| CanonicalNode::literal(i));
        i += unit.covered_len();
        units.push(unit);
    }

    units
}

/// Detect repetitions and canonicalize in one step
pub fn canonicalize_labels<L: AsRef<str>>(
    labels: &[L],
    min_chunk: usize,
    max_chunk: usize,
) -> Result<Vec<CanonicalNode>> {
    let table = RepetitionTable::build(labels, min_chunk, max_chunk)?;
    Ok(canonicalize(&table, labels.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chars(s: &str) -> Vec<String> {
        s.chars().map(|c| c.to_string()).collect()
    }

    fn canon(s: &str) -> Vec<CanonicalNode> {
        canonicalize_labels(&chars(s), 2, 8).unwrap()
    }

    fn rep(pos: usize, chunk_size: usize, num_repetitions: usize) -> CanonicalNode {
        CanonicalNode {
            pos,
            chunk_size,
            num_repetitions,
        }
    }

    #[test]
    fn test_all_literals() {
        assert_eq!(
            canon("abc"),
            vec![
                CanonicalNode::literal(0),
                CanonicalNode::literal(1),
                CanonicalNode::literal(2)
            ]
        );
    }

    #[test]
    fn test_loop_between_literals() {
        assert_eq!(
            canon("sabcabcabct"),
            vec![CanonicalNode::literal(0), rep(1, 3, 3), CanonicalNode::literal(10)]
        );
    }

    #[test]
    fn test_tie_prefers_smaller_chunk() {
        // 4 x "ab" and 2 x "abab" both cover 8 elements
        assert_eq!(canon("abababab"), vec![rep(0, 2, 4)]);
    }

    #[test]
    fn test_larger_coverage_wins() {
        // chunk 2 "ab" x2 covers 4 elements, chunk 5 "ababc" x2 covers all 10
        assert_eq!(canon("ababcababc"), vec![rep(0, 5, 2)]);
        assert_eq!(canon("aabaabaab"), vec![rep(0, 3, 3)]);
    }

    #[test]
    fn test_partition_covers_every_index_once() {
        let labels = chars("xxyxyxyzzzqzqzq");
        let units = canonicalize_labels(&labels, 2, 8).unwrap();
        let mut next = 0;
        for unit in &units {
            assert_eq!(unit.pos, next);
            next = unit.end();
        }
        assert_eq!(next, labels.len());
    }

    #[test]
    fn test_empty_sequence() {
        assert!(canon("").is_empty());
    }

    #[test]
    fn test_rejects_bad_bounds() {
        assert!(canonicalize_labels(&chars("ab"), 0, 8).is_err());
    }
}
