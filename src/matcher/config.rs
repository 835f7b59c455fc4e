// Configuration for graph matching
//
// Every knob that trades result quality for time or memory is a named constant
// here. Hitting one of the limits never fails a call: the result is flagged
// `truncated` and may be suboptimal.

use crate::error::{DiffError, Result};
use crate::repetition::{validate_chunk_bounds, DEFAULT_MAX_CHUNK, DEFAULT_MIN_CHUNK};
use serde::{Deserialize, Serialize};

/// Default band on `|pos_a - pos_b|` explored by the alignment DP
pub const DEFAULT_DISTANCE_BOUND: usize = 6000;

/// Default cap on memoized DP states per matching call
pub const DEFAULT_MAX_DP_STATES: usize = 20_000_000;

/// Default number of tree levels the hierarchical matcher descends
pub const DEFAULT_MAX_NESTING_DEPTH: usize = 256;

/// Resource limits for one matching call
///
/// - `distance_bound`: states further than this from the diagonal are resolved
///   by skipping everything that remains. The hierarchical gap DP widens the
///   band by the length difference of the two gaps.
/// - `max_dp_states`: once this many states are memoized, new states are
///   resolved the same way.
/// - `max_nesting_depth`: children below this many levels are left unmatched
///   and charged skip cost (hierarchical matcher only).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchLimits {
    pub distance_bound: usize,
    pub max_dp_states: usize,
    pub max_nesting_depth: usize,
}

impl Default for MatchLimits {
    fn default() -> Self {
        Self {
            distance_bound: DEFAULT_DISTANCE_BOUND,
            max_dp_states: DEFAULT_MAX_DP_STATES,
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
        }
    }
}

impl MatchLimits {
    /// No distance band, a larger state budget
    ///
    /// Use for small graphs when an exact alignment matters more than time.
    pub fn exhaustive() -> Self {
        Self {
            distance_bound: usize::MAX,
            max_dp_states: 200_000_000,
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_dp_states == 0 {
            return Err(DiffError::InvalidLimit(
                "max_dp_states must be positive".to_string(),
            ));
        }
        if self.max_nesting_depth == 0 {
            return Err(DiffError::InvalidLimit(
                "max_nesting_depth must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration shared by the flat and hierarchical matchers
///
/// # Example
/// ```
/// use execdiff::matcher::MatchConfig;
///
/// let config = MatchConfig::with_skip_cost(2);
/// assert_eq!(config.skip_cost, 2);
/// assert_eq!(config.min_chunk, 2);
/// assert_eq!(config.max_chunk, 8);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Cost charged per node left unmatched
    pub skip_cost: u64,

    /// Cost charged per node of loop iterations present on one side only
    pub repeat_skip_cost: u64,

    /// Smallest repeated chunk detected (hierarchical matcher)
    pub min_chunk: usize,

    /// Largest repeated chunk detected (hierarchical matcher)
    pub max_chunk: usize,

    pub limits: MatchLimits,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            skip_cost: 1,
            repeat_skip_cost: 1,
            min_chunk: DEFAULT_MIN_CHUNK,
            max_chunk: DEFAULT_MAX_CHUNK,
            limits: MatchLimits::default(),
        }
    }
}

impl MatchConfig {
    pub fn with_skip_cost(skip_cost: u64) -> Self {
        Self {
            skip_cost,
            ..Self::default()
        }
    }

    /// Default costs with [`MatchLimits::exhaustive`]
    pub fn exhaustive() -> Self {
        Self {
            limits: MatchLimits::exhaustive(),
            ..Self::default()
        }
    }

    /// Reject configurations the matchers cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.skip_cost == 0 {
            return Err(DiffError::NonPositiveSkipCost);
        }
        validate_chunk_bounds(self.min_chunk, self.max_chunk)?;
        self.limits.validate()
    }
}
