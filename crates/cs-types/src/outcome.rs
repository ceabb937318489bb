//! Per-trial and per-combination results.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::params::Combination;

/// Outcome of one solver invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrialResult {
    /// The solver converged after this many generations.
    Converged(u64),
    /// The solver failed, timed out, or hit the generation cap.
    Sentinel,
}

impl TrialResult {
    /// Numeric value of the trial, with the sentinel standing for `generation_max`.
    pub fn generations(&self, generation_max: u64) -> u64 {
        match self {
            Self::Converged(g) => *g,
            Self::Sentinel => generation_max,
        }
    }
}

/// Reduced result of all trials run for one combination.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Aggregate {
    /// Mean over every trial that ran.
    Mean(f64),
    /// Early stop fired; holds the sentinel value (the generation cap).
    Sentinel(u64),
}

impl Aggregate {
    pub fn is_sentinel(&self) -> bool {
        matches!(self, Self::Sentinel(_))
    }
}

impl fmt::Display for Aggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mean(v) => write!(f, "{v:?}"),
            Self::Sentinel(v) => write!(f, "{v}"),
        }
    }
}

/// One line of the output table: the combination's values, then the aggregate.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    pub combination: Combination,
    pub aggregate: Aggregate,
}

impl ResultRow {
    pub fn new(combination: Combination, aggregate: Aggregate) -> Self {
        Self {
            combination,
            aggregate,
        }
    }

    pub fn fields(&self) -> Vec<String> {
        self.combination
            .values()
            .map(ToString::to_string)
            .chain(std::iter::once(self.aggregate.to_string()))
            .collect()
    }
}
