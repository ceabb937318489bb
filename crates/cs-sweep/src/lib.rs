//! # cs-sweep
//!
//! Concurrent parameter-sweep engine for ConvSweep.
//!
//! Expands swept axes into combinations, runs the external solver repeatedly
//! for each one on a bounded pool of workers, and appends one aggregate row
//! per combination to a shared CSV table.

mod aggregate;
mod config;
mod dispatch;
mod search;
mod sink;
mod solver;
mod status;

#[cfg(test)]
mod test_support;

pub use aggregate::Aggregator;
pub use config::{ErrorPolicy, SweepConfig};
pub use dispatch::{sweep, FailedCombination, Sweep, SweepError};
pub use search::{combinations, AxisDef, AxisKind, Combinations, Grid, SearchSpace, MAX_GRID_SIZE};
pub use sink::{ResultSink, TableSink};
pub use solver::{ProcessSolver, Solver};
pub use status::{BestCombination, SweepEvent, SweepId, SweepState, SweepStatus};
