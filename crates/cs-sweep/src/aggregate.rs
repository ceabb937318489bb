//! Repeated-trial aggregation with consecutive-failure early stop.

use cs_types::{Aggregate, SolverError, TrialResult};
use tracing::{debug, info};

use crate::solver::Solver;

/// Runs up to `trial_count` trials for one argument set and reduces them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Aggregator {
    generation_max: u64,
    early_stop_threshold: usize,
}

impl Aggregator {
    pub fn new(generation_max: u64, early_stop_threshold: usize) -> Self {
        Self {
            generation_max,
            early_stop_threshold,
        }
    }

    /// Mean generation count over `trial_count` trials.
    ///
    /// Returns [`Aggregate::Sentinel`] as soon as `early_stop_threshold`
    /// sentinels arrive back to back. Otherwise the mean covers every trial,
    /// with isolated sentinels counted at the cap. Trials run sequentially.
    pub async fn average<S: Solver + ?Sized>(
        &self,
        solver: &S,
        tokens: &[String],
        trial_count: usize,
    ) -> Result<Aggregate, SolverError> {
        let mut sum: u128 = 0;
        let mut consecutive = 0usize;

        for trial in 0..trial_count {
            let result = solver.run(tokens).await?;
            debug!(trial, ?result, "trial finished");

            if result == TrialResult::Sentinel {
                consecutive += 1;
                if consecutive >= self.early_stop_threshold {
                    info!(
                        trials_run = trial + 1,
                        threshold = self.early_stop_threshold,
                        "early stop"
                    );
                    return Ok(Aggregate::Sentinel(self.generation_max));
                }
            } else {
                consecutive = 0;
            }
            sum += u128::from(result.generations(self.generation_max));
        }

        Ok(Aggregate::Mean(sum as f64 / trial_count as f64))
    }
}
