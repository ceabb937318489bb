//! Sweep lifecycle tracking and progress events.

use chrono::{DateTime, Utc};
use cs_types::{Aggregate, Combination, ResultRow};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique sweep run identifier.
pub type SweepId = Uuid;

/// Lifecycle state for a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SweepState {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// The lowest mean seen so far.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestCombination {
    pub combination: String,
    pub mean_generations: f64,
}

/// Aggregate status of a sweep.
///
/// Only the dispatcher loop mutates this; workers report through their
/// return values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepStatus {
    pub id: SweepId,
    pub state: SweepState,
    pub total: usize,
    pub rows_written: usize,
    pub early_stopped: usize,
    pub failed: usize,
    pub best: Option<BestCombination>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl SweepStatus {
    pub fn new(total: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: SweepState::Pending,
            total,
            rows_written: 0,
            early_stopped: 0,
            failed: 0,
            best: None,
            started_at: None,
            finished_at: None,
            error: None,
        }
    }

    pub fn mark_running(&mut self) {
        self.state = SweepState::Running;
        self.started_at = Some(Utc::now());
    }

    pub fn mark_completed(&mut self) {
        self.state = SweepState::Completed;
        self.finished_at = Some(Utc::now());
    }

    pub fn mark_failed(&mut self, error: String) {
        self.state = SweepState::Failed;
        self.finished_at = Some(Utc::now());
        self.error = Some(error);
    }

    pub fn mark_cancelled(&mut self) {
        self.state = SweepState::Cancelled;
        self.finished_at = Some(Utc::now());
    }

    /// Combinations finished so far, written or failed.
    pub fn completed(&self) -> usize {
        self.rows_written + self.failed
    }

    pub fn record_row(&mut self, combination: &Combination, aggregate: Aggregate) {
        self.rows_written += 1;
        match aggregate {
            Aggregate::Sentinel(_) => self.early_stopped += 1,
            Aggregate::Mean(mean) => {
                let improves = self
                    .best
                    .as_ref()
                    .map_or(true, |best| mean < best.mean_generations);
                if improves {
                    self.best = Some(BestCombination {
                        combination: combination.to_string(),
                        mean_generations: mean,
                    });
                }
            }
        }
    }

    pub fn record_failure(&mut self) {
        self.failed += 1;
    }
}

/// Progress notifications emitted by the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub enum SweepEvent {
    Started { id: SweepId, total: usize },
    RowWritten { row: ResultRow, completed: usize, total: usize },
    CombinationFailed { combination: Combination, error: String },
    Finished { id: SweepId, state: SweepState },
}
