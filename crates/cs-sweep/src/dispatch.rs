//! Bounded-concurrency work dispatcher.
//!
//! Every combination becomes one unit of work: an owned [`ArgumentSet`]
//! snapshot plus the combination itself. At most `concurrency` units run at
//! once; the generator is only advanced when a slot frees up, so the grid is
//! never materialized. Completed units are reaped by the dispatch loop, which
//! is the only place [`SweepStatus`] changes.

use crossbeam_channel::Sender;
use cs_types::{Aggregate, ArgumentSet, Combination, ConfigError, CsError, CsResult, ResultRow};
use std::collections::HashMap;
use std::future::Future;
use std::io::Write;
use std::sync::Arc;
use tokio::task::{self, JoinSet};
use tracing::{debug, error, info, info_span, Instrument};

use crate::aggregate::Aggregator;
use crate::config::{ErrorPolicy, SweepConfig};
use crate::search::Grid;
use crate::sink::ResultSink;
use crate::solver::{ProcessSolver, Solver};
use crate::status::{SweepEvent, SweepStatus};

/// A combination that could not be evaluated.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedCombination {
    pub combination: Combination,
    pub error: String,
}

/// Ways a sweep can end other than completing every row.
#[derive(Debug, thiserror::Error)]
pub enum SweepError {
    #[error("invalid sweep configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("combination {combination} failed: {source}")]
    Worker {
        combination: Combination,
        #[source]
        source: CsError,
        status: Box<SweepStatus>,
    },

    #[error("worker for {combination} panicked: {message}")]
    WorkerPanicked {
        combination: Combination,
        message: String,
        status: Box<SweepStatus>,
    },

    #[error("{} of {} combinations failed", .failures.len(), .status.total)]
    Incomplete {
        failures: Vec<FailedCombination>,
        status: Box<SweepStatus>,
    },

    #[error("sweep cancelled after {} of {} rows", .status.rows_written, .status.total)]
    Cancelled { status: Box<SweepStatus> },
}

impl SweepError {
    /// Final status of the run, when it got far enough to have one.
    pub fn status(&self) -> Option<&SweepStatus> {
        match self {
            Self::Config(_) => None,
            Self::Worker { status, .. }
            | Self::WorkerPanicked { status, .. }
            | Self::Incomplete { status, .. }
            | Self::Cancelled { status } => Some(status),
        }
    }
}

type UnitOutcome = CsResult<Aggregate>;

/// In-flight units, keyed by task so a panic can be traced to its combination.
type InFlight = HashMap<task::Id, Combination>;

/// A configured sweep, ready to run.
pub struct Sweep<S, W>
where
    S: Solver + 'static,
    W: Write + Send + 'static,
{
    config: SweepConfig,
    grid: Grid,
    solver: Arc<S>,
    sink: Arc<ResultSink<W>>,
    events: Option<Sender<SweepEvent>>,
}

impl<S, W> Sweep<S, W>
where
    S: Solver + 'static,
    W: Write + Send + 'static,
{
    /// Validate `config` and bind it to a solver and a sink.
    pub fn new(
        config: SweepConfig,
        solver: Arc<S>,
        sink: Arc<ResultSink<W>>,
    ) -> Result<Self, ConfigError> {
        let grid = config.validate()?;
        Ok(Self {
            config,
            grid,
            solver,
            sink,
            events: None,
        })
    }

    /// Emit progress events on `tx`.
    pub fn with_events(mut self, tx: Sender<SweepEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// Run every combination to completion.
    pub async fn run(self) -> Result<SweepStatus, SweepError> {
        self.run_until(std::future::pending()).await
    }

    /// Run until every combination is done or `shutdown` resolves.
    ///
    /// On shutdown all in-flight units are aborted, which kills their solver
    /// processes. Rows already written stay; no partial row is ever written.
    pub async fn run_until<F>(self, shutdown: F) -> Result<SweepStatus, SweepError>
    where
        F: Future<Output = ()>,
    {
        let mut shutdown = std::pin::pin!(shutdown);
        let total = self.grid.size().unwrap_or(usize::MAX);
        let concurrency = self.config.concurrency;
        let trial_count = self.config.trial_count;
        let aggregator = Aggregator::new(
            self.config.generation_max,
            self.config.early_stop_threshold,
        );
        let base = self.config.effective_base_args();

        let mut status = SweepStatus::new(total);
        status.mark_running();
        info!(id = %status.id, total, concurrency, trial_count, "sweep started");
        self.emit(SweepEvent::Started {
            id: status.id,
            total,
        });

        let mut combinations = self.grid.iter();
        let mut workers: JoinSet<UnitOutcome> = JoinSet::new();
        let mut in_flight = InFlight::new();
        let mut failures: Vec<FailedCombination> = Vec::new();

        loop {
            while workers.len() < concurrency {
                let Some(combination) = combinations.next() else {
                    break;
                };
                let args = combination.apply(&base);
                let id = self.submit(
                    &mut workers,
                    aggregator,
                    trial_count,
                    args,
                    combination.clone(),
                );
                in_flight.insert(id, combination);
            }

            if workers.is_empty() {
                break;
            }

            let joined = tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!(in_flight = workers.len(), "shutdown requested, aborting workers");
                    self.stop(&mut workers, &mut in_flight, &mut status, total).await;
                    status.mark_cancelled();
                    self.emit(SweepEvent::Finished { id: status.id, state: status.state });
                    return Err(SweepError::Cancelled { status: Box::new(status) });
                }
                joined = workers.join_next_with_id() => joined,
            };
            let Some(joined) = joined else {
                continue;
            };

            let (id, outcome) = match joined {
                Ok(done) => done,
                Err(join_err) => {
                    let combination = in_flight.remove(&join_err.id()).unwrap_or_default();
                    error!(combination = %combination, error = %join_err, "worker task died");
                    status.record_failure();
                    self.stop(&mut workers, &mut in_flight, &mut status, total).await;
                    status.mark_failed(format!("{combination}: {join_err}"));
                    self.emit(SweepEvent::Finished { id: status.id, state: status.state });
                    return Err(SweepError::WorkerPanicked {
                        combination,
                        message: join_err.to_string(),
                        status: Box::new(status),
                    });
                }
            };
            let combination = in_flight.remove(&id).unwrap_or_default();

            let Some(err) = self.record(&mut status, total, &combination, outcome) else {
                continue;
            };
            match self.config.on_error {
                ErrorPolicy::Abort => {
                    self.stop(&mut workers, &mut in_flight, &mut status, total).await;
                    status.mark_failed(format!("{combination}: {err}"));
                    self.emit(SweepEvent::Finished { id: status.id, state: status.state });
                    return Err(SweepError::Worker {
                        combination,
                        source: err,
                        status: Box::new(status),
                    });
                }
                ErrorPolicy::Continue => failures.push(FailedCombination {
                    combination,
                    error: err.to_string(),
                }),
            }
        }

        if !failures.is_empty() {
            status.mark_failed(format!("{} combinations failed", failures.len()));
            self.emit(SweepEvent::Finished { id: status.id, state: status.state });
            return Err(SweepError::Incomplete {
                failures,
                status: Box::new(status),
            });
        }

        status.mark_completed();
        info!(
            id = %status.id,
            rows = status.rows_written,
            early_stopped = status.early_stopped,
            "sweep completed"
        );
        self.emit(SweepEvent::Finished {
            id: status.id,
            state: status.state,
        });
        Ok(status)
    }

    /// Spawn one unit. `args` is moved in, so the worker owns its snapshot.
    fn submit(
        &self,
        workers: &mut JoinSet<UnitOutcome>,
        aggregator: Aggregator,
        trial_count: usize,
        args: ArgumentSet,
        combination: Combination,
    ) -> task::Id {
        let solver = Arc::clone(&self.solver);
        let sink = Arc::clone(&self.sink);
        let span = info_span!("combination", values = %combination);

        workers
            .spawn(
                async move {
                    evaluate(&*solver, aggregator, trial_count, &args, &combination, &sink).await
                }
                .instrument(span),
            )
            .id()
    }

    /// Fold one finished unit into `status`. Returns the error if it failed.
    fn record(
        &self,
        status: &mut SweepStatus,
        total: usize,
        combination: &Combination,
        outcome: UnitOutcome,
    ) -> Option<CsError> {
        match outcome {
            Ok(aggregate) => {
                status.record_row(combination, aggregate);
                debug!(
                    completed = status.completed(),
                    total,
                    combination = %combination,
                    aggregate = %aggregate,
                    "combination done"
                );
                self.emit(SweepEvent::RowWritten {
                    row: ResultRow::new(combination.clone(), aggregate),
                    completed: status.completed(),
                    total,
                });
                None
            }
            Err(err) => {
                error!(combination = %combination, error = %err, "combination failed");
                status.record_failure();
                self.emit(SweepEvent::CombinationFailed {
                    combination: combination.clone(),
                    error: err.to_string(),
                });
                Some(err)
            }
        }
    }

    /// Reap units that already finished, so their rows are counted, then
    /// abort the rest.
    async fn stop(
        &self,
        workers: &mut JoinSet<UnitOutcome>,
        in_flight: &mut InFlight,
        status: &mut SweepStatus,
        total: usize,
    ) {
        while let Some(joined) = workers.try_join_next_with_id() {
            match joined {
                Ok((id, outcome)) => {
                    let combination = in_flight.remove(&id).unwrap_or_default();
                    self.record(status, total, &combination, outcome);
                }
                Err(join_err) => {
                    let combination = in_flight.remove(&join_err.id()).unwrap_or_default();
                    error!(combination = %combination, error = %join_err, "worker task died");
                    status.record_failure();
                }
            }
        }
        workers.shutdown().await;
        in_flight.clear();
    }

    fn emit(&self, event: SweepEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.try_send(event);
        }
    }
}

async fn evaluate<S, W>(
    solver: &S,
    aggregator: Aggregator,
    trial_count: usize,
    args: &ArgumentSet,
    combination: &Combination,
    sink: &ResultSink<W>,
) -> CsResult<Aggregate>
where
    S: Solver + ?Sized,
    W: Write,
{
    let tokens = args.to_tokens();
    let aggregate = aggregator.average(solver, &tokens, trial_count).await?;
    sink.append_result(&ResultRow::new(combination.clone(), aggregate))?;
    Ok(aggregate)
}

/// Run `config` against the real solver binary, writing into `sink`.
pub async fn sweep<W>(
    config: SweepConfig,
    sink: Arc<ResultSink<W>>,
) -> Result<SweepStatus, SweepError>
where
    W: Write + Send + 'static,
{
    let solver = ProcessSolver::new(&config.solver, config.generation_max)
        .with_timeout(config.trial_timeout());
    Sweep::new(config, Arc::new(solver), sink)?.run().await
}
