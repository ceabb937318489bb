use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use crossbeam_channel::Receiver;
use cs_sweep::{
    ErrorPolicy, Grid, ProcessSolver, Sweep, SweepConfig, SweepEvent, SweepStatus, TableSink,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "convsweep",
    version,
    about = "Sweep solver parameters and record mean generations to convergence"
)]
struct Cli {
    /// Sweep definition (JSON).
    #[arg(long, short)]
    config: PathBuf,

    /// Output table; `-` writes to stdout.
    #[arg(long, short, default_value = "-")]
    output: PathBuf,

    /// Append to the output table instead of truncating it.
    #[arg(long)]
    append: bool,

    #[arg(long)]
    solver: Option<PathBuf>,

    /// Trials per combination.
    #[arg(long)]
    trials: Option<usize>,

    #[arg(long)]
    concurrency: Option<usize>,

    /// Consecutive failed trials that abandon a combination.
    #[arg(long)]
    early_stop: Option<usize>,

    #[arg(long)]
    generation_max: Option<u64>,

    /// Per-trial limit in seconds.
    #[arg(long)]
    trial_timeout: Option<u64>,

    #[arg(long, value_enum)]
    on_error: Option<ErrorPolicyArg>,

    /// Log filter, overrides RUST_LOG.
    #[arg(long)]
    log_level: Option<String>,

    /// Print the solver invocations without running them.
    #[arg(long)]
    dry_run: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ErrorPolicyArg {
    Abort,
    Continue,
}

impl From<ErrorPolicyArg> for ErrorPolicy {
    fn from(value: ErrorPolicyArg) -> Self {
        match value {
            ErrorPolicyArg::Abort => ErrorPolicy::Abort,
            ErrorPolicyArg::Continue => ErrorPolicy::Continue,
        }
    }
}

impl Cli {
    fn apply_overrides(&self, mut config: SweepConfig) -> SweepConfig {
        if let Some(solver) = &self.solver {
            config.solver = solver.clone();
        }
        if let Some(n) = self.trials {
            config.trial_count = n;
        }
        if let Some(n) = self.concurrency {
            config.concurrency = n;
        }
        if let Some(n) = self.early_stop {
            config.early_stop_threshold = n;
        }
        if let Some(n) = self.generation_max {
            config.generation_max = n;
        }
        if let Some(secs) = self.trial_timeout {
            config.trial_timeout_secs = Some(secs);
        }
        if let Some(policy) = self.on_error {
            config.on_error = policy.into();
        }
        config
    }
}

/// Solver command lines a sweep would run, one per combination.
fn dry_run_lines<'a>(
    config: &'a SweepConfig,
    grid: &'a Grid,
) -> impl Iterator<Item = String> + 'a {
    let base = config.effective_base_args();
    grid.iter().map(move |combination| {
        let tokens = combination.apply(&base).to_tokens();
        format!("{} {}", config.solver.display(), tokens.join(" "))
    })
}

fn enable_tracing(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn report_progress(rx: Receiver<SweepEvent>) {
    for event in rx.iter() {
        match event {
            SweepEvent::Started { id, total } => info!(%id, total, "sweep started"),
            SweepEvent::RowWritten {
                row,
                completed,
                total,
            } => info!(
                "[{completed}/{total}] {} -> {}",
                row.combination, row.aggregate
            ),
            SweepEvent::CombinationFailed { combination, error } => {
                warn!(%combination, %error, "combination failed")
            }
            SweepEvent::Finished { id, state } => info!(%id, ?state, "sweep finished"),
        }
    }
}

fn log_summary(status: &SweepStatus) {
    let elapsed = match (status.started_at, status.finished_at) {
        (Some(start), Some(end)) => (end - start).num_milliseconds() as f64 / 1000.0,
        _ => 0.0,
    };
    info!(
        rows = status.rows_written,
        early_stopped = status.early_stopped,
        failed = status.failed,
        elapsed_secs = elapsed,
        "summary"
    );
    if let Some(best) = &status.best {
        info!(
            combination = %best.combination,
            mean_generations = best.mean_generations,
            "fastest converging combination"
        );
    }
    if let Ok(json) = serde_json::to_string(status) {
        tracing::debug!(status = %json, "final status");
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "cannot listen for Ctrl-C; sweep can only be stopped by killing it");
        std::future::pending::<()>().await;
    }
    warn!("interrupted, stopping solver processes");
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    enable_tracing(cli.log_level.as_deref());

    let config = SweepConfig::from_file(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    let config = cli.apply_overrides(config);
    let grid = config.validate().context("invalid sweep configuration")?;

    if cli.dry_run {
        for line in dry_run_lines(&config, &grid) {
            println!("{line}");
        }
        return Ok(());
    }

    let sink = TableSink::open(&cli.output, cli.append)
        .with_context(|| format!("opening {}", cli.output.display()))?;
    let solver = ProcessSolver::new(&config.solver, config.generation_max)
        .with_timeout(config.trial_timeout());

    let (tx, rx) = crossbeam_channel::unbounded();
    let listener = std::thread::spawn(move || report_progress(rx));

    let result = Sweep::new(config, Arc::new(solver), Arc::new(sink))?
        .with_events(tx)
        .run_until(shutdown_signal())
        .await;

    if listener.join().is_err() {
        warn!("progress reporter panicked");
    }

    match result {
        Ok(status) => {
            log_summary(&status);
            Ok(())
        }
        Err(err) => {
            if let Some(status) = err.status() {
                log_summary(status);
            }
            Err(err.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cs_sweep::SearchSpace;

    fn file_config() -> SweepConfig {
        let mut config = SweepConfig::new(
            "./genetictsp",
            SearchSpace::new().add_values("-p", [10i64, 20]),
        )
        .with_trial_count(100)
        .with_concurrency(8)
        .with_early_stop_threshold(3)
        .with_generation_max(1000)
        .with_trial_timeout(Some(60));
        config.base_args.set("-i", "gr17.tsp");
        config
    }

    #[test]
    fn absent_flags_keep_file_values() {
        let cli = Cli::parse_from(["convsweep", "--config", "sweep.json"]);
        assert_eq!(cli.apply_overrides(file_config()), file_config());
        assert_eq!(cli.output, PathBuf::from("-"));
        assert!(!cli.append);
        assert!(!cli.dry_run);
    }

    #[test]
    fn every_flag_overrides_the_file() {
        let cli = Cli::parse_from([
            "convsweep",
            "--config",
            "sweep.json",
            "--solver",
            "/opt/solver",
            "--trials",
            "5",
            "--concurrency",
            "2",
            "--early-stop",
            "4",
            "--generation-max",
            "50",
            "--trial-timeout",
            "9",
            "--on-error",
            "continue",
        ]);
        let config = cli.apply_overrides(file_config());

        assert_eq!(config.solver, PathBuf::from("/opt/solver"));
        assert_eq!(config.trial_count, 5);
        assert_eq!(config.concurrency, 2);
        assert_eq!(config.early_stop_threshold, 4);
        assert_eq!(config.generation_max, 50);
        assert_eq!(config.trial_timeout_secs, Some(9));
        assert_eq!(config.on_error, ErrorPolicy::Continue);
        assert_eq!(config.base_args, file_config().base_args);
    }

    #[test]
    fn dry_run_lists_every_invocation() {
        let cli = Cli::parse_from([
            "convsweep",
            "-c",
            "sweep.json",
            "--generation-max",
            "50",
            "--dry-run",
        ]);
        assert!(cli.dry_run);

        let config = cli.apply_overrides(file_config());
        let grid = config.validate().unwrap();
        let lines: Vec<String> = dry_run_lines(&config, &grid).collect();
        assert_eq!(
            lines,
            vec![
                "./genetictsp -i gr17.tsp -g 50 -p 10",
                "./genetictsp -i gr17.tsp -g 50 -p 20",
            ]
        );
    }
}
