//! Trial runner: one solver invocation, one result.
//!
//! The [`Solver`] trait is the seam between the aggregator and the outside
//! world. [`ProcessSolver`] is the production implementation and spawns the
//! solver binary once per call.

use async_trait::async_trait;
use cs_types::{SolverError, TrialResult};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Runs a single trial with the given argv tokens.
#[async_trait]
pub trait Solver: Send + Sync {
    async fn run(&self, tokens: &[String]) -> Result<TrialResult, SolverError>;
}

/// Spawns the external solver binary for every trial.
///
/// Exit code 0 must come with a single decimal integer on stdout. Any other
/// exit status, a timeout, or a count equal to the cap yields the sentinel.
#[derive(Debug, Clone)]
pub struct ProcessSolver {
    program: PathBuf,
    generation_max: u64,
    timeout: Option<Duration>,
}

impl ProcessSolver {
    pub fn new(program: impl Into<PathBuf>, generation_max: u64) -> Self {
        Self {
            program: program.into(),
            generation_max,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn argv(&self, tokens: &[String]) -> String {
        std::iter::once(self.program.display().to_string())
            .chain(tokens.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn classify(&self, tokens: &[String], stdout: &[u8]) -> Result<TrialResult, SolverError> {
        let text = String::from_utf8_lossy(stdout);
        let generation: u64 =
            text.trim()
                .parse()
                .map_err(|_| SolverError::MalformedOutput {
                    argv: self.argv(tokens),
                    stdout: text.to_string(),
                })?;

        if generation > self.generation_max {
            return Err(SolverError::CountAboveCap {
                argv: self.argv(tokens),
                generation,
                generation_max: self.generation_max,
            });
        }
        if generation == self.generation_max {
            return Ok(TrialResult::Sentinel);
        }
        Ok(TrialResult::Converged(generation))
    }
}

#[async_trait]
impl Solver for ProcessSolver {
    async fn run(&self, tokens: &[String]) -> Result<TrialResult, SolverError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(tokens)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, cmd.output()).await {
                Ok(output) => output,
                Err(_) => {
                    warn!(argv = %self.argv(tokens), ?limit, "trial timed out, counting as sentinel");
                    return Ok(TrialResult::Sentinel);
                }
            },
            None => cmd.output().await,
        }
        .map_err(|source| SolverError::Spawn {
            program: self.program.display().to_string(),
            source,
        })?;

        if !output.status.success() {
            debug!(
                status = %output.status,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "solver did not converge"
            );
            return Ok(TrialResult::Sentinel);
        }

        self.classify(tokens, &output.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solver() -> ProcessSolver {
        ProcessSolver::new("genetictsp", 50)
    }

    fn tokens() -> Vec<String> {
        vec!["-g".to_string(), "50".to_string()]
    }

    #[test]
    fn parses_generation_count() {
        assert_eq!(
            solver().classify(&tokens(), b"17\n").unwrap(),
            TrialResult::Converged(17)
        );
        assert_eq!(
            solver().classify(&tokens(), b"  0 ").unwrap(),
            TrialResult::Converged(0)
        );
    }

    #[test]
    fn count_at_cap_is_sentinel() {
        assert_eq!(
            solver().classify(&tokens(), b"50\n").unwrap(),
            TrialResult::Sentinel
        );
    }

    #[test]
    fn count_above_cap_is_a_protocol_violation() {
        let err = solver().classify(&tokens(), b"51\n").unwrap_err();
        assert!(matches!(err, SolverError::CountAboveCap { generation: 51, .. }));
    }

    #[test]
    fn non_integer_output_is_fatal() {
        for garbage in [&b""[..], b"abc", b"12.5", b"-3", b"1 2"] {
            let err = solver().classify(&tokens(), garbage).unwrap_err();
            match err {
                SolverError::MalformedOutput { argv, .. } => {
                    assert_eq!(argv, "genetictsp -g 50")
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn missing_binary_is_a_spawn_error() {
        let solver = ProcessSolver::new("/nonexistent/genetictsp", 50);
        let err = solver.run(&tokens()).await.unwrap_err();
        assert!(matches!(err, SolverError::Spawn { .. }));
    }
}
