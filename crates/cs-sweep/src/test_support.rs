//! In-memory solver doubles for unit tests.

use async_trait::async_trait;
use cs_types::{SolverError, TrialResult};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::solver::Solver;

/// Replays a fixed list of outcomes, then a fallback if one is set.
pub(crate) struct ScriptedSolver {
    script: Mutex<VecDeque<TrialResult>>,
    fallback: Option<TrialResult>,
    fail: bool,
    calls: AtomicUsize,
}

impl ScriptedSolver {
    pub(crate) fn new(script: Vec<TrialResult>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: None,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn repeating(result: TrialResult) -> Self {
        Self {
            fallback: Some(result),
            ..Self::new(Vec::new())
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(Vec::new())
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Solver for ScriptedSolver {
    async fn run(&self, tokens: &[String]) -> Result<TrialResult, SolverError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(SolverError::MalformedOutput {
                argv: tokens.join(" "),
                stdout: "garbage".to_string(),
            });
        }
        let next = self.script.lock().pop_front();
        Ok(next
            .or(self.fallback)
            .unwrap_or_else(|| panic!("script exhausted after {} calls", self.calls())))
    }
}

/// Computes each outcome from the argv, after an optional delay.
pub(crate) struct FnSolver<F> {
    f: F,
    delay: Duration,
}

impl<F> FnSolver<F>
where
    F: Fn(&[String]) -> Result<TrialResult, SolverError> + Send + Sync,
{
    pub(crate) fn new(f: F) -> Self {
        Self {
            f,
            delay: Duration::ZERO,
        }
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl<F> Solver for FnSolver<F>
where
    F: Fn(&[String]) -> Result<TrialResult, SolverError> + Send + Sync,
{
    async fn run(&self, tokens: &[String]) -> Result<TrialResult, SolverError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        (self.f)(tokens)
    }
}

/// Value following `flag` in an argv token list.
pub(crate) fn flag_value<'a>(tokens: &'a [String], flag: &str) -> Option<&'a str> {
    tokens
        .chunks(2)
        .find(|pair| pair[0] == flag)
        .and_then(|pair| pair.get(1))
        .map(String::as_str)
}
