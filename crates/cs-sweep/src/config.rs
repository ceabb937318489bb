//! Sweep configuration.

use cs_types::{invalid_value, ArgumentSet, ConfigError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::search::{Grid, SearchSpace};

/// What to do when evaluating a combination fails outright.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Stop every worker and report the first failure.
    #[default]
    Abort,
    /// Keep sweeping and report every failed combination at the end.
    Continue,
}

/// Top-level configuration for a sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Path to the solver binary.
    pub solver: PathBuf,

    /// Arguments every trial starts from, in argv order.
    #[serde(default)]
    pub base_args: ArgumentSet,

    /// Swept axes, slowest-varying first.
    pub axes: SearchSpace,

    /// Trials per combination.
    #[serde(default = "defaults::trial_count")]
    pub trial_count: usize,

    /// How many combinations are evaluated in parallel.
    #[serde(default = "defaults::concurrency")]
    pub concurrency: usize,

    /// Consecutive sentinel trials after which a combination is abandoned.
    #[serde(default = "defaults::early_stop_threshold")]
    pub early_stop_threshold: usize,

    /// Generation cap handed to the solver; doubles as the sentinel value.
    #[serde(default = "defaults::generation_max")]
    pub generation_max: u64,

    /// Flag through which `generation_max` reaches the solver.
    #[serde(default = "defaults::generation_flag")]
    pub generation_flag: String,

    /// Wall-clock limit per trial. A trial that exceeds it counts as the sentinel.
    #[serde(default)]
    pub trial_timeout_secs: Option<u64>,

    #[serde(default)]
    pub on_error: ErrorPolicy,
}

mod defaults {
    pub fn trial_count() -> usize {
        100
    }

    pub fn concurrency() -> usize {
        8
    }

    pub fn early_stop_threshold() -> usize {
        3
    }

    pub fn generation_max() -> u64 {
        1000
    }

    pub fn generation_flag() -> String {
        "-g".to_string()
    }
}

impl SweepConfig {
    pub fn new(solver: impl Into<PathBuf>, axes: SearchSpace) -> Self {
        Self {
            solver: solver.into(),
            base_args: ArgumentSet::new(),
            axes,
            trial_count: defaults::trial_count(),
            concurrency: defaults::concurrency(),
            early_stop_threshold: defaults::early_stop_threshold(),
            generation_max: defaults::generation_max(),
            generation_flag: defaults::generation_flag(),
            trial_timeout_secs: None,
            on_error: ErrorPolicy::default(),
        }
    }

    /// Load a JSON config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn with_base_args(mut self, args: ArgumentSet) -> Self {
        self.base_args = args;
        self
    }

    pub fn with_trial_count(mut self, n: usize) -> Self {
        self.trial_count = n;
        self
    }

    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n;
        self
    }

    pub fn with_early_stop_threshold(mut self, n: usize) -> Self {
        self.early_stop_threshold = n;
        self
    }

    pub fn with_generation_max(mut self, n: u64) -> Self {
        self.generation_max = n;
        self
    }

    pub fn with_trial_timeout(mut self, secs: Option<u64>) -> Self {
        self.trial_timeout_secs = secs;
        self
    }

    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.on_error = policy;
        self
    }

    pub fn trial_timeout(&self) -> Option<Duration> {
        self.trial_timeout_secs.map(Duration::from_secs)
    }

    /// Base arguments with the generation cap applied.
    pub fn effective_base_args(&self) -> ArgumentSet {
        let mut args = self.base_args.clone();
        args.set(self.generation_flag.as_str(), self.generation_max.to_string());
        args
    }

    /// Check every field and resolve the axes into a grid.
    pub fn validate(&self) -> Result<Grid, ConfigError> {
        if self.solver.as_os_str().is_empty() {
            return Err(invalid_value!("solver", "path is empty"));
        }
        if self.trial_count == 0 {
            return Err(invalid_value!("trial_count", "must be at least 1"));
        }
        if self.concurrency == 0 {
            return Err(invalid_value!("concurrency", "must be at least 1"));
        }
        if self.early_stop_threshold == 0 {
            return Err(invalid_value!("early_stop_threshold", "must be at least 1"));
        }
        if self.generation_max == 0 {
            return Err(invalid_value!("generation_max", "must be at least 1"));
        }
        if self.generation_flag.is_empty() {
            return Err(invalid_value!("generation_flag", "must not be empty"));
        }
        if self.trial_timeout_secs == Some(0) {
            return Err(invalid_value!("trial_timeout_secs", "must be at least 1"));
        }
        if let Some(axis) = self
            .axes
            .axes
            .iter()
            .find(|axis| axis.name == self.generation_flag)
        {
            return Err(ConfigError::GenerationFlagSwept {
                axis: axis.name.clone(),
            });
        }
        self.axes.resolve()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_config() -> SweepConfig {
        let space = SearchSpace::new().add_int("-p", 10, 30, 10);
        SweepConfig::new("./target/release/genetictsp", space)
            .with_base_args(ArgumentSet::new().with("-i", "gr17.tsp").with("-e", "2500"))
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = sample_config();
        assert_eq!(config.trial_count, 100);
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.early_stop_threshold, 3);
        assert_eq!(config.generation_max, 1000);
        assert_eq!(config.on_error, ErrorPolicy::Abort);
        assert!(config.trial_timeout().is_none());
    }

    #[test]
    fn generation_cap_is_applied_to_base_args() {
        let config = sample_config().with_generation_max(50);
        let args = config.effective_base_args();
        assert_eq!(
            args.to_tokens(),
            vec!["-i", "gr17.tsp", "-e", "2500", "-g", "50"]
        );

        let overridden = sample_config()
            .with_base_args(ArgumentSet::new().with("-g", "7").with("-i", "a.tsp"))
            .with_generation_max(20);
        assert_eq!(
            overridden.effective_base_args().to_tokens(),
            vec!["-g", "20", "-i", "a.tsp"]
        );
    }

    #[test]
    fn validate_rejects_zero_values() {
        assert!(sample_config().with_trial_count(0).validate().is_err());
        assert!(sample_config().with_concurrency(0).validate().is_err());
        assert!(sample_config().with_early_stop_threshold(0).validate().is_err());
        assert!(sample_config().with_generation_max(0).validate().is_err());
        assert!(sample_config().with_trial_timeout(Some(0)).validate().is_err());
    }

    #[test]
    fn validate_rejects_swept_generation_flag() {
        let config = SweepConfig::new("solver", SearchSpace::new().add_values("-g", [10i64, 20]));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::GenerationFlagSwept { .. })
        ));
    }

    #[test]
    fn validate_returns_grid() {
        let grid = sample_config().validate().unwrap();
        assert_eq!(grid.size(), Some(3));
    }

    #[test]
    fn loads_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "solver": "./genetictsp",
                "base_args": [["-i", "gr17.tsp"], ["-e", "2500"]],
                "axes": [
                    {{"name": "-p", "int_range": {{"low": 10, "high": 100, "step": 10}}}},
                    {{"name": "-M", "values": [0.01, 0.05]}}
                ],
                "trial_count": 20,
                "concurrency": 4,
                "trial_timeout_secs": 60,
                "on_error": "continue"
            }}"#
        )
        .unwrap();

        let config = SweepConfig::from_file(file.path()).unwrap();
        assert_eq!(config.trial_count, 20);
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.early_stop_threshold, 3);
        assert_eq!(config.on_error, ErrorPolicy::Continue);
        assert_eq!(config.trial_timeout(), Some(Duration::from_secs(60)));
        assert_eq!(config.base_args.get("-i"), Some("gr17.tsp"));
        assert_eq!(config.validate().unwrap().size(), Some(20));
    }

    #[test]
    fn bundled_sweeps_are_valid() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../sweeps");
        let population = SweepConfig::from_file(dir.join("population.json")).unwrap();
        assert_eq!(population.validate().unwrap().size(), Some(999));

        let rates = SweepConfig::from_file(dir.join("mutation_crossover.json")).unwrap();
        assert_eq!(rates.validate().unwrap().size(), Some(21 * 21));
        assert_eq!(rates.on_error, ErrorPolicy::Continue);
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = SweepConfig::from_file("/nonexistent/sweep.json").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
