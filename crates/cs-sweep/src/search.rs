//! Axis definitions and the Cartesian combination generator.

use cs_types::{Combination, ConfigError, ParameterAxis, ParameterValue};
use serde::{Deserialize, Serialize};

/// A single swept dimension as written in the sweep config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisDef {
    /// Solver flag the axis drives (e.g. "-p").
    pub name: String,
    /// How the axis values are produced.
    #[serde(flatten)]
    pub kind: AxisKind,
}

/// Describes how an axis is expanded into values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisKind {
    /// Explicit list, used as-is.
    Values(Vec<ParameterValue>),
    /// Integer range [low, high] inclusive, every `step`.
    IntRange {
        low: i64,
        high: i64,
        #[serde(default = "default_step")]
        step: i64,
    },
    /// `steps` evenly spaced points over [low, high], both ends included.
    FloatRange { low: f64, high: f64, steps: usize },
}

fn default_step() -> i64 {
    1
}

/// Largest grid a sweep will enumerate.
pub const MAX_GRID_SIZE: usize = u32::MAX as usize;

impl AxisDef {
    /// Expand into an ordered axis. Integer ranges stay arithmetic; the
    /// other kinds are listed, after their length is checked.
    pub fn resolve(&self) -> Result<ParameterAxis, ConfigError> {
        let invalid = |message: String| ConfigError::InvalidRange {
            axis: self.name.clone(),
            message,
        };
        let too_large = || ConfigError::GridOverflow {
            limit: MAX_GRID_SIZE,
        };

        let axis = match &self.kind {
            AxisKind::Values(values) => ParameterAxis::new(self.name.clone(), values.clone()),
            AxisKind::IntRange { low, high, step } => {
                if *step <= 0 {
                    return Err(invalid(format!("step must be positive, got {step}")));
                }
                if low > high {
                    return Err(invalid(format!("low {low} is above high {high}")));
                }
                let len = (i128::from(*high) - i128::from(*low)) / i128::from(*step) + 1;
                let len = usize::try_from(len)
                    .ok()
                    .filter(|len| *len <= MAX_GRID_SIZE)
                    .ok_or_else(too_large)?;
                ParameterAxis::stepped(self.name.clone(), *low, *step, len)
            }
            AxisKind::FloatRange { low, high, steps } => {
                if !low.is_finite() || !high.is_finite() {
                    return Err(invalid("bounds must be finite".to_string()));
                }
                if *steps > MAX_GRID_SIZE {
                    return Err(too_large());
                }
                let values: Vec<f64> = match *steps {
                    0 => return Err(invalid("steps must be at least 1".to_string())),
                    1 if low == high => vec![*low],
                    1 => {
                        return Err(invalid(
                            "a single step needs low == high".to_string(),
                        ))
                    }
                    n => (0..n)
                        .map(|i| {
                            if i == n - 1 {
                                return *high;
                            }
                            let t = i as f64 / (n - 1) as f64;
                            round_significant(low + t * (high - low))
                        })
                        .collect(),
                };
                ParameterAxis::new(self.name.clone(), values)
            }
        };

        if axis.is_empty() {
            return Err(ConfigError::EmptyAxis {
                axis: self.name.clone(),
            });
        }
        Ok(axis)
    }
}

/// Round to 12 significant digits, dropping linspace noise such as
/// `0.30000000000000004`.
fn round_significant(value: f64) -> f64 {
    format!("{value:.11e}").parse().unwrap_or(value)
}

/// The full search space: an ordered list of axis definitions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SearchSpace {
    pub axes: Vec<AxisDef>,
}

impl SearchSpace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_values<V: Into<ParameterValue>>(
        mut self,
        name: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.axes.push(AxisDef {
            name: name.into(),
            kind: AxisKind::Values(values.into_iter().map(Into::into).collect()),
        });
        self
    }

    pub fn add_int(mut self, name: impl Into<String>, low: i64, high: i64, step: i64) -> Self {
        self.axes.push(AxisDef {
            name: name.into(),
            kind: AxisKind::IntRange { low, high, step },
        });
        self
    }

    pub fn add_float(mut self, name: impl Into<String>, low: f64, high: f64, steps: usize) -> Self {
        self.axes.push(AxisDef {
            name: name.into(),
            kind: AxisKind::FloatRange { low, high, steps },
        });
        self
    }

    /// Resolve every axis, rejecting empty or duplicated ones.
    pub fn resolve(&self) -> Result<Grid, ConfigError> {
        let mut axes: Vec<ParameterAxis> = Vec::with_capacity(self.axes.len());
        for def in &self.axes {
            if axes.iter().any(|a| a.name == def.name) {
                return Err(ConfigError::DuplicateAxis {
                    axis: def.name.clone(),
                });
            }
            axes.push(def.resolve()?);
        }
        let grid = Grid::new(axes);
        match grid.size() {
            Some(size) if size <= MAX_GRID_SIZE => Ok(grid),
            _ => Err(ConfigError::GridOverflow {
                limit: MAX_GRID_SIZE,
            }),
        }
    }
}

/// Resolved axes, ready to be enumerated any number of times.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    axes: Vec<ParameterAxis>,
}

impl Grid {
    pub fn new(axes: Vec<ParameterAxis>) -> Self {
        Self { axes }
    }

    pub fn axes(&self) -> &[ParameterAxis] {
        &self.axes
    }

    /// Total number of combinations, `None` on overflow.
    pub fn size(&self) -> Option<usize> {
        self.axes
            .iter()
            .try_fold(1usize, |total, axis| total.checked_mul(axis.len()))
    }

    pub fn iter(&self) -> Combinations<'_> {
        combinations(&self.axes)
    }
}

/// Lazily walk the Cartesian product of `axes`.
///
/// The first axis varies slowest and the last axis fastest. No axes yields a
/// single empty combination; an axis without values yields nothing.
pub fn combinations(axes: &[ParameterAxis]) -> Combinations<'_> {
    let remaining = axes
        .iter()
        .try_fold(1usize, |total, axis| total.checked_mul(axis.len()));
    Combinations {
        axes,
        indices: vec![0; axes.len()],
        exhausted: remaining == Some(0),
        remaining,
    }
}

/// Iterator returned by [`combinations`].
#[derive(Debug, Clone)]
pub struct Combinations<'a> {
    axes: &'a [ParameterAxis],
    indices: Vec<usize>,
    exhausted: bool,
    remaining: Option<usize>,
}

impl Combinations<'_> {
    fn advance(&mut self) {
        for k in (0..self.axes.len()).rev() {
            self.indices[k] += 1;
            if self.indices[k] < self.axes[k].len() {
                return;
            }
            self.indices[k] = 0;
        }
        self.exhausted = true;
    }
}

impl Iterator for Combinations<'_> {
    type Item = Combination;

    fn next(&mut self) -> Option<Combination> {
        if self.exhausted {
            return None;
        }

        let mut assignments = Vec::with_capacity(self.axes.len());
        for (axis, &i) in self.axes.iter().zip(&self.indices) {
            assignments.push((axis.name.clone(), axis.value(i)?));
        }
        let combo = Combination::new(assignments);
        self.advance();
        if let Some(n) = self.remaining.as_mut() {
            *n = n.saturating_sub(1);
        }
        Some(combo)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self.remaining {
            Some(n) => (n, Some(n)),
            None => (usize::MAX, None),
        }
    }
}
