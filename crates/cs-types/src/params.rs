//! Sweep axes and the combinations drawn from them.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::args::ArgumentSet;

/// A concrete parameter value on an axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            // Debug keeps the decimal point on whole floats ("1.0", not "1").
            Self::Float(v) => write!(f, "{v:?}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

impl From<i64> for ParameterValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for ParameterValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for ParameterValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

/// One swept dimension: a flag name and its ordered values.
///
/// Integer ranges stay arithmetic, so a wide axis costs nothing until it
/// is walked.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterAxis {
    pub name: String,
    values: AxisValues,
}

#[derive(Debug, Clone, PartialEq)]
enum AxisValues {
    Listed(Vec<ParameterValue>),
    /// `len` integers starting at `start`, `step` apart.
    Stepped { start: i64, step: i64, len: usize },
}

impl ParameterAxis {
    pub fn new<V: Into<ParameterValue>>(
        name: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self {
            name: name.into(),
            values: AxisValues::Listed(values.into_iter().map(Into::into).collect()),
        }
    }

    /// `len` integers `start, start + step, ...`.
    pub fn stepped(name: impl Into<String>, start: i64, step: i64, len: usize) -> Self {
        Self {
            name: name.into(),
            values: AxisValues::Stepped { start, step, len },
        }
    }

    pub fn len(&self) -> usize {
        match &self.values {
            AxisValues::Listed(values) => values.len(),
            AxisValues::Stepped { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value at `index`, `None` past the end.
    pub fn value(&self, index: usize) -> Option<ParameterValue> {
        match &self.values {
            AxisValues::Listed(values) => values.get(index).cloned(),
            AxisValues::Stepped { start, step, len } => {
                if index >= *len {
                    return None;
                }
                let offset = step.checked_mul(i64::try_from(index).ok()?)?;
                start.checked_add(offset).map(ParameterValue::Int)
            }
        }
    }

    pub fn values(&self) -> impl Iterator<Item = ParameterValue> + '_ {
        (0..self.len()).map_while(move |i| self.value(i))
    }
}

/// One value per axis, in axis-definition order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Combination {
    assignments: Vec<(String, ParameterValue)>,
}

impl Combination {
    pub fn new(assignments: Vec<(String, ParameterValue)>) -> Self {
        Self { assignments }
    }

    pub fn get(&self, name: &str) -> Option<&ParameterValue> {
        self.assignments
            .iter()
            .find(|(axis, _)| axis == name)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParameterValue)> {
        self.assignments
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    pub fn values(&self) -> impl Iterator<Item = &ParameterValue> {
        self.assignments.iter().map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// Copy `base` and overwrite it with this combination's values.
    ///
    /// The returned set is owned by the caller; `base` is never touched.
    pub fn apply(&self, base: &ArgumentSet) -> ArgumentSet {
        let mut args = base.clone();
        for (name, value) in &self.assignments {
            args.set(name.as_str(), value.to_string());
        }
        args
    }
}

impl fmt::Display for Combination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, value)) in self.assignments.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{name}={value}")?;
        }
        Ok(())
    }
}
