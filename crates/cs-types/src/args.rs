//! Ordered solver arguments.

use serde::{Deserialize, Serialize};

/// An ordered mapping from flag name to value.
///
/// Insertion order defines the argv handed to the solver. Overwriting an
/// existing flag keeps its original position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<(String, String)>", into = "Vec<(String, String)>")]
pub struct ArgumentSet {
    entries: Vec<(String, String)>,
}

impl ArgumentSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `flag` to `value`, replacing in place or appending at the end.
    pub fn set(&mut self, flag: impl Into<String>, value: impl Into<String>) {
        let flag = flag.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(name, _)| *name == flag) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((flag, value)),
        }
    }

    pub fn with(mut self, flag: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(flag, value);
        self
    }

    pub fn get(&self, flag: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(name, _)| name == flag)
            .map(|(_, value)| value.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// Flatten to `[flag, value, flag, value, ...]`.
    pub fn to_tokens(&self) -> Vec<String> {
        self.entries
            .iter()
            .flat_map(|(name, value)| [name.clone(), value.clone()])
            .collect()
    }
}

impl From<Vec<(String, String)>> for ArgumentSet {
    fn from(pairs: Vec<(String, String)>) -> Self {
        let mut args = ArgumentSet::new();
        for (flag, value) in pairs {
            args.set(flag, value);
        }
        args
    }
}

impl From<ArgumentSet> for Vec<(String, String)> {
    fn from(args: ArgumentSet) -> Self {
        args.entries
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for ArgumentSet {
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a str)>>(iter: I) -> Self {
        let mut args = ArgumentSet::new();
        for (flag, value) in iter {
            args.set(flag, value);
        }
        args
    }
}
