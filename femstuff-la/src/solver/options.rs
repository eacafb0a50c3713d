use crate::Real;
use core::fmt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::str::FromStr;

pub const TYPE: &str = "type";
pub const POST_CHECK_SOLVES_SYSTEM: &str = "post_check_solves_system";
pub const PRE_CHECK_SYMMETRY: &str = "pre_check_symmetry";

/// Flat, ordered string-to-string map configuring one solve.
///
/// Values are kept as strings and parsed on demand by the typed getters. The mandatory key
/// `type` selects the algorithm.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SolverOptions {
    entries: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionError {
    Missing { key: String },
    Invalid { key: String, value: String },
}

impl fmt::Display for OptionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing { key } => write!(f, "missing option '{}'", key),
            Self::Invalid { key, value } => write!(f, "option '{}' has invalid value '{}'", key, value),
        }
    }
}

impl Error for OptionError {}

impl SolverOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options holding only the given solver type.
    pub fn with_type(solver_type: &str) -> Self {
        let mut options = Self::new();
        options.set(TYPE, solver_type);
        options
    }

    pub fn solver_type(&self) -> Option<&str> {
        self.get_str(TYPE)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl ToString) -> &mut Self {
        self.entries.insert(key.into(), value.to_string());
        self
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn get<V: FromStr>(&self, key: &str) -> Result<V, OptionError> {
        let value = self.get_str(key).ok_or_else(|| OptionError::Missing { key: key.to_string() })?;
        value.trim().parse().map_err(|_| OptionError::Invalid {
            key: key.to_string(),
            value: value.to_string(),
        })
    }

    /// Parses the value as `f64` and converts it to the scalar type.
    pub fn get_real<T: Real>(&self, key: &str) -> Result<T, OptionError> {
        self.get::<f64>(key).map(nalgebra::convert)
    }

    /// `self` layered on top of `defaults`: keys present in `self` win.
    pub fn merged_with_defaults(&self, defaults: &SolverOptions) -> SolverOptions {
        let mut merged = defaults.clone();
        merged.entries.extend(
            self.entries
                .iter()
                .map(|(key, value)| (key.clone(), value.clone())),
        );
        merged
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: ToString> FromIterator<(K, V)> for SolverOptions {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut options = Self::new();
        for (key, value) in iter {
            options.set(key, value);
        }
        options
    }
}

impl fmt::Display for SolverOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in self.iter() {
            writeln!(f, "  {} = {}", key, value)?;
        }
        Ok(())
    }
}
