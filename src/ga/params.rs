//! Operator-specific keyword parameters.
//!
//! Each operator category carries a free-form key/value map from the run
//! configuration. Operators read it through the typed accessors of
//! [`OperatorParams`], which also accept numbers written as text.

use crate::error::OperatorFailure;
use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A single parameter value.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<ParamValue>),
}

impl ParamValue {
    fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Int(v) => Some(*v as f64),
            ParamValue::Float(v) => Some(*v),
            ParamValue::Text(s) => s.trim().parse().ok(),
            ParamValue::Bool(_) | ParamValue::List(_) => None,
        }
    }

    fn as_row(&self) -> Option<Vec<f64>> {
        match self {
            ParamValue::List(items) => items.iter().map(ParamValue::as_f64).collect(),
            ParamValue::Text(s) => s
                .split(|c: char| c.is_whitespace() || c == ',')
                .filter(|t| !t.is_empty())
                .map(|t| t.parse().ok())
                .collect(),
            _ => None,
        }
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        ParamValue::Int(v as i64)
    }
}

impl From<usize> for ParamValue {
    fn from(v: usize) -> Self {
        ParamValue::Int(v as i64)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Text(v)
    }
}

impl From<Vec<f64>> for ParamValue {
    fn from(v: Vec<f64>) -> Self {
        ParamValue::List(v.into_iter().map(ParamValue::Float).collect())
    }
}

impl From<Vec<Vec<f64>>> for ParamValue {
    fn from(rows: Vec<Vec<f64>>) -> Self {
        ParamValue::List(rows.into_iter().map(ParamValue::from).collect())
    }
}

/// Keyword parameters of one operator.
///
/// # Examples
///
/// ```
/// use u_evolve::ga::OperatorParams;
///
/// let params = OperatorParams::new()
///     .with("tournament_size", 5)
///     .with("alpha", "0.25");
/// assert_eq!(params.usize_or("tournament_size", 3).unwrap(), 5);
/// assert_eq!(params.f64_or("alpha", 0.5).unwrap(), 0.25);
/// assert_eq!(params.f64_or("missing", 1.5).unwrap(), 1.5);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct OperatorParams {
    values: BTreeMap<String, ParamValue>,
}

impl OperatorParams {
    /// Creates an empty parameter map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a parameter (builder style).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Inserts or replaces a parameter.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        self.values.insert(key.into(), value.into());
    }

    /// Raw access to a parameter.
    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.values.get(key)
    }

    /// Whether the parameter is present.
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Whether no parameters are set.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Reads a real-valued parameter.
    pub fn f64(&self, key: &str) -> Result<Option<f64>, OperatorFailure> {
        match self.values.get(key) {
            None => Ok(None),
            Some(v) => v
                .as_f64()
                .filter(|x| !x.is_nan())
                .map(Some)
                .ok_or_else(|| OperatorFailure::new(format!("parameter `{key}` must be a number"))),
        }
    }

    /// Reads a real-valued parameter with a default.
    pub fn f64_or(&self, key: &str, default: f64) -> Result<f64, OperatorFailure> {
        Ok(self.f64(key)?.unwrap_or(default))
    }

    /// Reads a non-negative integer parameter.
    pub fn usize(&self, key: &str) -> Result<Option<usize>, OperatorFailure> {
        match self.f64(key)? {
            None => Ok(None),
            Some(x) if x >= 0.0 && x.fract() == 0.0 && x <= usize::MAX as f64 => {
                Ok(Some(x as usize))
            }
            Some(x) => Err(OperatorFailure::new(format!(
                "parameter `{key}` must be a non-negative integer, got {x}"
            ))),
        }
    }

    /// Reads a non-negative integer parameter with a default.
    pub fn usize_or(&self, key: &str, default: usize) -> Result<usize, OperatorFailure> {
        Ok(self.usize(key)?.unwrap_or(default))
    }

    /// Reads a required non-negative integer parameter.
    pub fn require_usize(&self, key: &str) -> Result<usize, OperatorFailure> {
        self.usize(key)?
            .ok_or_else(|| OperatorFailure::new(format!("missing required parameter `{key}`")))
    }

    /// Reads a text parameter.
    pub fn text(&self, key: &str) -> Option<&str> {
        match self.values.get(key) {
            Some(ParamValue::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Reads a list of rows of numbers.
    ///
    /// Accepts a list of lists, a flat list (one row), or text with rows
    /// separated by `;` and values separated by whitespace or commas.
    pub fn matrix(&self, key: &str) -> Result<Option<Vec<Vec<f64>>>, OperatorFailure> {
        let malformed = || OperatorFailure::new(format!("parameter `{key}` must be rows of numbers"));
        match self.values.get(key) {
            None => Ok(None),
            Some(ParamValue::List(items)) if items.iter().all(|i| matches!(i, ParamValue::List(_))) => {
                items
                    .iter()
                    .map(|row| row.as_row().ok_or_else(malformed))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Some)
            }
            Some(v @ ParamValue::List(_)) => v.as_row().map(|r| Some(vec![r])).ok_or_else(malformed),
            Some(ParamValue::Text(s)) => s
                .split(';')
                .filter(|row| !row.trim().is_empty())
                .map(|row| ParamValue::Text(row.to_string()).as_row().ok_or_else(malformed))
                .collect::<Result<Vec<_>, _>>()
                .map(Some),
            Some(_) => Err(malformed()),
        }
    }
}

impl<K: Into<String>, V: Into<ParamValue>> FromIterator<(K, V)> for OperatorParams {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_accessors() {
        let p = OperatorParams::new()
            .with("int", 4)
            .with("float", 0.5)
            .with("text", " 2.5 ")
            .with("flag", true);

        assert_eq!(p.f64("int").unwrap(), Some(4.0));
        assert_eq!(p.f64("float").unwrap(), Some(0.5));
        assert_eq!(p.f64("text").unwrap(), Some(2.5));
        assert!(p.f64("flag").is_err());
        assert_eq!(p.f64("absent").unwrap(), None);
    }

    #[test]
    fn test_usize_rejects_fractions_and_negatives() {
        let p = OperatorParams::new()
            .with("ok", "7")
            .with("frac", 2.5)
            .with("neg", -1);
        assert_eq!(p.usize("ok").unwrap(), Some(7));
        assert!(p.usize("frac").is_err());
        assert!(p.usize("neg").is_err());
        assert!(p.require_usize("absent").is_err());
    }

    #[test]
    fn test_matrix_forms() {
        let p = OperatorParams::new()
            .with("rows", vec![vec![1.0, 0.0], vec![0.0, 1.0]])
            .with("flat", vec![1.0, 2.0, 3.0])
            .with("text", "1 0 1; 0,1,1")
            .with("bad", "1 x");

        assert_eq!(
            p.matrix("rows").unwrap(),
            Some(vec![vec![1.0, 0.0], vec![0.0, 1.0]])
        );
        assert_eq!(p.matrix("flat").unwrap(), Some(vec![vec![1.0, 2.0, 3.0]]));
        assert_eq!(
            p.matrix("text").unwrap(),
            Some(vec![vec![1.0, 0.0, 1.0], vec![0.0, 1.0, 1.0]])
        );
        assert!(p.matrix("bad").is_err());
        assert_eq!(p.matrix("absent").unwrap(), None);
    }

    #[test]
    fn test_from_iterator() {
        let p: OperatorParams = [("a", 1), ("b", 2)].into_iter().collect();
        assert_eq!(p.usize_or("b", 0).unwrap(), 2);
        assert!(!p.is_empty());
        assert!(p.contains("a"));
    }
}
