//! Parameter schema and caller-supplied parameter values.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// The shape a parameter value must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Integer,
    /// Integer forced to the next odd value when even (kernel/block sizes).
    OddInteger,
    Float,
    /// Row-major matrix of `rows * cols` finite numbers.
    Matrix { rows: usize, cols: usize },
}

impl ParamKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::OddInteger => "odd_integer",
            Self::Float => "float",
            Self::Matrix { .. } => "matrix",
        }
    }

    pub fn is_scalar(self) -> bool {
        !matches!(self, Self::Matrix { .. })
    }
}

/// One declared parameter of an operation.
///
/// A parameter without a default is required.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub default: Option<f64>,
}

impl ParamSpec {
    pub const fn int(name: &'static str, min: f64, max: f64, default: f64) -> Self {
        Self {
            name,
            kind: ParamKind::Integer,
            min: Some(min),
            max: Some(max),
            default: Some(default),
        }
    }

    pub const fn odd(name: &'static str, min: f64, max: f64, default: f64) -> Self {
        Self {
            name,
            kind: ParamKind::OddInteger,
            min: Some(min),
            max: Some(max),
            default: Some(default),
        }
    }

    pub const fn float(name: &'static str, min: f64, max: f64, default: f64) -> Self {
        Self {
            name,
            kind: ParamKind::Float,
            min: Some(min),
            max: Some(max),
            default: Some(default),
        }
    }

    pub const fn required_int(name: &'static str, min: f64, max: f64) -> Self {
        Self {
            name,
            kind: ParamKind::Integer,
            min: Some(min),
            max: Some(max),
            default: None,
        }
    }

    pub const fn matrix(name: &'static str, rows: usize, cols: usize) -> Self {
        Self {
            name,
            kind: ParamKind::Matrix { rows, cols },
            min: None,
            max: None,
            default: None,
        }
    }

    pub fn is_required(&self) -> bool {
        self.default.is_none()
    }
}

/// A raw parameter value as supplied by the caller.
///
/// Numeric strings are accepted for scalar parameters since form-based
/// clients send slider values as text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Number(f64),
    Rows(Vec<Vec<f64>>),
    List(Vec<f64>),
    Text(String),
    Bool(bool),
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<Vec<Vec<f64>>> for ParamValue {
    fn from(rows: Vec<Vec<f64>>) -> Self {
        Self::Rows(rows)
    }
}

/// Sparse caller parameters keyed by name.
pub type ParamMap = BTreeMap<String, ParamValue>;

/// A parameter value after validation.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    Scalar(f64),
    Matrix(Vec<f64>),
}

/// Complete, range-checked parameters for one method.
///
/// Every declared parameter of the method is present.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidatedParams {
    values: BTreeMap<&'static str, Resolved>,
}

impl ValidatedParams {
    pub(crate) fn insert(&mut self, name: &'static str, value: Resolved) {
        self.values.insert(name, value);
    }

    pub fn get(&self, name: &str) -> Option<&Resolved> {
        self.values.get(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn float(&self, name: &str) -> Result<f64> {
        match self.values.get(name) {
            Some(Resolved::Scalar(v)) => Ok(*v),
            Some(Resolved::Matrix(_)) => Err(PipelineError::invalid(name, "expected a number")),
            None => Err(PipelineError::invalid(name, "missing")),
        }
    }

    pub fn int(&self, name: &str) -> Result<i64> {
        self.float(name).map(|v| v as i64)
    }

    /// Integer parameter that is known to be positive (sizes, counts).
    pub fn size(&self, name: &str) -> Result<u32> {
        let v = self.int(name)?;
        u32::try_from(v).map_err(|_| PipelineError::invalid(name, "must be non-negative"))
    }

    pub fn matrix(&self, name: &str) -> Result<&[f64]> {
        match self.values.get(name) {
            Some(Resolved::Matrix(m)) => Ok(m),
            Some(Resolved::Scalar(_)) => Err(PipelineError::invalid(name, "expected a matrix")),
            None => Err(PipelineError::invalid(name, "missing")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_value_deserialization() {
        let map: ParamMap = serde_json::from_str(
            r#"{"a": 5, "b": 1.5, "c": "7", "m": [[1, 0, 0], [0, 1, 0]], "l": [1, 2], "f": true}"#,
        )
        .unwrap();
        assert_eq!(map["a"], ParamValue::Number(5.0));
        assert_eq!(map["b"], ParamValue::Number(1.5));
        assert_eq!(map["c"], ParamValue::Text("7".into()));
        assert_eq!(
            map["m"],
            ParamValue::Rows(vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]])
        );
        assert_eq!(map["l"], ParamValue::List(vec![1.0, 2.0]));
        assert_eq!(map["f"], ParamValue::Bool(true));
    }

    #[test]
    fn test_spec_constructors() {
        let spec = ParamSpec::required_int("width", 1.0, 16384.0);
        assert!(spec.is_required());
        assert!(spec.kind.is_scalar());
        let spec = ParamSpec::matrix("matrix", 2, 3);
        assert_eq!(spec.kind, ParamKind::Matrix { rows: 2, cols: 3 });
        assert!(!spec.kind.is_scalar());
        assert_eq!(ParamSpec::odd("k", 3.0, 15.0, 5.0).kind.as_str(), "odd_integer");
    }

    #[test]
    fn test_validated_accessors() {
        let mut params = ValidatedParams::default();
        params.insert("k", Resolved::Scalar(5.0));
        params.insert("m", Resolved::Matrix(vec![1.0; 6]));

        assert_eq!(params.int("k").unwrap(), 5);
        assert_eq!(params.size("k").unwrap(), 5);
        assert_eq!(params.matrix("m").unwrap().len(), 6);
        assert!(params.float("m").is_err());
        assert!(params.matrix("k").is_err());
        assert!(params.float("missing").is_err());
    }
}
