//! Checks caller parameters against a method's schema.

use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::params::{ParamKind, ParamMap, ParamSpec, ParamValue, Resolved, ValidatedParams};
use crate::registry::Method;

/// Validate `params` for `method`, filling in defaults.
///
/// # Errors
///
/// `InvalidParameter` for an unknown name, a value of the wrong kind, a
/// value outside the declared range, or a missing required parameter.
pub fn validate(method: Method, params: &ParamMap) -> Result<ValidatedParams> {
    let schema = method.params();

    if let Some(unknown) = params
        .keys()
        .find(|name| !schema.iter().any(|spec| spec.name == name.as_str()))
    {
        return Err(PipelineError::invalid(
            unknown.as_str(),
            format!("not a parameter of {method}"),
        ));
    }

    let mut validated = ValidatedParams::default();
    for spec in schema {
        let value = match params.get(spec.name) {
            Some(raw) => check(spec, raw)?,
            None => match spec.default {
                Some(default) => Resolved::Scalar(default),
                None => return Err(PipelineError::invalid(spec.name, "is required")),
            },
        };
        validated.insert(spec.name, value);
    }

    debug!(%method, supplied = params.len(), "validated parameters");
    Ok(validated)
}

fn check(spec: &ParamSpec, raw: &ParamValue) -> Result<Resolved> {
    match spec.kind {
        ParamKind::Matrix { rows, cols } => matrix(spec.name, rows, cols, raw).map(Resolved::Matrix),
        kind => {
            let mut value = scalar(spec.name, raw)?;
            if matches!(kind, ParamKind::Integer | ParamKind::OddInteger) && value.fract() != 0.0 {
                return Err(PipelineError::invalid(spec.name, "must be an integer"));
            }
            check_range(spec, value)?;
            if kind == ParamKind::OddInteger && (value as i64) % 2 == 0 {
                value += 1.0;
            }
            Ok(Resolved::Scalar(value))
        }
    }
}

fn scalar(name: &str, raw: &ParamValue) -> Result<f64> {
    let value = match raw {
        ParamValue::Number(v) => *v,
        ParamValue::Text(text) => text
            .trim()
            .parse::<f64>()
            .map_err(|_| PipelineError::invalid(name, format!("'{text}' is not a number")))?,
        ParamValue::Rows(_) | ParamValue::List(_) => {
            return Err(PipelineError::invalid(name, "expected a number, got a list"))
        }
        ParamValue::Bool(_) => {
            return Err(PipelineError::invalid(name, "expected a number, got a boolean"))
        }
    };
    if !value.is_finite() {
        return Err(PipelineError::invalid(name, "must be finite"));
    }
    Ok(value)
}

fn check_range(spec: &ParamSpec, value: f64) -> Result<()> {
    let below = spec.min.is_some_and(|min| value < min);
    let above = spec.max.is_some_and(|max| value > max);
    if below || above {
        return Err(PipelineError::invalid(
            spec.name,
            format!(
                "{value} is outside [{}, {}]",
                spec.min.unwrap_or(f64::NEG_INFINITY),
                spec.max.unwrap_or(f64::INFINITY)
            ),
        ));
    }
    Ok(())
}

fn matrix(name: &str, rows: usize, cols: usize, raw: &ParamValue) -> Result<Vec<f64>> {
    let flat: Vec<f64> = match raw {
        ParamValue::Rows(data) => {
            if data.len() != rows || data.iter().any(|row| row.len() != cols) {
                return Err(PipelineError::invalid(
                    name,
                    format!("expected a {rows}x{cols} matrix"),
                ));
            }
            data.iter().flatten().copied().collect()
        }
        ParamValue::List(data) => {
            if data.len() != rows * cols {
                return Err(PipelineError::invalid(
                    name,
                    format!("expected {} values, got {}", rows * cols, data.len()),
                ));
            }
            data.clone()
        }
        _ => return Err(PipelineError::invalid(name, "expected a matrix")),
    };
    if flat.iter().any(|v| !v.is_finite()) {
        return Err(PipelineError::invalid(name, "matrix entries must be finite"));
    }
    Ok(flat)
}
