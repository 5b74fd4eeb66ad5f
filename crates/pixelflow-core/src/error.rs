//! Request-level error taxonomy.
//!
//! Every failure the engine can report is a [`PipelineError`]. Inside the
//! multi-step pipeline all per-step errors are recovered (the step is
//! skipped); everywhere else they surface to the caller with a stable
//! [`ErrorKind`] and a readable message.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::codec::{DecodeError, EncodeError};

/// Machine-distinguishable error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    DecodeError,
    EncodeError,
    UnknownFamily,
    UnknownMethod,
    InvalidParameter,
    NotFound,
    StepFailure,
    StorageError,
    DeadlineExceeded,
    StepLimitExceeded,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DecodeError => "decode_error",
            Self::EncodeError => "encode_error",
            Self::UnknownFamily => "unknown_family",
            Self::UnknownMethod => "unknown_method",
            Self::InvalidParameter => "invalid_parameter",
            Self::NotFound => "not_found",
            Self::StepFailure => "step_failure",
            Self::StorageError => "storage_error",
            Self::DeadlineExceeded => "deadline_exceeded",
            Self::StepLimitExceeded => "step_limit_exceeded",
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{0}")]
    Decode(#[from] DecodeError),

    #[error("{0}")]
    Encode(#[from] EncodeError),

    #[error("Unknown operation family: {0}")]
    UnknownFamily(String),

    #[error("Unknown method '{method}' for family '{family}'")]
    UnknownMethod { family: String, method: String },

    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("Image not found: {0}")]
    NotFound(String),

    #[error("Step failed in {family}/{method}: {reason}")]
    StepFailure {
        family: String,
        method: String,
        reason: String,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Deadline exceeded after {elapsed_ms} ms")]
    DeadlineExceeded { elapsed_ms: u128 },

    #[error("Step limit of {limit} reached")]
    StepLimit { limit: usize },
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Decode(_) => ErrorKind::DecodeError,
            Self::Encode(_) => ErrorKind::EncodeError,
            Self::UnknownFamily(_) => ErrorKind::UnknownFamily,
            Self::UnknownMethod { .. } => ErrorKind::UnknownMethod,
            Self::InvalidParameter { .. } => ErrorKind::InvalidParameter,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::StepFailure { .. } => ErrorKind::StepFailure,
            Self::Storage(_) => ErrorKind::StorageError,
            Self::DeadlineExceeded { .. } => ErrorKind::DeadlineExceeded,
            Self::StepLimit { .. } => ErrorKind::StepLimitExceeded,
        }
    }

    pub(crate) fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            PipelineError::from(DecodeError::InvalidFormat).kind(),
            ErrorKind::DecodeError
        );
        assert_eq!(
            PipelineError::UnknownFamily("blur".into()).kind(),
            ErrorKind::UnknownFamily
        );
        assert_eq!(
            PipelineError::invalid("threshold", "out of range").kind(),
            ErrorKind::InvalidParameter
        );
    }

    #[test]
    fn test_messages() {
        let err = PipelineError::UnknownMethod {
            family: "threshold".into(),
            method: "magic".into(),
        };
        assert_eq!(
            err.to_string(),
            "Unknown method 'magic' for family 'threshold'"
        );
        let err = PipelineError::invalid("c", "must be an integer");
        assert_eq!(err.to_string(), "Invalid parameter 'c': must be an integer");
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        for kind in [
            ErrorKind::DecodeError,
            ErrorKind::UnknownMethod,
            ErrorKind::InvalidParameter,
            ErrorKind::DeadlineExceeded,
        ] {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }
}
