//! Wire types for requests and responses.
//!
//! Requests are tolerant: a method may sit at the top of a step or inside
//! `params` under the family's method key, and params arrive as arbitrary
//! JSON. Responses are `{"status": "success", ...}` or
//! `{"status": "error", "kind": ..., "message": ...}`.

use std::collections::BTreeMap;

use pixelflow_core::files::{CompressRequest, ConvertRequest, CropRequest, ResizeRequest};
use pixelflow_core::{
    codec, registry, FileTransformResult, OperationStep, ParamMap, ParamValue, PipelineError,
    StepReport,
};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

/// Error kind for requests that never reach the engine.
pub const INVALID_REQUEST: &str = "invalid_request";

/// `{"image": ..., "operations": [...]}`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProcessRequest {
    #[serde(default)]
    pub image: Option<String>,
    /// Kept raw so one malformed element only costs its own step.
    #[serde(default)]
    pub operations: Option<Vec<Value>>,
}

impl ProcessRequest {
    pub fn steps(&self) -> Option<Vec<OperationStep>> {
        self.operations
            .as_ref()
            .map(|ops| ops.iter().cloned().map(parse_step).collect())
    }
}

/// Normalize one raw `operations` element.
///
/// Elements that do not have the step shape still yield a step, marked
/// rejected, so the pipeline reports them as skipped by position.
pub fn parse_step(value: Value) -> OperationStep {
    let family = value
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    if !value.is_object() {
        return OperationStep::rejected(family, format!("malformed step: expected an object, got {value}"));
    }
    match serde_json::from_value::<StepDto>(value) {
        Ok(dto) => dto.into_step(),
        Err(err) => OperationStep::rejected(family, format!("malformed step: {err}")),
    }
}

/// One step as sent by clients.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StepDto {
    #[serde(rename = "type", default)]
    pub family: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub params: BTreeMap<String, Value>,
}

impl StepDto {
    /// Normalize into an engine step.
    ///
    /// The family's method key is lifted out of `params` when present, a
    /// top-level `method` taking precedence. Null params count as omitted;
    /// values of no recognizable shape are kept as text so validation
    /// rejects them by name.
    pub fn into_step(self) -> OperationStep {
        let family = self.family.unwrap_or_default();
        let mut params = self.params;

        let mut lifted = None;
        if let Ok(spec) = registry::lookup(&family) {
            if let Some(Value::String(name)) = params.get(spec.method_key) {
                lifted = Some(name.clone());
                params.remove(spec.method_key);
            }
        }
        let method = self.method.or(lifted);

        let params: ParamMap = params
            .into_iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(name, value)| {
                let param = serde_json::from_value::<ParamValue>(value.clone())
                    .unwrap_or_else(|_| ParamValue::Text(value.to_string()));
                (name, param)
            })
            .collect();

        OperationStep {
            family,
            method,
            params,
            rejected: None,
        }
    }
}

/// A request addressed by command, as used in batch files.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Request {
    Process(ProcessRequest),
    Filters,
    Health,
    Compress(CompressRequest),
    Resize(ResizeRequest),
    Crop(CropRequest),
    Convert(ConvertRequest),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorBody {
    pub kind: String,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<StepReport>,
}

/// Status envelope shared by every response.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Envelope<T> {
    Success(T),
    Error(ErrorBody),
}

impl<T> Envelope<T> {
    pub fn failure(err: &PipelineError) -> Self {
        Self::Error(ErrorBody {
            kind: err.kind().as_str().to_string(),
            message: err.to_string(),
            steps: Vec::new(),
        })
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::Error(ErrorBody {
            kind: INVALID_REQUEST.to_string(),
            message: message.into(),
            steps: Vec::new(),
        })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn error(&self) -> Option<&ErrorBody> {
        match self {
            Self::Error(body) => Some(body),
            Self::Success(_) => None,
        }
    }
}

impl<T, E: Into<PipelineError>> From<Result<T, E>> for Envelope<T> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Self::Success(value),
            Err(err) => Self::failure(&err.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessOutput {
    /// `data:image/png;base64,...`
    pub image: String,
    pub width: u32,
    pub height: u32,
    pub steps: Vec<StepReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub message: String,
}

/// File transform response; the size field is named per operation.
#[derive(Debug, Clone, PartialEq)]
pub struct FileOutput(pub FileTransformResult);

impl Serialize for FileOutput {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let r = &self.0;
        let mut map = serializer.serialize_map(Some(7))?;
        map.serialize_entry("image", &codec::to_base64(&r.bytes))?;
        map.serialize_entry("filename", &r.key)?;
        map.serialize_entry("format", &r.format)?;
        map.serialize_entry("original_size", &r.original_size_kb)?;
        map.serialize_entry(r.operation.size_field(), &r.transformed_size_kb)?;
        map.serialize_entry("width", &r.width)?;
        map.serialize_entry("height", &r.height)?;
        map.end()
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::{json, Map};

    fn json_value() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i32>().prop_map(|n| json!(n)),
            (-1e6f64..1e6).prop_map(|f| json!(f)),
            "[a-z0-9 .]{0,8}".prop_map(Value::String),
        ];
        leaf.prop_recursive(3, 16, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                prop::collection::btree_map("[a-z_]{1,8}", inner, 0..4)
                    .prop_map(|m| Value::Object(m.into_iter().collect::<Map<_, _>>())),
            ]
        })
    }

    proptest! {
        /// Property: any JSON element yields a step without panicking.
        #[test]
        fn prop_parse_step_total(value in json_value()) {
            let step = parse_step(value.clone());
            if !value.is_object() {
                prop_assert!(step.rejected.is_some());
            }
        }

        /// Property: a string under the family's method key is always lifted.
        #[test]
        fn prop_method_key_lifted(
            family_index in 0..registry::families().len(),
            method in "[a-z_]{1,12}",
            extra in prop::collection::btree_map("[a-z_]{1,8}", json_value(), 0..4),
        ) {
            let spec = &registry::families()[family_index];
            let mut params: Map<String, Value> = extra.into_iter().collect();
            params.insert(spec.method_key.to_string(), Value::String(method.clone()));

            let step = parse_step(json!({"type": spec.name(), "params": params.clone()}));
            prop_assert_eq!(step.rejected, None);
            prop_assert_eq!(step.method.as_deref(), Some(method.as_str()));
            prop_assert!(!step.params.contains_key(spec.method_key));
            for name in step.params.keys() {
                prop_assert!(params.get(name).is_some_and(|v| !v.is_null()));
            }
        }
    }
}
