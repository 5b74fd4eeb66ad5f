//! Capabilities listing built from the operation registry.
//!
//! Serialized straight from the static catalog so families, methods and
//! parameters appear in catalog order.

use pixelflow_core::registry::{self, FamilySpec};
use pixelflow_core::{ParamKind, ParamSpec};
use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Serialize, Serializer};

/// `{family: {methods, default_method, method_key, params}}` for every family.
///
/// Families whose methods take different parameters also carry
/// `method_params`, one schema per method.
#[derive(Debug, Clone, Copy, Default)]
pub struct Capabilities;

impl Serialize for Capabilities {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let families = registry::families();
        let mut map = serializer.serialize_map(Some(families.len()))?;
        for spec in families {
            map.serialize_entry(spec.name(), &FamilyEntry(spec))?;
        }
        map.end()
    }
}

struct FamilyEntry(&'static FamilySpec);

impl Serialize for FamilyEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let spec = self.0;
        let methods: Vec<&str> = spec.methods().iter().map(|m| m.name()).collect();
        let per_method = spec.has_method_schemas();
        let mut s = serializer.serialize_struct("Family", if per_method { 5 } else { 4 })?;
        s.serialize_field("methods", &methods)?;
        s.serialize_field("default_method", spec.default_method.name())?;
        s.serialize_field("method_key", spec.method_key)?;
        s.serialize_field("params", &ParamsEntry(spec.params()))?;
        if per_method {
            s.serialize_field("method_params", &MethodParamsEntry(spec))?;
        }
        s.end()
    }
}

struct MethodParamsEntry(&'static FamilySpec);

impl Serialize for MethodParamsEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let methods = self.0.methods();
        let mut map = serializer.serialize_map(Some(methods.len()))?;
        for method in methods {
            map.serialize_entry(method.name(), &ParamsEntry(method.params().iter().collect()))?;
        }
        map.end()
    }
}

struct ParamsEntry(Vec<&'static ParamSpec>);

impl Serialize for ParamsEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for spec in &self.0 {
            map.serialize_entry(spec.name, &ParamEntry(spec))?;
        }
        map.end()
    }
}

struct ParamEntry(&'static ParamSpec);

/// Integer parameters print as integers.
#[derive(Serialize)]
#[serde(untagged)]
enum Bound {
    Int(i64),
    Float(f64),
}

impl ParamEntry {
    fn bound(&self, value: f64) -> Bound {
        match self.0.kind {
            ParamKind::Integer | ParamKind::OddInteger => Bound::Int(value as i64),
            _ => Bound::Float(value),
        }
    }
}

impl Serialize for ParamEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let spec = self.0;
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("kind", spec.kind.as_str())?;
        if let Some(min) = spec.min {
            map.serialize_entry("min", &self.bound(min))?;
        }
        if let Some(max) = spec.max {
            map.serialize_entry("max", &self.bound(max))?;
        }
        if let Some(default) = spec.default {
            map.serialize_entry("default", &self.bound(default))?;
        }
        if spec.is_required() {
            map.serialize_entry("required", &true)?;
        }
        if let ParamKind::Matrix { rows, cols } = spec.kind {
            map.serialize_entry("shape", &[rows, cols])?;
        }
        map.end()
    }
}
