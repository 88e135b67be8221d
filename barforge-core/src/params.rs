//! Late-bound parameter store.
//!
//! Every parameterizable object (strategies under optimization, analyzers)
//! can be configured through a name → tagged-value map. Typed components
//! keep their own structs with baked-in defaults; this store is the narrow
//! interface the optimizer drives `set_param` through.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A tagged parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    None,
}

impl ParamValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            ParamValue::Bool(_) => "bool",
            ParamValue::Int(_) => "int",
            ParamValue::Float(_) => "float",
            ParamValue::Str(_) => "str",
            ParamValue::None => "none",
        }
    }

    /// Numeric view: ints widen to float, everything else is rejected.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Int(i) => Some(*i as f64),
            ParamValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<usize> for ParamValue {
    fn from(v: usize) -> Self {
        ParamValue::Int(v as i64)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Str(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Str(v)
    }
}

/// Ordered name → value map. BTreeMap keeps optimization result rows
/// printable in a stable key order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Params {
    values: BTreeMap<String, ParamValue>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.set(name, value);
        self
    }

    pub fn has(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn raw(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    /// Failing lookup: a missing key is a programming error at the caller.
    pub fn get(&self, name: &str) -> Result<&ParamValue> {
        self.values
            .get(name)
            .ok_or_else(|| Error::ParamNotFound(name.to_string()))
    }

    pub fn get_f64(&self, name: &str) -> Result<f64> {
        let v = self.get(name)?;
        v.as_f64().ok_or_else(|| Error::ParamType {
            name: name.to_string(),
            expected: "float",
            actual: v.type_name(),
        })
    }

    pub fn get_i64(&self, name: &str) -> Result<i64> {
        let v = self.get(name)?;
        v.as_i64().ok_or_else(|| Error::ParamType {
            name: name.to_string(),
            expected: "int",
            actual: v.type_name(),
        })
    }

    pub fn get_bool(&self, name: &str) -> Result<bool> {
        let v = self.get(name)?;
        v.as_bool().ok_or_else(|| Error::ParamType {
            name: name.to_string(),
            expected: "bool",
            actual: v.type_name(),
        })
    }

    pub fn get_or_f64(&self, name: &str, default: f64) -> f64 {
        self.values
            .get(name)
            .and_then(ParamValue::as_f64)
            .unwrap_or(default)
    }

    pub fn get_or_i64(&self, name: &str, default: i64) -> i64 {
        self.values
            .get(name)
            .and_then(ParamValue::as_i64)
            .unwrap_or(default)
    }

    pub fn get_or_bool(&self, name: &str, default: bool) -> bool {
        self.values
            .get(name)
            .and_then(ParamValue::as_bool)
            .unwrap_or(default)
    }

    /// Add keys from `other` only where absent (parameter inheritance).
    pub fn merge(&mut self, other: &Params) {
        for (k, v) in &other.values {
            self.values.entry(k.clone()).or_insert_with(|| v.clone());
        }
    }

    /// Write `other` through unconditionally (user overrides).
    pub fn override_with(&mut self, other: &Params) {
        for (k, v) in &other.values {
            self.values.insert(k.clone(), v.clone());
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
