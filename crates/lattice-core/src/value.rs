use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// Key of the single-entry map that carries a non-finite float across the
/// worker protocol, where JSON has no literal for it.
pub const FLOAT_TAG: &str = "$float";

/// Data exchanged with candidate code: test inputs, expected outputs and
/// returned results.
///
/// Serializes as plain JSON, except that non-finite floats become the
/// strings `"Infinity"`, `"-Infinity"` and `"NaN"`.
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Rewrites non-finite floats into `{"$float": "inf"}` maps for the
    /// worker protocol.
    pub fn to_wire(&self) -> Value {
        match self {
            Value::Float(f) if !f.is_finite() => Value::Map(BTreeMap::from([(
                FLOAT_TAG.to_string(),
                Value::Str(python_float_repr(*f).to_string()),
            )])),
            Value::List(items) => Value::List(items.iter().map(Value::to_wire).collect()),
            Value::Map(map) => Value::Map(
                map.iter()
                    .map(|(key, value)| (key.clone(), value.to_wire()))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    /// Inverse of [`Value::to_wire`].
    pub fn from_wire(wire: Value) -> Value {
        match wire {
            Value::Map(map) => {
                if let Some(f) = tagged_float(&map) {
                    return Value::Float(f);
                }
                Value::Map(
                    map.into_iter()
                        .map(|(key, value)| (key, Value::from_wire(value)))
                        .collect(),
                )
            }
            Value::List(items) => Value::List(items.into_iter().map(Value::from_wire).collect()),
            other => other,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }
}

fn python_float_repr(f: f64) -> &'static str {
    if f.is_nan() {
        "nan"
    } else if f > 0.0 {
        "inf"
    } else {
        "-inf"
    }
}

fn tagged_float(map: &BTreeMap<String, Value>) -> Option<f64> {
    if map.len() != 1 {
        return None;
    }
    match map.get(FLOAT_TAG)? {
        Value::Str(text) => text.parse().ok(),
        _ => None,
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) if f.is_finite() => serializer.serialize_f64(*f),
            Value::Float(f) if f.is_nan() => serializer.serialize_str("NaN"),
            Value::Float(f) if *f > 0.0 => serializer.serialize_str("Infinity"),
            Value::Float(_) => serializer.serialize_str("-Infinity"),
            Value::Str(text) => serializer.serialize_str(text),
            Value::List(items) => items.serialize(serializer),
            Value::Map(map) => map.serialize(serializer),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match serde_json::to_string(self) {
            Ok(text) => f.write_str(&text),
            Err(_) => write!(f, "<{}>", self.type_name()),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::List(value)
    }
}
