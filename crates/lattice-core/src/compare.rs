use crate::value::Value;
use serde::{Deserialize, Serialize};

const FLOAT_DECIMALS: usize = 6;

/// How a list result is matched against a list expectation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareMode {
    #[default]
    Ordered,
    /// The outermost list is compared as a multiset.
    Unordered,
}

/// Rounds every float to six decimal digits, recursing into lists and maps.
pub fn normalize(value: &Value) -> Value {
    match value {
        Value::Float(f) => Value::Float(round_decimal(*f)),
        Value::List(items) => Value::List(items.iter().map(normalize).collect()),
        Value::Map(map) => Value::Map(
            map.iter()
                .map(|(key, value)| (key.clone(), normalize(value)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn round_decimal(value: f64) -> f64 {
    if !value.is_finite() {
        return value;
    }
    format!("{value:.FLOAT_DECIMALS$}")
        .parse()
        .unwrap_or(value)
}

/// Numeric view of a value under Python's `==`: `True` is `1`.
enum Number {
    Int(i64),
    Float(f64),
}

fn number(value: &Value) -> Option<Number> {
    match value {
        Value::Bool(b) => Some(Number::Int(i64::from(*b))),
        Value::Int(i) => Some(Number::Int(*i)),
        Value::Float(f) => Some(Number::Float(*f)),
        _ => None,
    }
}

/// Exact integer/float equality, without rounding the integer to a float.
fn int_equals_float(i: i64, f: f64) -> bool {
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    f.fract() == 0.0 && (-LIMIT..LIMIT).contains(&f) && f as i64 == i
}

fn numbers_equal(left: Number, right: Number) -> bool {
    match (left, right) {
        (Number::Int(a), Number::Int(b)) => a == b,
        (Number::Float(a), Number::Float(b)) => a == b,
        (Number::Int(i), Number::Float(f)) | (Number::Float(f), Number::Int(i)) => {
            int_equals_float(i, f)
        }
    }
}

/// Structural equality with Python's numeric rules: booleans, integers and
/// floats compare by value.
pub fn values_equal(left: &Value, right: &Value) -> bool {
    if let (Some(a), Some(b)) = (number(left), number(right)) {
        return numbers_equal(a, b);
    }
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::Str(a), Value::Str(b)) => a == b,
        (Value::List(a), Value::List(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y))
        }
        (Value::Map(a), Value::Map(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(key, x)| b.get(key).is_some_and(|y| values_equal(x, y)))
        }
        _ => false,
    }
}

fn multiset_equal(actual: &[Value], expected: &[Value]) -> bool {
    let mut used = vec![false; expected.len()];
    actual.iter().all(|item| {
        let slot = expected
            .iter()
            .enumerate()
            .position(|(i, candidate)| !used[i] && values_equal(item, candidate));
        match slot {
            Some(i) => {
                used[i] = true;
                true
            }
            None => false,
        }
    })
}

pub fn compare(actual: &Value, expected: &Value, mode: CompareMode) -> bool {
    if expected.is_null() {
        return actual.is_null();
    }
    let actual = normalize(actual);
    let expected = normalize(expected);
    match (&actual, &expected) {
        (Value::List(a), Value::List(e)) if a.len() != e.len() => false,
        (Value::List(a), Value::List(e)) if mode == CompareMode::Unordered => multiset_equal(a, e),
        _ => values_equal(&actual, &expected),
    }
}
