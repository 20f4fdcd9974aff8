//! Scalar values carried by the scoreboard feed.

use serde::Serialize;
use serde_json::Value;

/// A leaf value of the scoreboard state tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StateValue {
    /// Explicit `null`; the scoreboard sends this when an element is removed.
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl StateValue {
    /// Convert a JSON leaf. Arrays and objects are not scoreboard values.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(StateValue::Null),
            Value::Bool(b) => Some(StateValue::Bool(*b)),
            Value::Number(n) => n
                .as_i64()
                .map(StateValue::Integer)
                .or_else(|| n.as_f64().map(StateValue::Float)),
            Value::String(s) => Some(StateValue::Text(s.clone())),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// Integer view: integers, integral floats and numeric text.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            StateValue::Integer(i) => Some(*i),
            StateValue::Float(f) if f.is_finite() && f.fract() == 0.0 => Some(*f as i64),
            StateValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            StateValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            StateValue::Bool(b) => Some(*b),
            StateValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl From<i64> for StateValue {
    fn from(v: i64) -> Self {
        StateValue::Integer(v)
    }
}

impl From<bool> for StateValue {
    fn from(v: bool) -> Self {
        StateValue::Bool(v)
    }
}

impl From<&str> for StateValue {
    fn from(v: &str) -> Self {
        StateValue::Text(v.to_string())
    }
}

impl From<String> for StateValue {
    fn from(v: String) -> Self {
        StateValue::Text(v)
    }
}
