//! Coercion of loosely typed caller input into [`Params`].
//!
//! Callers hand over booleans and integers as native JSON values, numbers, or
//! strings. Each coercion returns `None` for input it cannot interpret so the
//! field is omitted from the envelope instead of failing the command.
//!
//! Accepted boolean spellings (trimmed, ASCII case-insensitive):
//!
//! | true   | false   |
//! |--------|---------|
//! | `true` | `false` |
//! | `1`    | `0`     |
//! | `yes`  | `no`    |
//! | `on`   | `off`   |
//!
//! Native integers `1` and `0` are accepted as well.

use serde_json::Value;

use crate::envelope::{ParamValue, Params};

/// Coerces a raw value into a boolean.
#[must_use]
pub fn coerce_bool(raw: Option<&Value>) -> Option<bool> {
    match raw? {
        Value::Bool(flag) => Some(*flag),
        Value::Number(number) => match number.as_i64() {
            Some(1) => Some(true),
            Some(0) => Some(false),
            _ => None,
        },
        Value::String(text) => parse_bool(text),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Coerces a raw value into an integer.
///
/// `default` is returned only when the input is absent (or JSON `null`);
/// input that is present but not numeric yields `None`.
#[must_use]
pub fn coerce_int(raw: Option<&Value>, default: Option<i64>) -> Option<i64> {
    match raw {
        None | Some(Value::Null) => default,
        Some(Value::Number(number)) => number
            .as_i64()
            .or_else(|| number.as_f64().and_then(integral_float)),
        Some(Value::String(text)) => parse_int(text.trim()),
        Some(Value::Bool(_) | Value::Array(_) | Value::Object(_)) => None,
    }
}

fn parse_int(text: &str) -> Option<i64> {
    if text.is_empty() {
        return None;
    }
    text.parse::<i64>()
        .ok()
        .or_else(|| text.parse::<f64>().ok().and_then(integral_float))
}

// Range and fraction are checked before the cast.
fn integral_float(value: f64) -> Option<i64> {
    let in_range = value >= i64::MIN as f64 && value < i64::MAX as f64;
    (value.is_finite() && value.fract() == 0.0 && in_range).then_some(value as i64)
}

/// Builds a [`Params`] map, keeping only fields that resolved to a value.
#[derive(Debug, Default, Clone)]
pub struct ParamsBuilder {
    params: Params,
}

impl ParamsBuilder {
    /// Starts an empty parameter map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies `value` verbatim when present and non-empty.
    #[must_use]
    pub fn text(mut self, key: &str, value: Option<&str>) -> Self {
        if let Some(text) = value.filter(|text| !text.is_empty()) {
            self.params
                .insert(key.to_owned(), ParamValue::Str(text.to_owned()));
        }
        self
    }

    /// Adds a boolean coerced from `raw`.
    #[must_use]
    pub fn flag(mut self, key: &str, raw: Option<&Value>) -> Self {
        if let Some(flag) = coerce_bool(raw) {
            self.params.insert(key.to_owned(), ParamValue::Bool(flag));
        }
        self
    }

    /// Adds an integer coerced from `raw`, falling back to `default` when absent.
    #[must_use]
    pub fn integer(mut self, key: &str, raw: Option<&Value>, default: Option<i64>) -> Self {
        if let Some(integer) = coerce_int(raw, default) {
            self.params.insert(key.to_owned(), ParamValue::Int(integer));
        }
        self
    }

    /// Adds an already-typed value.
    #[must_use]
    pub fn value(mut self, key: &str, value: ParamValue) -> Self {
        self.params.insert(key.to_owned(), value);
        self
    }

    /// Finishes the map.
    #[must_use]
    pub fn build(self) -> Params {
        self.params
    }
}
