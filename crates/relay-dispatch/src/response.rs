//! Folds every dispatch outcome into a [`ResultEnvelope`].
//!
//! Editors answer in several shapes. A mapping with a truthy `success` is a
//! success; any other mapping is already an error report and is passed
//! through; anything else is reported as an unexpected shape. Dispatch
//! errors become failures whose message says what went wrong.

use serde_json::{Map, Value};

use crate::envelope::{DEFAULT_SUCCESS_MESSAGE, ResultEnvelope};
use crate::errors::DispatchError;

/// Message used when a failure reply carries no explanation.
pub const DEFAULT_FAILURE_MESSAGE: &str = "Editor reported a failure without a message.";

/// Key under which a failure reply's unusable `message` value is kept.
pub const DETAIL_KEY: &str = "detail";

/// Prefix of the message for replies that are not JSON objects.
pub const UNEXPECTED_SHAPE_PREFIX: &str = "Unexpected reply shape from editor: ";

/// Prefix of the message for calls that produced no reply.
pub const DISPATCH_FAILED_PREFIX: &str = "Dispatch failed: ";

/// Normalises a dispatch outcome.
#[must_use]
pub fn normalize(outcome: Result<Value, DispatchError>) -> ResultEnvelope {
    match outcome {
        Ok(Value::Object(reply)) => normalize_mapping(reply),
        Ok(other) => ResultEnvelope::failure(format!(
            "{UNEXPECTED_SHAPE_PREFIX}{}",
            describe(&other)
        )),
        Err(error) => ResultEnvelope::failure(format!("{DISPATCH_FAILED_PREFIX}{error}")),
    }
}

fn normalize_mapping(mut reply: Map<String, Value>) -> ResultEnvelope {
    let succeeded = reply.get("success").is_some_and(is_truthy);
    if succeeded {
        let message = non_empty_text(reply.get("message"))
            .unwrap_or(DEFAULT_SUCCESS_MESSAGE)
            .to_owned();
        return ResultEnvelope::success(message, reply.remove("data"));
    }

    reply.shift_remove("success");
    let message = match reply.shift_remove("message") {
        Some(Value::String(text)) if !text.trim().is_empty() => text,
        unused => {
            // A structured or blank message is kept for the caller.
            if let Some(original) = unused.filter(|value| !value.is_null()) {
                reply.entry(DETAIL_KEY).or_insert(original);
            }
            non_empty_text(reply.get("error"))
                .unwrap_or(DEFAULT_FAILURE_MESSAGE)
                .to_owned()
        }
    };
    let data = reply.shift_remove("data");
    let mut envelope = ResultEnvelope::failure(message);
    envelope.data = data;
    envelope.extra = reply;
    envelope
}

fn non_empty_text(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .filter(|text| !text.trim().is_empty())
}

/// JSON truthiness: `false`, `null`, zero and empty containers are falsy.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
