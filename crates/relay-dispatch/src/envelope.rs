//! Wire-facing data model: the command envelope sent to an editor and the
//! canonical result envelope returned to callers.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Default message attached to successful replies that carry none.
pub const DEFAULT_SUCCESS_MESSAGE: &str = "Operation successful.";

/// A single normalised parameter value.
///
/// Loosely typed caller input is coerced into one of these variants before it
/// reaches the dispatcher, so the envelope stays type-strict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Explicit JSON `null`.
    Null,
    /// Boolean flag.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// UTF-8 text.
    Str(String),
    /// Structured value forwarded verbatim.
    Json(Value),
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<Value> for ParamValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(flag) => Self::Bool(flag),
            Value::String(text) => Self::Str(text),
            Value::Number(number) => match number.as_i64() {
                Some(integer) => Self::Int(integer),
                None => Self::Json(Value::Number(number)),
            },
            other @ (Value::Array(_) | Value::Object(_)) => Self::Json(other),
        }
    }
}

/// Ordered parameter map; keys appear only for supplied arguments.
pub type Params = IndexMap<String, ParamValue>;

/// Command sent to an editor instance.
///
/// `action` is opaque to the relay and is forwarded even when empty;
/// validating it is the caller's job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandEnvelope {
    /// Command identifier understood by the editor.
    pub action: String,
    /// Normalised parameters.
    #[serde(default)]
    pub params: Params,
}

impl CommandEnvelope {
    /// Builds an envelope from an action and its parameters.
    pub fn new(action: impl Into<String>, params: Params) -> Self {
        Self {
            action: action.into(),
            params,
        }
    }

    /// Serialises the envelope into the bytes handed to a transport.
    ///
    /// # Errors
    ///
    /// Returns the serde error when a parameter cannot be encoded.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

/// Canonical answer returned for every command.
///
/// Either `success` is `true` and `data` may hold the editor's payload, or
/// `success` is `false` and `message` explains the failure. `message` is never
/// empty. Diagnostic fields carried by an editor failure reply are kept in
/// `extra` and flattened back out when serialised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEnvelope {
    /// Whether the command succeeded.
    pub success: bool,
    /// Human-readable outcome description.
    pub message: String,
    /// Payload returned by the editor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Additional fields from a passed-through failure reply.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ResultEnvelope {
    /// Builds a success envelope.
    pub fn success(message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
            extra: Map::new(),
        }
    }

    /// Builds a failure envelope with no payload.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            extra: Map::new(),
        }
    }

    /// Converts the envelope into a JSON value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut object = Map::new();
        object.insert(String::from("success"), Value::Bool(self.success));
        object.insert(String::from("message"), Value::String(self.message.clone()));
        if let Some(data) = &self.data {
            object.insert(String::from("data"), data.clone());
        }
        for (key, value) in &self.extra {
            object.entry(key.clone()).or_insert_with(|| value.clone());
        }
        Value::Object(object)
    }
}
