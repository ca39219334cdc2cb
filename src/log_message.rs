use crate::error::ConsumerError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::Write;

/// Printed in place of a field that is missing or `null`.
pub const ABSENT: &str = "None";

/// Known record keys paired with the label they are printed under, in display order.
pub const FIELDS: [(&str, &str); 7] = [
    ("User", "User Info"),
    ("OS", "OS"),
    ("Device Model", "Device Model"),
    ("Geolocation Data", "Geolocation Data"),
    ("Accelerometer Data", "Accelerometer Data"),
    ("Available Devices", "Available Devices"),
    ("Wi-Fi Signal Strength", "Wi-Fi Signal Strength"),
];

/// One device log record as published to the queue.
///
/// Every key is optional and values are kept as loosely-typed JSON. Keys
/// outside [`FIELDS`] are retained but never displayed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogMessage {
    fields: Map<String, Value>,
}

impl LogMessage {
    /// Decodes a raw delivery body: UTF-8 text holding a JSON object.
    pub fn from_payload(payload: &[u8]) -> Result<Self, ConsumerError> {
        let text = std::str::from_utf8(payload)?;
        match serde_json::from_str::<Value>(text)? {
            Value::Object(fields) => Ok(Self { fields }),
            other => Err(ConsumerError::NotAnObject(json_kind(&other))),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    /// Renders the seven labeled lines, newline-terminated, as one block.
    pub fn render(&self) -> String {
        let mut block = String::new();
        for (key, label) in FIELDS {
            // Writing into a String cannot fail.
            let _ = writeln!(block, "{}: {}", label, display_value(self.get(key)));
        }
        block
    }

    pub fn to_payload(&self) -> Result<Vec<u8>, ConsumerError> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// Strings print bare and `null` or a missing key prints [`ABSENT`].
/// Any other value prints as compact JSON, so `true` stays `true` and an
/// array prints as `["a","b"]`.
fn display_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => ABSENT.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
