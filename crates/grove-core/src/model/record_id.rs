use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::errors::{GroveError, Result};

/// Identifier of a node, content item or relation
///
/// Ids are either integers or non-empty strings. Strings holding an integer in
/// canonical form normalise to [`RecordId::Int`], so `"4"` and `4` address the
/// same record. Text such as `"007"` or `"+4"` stays [`RecordId::Text`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub enum RecordId {
    Int(i64),
    Text(String),
}

impl RecordId {
    /// Parse an id from text, normalising integer strings
    ///
    /// # Errors
    ///
    /// Returns `InvalidId` if the text is empty or whitespace-only.
    pub fn parse(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(GroveError::InvalidId {
                reason: "id must be provided and must be either number or string".to_string(),
            });
        }
        Ok(canonical_int(trimmed)
            .map(RecordId::Int)
            .unwrap_or_else(|| RecordId::Text(trimmed.to_string())))
    }

    /// Build an id from a JSON value
    ///
    /// # Errors
    ///
    /// Returns `InvalidId` for null, booleans, arrays, objects, non-integral
    /// numbers and empty strings.
    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(RecordId::Int).ok_or_else(|| {
                GroveError::InvalidId {
                    reason: format!("numeric id {} is not an integer", n),
                }
            }),
            Value::String(s) => Self::parse(s),
            other => Err(GroveError::InvalidId {
                reason: format!("id must be either number or string, got {}", other),
            }),
        }
    }

    /// JSON representation used when talking to a record store
    pub fn to_value(&self) -> Value {
        match self {
            RecordId::Int(n) => Value::from(*n),
            RecordId::Text(s) => Value::String(s.clone()),
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Int(n) => write!(f, "{}", n),
            RecordId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for RecordId {
    fn from(n: i64) -> Self {
        RecordId::Int(n)
    }
}

impl From<i32> for RecordId {
    fn from(n: i32) -> Self {
        RecordId::Int(i64::from(n))
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        match canonical_int(s.trim()) {
            Some(n) => RecordId::Int(n),
            None => RecordId::Text(s.to_string()),
        }
    }
}

impl TryFrom<Value> for RecordId {
    type Error = GroveError;

    fn try_from(value: Value) -> Result<Self> {
        Self::from_value(&value)
    }
}

impl From<RecordId> for Value {
    fn from(id: RecordId) -> Self {
        id.to_value()
    }
}

/// Integer value of `text` when printing it back yields the same text
fn canonical_int(text: &str) -> Option<i64> {
    text.parse::<i64>()
        .ok()
        .filter(|n| n.to_string() == text)
}

/// Render a list of ids for error messages
pub(crate) fn id_strings(ids: &[RecordId]) -> Vec<String> {
    ids.iter().map(ToString::to_string).collect()
}
