//! Activity records and validated activity messages.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::Timestamp;
use crate::error::{ActivityError, Result};

/// A named unit of work tracked by ID from start to end.
///
/// Timestamps are append-only and kept in insertion order. They are usually
/// non-decreasing but nothing enforces it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    id: u64,
    message: String,
    timestamps: Vec<Timestamp>,
}

impl Activity {
    pub(crate) fn new(id: u64, message: ActivityMessage) -> Self {
        Self {
            id,
            message: message.into_inner(),
            timestamps: Vec::new(),
        }
    }

    /// Build an activity record directly, e.g. to exercise a custom formatter.
    pub fn from_parts(id: u64, message: impl Into<String>, timestamps: Vec<Timestamp>) -> Self {
        Self {
            id,
            message: message.into(),
            timestamps,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn timestamps(&self) -> &[Timestamp] {
        &self.timestamps
    }

    pub fn first_timestamp(&self) -> Option<Timestamp> {
        self.timestamps.first().copied()
    }

    pub fn last_timestamp(&self) -> Option<Timestamp> {
        self.timestamps.last().copied()
    }

    /// Milliseconds between the first and last mark.
    ///
    /// Zero when the activity was marked fewer than two times, or when the
    /// clock went backwards between them.
    pub fn elapsed_ms(&self) -> u64 {
        match (self.first_timestamp(), self.last_timestamp()) {
            (Some(first), Some(last)) => last.millis_since(first),
            _ => 0,
        }
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.elapsed_ms())
    }

    pub(crate) fn push(&mut self, timestamp: Timestamp) {
        self.timestamps.push(timestamp);
    }
}

/// A non-empty activity message.
///
/// Typed callers pass `&str` or `String`. Callers holding loosely typed input
/// can convert a `serde_json::Value` or an `Option<&str>`; a missing value or
/// a non-string value is rejected with [`ActivityError::InvalidArgument`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityMessage(String);

impl ActivityMessage {
    pub fn new(message: impl Into<String>) -> Result<Self> {
        let message = message.into();
        if message.is_empty() {
            return Err(ActivityError::invalid_argument(
                "activity message must not be empty",
            ));
        }
        Ok(Self(message))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl TryFrom<&str> for ActivityMessage {
    type Error = ActivityError;

    fn try_from(message: &str) -> Result<Self> {
        Self::new(message)
    }
}

impl TryFrom<String> for ActivityMessage {
    type Error = ActivityError;

    fn try_from(message: String) -> Result<Self> {
        Self::new(message)
    }
}

impl TryFrom<Option<&str>> for ActivityMessage {
    type Error = ActivityError;

    fn try_from(message: Option<&str>) -> Result<Self> {
        match message {
            Some(message) => Self::new(message),
            None => Err(ActivityError::invalid_argument(
                "activity message is missing",
            )),
        }
    }
}

impl TryFrom<serde_json::Value> for ActivityMessage {
    type Error = ActivityError;

    fn try_from(value: serde_json::Value) -> Result<Self> {
        use serde_json::Value;

        let kind = match value {
            Value::String(message) => return Self::new(message),
            Value::Null => {
                return Err(ActivityError::invalid_argument(
                    "activity message is missing",
                ));
            }
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        };
        Err(ActivityError::invalid_argument(format!(
            "activity message must be a string, got {kind}"
        )))
    }
}

impl AsRef<str> for ActivityMessage {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
