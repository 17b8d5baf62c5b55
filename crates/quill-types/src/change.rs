use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TypeError;
use crate::temporal::Timestamp;

/// A single change record: "at `time`, `field` became `value`".
///
/// Change records are immutable once written. An object's state is the
/// left fold of its change records in file order, last write wins per field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Change {
    pub time: Timestamp,
    pub field: String,
    pub value: Value,
}

impl Change {
    /// Build a change record, rejecting field names the line grammar cannot
    /// carry.
    pub fn new(time: Timestamp, field: impl Into<String>, value: Value) -> Result<Self, TypeError> {
        let field = field.into();
        if !is_valid_field(&field) {
            return Err(TypeError::InvalidField(field));
        }
        Ok(Self { time, field, value })
    }

    /// Build a change record stamped with the current time.
    pub fn now(field: impl Into<String>, value: Value) -> Result<Self, TypeError> {
        Self::new(Timestamp::now(), field, value)
    }
}

/// Field names are one or more word characters (`[A-Za-z0-9_]`).
pub fn is_valid_field(field: &str) -> bool {
    !field.is_empty() && field.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}
