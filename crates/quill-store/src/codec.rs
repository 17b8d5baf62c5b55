//! Changelog line format.
//!
//! ```text
//! <time>:<field>=<json-value>
//! ```
//!
//! `time` is decimal milliseconds, `field` is one or more word characters and
//! the value is any JSON document on a single line. Lines that do not fit
//! (blank lines, torn writes, hand edits) are kept as [`LogEntry::Raw`] and
//! contribute nothing to replay.

use std::collections::BTreeMap;

use quill_types::{is_valid_field, Change, Timestamp};
use serde::Serialize;
use serde_json::Value;

use crate::error::{StoreError, StoreResult};

/// Assembled object state: field name to current value.
pub type ObjectState = BTreeMap<String, Value>;

/// One line of a changelog.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum LogEntry {
    Change(Change),
    Raw(String),
}

impl LogEntry {
    pub fn as_change(&self) -> Option<&Change> {
        match self {
            Self::Change(change) => Some(change),
            Self::Raw(_) => None,
        }
    }

    pub fn is_raw(&self) -> bool {
        matches!(self, Self::Raw(_))
    }
}

/// Render a change as a changelog line (without the trailing newline).
pub fn serialize(change: &Change) -> StoreResult<String> {
    let value =
        serde_json::to_string(&change.value).map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(format!("{}:{}={}", change.time, change.field, value))
}

/// Parse a single line. Never fails: anything unrecognised is raw.
pub fn parse(line: &str) -> LogEntry {
    parse_change(line).map_or_else(|| LogEntry::Raw(line.to_string()), LogEntry::Change)
}

pub(crate) fn parse_change(line: &str) -> Option<Change> {
    let (time, rest) = line.split_once(':')?;
    if time.is_empty() || !time.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let time: u64 = time.parse().ok()?;
    let (field, value) = rest.split_once('=')?;
    if !is_valid_field(field) {
        return None;
    }
    let value: Value = serde_json::from_str(value).ok()?;
    Some(Change {
        time: Timestamp::from_millis(time),
        field: field.to_string(),
        value,
    })
}

/// Parse a whole changelog file.
pub fn parse_log(content: &str) -> Vec<LogEntry> {
    content.lines().map(parse).collect()
}

/// Fold entries in order, last write wins per field. Raw entries are skipped.
pub fn replay<'a, I>(entries: I) -> ObjectState
where
    I: IntoIterator<Item = &'a LogEntry>,
{
    let mut state = ObjectState::new();
    for change in entries.into_iter().filter_map(LogEntry::as_change) {
        state.insert(change.field.clone(), change.value.clone());
    }
    state
}
