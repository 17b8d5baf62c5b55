//! Day-partitioned audit trail.
//!
//! Every object and index mutation is mirrored into `log/objects-<date>` or
//! `log/index-<date>`, dated by the local calendar day at append time. The
//! trail is independent of the per-object files and is enough to rebuild
//! them (see [`Recovery`](crate::Recovery)).
//!
//! ```text
//! objects-2024-05-01:  <id>:<time>:<field>=<json-value>
//! index-2024-05-01:    <id>@<time>:<key>
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};
use quill_types::{Change, IndexKey, ObjectId, Timestamp};

use crate::codec;
use crate::error::{StoreError, StoreResult};
use crate::queue::{PendingAppend, WriteQueue};

/// Which daily file a record belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AuditKind {
    Object,
    Index,
}

impl AuditKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Object => "objects",
            Self::Index => "index",
        }
    }

    /// File name for this kind on `date`.
    pub fn file_name(&self, date: NaiveDate) -> String {
        format!("{}-{}", self.prefix(), date.format("%Y-%m-%d"))
    }

    /// Recognise an audit file name, returning its kind and date.
    pub fn parse_file_name(name: &str) -> Option<(Self, NaiveDate)> {
        let (kind, date) = if let Some(date) = name.strip_prefix("objects-") {
            (Self::Object, date)
        } else if let Some(date) = name.strip_prefix("index-") {
            (Self::Index, date)
        } else {
            return None;
        };
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
        Some((kind, date))
    }
}

impl fmt::Display for AuditKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// A single mutation as written to the audit trail.
#[derive(Clone, Debug, PartialEq)]
pub enum AuditRecord {
    Object {
        id: ObjectId,
        change: Change,
    },
    Index {
        id: ObjectId,
        time: Timestamp,
        key: IndexKey,
    },
}

impl AuditRecord {
    pub fn kind(&self) -> AuditKind {
        match self {
            Self::Object { .. } => AuditKind::Object,
            Self::Index { .. } => AuditKind::Index,
        }
    }

    pub fn to_line(&self) -> StoreResult<String> {
        match self {
            Self::Object { id, change } => Ok(format!("{id}:{}", codec::serialize(change)?)),
            Self::Index { id, time, key } => Ok(format!("{id}@{time}:{key}")),
        }
    }

    /// Parse a line from a file of the given kind.
    pub fn parse(kind: AuditKind, line: &str) -> Option<Self> {
        match kind {
            AuditKind::Object => {
                let (id, rest) = line.split_once(':')?;
                let id = ObjectId::new(id).ok()?;
                let change = codec::parse_change(rest)?;
                Some(Self::Object { id, change })
            }
            AuditKind::Index => {
                let (id, rest) = line.split_once('@')?;
                let (time, key) = rest.split_once(':')?;
                if !time.bytes().all(|b| b.is_ascii_digit()) {
                    return None;
                }
                Some(Self::Index {
                    id: ObjectId::new(id).ok()?,
                    time: Timestamp::from_millis(time.parse().ok()?),
                    key: IndexKey::new(key).ok()?,
                })
            }
        }
    }
}

/// Appends mutation records to the daily audit files.
#[derive(Clone, Debug)]
pub struct AuditLog {
    dir: PathBuf,
    queue: WriteQueue,
}

impl AuditLog {
    pub fn new(dir: impl Into<PathBuf>, queue: WriteQueue) -> Self {
        Self {
            dir: dir.into(),
            queue,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file for `kind` on `date`.
    pub fn path_for(&self, kind: AuditKind, date: NaiveDate) -> PathBuf {
        self.dir.join(kind.file_name(date))
    }

    /// Path of today's file for `kind`.
    pub fn current_path(&self, kind: AuditKind) -> PathBuf {
        self.path_for(kind, Local::now().date_naive())
    }

    /// Append records of a single kind to today's file as one contiguous
    /// unit. Queued at call time.
    pub fn record(&self, kind: AuditKind, records: &[AuditRecord]) -> PendingAppend {
        if let Some(other) = records.iter().find(|r| r.kind() != kind) {
            return PendingAppend::failed(StoreError::InvalidArgument(format!(
                "{} record submitted to the {kind} audit file",
                other.kind()
            )));
        }
        let lines: StoreResult<Vec<String>> = records.iter().map(AuditRecord::to_line).collect();
        let lines = match lines {
            Ok(lines) => lines,
            Err(e) => return PendingAppend::failed(e),
        };
        self.queue.append_many(self.current_path(kind), lines)
    }
}
