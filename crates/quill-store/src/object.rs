//! Object operations: create, get, read, log, update.
//!
//! An object has no stored state of its own. Its changelog file is the only
//! record, and [`Store::read`] rebuilds the current field mapping by
//! replaying it. An object exists from its first appended record; an id with
//! no changelog reads as an empty mapping.

use std::future::Future;
use std::path::PathBuf;

use quill_types::{is_valid_field, Change, IndexKey, ObjectId};
use serde_json::Value;
use tracing::debug;

use crate::audit::{AuditKind, AuditRecord};
use crate::codec::{self, LogEntry, ObjectState};
use crate::error::{StoreError, StoreResult};
use crate::partition;
use crate::queue::PendingAppend;
use crate::store::Store;

/// What [`Store::create`] should start from.
#[derive(Clone, Debug, PartialEq)]
pub enum Seed {
    /// A fresh id with no changelog yet.
    Empty,
    /// A handle to an object that already exists (or will).
    ByExistingId(ObjectId),
    /// One change per field, stamped now, in the given order.
    FromFields(Vec<(String, Value)>),
    /// Pre-formed change records, appended verbatim.
    FromChanges(Vec<Change>),
}

impl Seed {
    /// Convenience constructor for [`Seed::FromFields`].
    pub fn fields<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Self::FromFields(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Resolve a dynamically shaped JSON seed.
    ///
    /// `null` is [`Seed::Empty`], a string is an existing id, an object is a
    /// field mapping and an array must hold `{time, field, value}` records.
    /// Anything else is an invalid argument.
    pub fn from_json(value: Value) -> StoreResult<Self> {
        match value {
            Value::Null => Ok(Self::Empty),
            Value::String(id) => Ok(Self::ByExistingId(ObjectId::new(id)?)),
            Value::Object(map) => Ok(Self::FromFields(map.into_iter().collect())),
            Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| {
                    serde_json::from_value::<Change>(item).map_err(|e| {
                        StoreError::InvalidArgument(format!("change record {i}: {e}"))
                    })
                })
                .collect::<StoreResult<Vec<_>>>()
                .map(Self::FromChanges),
            other => Err(StoreError::InvalidArgument(format!(
                "cannot create an object from {}",
                json_kind(&other)
            ))),
        }
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

impl Store {
    /// Create an object from `seed` and return a handle to it.
    ///
    /// All records of a seed are appended as one contiguous unit. Invalid
    /// field names fail before anything is written.
    pub async fn create(&self, seed: Seed) -> StoreResult<ObjectHandle> {
        let changes = match seed {
            Seed::Empty => Vec::new(),
            Seed::ByExistingId(id) => return Ok(self.get(id)),
            Seed::FromFields(fields) => fields
                .into_iter()
                .map(|(field, value)| Change::now(field, value).map_err(StoreError::from))
                .collect::<StoreResult<Vec<_>>>()?,
            Seed::FromChanges(changes) => {
                if let Some(bad) = changes.iter().find(|c| !is_valid_field(&c.field)) {
                    return Err(StoreError::InvalidArgument(format!(
                        "invalid field name {:?}",
                        bad.field
                    )));
                }
                changes
            }
        };

        let id = ObjectId::generate();
        let records = changes.len();
        if !changes.is_empty() {
            self.commit(&id, changes).await?;
        }
        debug!(%id, records, "object created");
        Ok(self.get(id))
    }

    /// A handle bound to `id`. Does not touch the filesystem.
    pub fn get(&self, id: ObjectId) -> ObjectHandle {
        ObjectHandle {
            id,
            store: self.clone(),
        }
    }

    /// Replay the object's changelog into its current field mapping.
    pub async fn read(&self, id: &ObjectId) -> StoreResult<ObjectState> {
        let log = self.log(id).await?;
        Ok(codec::replay(&log))
    }

    /// The object's changelog as parsed entries, raw lines included.
    pub async fn log(&self, id: &ObjectId) -> StoreResult<Vec<LogEntry>> {
        let content = self.read_file(&partition::object_path(self.root(), id)).await?;
        Ok(codec::parse_log(&content))
    }

    /// Set `field` to `value`, stamped with the current time.
    ///
    /// The append is queued when this is called; the returned future
    /// resolves once both the changelog and the audit log have it.
    pub fn update(
        &self,
        id: &ObjectId,
        field: &str,
        value: Value,
    ) -> impl Future<Output = StoreResult<Change>> + Send + 'static {
        let staged = Change::now(field, value)
            .map_err(StoreError::from)
            .map(|change| (change.clone(), self.commit(id, vec![change])));
        async move {
            let (change, committed) = staged?;
            committed.await?;
            Ok(change)
        }
    }

    /// Append `changes` to the object's changelog, then mirror them to the
    /// audit log. Both appends run to completion even if the returned future
    /// is dropped.
    fn commit(
        &self,
        id: &ObjectId,
        changes: Vec<Change>,
    ) -> impl Future<Output = StoreResult<()>> + Send + 'static {
        let lines: StoreResult<Vec<String>> = changes.iter().map(codec::serialize).collect();
        let pending = match lines {
            Ok(lines) => self
                .queue()
                .append_many(partition::object_path(self.root(), id), lines),
            Err(e) => PendingAppend::failed(e),
        };

        let audit = self.audit().clone();
        let id = id.clone();
        let task = tokio::spawn(async move {
            pending.await?;
            let records: Vec<AuditRecord> = changes
                .into_iter()
                .map(|change| AuditRecord::Object {
                    id: id.clone(),
                    change,
                })
                .collect();
            audit.record(AuditKind::Object, &records).await?;
            debug!(%id, records = records.len(), "changes committed");
            Ok(())
        });

        async move { task.await.map_err(|_| StoreError::QueueClosed)? }
    }
}

/// A lightweight reference to one object.
#[derive(Clone)]
pub struct ObjectHandle {
    id: ObjectId,
    store: Store,
}

impl std::fmt::Debug for ObjectHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectHandle").field("id", &self.id).finish()
    }
}

impl ObjectHandle {
    pub fn id(&self) -> &ObjectId {
        &self.id
    }

    /// Location of the changelog file.
    pub fn path(&self) -> PathBuf {
        partition::object_path(self.store.root(), &self.id)
    }

    pub async fn read(&self) -> StoreResult<ObjectState> {
        self.store.read(&self.id).await
    }

    pub async fn log(&self) -> StoreResult<Vec<LogEntry>> {
        self.store.log(&self.id).await
    }

    pub fn update(
        &self,
        field: &str,
        value: Value,
    ) -> impl Future<Output = StoreResult<Change>> + Send + 'static {
        self.store.update(&self.id, field, value)
    }

    /// Add this object to each of `keys`, in order.
    pub async fn index<I>(&self, keys: I) -> StoreResult<()>
    where
        I: IntoIterator<Item = IndexKey>,
    {
        self.store.index_append_all(&self.id, keys).await
    }
}
