//! Optimistic side indexes.
//!
//! An index file is the list of object ids ever added under a key, one per
//! line. Nothing is deduplicated or removed: readers must re-check each id
//! against the object's current state.

use std::borrow::Borrow;
use std::future::Future;

use quill_types::{IndexKey, ObjectId, Timestamp};
use serde_json::Value;
use tracing::debug;

use crate::audit::{AuditKind, AuditRecord};
use crate::error::{StoreError, StoreResult};
use crate::partition;
use crate::store::Store;

impl Store {
    /// Append `id` to the index for `key` and mirror it to the audit log.
    ///
    /// Queued at call time; runs to completion even if the returned future
    /// is dropped.
    pub fn index_append(
        &self,
        id: &ObjectId,
        key: &IndexKey,
    ) -> impl Future<Output = StoreResult<()>> + Send + 'static {
        let pending = self
            .queue()
            .append(partition::index_path(self.root(), key), id.as_str());
        let record = AuditRecord::Index {
            id: id.clone(),
            time: Timestamp::now(),
            key: key.clone(),
        };
        let audit = self.audit().clone();

        let task = tokio::spawn(async move {
            pending.await?;
            audit.record(AuditKind::Index, &[record]).await
        });

        async move { task.await.map_err(|_| StoreError::QueueClosed)? }
    }

    /// Append `id` under each key, in order. Every key is attempted; the
    /// first failure is returned.
    pub async fn index_append_all<I, K>(&self, id: &ObjectId, keys: I) -> StoreResult<()>
    where
        I: IntoIterator<Item = K>,
        K: Borrow<IndexKey>,
    {
        let pending: Vec<_> = keys
            .into_iter()
            .map(|key| self.index_append(id, key.borrow()))
            .collect();

        let mut first_error = None;
        for append in pending {
            if let Err(e) = append.await {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Append `id` under keys given as a string or nested arrays of strings.
    /// Keys are validated before anything is written.
    pub async fn index_append_value(&self, id: &ObjectId, keys: &Value) -> StoreResult<()> {
        let keys = flatten_keys(keys)?;
        self.index_append_all(id, &keys).await
    }

    /// Every id ever appended under `key`, in append order, duplicates
    /// included. A missing index is empty.
    pub async fn index_lookup(&self, key: &IndexKey) -> StoreResult<Vec<ObjectId>> {
        let content = self
            .read_file(&partition::index_path(self.root(), key))
            .await?;
        let ids = content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match ObjectId::new(line) {
                Ok(id) => Some(id),
                Err(e) => {
                    debug!(%key, line, error = %e, "skipping unreadable index entry");
                    None
                }
            })
            .collect();
        Ok(ids)
    }
}

/// Flatten a key argument that may be a string or arbitrarily nested arrays
/// of strings, preserving order.
pub fn flatten_keys(value: &Value) -> StoreResult<Vec<IndexKey>> {
    fn walk(value: &Value, out: &mut Vec<IndexKey>) -> StoreResult<()> {
        match value {
            Value::String(key) => out.push(IndexKey::new(key.as_str())?),
            Value::Array(items) => {
                for item in items {
                    walk(item, out)?;
                }
            }
            other => {
                return Err(StoreError::InvalidArgument(format!(
                    "index keys must be strings, got {other}"
                )))
            }
        }
        Ok(())
    }

    let mut keys = Vec::new();
    walk(value, &mut keys)?;
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::config::StoreConfig;

    fn key(s: &str) -> IndexKey {
        IndexKey::new(s).unwrap()
    }

    fn id(s: &str) -> ObjectId {
        ObjectId::new(s).unwrap()
    }

    #[tokio::test]
    async fn duplicates_are_kept() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(StoreConfig::new(dir.path())).await.unwrap();

        store.index_append(&id("x"), &key("title:foo")).await.unwrap();
        store.index_append(&id("x"), &key("title:foo")).await.unwrap();

        let ids = store.index_lookup(&key("title:foo")).await.unwrap();
        assert_eq!(ids, vec![id("x"), id("x")]);
    }

    #[tokio::test]
    async fn missing_index_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(StoreConfig::new(dir.path())).await.unwrap();
        assert!(store.index_lookup(&key("nothing")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn append_all_applies_each_key_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(StoreConfig::new(dir.path())).await.unwrap();

        store
            .index_append_all(&id("a"), [key("k1"), key("k2")])
            .await
            .unwrap();
        store
            .index_append_all(&id("b"), &[key("k2")])
            .await
            .unwrap();

        assert_eq!(store.index_lookup(&key("k1")).await.unwrap(), vec![id("a")]);
        assert_eq!(
            store.index_lookup(&key("k2")).await.unwrap(),
            vec![id("a"), id("b")]
        );

        store.flush().await.unwrap();
        let audit = std::fs::read_to_string(store.audit().current_path(AuditKind::Index)).unwrap();
        let keys: Vec<&str> = audit
            .lines()
            .map(|l| l.split_once(':').unwrap().1)
            .collect();
        assert_eq!(keys, ["k1", "k2", "k2"]);
        assert!(audit.lines().all(|l| l.contains('@')));
    }

    #[tokio::test]
    async fn blank_and_unreadable_lines_are_filtered() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(StoreConfig::new(dir.path())).await.unwrap();
        let path = partition::index_path(dir.path(), &key("k"));
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "a\n\n  \nb/c\nd\n").unwrap();

        assert_eq!(
            store.index_lookup(&key("k")).await.unwrap(),
            vec![id("a"), id("d")]
        );
    }

    #[tokio::test]
    async fn nested_key_values_are_applied_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(StoreConfig::new(dir.path())).await.unwrap();

        store
            .index_append_value(&id("x"), &json!(["k1", ["k2", ["k1"]]]))
            .await
            .unwrap();

        assert_eq!(store.index_lookup(&key("k1")).await.unwrap(), vec![id("x"), id("x")]);
        assert_eq!(store.index_lookup(&key("k2")).await.unwrap(), vec![id("x")]);
    }

    #[tokio::test]
    async fn bad_nested_key_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(StoreConfig::new(dir.path())).await.unwrap();

        let err = store
            .index_append_value(&id("x"), &json!(["k1", 7]))
            .await
            .unwrap_err();
        assert!(err.is_invalid_argument());
        assert!(store.index_lookup(&key("k1")).await.unwrap().is_empty());
    }

    #[test]
    fn flatten_nested_keys() {
        let keys = flatten_keys(&json!(["a", ["b", ["c"]], "d"])).unwrap();
        let names: Vec<&str> = keys.iter().map(IndexKey::as_str).collect();
        assert_eq!(names, ["a", "b", "c", "d"]);
        assert_eq!(flatten_keys(&json!("solo")).unwrap(), vec![key("solo")]);
    }

    #[test]
    fn flatten_rejects_non_strings() {
        assert!(flatten_keys(&json!(["a", 1])).unwrap_err().is_invalid_argument());
        assert!(flatten_keys(&json!("../x")).unwrap_err().is_invalid_argument());
    }
}
