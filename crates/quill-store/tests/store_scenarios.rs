use std::collections::HashSet;
use std::time::Duration;

use quill_store::{
    partition, IndexKey, LogEntry, ObjectId, Seed, Store, StoreConfig, SyncMode,
};
use serde_json::json;

async fn open(dir: &tempfile::TempDir) -> Store {
    Store::open(StoreConfig::new(dir.path())).await.unwrap()
}

#[tokio::test]
async fn create_update_read_log_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(&dir).await;

    let handle = store
        .create(Seed::fields([("foo", json!("bar")), ("bif", json!("baz"))]))
        .await
        .unwrap();
    let state = handle.read().await.unwrap();
    assert_eq!(json!(state), json!({"foo": "bar", "bif": "baz"}));

    handle.update("foo", json!("qux")).await.unwrap();
    let state = handle.read().await.unwrap();
    assert_eq!(json!(state), json!({"foo": "qux", "bif": "baz"}));

    let log = handle.log().await.unwrap();
    assert_eq!(log.len(), 3);
    let times: Vec<u64> = log
        .iter()
        .map(|entry| entry.as_change().unwrap().time.as_millis())
        .collect();
    assert!(times.windows(2).all(|w| w[0] <= w[1]));
}

#[tokio::test]
async fn never_created_object_reads_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(&dir).await;
    let state = store.read(&ObjectId::generate()).await.unwrap();
    assert!(state.is_empty());
}

#[tokio::test]
async fn reads_are_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(&dir).await;
    let handle = store
        .create(Seed::fields([("a", json!([1, 2, 3])), ("b", json!(null))]))
        .await
        .unwrap();

    let first = handle.read().await.unwrap();
    let second = handle.read().await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn replay_matches_fold_across_many_updates() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(&dir).await;
    let handle = store.create(Seed::Empty).await.unwrap();

    let writes = [("a", 1), ("b", 2), ("a", 3), ("c", 4), ("b", 5)];
    for (field, value) in writes {
        handle.update(field, json!(value)).await.unwrap();
    }

    let state = handle.read().await.unwrap();
    assert_eq!(json!(state), json!({"a": 3, "b": 5, "c": 4}));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_updates_to_one_object_are_all_kept() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(
        StoreConfig::new(dir.path())
            .with_file_limit(4)
            .with_filehandle_wait(Duration::from_millis(1)),
    )
    .await
    .unwrap();
    let id = ObjectId::generate();

    let mut tasks = Vec::new();
    for i in 0..100 {
        let store = store.clone();
        let id = id.clone();
        tasks.push(tokio::spawn(async move {
            store
                .update(&id, &format!("f{i}"), json!(format!("v{i}")))
                .await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let log = store.log(&id).await.unwrap();
    assert_eq!(log.len(), 100);
    assert!(log.iter().all(|entry| !entry.is_raw()));

    let state = store.read(&id).await.unwrap();
    assert_eq!(state.len(), 100);
    for i in 0..100 {
        assert_eq!(state[&format!("f{i}")], json!(format!("v{i}")));
    }
}

#[tokio::test]
async fn objects_are_partitioned_by_suffix() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(&dir).await;

    for raw in ["x1ab", "x2cd", "x3ab"] {
        let id = ObjectId::new(raw).unwrap();
        store.update(&id, "n", json!(raw)).await.unwrap();
    }

    let objects = dir.path().join(partition::OBJECTS_DIR);
    let mut entries: Vec<String> = std::fs::read_dir(&objects)
        .unwrap()
        .map(|e| e.unwrap())
        .inspect(|e| assert!(e.file_type().unwrap().is_dir()))
        .map(|e| e.file_name().into_string().unwrap())
        .collect();
    entries.sort();
    assert_eq!(entries, ["ab", "cd"]);
    assert_eq!(std::fs::read_dir(objects.join("ab")).unwrap().count(), 2);
}

#[tokio::test]
async fn generated_objects_spread_over_partitions() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(&dir).await;

    for _ in 0..200 {
        let handle = store.create(Seed::fields([("k", json!(1))])).await.unwrap();
        assert_eq!(
            handle.path().parent().unwrap().file_name().unwrap(),
            handle.id().suffix()
        );
    }

    let partitions: HashSet<_> = std::fs::read_dir(dir.path().join(partition::OBJECTS_DIR))
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert!(partitions.len() > 1);
    assert!(partitions.len() <= 36 * 36);
}

#[tokio::test]
async fn index_is_optimistic() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(&dir).await;
    let key = IndexKey::new("title:foo").unwrap();
    let x = ObjectId::new("x").unwrap();

    store.index_append(&x, &key).await.unwrap();
    store.index_append(&x, &key).await.unwrap();

    assert_eq!(store.index_lookup(&key).await.unwrap(), vec![x.clone(), x]);
}

#[tokio::test]
async fn every_update_reaches_the_audit_log() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(StoreConfig::new(dir.path()).with_sync(SyncMode::EveryWrite))
        .await
        .unwrap();
    let handle = store
        .create(Seed::fields([("foo", json!("bar"))]))
        .await
        .unwrap();
    handle.update("foo", json!("qux")).await.unwrap();

    let audit = std::fs::read_to_string(
        store
            .audit()
            .current_path(quill_store::AuditKind::Object),
    )
    .unwrap();
    let mirrored: Vec<&str> = audit.lines().collect();
    assert_eq!(mirrored.len(), 2);

    let changelog = std::fs::read_to_string(handle.path()).unwrap();
    for (audit_line, log_line) in mirrored.iter().zip(changelog.lines()) {
        assert_eq!(*audit_line, format!("{}:{log_line}", handle.id()));
    }
}

#[tokio::test]
async fn damaged_changelog_still_assembles() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(&dir).await;
    let id = ObjectId::new("damaged").unwrap();
    let path = partition::object_path(dir.path(), &id);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "1:a=1\n\n2:b=oops\n3:c=\"ok\"\n4:a=").unwrap();

    let log = store.log(&id).await.unwrap();
    assert_eq!(log.len(), 5);
    assert_eq!(log[1], LogEntry::Raw(String::new()));

    let state = store.read(&id).await.unwrap();
    assert_eq!(json!(state), json!({"a": 1, "c": "ok"}));
}
