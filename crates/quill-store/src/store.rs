use std::io;
use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::audit::AuditLog;
use crate::config::StoreConfig;
use crate::error::StoreResult;
use crate::partition;
use crate::queue::{ensure_dir, WriteQueue};
use crate::throttle::HandleThrottle;

struct StoreInner {
    config: StoreConfig,
    throttle: Arc<HandleThrottle>,
    queue: WriteQueue,
    audit: AuditLog,
}

/// An open Quill database rooted at [`StoreConfig::root`].
///
/// `Store` is a cheap handle: clones share the same write queue, file-handle
/// throttle and audit log. Object operations live in [`crate::object`] and
/// index operations in [`crate::index`].
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("root", &self.inner.config.root)
            .field("in_flight", &self.inner.throttle.in_flight())
            .field("active_files", &self.inner.queue.active_files())
            .finish()
    }
}

impl Store {
    /// Open (or create) the database described by `config`.
    pub async fn open(config: StoreConfig) -> StoreResult<Self> {
        config.validate()?;
        ensure_dir(&config.root, config.mode).await?;

        let throttle = HandleThrottle::new(config.file_limit, config.filehandle_wait());
        let queue = WriteQueue::new(Arc::clone(&throttle), config.mode, config.sync);
        let audit = AuditLog::new(partition::log_dir(&config.root), queue.clone());

        info!(
            root = %config.root.display(),
            file_limit = config.file_limit,
            sync = ?config.sync,
            "store opened"
        );

        Ok(Self {
            inner: Arc::new(StoreInner {
                config,
                throttle,
                queue,
                audit,
            }),
        })
    }

    pub fn root(&self) -> &Path {
        &self.inner.config.root
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    pub fn queue(&self) -> &WriteQueue {
        &self.inner.queue
    }

    pub fn throttle(&self) -> &Arc<HandleThrottle> {
        &self.inner.throttle
    }

    pub fn audit(&self) -> &AuditLog {
        &self.inner.audit
    }

    /// Wait for every queued append to reach its file.
    pub async fn flush(&self) -> StoreResult<()> {
        self.inner.queue.flush().await
    }

    /// Read a whole file under the throttle. A missing file reads as empty;
    /// invalid UTF-8 is replaced so that damaged bytes surface as raw lines.
    pub(crate) async fn read_file(&self, path: &Path) -> StoreResult<String> {
        let _slot = self.inner.throttle.acquire().await;
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(e.into()),
        }
    }
}
