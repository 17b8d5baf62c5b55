//! Per-file serialized append pipeline.
//!
//! Every active file gets one worker task and one unbounded queue. The
//! worker holds a [`HandleSlot`] and a single open append handle for as long
//! as its queue has work, then closes the handle, releases the slot and
//! retires. The next append to that file starts a fresh worker.
//!
//! Appends are enqueued when [`WriteQueue::append`] is *called*, not when the
//! returned [`PendingAppend`] is awaited, so two appends issued one after the
//! other on the same file land in that order even if their futures are
//! polled in a different order.

use std::collections::HashMap;
use std::future::{Future, IntoFuture};
use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::config::SyncMode;
use crate::error::{StoreError, StoreResult};
use crate::throttle::{HandleSlot, HandleThrottle};

/// One queued unit of work: zero or more complete lines.
struct PendingWrite {
    payload: String,
    done: oneshot::Sender<io::Result<()>>,
}

struct QueueInner {
    throttle: Arc<HandleThrottle>,
    mode: u32,
    sync: SyncMode,
    /// Active files. An entry exists exactly while its worker is running.
    files: Mutex<HashMap<PathBuf, mpsc::UnboundedSender<PendingWrite>>>,
}

impl QueueInner {
    fn files(&self) -> MutexGuard<'_, HashMap<PathBuf, mpsc::UnboundedSender<PendingWrite>>> {
        // The table is never left half-updated, so a poisoned lock is still
        // consistent.
        self.files.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Serializes appends per file while letting different files proceed in
/// parallel, subject to the shared [`HandleThrottle`].
#[derive(Clone)]
pub struct WriteQueue {
    inner: Arc<QueueInner>,
}

impl std::fmt::Debug for WriteQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteQueue")
            .field("active_files", &self.active_files())
            .field("mode", &format_args!("{:o}", self.inner.mode))
            .field("sync", &self.inner.sync)
            .finish()
    }
}

impl WriteQueue {
    pub fn new(throttle: Arc<HandleThrottle>, mode: u32, sync: SyncMode) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                throttle,
                mode,
                sync,
                files: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Append one line to `path`. A trailing newline is added.
    ///
    /// Must be called from within a tokio runtime.
    pub fn append(&self, path: impl Into<PathBuf>, line: &str) -> PendingAppend {
        self.append_many(path, [line])
    }

    /// Append several lines to `path` as a single queued unit, so no other
    /// append to the same file can land between them.
    pub fn append_many<I, S>(&self, path: impl Into<PathBuf>, lines: I) -> PendingAppend
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut payload = String::new();
        for line in lines {
            let line = line.as_ref();
            if line.contains(['\n', '\r']) {
                return PendingAppend::failed(StoreError::InvalidArgument(
                    "appended lines must not contain line breaks".into(),
                ));
            }
            payload.push_str(line);
            payload.push('\n');
        }
        if payload.is_empty() {
            return PendingAppend::empty();
        }
        PendingAppend::queued(self.submit(path.into(), payload))
    }

    /// Wait until every append queued before this call has been applied.
    pub async fn flush(&self) -> StoreResult<()> {
        let paths: Vec<PathBuf> = self.inner.files().keys().cloned().collect();
        let barriers: Vec<_> = paths
            .into_iter()
            .map(|path| PendingAppend::queued(self.submit(path, String::new())))
            .collect();
        for barrier in barriers {
            barrier.await?;
        }
        Ok(())
    }

    /// Number of files with a running worker (and so an open or opening
    /// handle).
    pub fn active_files(&self) -> usize {
        self.inner.files().len()
    }

    fn submit(&self, path: PathBuf, payload: String) -> oneshot::Receiver<io::Result<()>> {
        let (done, receipt) = oneshot::channel();
        let mut job = PendingWrite { payload, done };

        let mut files = self.inner.files();
        if let Some(tx) = files.get(&path) {
            match tx.send(job) {
                Ok(()) => return receipt,
                // The worker only drops its receiver after removing itself
                // from the table, so this arm is unreachable in practice.
                Err(mpsc::error::SendError(returned)) => job = returned,
            }
        }

        let (tx, rx) = mpsc::unbounded_channel();
        // The receiver is alive: we are holding it.
        let _ = tx.send(job);
        files.insert(path.clone(), tx);
        drop(files);

        tokio::spawn(drain(Arc::clone(&self.inner), path, rx));
        receipt
    }
}

/// Worker loop for a single file.
async fn drain(
    inner: Arc<QueueInner>,
    path: PathBuf,
    mut rx: mpsc::UnboundedReceiver<PendingWrite>,
) {
    let _slot: HandleSlot = inner.throttle.acquire().await;
    let mut handle: Option<File> = None;

    loop {
        let job = match rx.try_recv() {
            Ok(job) => job,
            Err(_) => {
                // Retire under the table lock: appenders send while holding
                // it, so nothing can be enqueued between this check and the
                // removal.
                let mut files = inner.files();
                match rx.try_recv() {
                    Ok(job) => job,
                    Err(_) => {
                        files.remove(&path);
                        break;
                    }
                }
            }
        };

        let result = write_payload(&inner, &path, &mut handle, &job.payload).await;
        if let Err(ref e) = result {
            warn!(path = %path.display(), error = %e, "append failed");
            handle = None;
        }
        // The caller may have stopped waiting; the write stands either way.
        let _ = job.done.send(result);
    }

    if handle.is_some() {
        debug!(path = %path.display(), "write stream closed");
    }
}

async fn write_payload(
    inner: &QueueInner,
    path: &Path,
    handle: &mut Option<File>,
    payload: &str,
) -> io::Result<()> {
    if payload.is_empty() {
        return Ok(());
    }

    let file = match handle.take() {
        Some(file) => file,
        None => open_append(path, inner.mode).await?,
    };
    let file = handle.insert(file);

    file.write_all(payload.as_bytes()).await?;
    file.flush().await?;
    if inner.sync == SyncMode::EveryWrite {
        file.sync_data().await?;
    }

    debug!(path = %path.display(), len = payload.len(), "append");
    Ok(())
}

async fn open_append(path: &Path, mode: u32) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent, mode).await?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .read(true)
        .append(true)
        .open(path)
        .await?;
    terminate_torn_tail(path, &mut file).await?;
    debug!(path = %path.display(), "write stream opened");
    Ok(file)
}

/// A crash or a failed write can leave the file ending mid-line. Close that
/// line off so the next append starts on a line of its own.
async fn terminate_torn_tail(path: &Path, file: &mut File) -> io::Result<()> {
    if file.metadata().await?.len() == 0 {
        return Ok(());
    }
    file.seek(SeekFrom::End(-1)).await?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last).await?;
    if last[0] != b'\n' {
        warn!(path = %path.display(), "file ends mid-line; terminating it");
        file.write_all(b"\n").await?;
    }
    Ok(())
}

/// Create `dir` and any missing parents with the given permission bits.
pub(crate) async fn ensure_dir(dir: &Path, mode: u32) -> io::Result<()> {
    let mut builder = tokio::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(mode);
    #[cfg(not(unix))]
    let _ = mode;
    builder.create(dir).await
}

/// An append that has been queued. Await it to learn whether it reached the
/// file.
///
/// Dropping a `PendingAppend` does not cancel the write.
#[must_use = "an append is only known to be applied once awaited"]
pub struct PendingAppend {
    state: PendingState,
}

enum PendingState {
    Queued(oneshot::Receiver<io::Result<()>>),
    Failed(StoreError),
    Empty,
}

impl PendingAppend {
    fn queued(receipt: oneshot::Receiver<io::Result<()>>) -> Self {
        Self {
            state: PendingState::Queued(receipt),
        }
    }

    pub(crate) fn failed(error: StoreError) -> Self {
        Self {
            state: PendingState::Failed(error),
        }
    }

    fn empty() -> Self {
        Self {
            state: PendingState::Empty,
        }
    }
}

impl std::fmt::Debug for PendingAppend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.state {
            PendingState::Queued(_) => "queued",
            PendingState::Failed(_) => "failed",
            PendingState::Empty => "empty",
        };
        f.debug_struct("PendingAppend").field("state", &state).finish()
    }
}

impl IntoFuture for PendingAppend {
    type Output = StoreResult<()>;
    type IntoFuture = Pin<Box<dyn Future<Output = StoreResult<()>> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move {
            match self.state {
                PendingState::Queued(receipt) => {
                    receipt.await.map_err(|_| StoreError::QueueClosed)??;
                    Ok(())
                }
                PendingState::Failed(error) => Err(error),
                PendingState::Empty => Ok(()),
            }
        })
    }
}
