//! Append-only, plain-text object storage.
//!
//! Quill keeps one changelog file per object and never rewrites a byte of
//! it. An object's current state is rebuilt on every read by replaying its
//! changelog in file order. Side indexes and a daily audit trail are plain
//! append-only files too.
//!
//! # Layout
//!
//! ```text
//! <root>/objects/<last-2-chars-of-id>/<id>   <time>:<field>=<json-value>
//! <root>/indexes/<key>                       <object-id>
//! <root>/log/objects-<YYYY-MM-DD>            <id>:<time>:<field>=<json-value>
//! <root>/log/index-<YYYY-MM-DD>              <id>@<time>:<key>
//! ```
//!
//! # Components
//!
//! - [`partition`] -- maps ids and index keys to paths
//! - [`HandleThrottle`] -- bounds concurrent file operations
//! - [`WriteQueue`] -- per-file, strictly ordered appends
//! - [`codec`] -- changelog line format and replay
//! - [`Store`] -- object and index operations
//! - [`AuditLog`] / [`Recovery`] -- daily audit trail and rebuild from it
//!
//! # Design Rules
//!
//! 1. Files are only ever appended to.
//! 2. Appends to one file land in call order and never interleave.
//! 3. A corrupted line is kept on disk and ignored by replay.
//! 4. A missing file reads as empty.
//! 5. I/O errors are reported to the caller and never retried.

pub mod audit;
pub mod codec;
pub mod config;
pub mod error;
pub mod index;
pub mod object;
pub mod partition;
pub mod queue;
pub mod recovery;
pub mod store;
pub mod throttle;

pub use audit::{AuditKind, AuditLog, AuditRecord};
pub use codec::{LogEntry, ObjectState};
pub use config::{StoreConfig, SyncMode};
pub use error::{StoreError, StoreResult};
pub use index::flatten_keys;
pub use object::{ObjectHandle, Seed};
pub use queue::{PendingAppend, WriteQueue};
pub use recovery::{Recovery, RecoveryReport};
pub use store::Store;
pub use throttle::{HandleSlot, HandleThrottle};

pub use quill_types::{Change, IndexKey, ObjectId, Timestamp};
