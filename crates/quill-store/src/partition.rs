//! On-disk layout.
//!
//! ```text
//! <root>/objects/<last-2-chars-of-id>/<id>
//! <root>/indexes/<key>
//! <root>/log/objects-<YYYY-MM-DD>
//! <root>/log/index-<YYYY-MM-DD>
//! ```
//!
//! Object files are spread over at most 36 × 36 suffix directories for
//! generated ids, so no single directory grows with the whole population.
//! Index keys are few compared to objects and live in one flat directory.

use std::path::{Path, PathBuf};

use quill_types::{IndexKey, ObjectId};

pub const OBJECTS_DIR: &str = "objects";
pub const INDEXES_DIR: &str = "indexes";
pub const LOG_DIR: &str = "log";

/// Changelog file for an object.
pub fn object_path(root: &Path, id: &ObjectId) -> PathBuf {
    root.join(OBJECTS_DIR).join(id.suffix()).join(id.as_str())
}

/// Index file for a key.
pub fn index_path(root: &Path, key: &IndexKey) -> PathBuf {
    root.join(INDEXES_DIR).join(key.as_str())
}

/// Directory holding the daily audit files.
pub fn log_dir(root: &Path) -> PathBuf {
    root.join(LOG_DIR)
}
