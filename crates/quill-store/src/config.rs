use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Flush/sync strategy for appended lines.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Rely on OS page-cache buffering (fastest, least durable).
    #[default]
    OsDefault,
    /// `fsync` after every append (safest, highest latency).
    EveryWrite,
}

/// Configuration for a [`Store`](crate::Store).
///
/// Every field has a default, so a TOML file only needs the keys it changes:
///
/// ```toml
/// root = "/var/lib/quill"
/// file_limit = 64
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Root directory holding `objects/`, `indexes/` and `log/`.
    pub root: PathBuf,
    /// Permission bits for directories the store creates.
    pub mode: u32,
    /// Maximum number of file operations in flight at once.
    pub file_limit: usize,
    /// Backoff before retrying admission when `file_limit` is reached.
    pub filehandle_wait_ms: u64,
    /// Sync strategy for appends.
    pub sync: SyncMode,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("quill-data"),
            mode: 0o700,
            file_limit: 100,
            filehandle_wait_ms: 10,
            sync: SyncMode::default(),
        }
    }
}

impl StoreConfig {
    /// Default configuration rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::default().with_root(root)
    }

    #[must_use]
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    #[must_use]
    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn with_file_limit(mut self, file_limit: usize) -> Self {
        self.file_limit = file_limit;
        self
    }

    #[must_use]
    pub fn with_filehandle_wait(mut self, wait: Duration) -> Self {
        self.filehandle_wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX);
        self
    }

    #[must_use]
    pub fn with_sync(mut self, sync: SyncMode) -> Self {
        self.sync = sync;
        self
    }

    /// Backoff as a [`Duration`].
    pub fn filehandle_wait(&self) -> Duration {
        Duration::from_millis(self.filehandle_wait_ms)
    }

    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> StoreResult<Self> {
        let config: Self = toml::from_str(s).map_err(|e| StoreError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML configuration file.
    pub fn load(path: &Path) -> StoreResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    /// Check that all values are in range.
    pub fn validate(&self) -> StoreResult<()> {
        if self.file_limit == 0 {
            return Err(StoreError::Config("file_limit must be at least 1".into()));
        }
        if self.mode > 0o7777 {
            return Err(StoreError::Config(format!(
                "mode {:o} is not a valid permission set",
                self.mode
            )));
        }
        if self.root.as_os_str().is_empty() {
            return Err(StoreError::Config("root must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = StoreConfig::default();
        assert_eq!(c.mode, 0o700);
        assert_eq!(c.file_limit, 100);
        assert_eq!(c.filehandle_wait(), Duration::from_millis(10));
        assert_eq!(c.sync, SyncMode::OsDefault);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let c = StoreConfig::from_toml_str(
            r#"
            root = "/tmp/quill"
            file_limit = 8
            sync = "every_write"
            "#,
        )
        .unwrap();
        assert_eq!(c.root, PathBuf::from("/tmp/quill"));
        assert_eq!(c.file_limit, 8);
        assert_eq!(c.sync, SyncMode::EveryWrite);
        assert_eq!(c.mode, 0o700);
        assert_eq!(c.filehandle_wait_ms, 10);
    }

    #[test]
    fn oversized_wait_saturates() {
        let c = StoreConfig::default().with_filehandle_wait(Duration::MAX);
        assert_eq!(c.filehandle_wait_ms, u64::MAX);
        let c = StoreConfig::default().with_filehandle_wait(Duration::from_millis(25));
        assert_eq!(c.filehandle_wait_ms, 25);
    }

    #[test]
    fn zero_file_limit_is_rejected() {
        let err = StoreConfig::from_toml_str("file_limit = 0").unwrap_err();
        assert!(matches!(err, StoreError::Config(_)));
    }

    #[test]
    fn out_of_range_mode_is_rejected() {
        let c = StoreConfig::default().with_mode(0o17777);
        assert!(c.validate().is_err());
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        let err = StoreConfig::from_toml_str("file_limit = \"many\"").unwrap_err();
        assert!(matches!(err, StoreError::Config(_)));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quill.toml");
        std::fs::write(&path, "filehandle_wait_ms = 25\n").unwrap();
        let c = StoreConfig::load(&path).unwrap();
        assert_eq!(c.filehandle_wait(), Duration::from_millis(25));
    }
}
