use quill_types::TypeError;

/// Errors from store operations.
///
/// Parse anomalies and missing files are not errors: corrupted changelog
/// lines surface as raw entries and absent files read as empty.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Malformed input to a create/update API. Raised before any I/O.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An identifier, index key, or field name failed validation.
    #[error("invalid argument: {0}")]
    InvalidName(#[from] TypeError),

    /// I/O error from the underlying filesystem.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The configuration is malformed or out of range.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The write worker for a file went away before acknowledging an append.
    #[error("write queue closed before the append was acknowledged")]
    QueueClosed,
}

impl StoreError {
    /// Returns `true` for errors caused by caller input rather than the
    /// environment.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_) | Self::InvalidName(_))
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
