/*!
Error types for the ignoregrets core engine.
*/

use thiserror::Error;

/// Result type used throughout the ignoregrets core.
pub type Result<T> = std::result::Result<T, IgnoregretsError>;

/// Errors that can occur during snapshot, restore and prune operations.
#[derive(Error, Debug)]
pub enum IgnoregretsError {
    /// I/O errors during file operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML configuration errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Tar/gzip stream errors, with the operation that failed
    #[error("Archive error: {context}: {source}")]
    Archive {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// The working directory is not inside a managed repository
    #[error("Not a Git repository: {0}")]
    NotARepository(String),

    /// The version-control command failed or is unavailable
    #[error("Version control error: {0}")]
    Vcs(String),

    /// Filtering left no file to archive
    #[error("No files to snapshot")]
    NothingToSnapshot,

    /// No archive exists for the requested commit
    #[error("No snapshots found for commit {commit}")]
    SnapshotNotFound { commit: String },

    /// The requested snapshot index exceeds the number of archives
    #[error("Snapshot index {index} not found for commit {commit} ({available} available)")]
    SnapshotIndexOutOfRange {
        commit: String,
        index: usize,
        available: usize,
    },

    /// The archive has no manifest entry
    #[error("manifest.json not found in snapshot {0}")]
    ManifestMissing(String),

    /// The manifest entry could not be decoded
    #[error("Failed to parse manifest: {0}")]
    ManifestDecode(String),

    /// The archive is bound to a different commit than requested
    #[error("Snapshot commit hash mismatch: expected {expected}, got {actual}")]
    CommitMismatch { expected: String, actual: String },

    /// Integrity check failures
    #[error("Integrity check failed for {path}: expected hash {expected}, got {actual}")]
    IntegrityCheckFailed {
        path: String,
        expected: String,
        actual: String,
    },

    /// Invalid snapshot format
    #[error("Invalid snapshot format: {0}")]
    InvalidFormat(String),

    /// Snapshot directory errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),
}

impl IgnoregretsError {
    /// Create a new archive error
    pub fn archive<S: Into<String>>(context: S, source: std::io::Error) -> Self {
        Self::Archive {
            context: context.into(),
            source,
        }
    }

    /// Create a new storage error
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a new invalid format error
    pub fn invalid_format<S: Into<String>>(msg: S) -> Self {
        Self::InvalidFormat(msg.into())
    }

    /// Create a new version control error
    pub fn vcs<S: Into<String>>(msg: S) -> Self {
        Self::Vcs(msg.into())
    }

    /// True for failures that mean the snapshot itself is unusable
    pub fn is_data_error(&self) -> bool {
        matches!(
            self,
            Self::ManifestMissing(_)
                | Self::ManifestDecode(_)
                | Self::CommitMismatch { .. }
                | Self::IntegrityCheckFailed { .. }
                | Self::InvalidFormat(_)
        )
    }
}
