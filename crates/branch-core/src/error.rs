//! Error types for branch-core

use std::path::PathBuf;

/// Result type for branch-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in branch-core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration file not found at expected path
    #[error("Configuration not found at {path}")]
    ConfigNotFound { path: PathBuf },

    /// Configuration parsed but holds unusable values
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// An item with the same name already exists in the container
    #[error("Item '{name}' already exists")]
    ItemExists { name: String },

    /// Item not found
    #[error("Item not found: {0}")]
    NotFound(String),

    /// A discovery call failed; the pass was aborted without mutating
    #[error("Provider unavailable while indexing {item}: {reason}")]
    ProviderUnavailable { item: String, reason: String },

    /// A build was requested for a branch that has no revision yet
    #[error("No revision known for {item}")]
    NoRevision { item: String },

    /// The item was deleted while an operation was in flight
    #[error("Item {item} has been deleted")]
    Deleted { item: String },

    /// Persisted item record could not be read or written
    #[error("Store error at {path}: {message}")]
    Store { path: PathBuf, message: String },

    // Transparent wrappers for underlying crate errors
    /// Name encoding error from branch-naming
    #[error(transparent)]
    Naming(#[from] branch_naming::Error),

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// TOML deserialization error
    #[error(transparent)]
    TomlDe(#[from] toml::de::Error),

    /// TOML serialization error
    #[error(transparent)]
    TomlSer(#[from] toml::ser::Error),

    /// JSON error from an event payload
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn store(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Store {
            path: path.into(),
            message: message.into(),
        }
    }
}
