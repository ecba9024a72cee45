//! Error types for branch-naming

/// Result type for branch-naming operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while encoding or looking up names
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("Invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("No original name registered for '{encoded}'")]
    NotFound { encoded: String },

    #[error("Name '{original}' is already registered as '{encoded}'")]
    Conflict { original: String, encoded: String },
}

impl Error {
    pub fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidName {
            name: name.into(),
            reason: reason.into(),
        }
    }
}
