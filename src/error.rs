//! Error types for relmap

use crate::model::UserId;
use thiserror::Error;

/// Result type alias for relmap operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in relmap operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    /// Two version creations for the same user computed the same number
    #[error("Version {number} already exists for user {user}")]
    VersionConflict { user: UserId, number: u64 },

    #[error("Corruption detected: {0}")]
    Corruption(String),

    #[error("Invalid database file: {0}")]
    InvalidFile(String),

    #[error("Format version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    #[error("Config error: {0}")]
    Config(String),
}

impl Error {
    /// The requested row does not exist for this user (404-equivalent)
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// The request clashes with existing state (409-equivalent)
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict(_) | Error::VersionConflict { .. })
    }

    /// Short machine-readable label, used by the CLI's JSON error output
    pub fn kind(&self) -> &'static str {
        match self {
            Error::NotFound(_) => "not_found",
            Error::Conflict(_) | Error::VersionConflict { .. } => "conflict",
            Error::Validation(_) => "validation",
            Error::Config(_) => "config",
            _ => "storage",
        }
    }
}
