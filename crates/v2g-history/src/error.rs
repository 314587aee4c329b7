// error.rs: Error types for the legacy reader boundary.

use std::path::PathBuf;
use thiserror::Error;

use crate::item::ItemId;

/// Errors raised while reading the legacy repository.
#[derive(Debug, Error)]
pub enum ReaderError {
    /// The legacy path does not resolve to a usable project.
    #[error("invalid project path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// An item disappeared between listing and reading.
    #[error("item not found: {0}")]
    ItemNotFound(ItemId),

    /// The item's history records cannot be read.
    #[error("history of {path} is unreadable: {reason}")]
    Unreadable { path: String, reason: String },

    /// A content payload referenced by a revision is missing.
    #[error("payload not found: {0}")]
    PayloadNotFound(String),

    /// A file I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The dump manifest is malformed.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// An exclusion pattern is not a valid glob.
    #[error("invalid exclude pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

pub type Result<T> = std::result::Result<T, ReaderError>;
