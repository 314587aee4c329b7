// error.rs: Error types for target repository operations.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by a target repository sink.
#[derive(Debug, Error)]
pub enum TargetError {
    /// The VCS command failed.
    #[error("VCS operation failed: {0}")]
    VcsError(String),

    /// A file I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A path would resolve outside the working tree.
    #[error("path traversal detected: '{path}' resolves outside the working tree")]
    PathTraversal { path: String },

    /// A rename or copy source does not exist in the working tree.
    #[error("file not found in working tree: '{path}'")]
    FileNotFound { path: String },

    /// A tag or branch was requested before the first commit.
    #[error("cannot create {kind} '{name}': no commit yet")]
    NoHead { kind: &'static str, name: String },

    /// A tag or branch name is already taken.
    #[error("ref already exists: {0}")]
    RefExists(String),
}

pub type Result<T> = std::result::Result<T, TargetError>;
