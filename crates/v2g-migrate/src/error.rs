// error.rs: Fatal errors that stop a migration before or instead of export.
//
// Recoverable per-item and per-changeset problems are not errors here; they
// are TaskFailures collected into the MigrationOutcome.

use thiserror::Error;

use v2g_export::TargetError;
use v2g_history::ReaderError;

#[derive(Debug, Error)]
pub enum MigrationError {
    /// The selected legacy path does not resolve to a project.
    #[error("cannot migrate '{path}': {source}")]
    InvalidProject {
        path: String,
        #[source]
        source: ReaderError,
    },

    /// An exclusion pattern could not be compiled.
    #[error("invalid exclusions: {0}")]
    Exclude(#[source] ReaderError),

    /// The target repository could not be created.
    #[error("cannot initialize target repository: {0}")]
    Target(#[source] TargetError),

    /// The configuration is unreadable, malformed or out of range.
    /// `origin` names the file, or the merged settings when the problem was
    /// found after command-line overrides were applied.
    #[error("invalid config {origin}: {reason}")]
    Config { origin: String, reason: String },

    /// The export task died without handing back its results.
    #[error("export aborted: {0}")]
    ExportAborted(String),
}

pub type Result<T> = std::result::Result<T, MigrationError>;
