// target.rs: The sink the exporter writes into.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Author identity for commits and tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    pub email: String,
}

impl Author {
    /// Map a legacy user to an identity in `email_domain`:
    /// `John Smith` becomes `John Smith <john.smith@domain>`.
    pub fn for_user(user: &str, email_domain: &str) -> Self {
        let local = user.trim().to_lowercase().replace(' ', ".");
        Self {
            name: user.trim().to_string(),
            email: format!("{}@{}", local, email_domain),
        }
    }
}

impl fmt::Display for Author {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.name, self.email)
    }
}

/// Identifier of a commit in the target repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommitId(pub String);

impl CommitId {
    /// First eight characters, for log lines.
    pub fn short(&self) -> &str {
        self.0.get(..8).unwrap_or(&self.0)
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A target repository with a working tree.
///
/// Paths are relative to the working tree root and use `/` separators.
/// Tree operations accumulate until [`commit`](Self::commit) records them.
pub trait TargetRepository: Send {
    /// Create the repository and its working tree.
    fn init(&mut self) -> Result<()>;

    /// Create or overwrite a file, creating parent directories.
    fn write_file(&mut self, path: &str, content: &[u8]) -> Result<()>;

    /// Create a directory (and its parents).
    fn create_dir(&mut self, path: &str) -> Result<()>;

    /// Remove a file. Removing a missing file is not an error.
    fn remove_file(&mut self, path: &str) -> Result<()>;

    /// Remove a directory and everything under it. Removing a missing
    /// directory is not an error.
    fn remove_dir(&mut self, path: &str) -> Result<()>;

    /// Move a file or directory.
    fn rename(&mut self, from: &str, to: &str) -> Result<()>;

    /// Copy a file's current content to another path.
    fn copy_file(&mut self, from: &str, to: &str) -> Result<()>;

    /// Record the working tree delta as one commit dated `timestamp` (both
    /// author and committer). Returns `None` when there is nothing to
    /// commit.
    fn commit(
        &mut self,
        author: &Author,
        timestamp: DateTime<Utc>,
        message: &str,
    ) -> Result<Option<CommitId>>;

    /// Create an annotated tag on the current head.
    fn create_tag(
        &mut self,
        name: &str,
        tagger: &Author,
        timestamp: DateTime<Utc>,
        message: &str,
    ) -> Result<()>;

    /// Create a branch at the current head.
    fn create_branch(&mut self, name: &str) -> Result<()>;

    /// Throw away uncommitted working tree changes.
    fn discard_changes(&mut self) -> Result<()>;

    /// Sink display name (for logs).
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn author_email_is_domain_qualified() {
        let author = Author::for_user("John Smith", "example.com");
        assert_eq!(author.name, "John Smith");
        assert_eq!(author.email, "john.smith@example.com");
        assert_eq!(author.to_string(), "John Smith <john.smith@example.com>");
    }

    #[test]
    fn short_commit_id() {
        assert_eq!(CommitId("0123456789abcdef".into()).short(), "01234567");
        assert_eq!(CommitId("abc".into()).short(), "abc");
    }
}
