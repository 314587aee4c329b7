// changeset.rs: A group of revision events replayed as one commit.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use v2g_history::{Action, RevisionEvent};

/// Position of a changeset in the export order, starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangesetId(pub u64);

impl fmt::Display for ChangesetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "changeset {}", self.0)
    }
}

/// A sealed changeset.
///
/// Invariants: `members` is non-empty, every member has the same `user`,
/// and members are in stream order. A changeset is never modified after
/// the builder seals it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Changeset {
    pub id: ChangesetId,

    /// Legacy user who performed every member action.
    pub user: String,

    /// Commit message: the distinct non-empty member comments in member
    /// order, one per line.
    pub comment: String,

    /// Timestamp of the earliest member.
    pub timestamp: DateTime<Utc>,

    pub members: Vec<RevisionEvent>,
}

impl Changeset {
    /// Seal `members` into a changeset. `members` must be non-empty.
    pub(crate) fn seal(id: ChangesetId, members: Vec<RevisionEvent>) -> Self {
        let first = &members[0];
        let user = first.user.clone();
        let timestamp = first.timestamp;

        let mut comments: Vec<&str> = Vec::new();
        for member in &members {
            let comment = member.comment.trim();
            if !comment.is_empty() && !comments.contains(&comment) {
                comments.push(comment);
            }
        }
        let comment = comments.join("\n");

        Self {
            id,
            user,
            comment,
            timestamp,
            members,
        }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Label names applied by this changeset.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.members.iter().filter_map(|m| match &m.action {
            Action::Label { name } => Some(name.as_str()),
            _ => None,
        })
    }

    /// Whether any member changes the file tree.
    pub fn changes_tree(&self) -> bool {
        self.members.iter().any(|m| m.action.touches_tree())
    }
}

impl fmt::Display for Changeset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} by {} at {} ({} revisions)",
            self.id,
            self.user,
            self.timestamp.to_rfc3339(),
            self.members.len()
        )
    }
}
