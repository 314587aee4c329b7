// event.rs: RevisionEvent, the unit of history flowing through the pipeline.
//
// One event per recorded action per item. Events are produced once by the
// collector and never mutated afterwards.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::item::{normalize_path, Item, ItemId, ItemKind};
use crate::reader::{RawAction, RawActionKind};

/// Opaque reference to a revision's content in the legacy store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PayloadRef(String);

impl PayloadRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PayloadRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What happened to the item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Item created (or recovered after a delete).
    Add,
    /// New content checked in.
    Edit,
    /// Item renamed or moved; the event path is the new location.
    Rename { previous_path: String },
    /// Item deleted (or destroyed).
    Delete,
    /// Label applied; becomes a tag.
    Label { name: String },
    /// Branch point; becomes a branch.
    Branch { name: String },
    /// Item shared into another project; the event path is the new location.
    Share { source_path: String },
}

impl Action {
    /// Whether the action changes the file tree (as opposed to refs).
    pub fn touches_tree(&self) -> bool {
        !matches!(self, Action::Label { .. } | Action::Branch { .. })
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Add => f.write_str("add"),
            Action::Edit => f.write_str("edit"),
            Action::Rename { previous_path } => write!(f, "rename from {}", previous_path),
            Action::Delete => f.write_str("delete"),
            Action::Label { name } => write!(f, "label '{}'", name),
            Action::Branch { name } => write!(f, "branch '{}'", name),
            Action::Share { source_path } => write!(f, "share from {}", source_path),
        }
    }
}

/// One atomic recorded action against one item at one point in time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RevisionEvent {
    pub item_id: ItemId,
    pub item_kind: ItemKind,
    /// Revision number of the item in the legacy store.
    pub version: u32,
    /// Legacy path of the item when the action was recorded.
    pub path: String,
    pub action: Action,
    pub timestamp: DateTime<Utc>,
    pub user: String,
    pub comment: String,
    /// Content of this revision, for actions that carry content.
    pub payload: Option<PayloadRef>,
}

impl RevisionEvent {
    /// Convert a raw reader record into an event for `item`.
    pub fn from_raw(item: &Item, raw: RawAction) -> Self {
        let action = match raw.kind {
            RawActionKind::Create | RawActionKind::Recover => Action::Add,
            RawActionKind::Checkin => Action::Edit,
            RawActionKind::Rename { previous_path } => Action::Rename {
                previous_path: normalize_path(&previous_path),
            },
            RawActionKind::Delete | RawActionKind::Destroy => Action::Delete,
            RawActionKind::Label { label } => Action::Label { name: label },
            RawActionKind::Branch { name } => Action::Branch { name },
            RawActionKind::Share { source_path } => Action::Share {
                source_path: normalize_path(&source_path),
            },
        };
        Self {
            item_id: item.id.clone(),
            item_kind: item.kind,
            version: raw.version,
            path: raw
                .path
                .map(|p| normalize_path(&p))
                .unwrap_or_else(|| item.path.clone()),
            action,
            timestamp: raw.timestamp,
            user: raw.user,
            comment: raw.comment,
            payload: raw.payload,
        }
    }

    /// Global stream order: timestamp, then item id, then version.
    ///
    /// The id/version tie-break makes the stream independent of the order in
    /// which concurrent collection finished.
    pub fn stream_order(&self, other: &Self) -> Ordering {
        self.timestamp
            .cmp(&other.timestamp)
            .then_with(|| self.item_id.cmp(&other.item_id))
            .then_with(|| self.version.cmp(&other.version))
    }
}

impl fmt::Display for RevisionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} v{} by {} at {}",
            self.path,
            self.action,
            self.version,
            self.user,
            self.timestamp.to_rfc3339()
        )
    }
}
