// reader.rs: Boundary to the legacy repository reader.
//
// The physical database format is decoded elsewhere. The pipeline only needs
// to resolve a project path, list a project's children, list an item's raw
// action records and fetch revision content.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ReaderError, Result};
use crate::event::PayloadRef;
use crate::item::Item;

/// The action kinds a legacy reader reports. Each converts to exactly one
/// [`crate::Action`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RawActionKind {
    Create,
    Checkin,
    Recover,
    Rename { previous_path: String },
    Delete,
    Destroy,
    Label { label: String },
    Branch { name: String },
    Share { source_path: String },
}

/// One raw history record as the reader yields it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawAction {
    pub version: u32,
    #[serde(flatten)]
    pub kind: RawActionKind,
    pub timestamp: DateTime<Utc>,
    pub user: String,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub payload: Option<PayloadRef>,
    /// Item path at the time of the action, when it differs from the
    /// item's current path.
    #[serde(default)]
    pub path: Option<String>,
}

impl RawAction {
    pub fn new(
        version: u32,
        kind: RawActionKind,
        timestamp: DateTime<Utc>,
        user: impl Into<String>,
        comment: impl Into<String>,
    ) -> Self {
        Self {
            version,
            kind,
            timestamp,
            user: user.into(),
            comment: comment.into(),
            payload: None,
            path: None,
        }
    }

    /// Attach revision content and return self.
    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = Some(PayloadRef::new(payload));
        self
    }

    /// Record the item path at the time of this action and return self.
    pub fn at_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }
}

/// Read-only access to a legacy repository.
///
/// Implementations must be shareable across collector worker threads.
pub trait LegacyRepository: Send + Sync {
    /// Resolve a legacy path. Fails with [`ReaderError::InvalidPath`] when the
    /// path does not exist.
    fn get_item(&self, path: &str) -> Result<Item>;

    /// Direct children of a project.
    fn children(&self, project: &Item) -> Result<Vec<Item>>;

    /// Every recorded action against `item`.
    fn list_history(&self, item: &Item) -> Result<Vec<RawAction>>;

    /// Content of one revision.
    fn read_payload(&self, payload: &PayloadRef) -> Result<Vec<u8>>;

    /// Reader display name (for logs).
    fn name(&self) -> &str;
}

/// Resolve `path` and require it to be a project.
pub fn open_project(repo: &dyn LegacyRepository, path: &str) -> Result<Item> {
    let item = repo.get_item(path)?;
    if !item.is_project() {
        return Err(ReaderError::InvalidPath {
            path: path.to_string(),
            reason: "is not a project".to_string(),
        });
    }
    Ok(item)
}
