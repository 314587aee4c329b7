// item.rs: Legacy repository entities.
//
// Legacy paths use the `$/Project/sub/file.txt` form. An item keeps its
// identifier across renames and moves; only the path changes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Separator used in legacy paths.
pub const PATH_SEPARATOR: char = '/';

/// Stable internal identifier of a legacy item (the physical file name in
/// the legacy database).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether an item is a file or a project (directory).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    File,
    Project,
}

/// A file or project tracked by the legacy repository.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Item {
    pub id: ItemId,
    pub kind: ItemKind,
    /// Current legacy path, e.g. `$/Project/src/main.c`.
    pub path: String,
}

impl Item {
    pub fn new(id: impl Into<String>, kind: ItemKind, path: impl Into<String>) -> Self {
        Self {
            id: ItemId::new(id),
            kind,
            path: normalize_path(&path.into()),
        }
    }

    pub fn is_project(&self) -> bool {
        self.kind == ItemKind::Project
    }

    /// Last path segment.
    pub fn name(&self) -> &str {
        file_name(&self.path)
    }
}

/// Strip trailing separators (except for the `$/` root) so paths compare
/// consistently.
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim_end_matches(PATH_SEPARATOR);
    if trimmed == "$" || trimmed.is_empty() {
        "$/".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Parent of a legacy path, or `None` for the root.
pub fn parent_path(path: &str) -> Option<&str> {
    if path == "$/" {
        return None;
    }
    match path.rfind(PATH_SEPARATOR) {
        Some(1) if path.starts_with("$/") => Some("$/"),
        Some(idx) => Some(&path[..idx]),
        None => None,
    }
}

/// Last segment of a legacy path.
pub fn file_name(path: &str) -> &str {
    path.rsplit(PATH_SEPARATOR).next().unwrap_or(path)
}

/// Path of `name` inside the project at `parent`.
pub fn child_path(parent: &str, name: &str) -> String {
    if parent.ends_with(PATH_SEPARATOR) {
        format!("{}{}", parent, name)
    } else {
        format!("{}{}{}", parent, PATH_SEPARATOR, name)
    }
}

/// Path of `path` relative to the project at `root`, or `None` when `path`
/// is outside it. The root itself maps to an empty string.
pub fn relative_to<'a>(path: &'a str, root: &str) -> Option<&'a str> {
    if path.eq_ignore_ascii_case(root) {
        return Some("");
    }
    let prefix_len = if root.ends_with(PATH_SEPARATOR) {
        root.len()
    } else {
        root.len() + 1
    };
    if path.len() <= prefix_len {
        return None;
    }
    let head = path.get(..prefix_len)?;
    let rest = &path[prefix_len..];
    let head_matches = head.get(..root.len())?.eq_ignore_ascii_case(root)
        && (root.ends_with(PATH_SEPARATOR) || head.ends_with(PATH_SEPARATOR));
    head_matches.then_some(rest)
}
