// memory.rs: In-memory legacy repository.
//
// Holds items, their raw history and payload bytes in plain maps. Used as
// the index behind DumpRepository and as the fixture for pipeline tests.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::error::{ReaderError, Result};
use crate::event::PayloadRef;
use crate::item::{normalize_path, parent_path, Item, ItemId, ItemKind};
use crate::reader::{LegacyRepository, RawAction};

#[derive(Debug, Clone)]
struct Entry {
    item: Item,
    history: Vec<RawAction>,
}

/// A legacy repository held entirely in memory.
///
/// Paths are matched case-insensitively, as the legacy store does.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRepository {
    /// Entries keyed by lower-cased current path.
    entries: BTreeMap<String, Entry>,
    /// Child keys by parent key.
    children: HashMap<String, BTreeSet<String>>,
    paths_by_id: HashMap<ItemId, String>,
    payloads: HashMap<PayloadRef, Vec<u8>>,
    unreadable: HashSet<ItemId>,
}

impl InMemoryRepository {
    /// Create a repository containing the project at `root_path` (id `ROOT`).
    pub fn new(root_path: &str) -> Self {
        let mut repo = Self::default();
        repo.insert(Item::new("ROOT", ItemKind::Project, root_path));
        repo
    }

    /// Create an empty repository (no items at all).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Add (or replace) an item.
    pub fn insert(&mut self, item: Item) {
        let path = key(&item.path);
        if let Some(parent) = parent_path(&path) {
            self.children
                .entry(parent.to_string())
                .or_default()
                .insert(path.clone());
        }
        self.paths_by_id.insert(item.id.clone(), path.clone());
        self.entries.insert(
            path,
            Entry {
                item,
                history: Vec::new(),
            },
        );
    }

    /// Add a project and return self.
    pub fn with_project(mut self, path: &str, id: &str) -> Self {
        self.insert(Item::new(id, ItemKind::Project, path));
        self
    }

    /// Add a file and return self.
    pub fn with_file(mut self, path: &str, id: &str) -> Self {
        self.insert(Item::new(id, ItemKind::File, path));
        self
    }

    /// Append a raw history record to the item `id` and return self.
    ///
    /// Records for unknown ids are dropped with a warning.
    pub fn with_action(mut self, id: &str, action: RawAction) -> Self {
        self.push_action(&ItemId::new(id), action);
        self
    }

    /// Store payload bytes and return self.
    pub fn with_payload(mut self, reference: &str, content: impl Into<Vec<u8>>) -> Self {
        self.payloads.insert(PayloadRef::new(reference), content.into());
        self
    }

    /// Make `list_history` fail for the item `id` and return self.
    pub fn with_unreadable(mut self, id: &str) -> Self {
        self.unreadable.insert(ItemId::new(id));
        self
    }

    pub fn push_action(&mut self, id: &ItemId, action: RawAction) {
        let entry = self
            .paths_by_id
            .get(id)
            .and_then(|path| self.entries.get_mut(path));
        match entry {
            Some(entry) => entry.history.push(action),
            None => tracing::warn!("dropping history record for unknown item {}", id),
        }
    }

    /// Number of items (projects and files).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn key(path: &str) -> String {
    normalize_path(path).to_lowercase()
}

impl LegacyRepository for InMemoryRepository {
    fn get_item(&self, path: &str) -> Result<Item> {
        self.entries
            .get(&key(path))
            .map(|entry| entry.item.clone())
            .ok_or_else(|| ReaderError::InvalidPath {
                path: path.to_string(),
                reason: "no such item".to_string(),
            })
    }

    fn children(&self, project: &Item) -> Result<Vec<Item>> {
        let Some(keys) = self.children.get(&key(&project.path)) else {
            return Ok(Vec::new());
        };
        Ok(keys
            .iter()
            .filter_map(|child| self.entries.get(child))
            .map(|entry| entry.item.clone())
            .collect())
    }

    fn list_history(&self, item: &Item) -> Result<Vec<RawAction>> {
        if self.unreadable.contains(&item.id) {
            return Err(ReaderError::Unreadable {
                path: item.path.clone(),
                reason: "record header checksum mismatch".to_string(),
            });
        }
        let path = self
            .paths_by_id
            .get(&item.id)
            .ok_or_else(|| ReaderError::ItemNotFound(item.id.clone()))?;
        Ok(self
            .entries
            .get(path)
            .map(|entry| entry.history.clone())
            .unwrap_or_default())
    }

    fn read_payload(&self, payload: &PayloadRef) -> Result<Vec<u8>> {
        self.payloads
            .get(payload)
            .cloned()
            .ok_or_else(|| ReaderError::PayloadNotFound(payload.to_string()))
    }

    fn name(&self) -> &str {
        "memory"
    }
}
