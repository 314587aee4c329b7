// path_map.rs: Where each legacy item currently lives in the working tree.
//
// A file shared into several projects maps to several paths. Renaming or
// deleting a project rewrites or drops the entries of everything below it.
// Changes made while a changeset is being applied are journaled so a failed
// changeset can be rolled back without cloning the whole map.

use std::collections::HashMap;

use v2g_history::ItemId;

/// Item id to working-tree paths.
#[derive(Debug, Default)]
pub struct PathMapping {
    paths: HashMap<ItemId, Vec<String>>,
    /// Previous values of entries touched since `begin()`, oldest first.
    journal: Option<Vec<(ItemId, Option<Vec<String>>)>>,
}

impl PathMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every path the item is mapped to (empty when unknown).
    pub fn resolve(&self, id: &ItemId) -> &[String] {
        self.paths.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The first path the item was mapped to.
    pub fn primary(&self, id: &ItemId) -> Option<&str> {
        self.resolve(id).first().map(String::as_str)
    }

    /// The mapped path of `id` equal to `path` (ignoring case), if any.
    pub fn find(&self, id: &ItemId, path: &str) -> Option<&str> {
        self.resolve(id)
            .iter()
            .find(|p| p.eq_ignore_ascii_case(path))
            .map(String::as_str)
    }

    pub fn contains(&self, id: &ItemId) -> bool {
        self.paths.contains_key(id)
    }

    /// Number of mapped items.
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Map `id` to `path` in addition to any existing paths.
    pub fn insert(&mut self, id: &ItemId, path: impl Into<String>) {
        let path = path.into();
        if self.find(id, &path).is_some() {
            return;
        }
        self.record(id);
        self.paths.entry(id.clone()).or_default().push(path);
    }

    /// Move `id` from `from` to `to`, along with every entry below `from`.
    pub fn rename(&mut self, id: &ItemId, from: &str, to: &str) {
        self.record(id);
        let entry = self.paths.entry(id.clone()).or_default();
        match entry.iter_mut().find(|p| p.eq_ignore_ascii_case(from)) {
            Some(slot) => *slot = to.to_string(),
            None => entry.push(to.to_string()),
        }

        let affected: Vec<ItemId> = self
            .paths
            .iter()
            .filter(|(other, paths)| *other != id && paths.iter().any(|p| strip_dir(p, from).is_some()))
            .map(|(other, _)| other.clone())
            .collect();
        for other in affected {
            self.record(&other);
            if let Some(paths) = self.paths.get_mut(&other) {
                for path in paths.iter_mut() {
                    if let Some(rest) = strip_dir(path, from) {
                        *path = format!("{}/{}", to, rest);
                    }
                }
            }
        }
    }

    /// Unmap `id` from `path`, or from every path when `path` is `None`.
    /// Entries below each removed path are dropped too.
    pub fn remove(&mut self, id: &ItemId, path: Option<&str>) {
        let removed: Vec<String> = match (self.paths.get(id), path) {
            (None, _) => return,
            (Some(paths), Some(path)) => paths
                .iter()
                .filter(|p| p.eq_ignore_ascii_case(path))
                .cloned()
                .collect(),
            (Some(paths), None) => paths.clone(),
        };

        self.record(id);
        if let Some(paths) = self.paths.get_mut(id) {
            paths.retain(|p| !removed.iter().any(|r| r.eq_ignore_ascii_case(p)));
            if paths.is_empty() {
                self.paths.remove(id);
            }
        }

        let affected: Vec<ItemId> = self
            .paths
            .iter()
            .filter(|(_, paths)| {
                paths
                    .iter()
                    .any(|p| removed.iter().any(|r| strip_dir(p, r).is_some()))
            })
            .map(|(other, _)| other.clone())
            .collect();
        for other in affected {
            self.record(&other);
            if let Some(paths) = self.paths.get_mut(&other) {
                paths.retain(|p| !removed.iter().any(|r| strip_dir(p, r).is_some()));
                if paths.is_empty() {
                    self.paths.remove(&other);
                }
            }
        }
    }

    /// Start journaling changes. A previous open journal is discarded.
    pub fn begin(&mut self) {
        self.journal = Some(Vec::new());
    }

    /// Keep every change made since `begin()`.
    pub fn commit(&mut self) {
        self.journal = None;
    }

    /// Undo every change made since `begin()`.
    pub fn rollback(&mut self) {
        let Some(journal) = self.journal.take() else {
            return;
        };
        for (id, previous) in journal.into_iter().rev() {
            match previous {
                Some(paths) => {
                    self.paths.insert(id, paths);
                }
                None => {
                    self.paths.remove(&id);
                }
            }
        }
    }

    fn record(&mut self, id: &ItemId) {
        if let Some(journal) = self.journal.as_mut() {
            journal.push((id.clone(), self.paths.get(id).cloned()));
        }
    }
}

/// `path` relative to the directory `dir`, if `path` is strictly below it.
fn strip_dir<'a>(path: &'a str, dir: &str) -> Option<&'a str> {
    if dir.is_empty() || path.len() <= dir.len() + 1 {
        return None;
    }
    let head = path.get(..dir.len())?;
    let rest = path.get(dir.len() + 1..)?;
    (head.eq_ignore_ascii_case(dir) && path.as_bytes()[dir.len()] == b'/').then_some(rest)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> ItemId {
        ItemId::new(s)
    }

    #[test]
    fn insert_keeps_every_shared_path_once() {
        let mut map = PathMapping::new();
        map.insert(&id("F"), "a/file.txt");
        map.insert(&id("F"), "b/file.txt");
        map.insert(&id("F"), "A/FILE.TXT");
        assert_eq!(map.resolve(&id("F")), ["a/file.txt", "b/file.txt"]);
        assert_eq!(map.primary(&id("F")), Some("a/file.txt"));
        assert!(map.resolve(&id("missing")).is_empty());
    }

    #[test]
    fn renaming_a_project_moves_its_descendants() {
        let mut map = PathMapping::new();
        map.insert(&id("SRC"), "src");
        map.insert(&id("MAIN"), "src/main.c");
        map.insert(&id("LIB"), "src/lib/util.c");
        map.insert(&id("SRCX"), "srcx/other.c");

        map.rename(&id("SRC"), "src", "source");
        assert_eq!(map.primary(&id("SRC")), Some("source"));
        assert_eq!(map.primary(&id("MAIN")), Some("source/main.c"));
        assert_eq!(map.primary(&id("LIB")), Some("source/lib/util.c"));
        assert_eq!(map.primary(&id("SRCX")), Some("srcx/other.c"));
    }

    #[test]
    fn removing_a_project_drops_its_descendants() {
        let mut map = PathMapping::new();
        map.insert(&id("SRC"), "src");
        map.insert(&id("MAIN"), "src/main.c");
        map.insert(&id("SHARED"), "src/shared.h");
        map.insert(&id("SHARED"), "include/shared.h");

        map.remove(&id("SRC"), None);
        assert!(!map.contains(&id("SRC")));
        assert!(!map.contains(&id("MAIN")));
        assert_eq!(map.resolve(&id("SHARED")), ["include/shared.h"]);
    }

    #[test]
    fn remove_single_path_of_shared_item() {
        let mut map = PathMapping::new();
        map.insert(&id("F"), "a/f");
        map.insert(&id("F"), "b/f");
        map.remove(&id("F"), Some("a/f"));
        assert_eq!(map.resolve(&id("F")), ["b/f"]);
    }

    #[test]
    fn rollback_restores_state_at_begin() {
        let mut map = PathMapping::new();
        map.insert(&id("SRC"), "src");
        map.insert(&id("MAIN"), "src/main.c");

        map.begin();
        map.insert(&id("NEW"), "src/new.c");
        map.rename(&id("SRC"), "src", "source");
        map.remove(&id("MAIN"), None);
        map.rollback();

        assert_eq!(map.len(), 2);
        assert_eq!(map.primary(&id("SRC")), Some("src"));
        assert_eq!(map.primary(&id("MAIN")), Some("src/main.c"));
        assert!(!map.contains(&id("NEW")));
    }

    #[test]
    fn commit_keeps_changes() {
        let mut map = PathMapping::new();
        map.begin();
        map.insert(&id("A"), "a");
        map.commit();
        map.rollback();
        assert_eq!(map.primary(&id("A")), Some("a"));
    }
}
