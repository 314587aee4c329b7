// memory.rs: Target repository that records everything in memory.
//
// Used by tests and by `--dry-run`. Mirrors the git sink's semantics: a
// commit with no delta is skipped, refs need a head, and uncommitted changes
// can be discarded.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{Result, TargetError};
use crate::target::{Author, CommitId, TargetRepository};

/// One commit as recorded by [`MemoryRepository`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordedCommit {
    pub id: CommitId,
    pub author: Author,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    /// Full tree snapshot after the commit.
    pub files: BTreeMap<String, Vec<u8>>,
}

/// An in-memory working tree plus commit log.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    initialized: bool,
    files: BTreeMap<String, Vec<u8>>,
    dirs: BTreeSet<String>,
    commits: Vec<RecordedCommit>,
    /// Tag name to (commit index, message).
    tags: BTreeMap<String, (usize, String)>,
    branches: BTreeMap<String, usize>,
    failing: HashSet<String>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every write, copy or rename touching `path` fail and return self.
    pub fn with_failing_path(mut self, path: &str) -> Self {
        self.failing.insert(path.to_string());
        self
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn commits(&self) -> &[RecordedCommit] {
        &self.commits
    }

    /// Current working tree content.
    pub fn files(&self) -> &BTreeMap<String, Vec<u8>> {
        &self.files
    }

    pub fn file(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).map(Vec::as_slice)
    }

    /// Commit index and message of a tag.
    pub fn tag(&self, name: &str) -> Option<(usize, &str)> {
        self.tags.get(name).map(|(idx, msg)| (*idx, msg.as_str()))
    }

    pub fn tag_names(&self) -> Vec<&str> {
        self.tags.keys().map(String::as_str).collect()
    }

    /// Commit index a branch points at.
    pub fn branch(&self, name: &str) -> Option<usize> {
        self.branches.get(name).copied()
    }

    fn check(&self, path: &str) -> Result<()> {
        if path.is_empty() || path.split('/').any(|seg| seg == "..") || path.starts_with('/') {
            return Err(TargetError::PathTraversal {
                path: path.to_string(),
            });
        }
        if self.failing.contains(path) {
            return Err(TargetError::VcsError(format!("injected failure at {}", path)));
        }
        Ok(())
    }

    fn head(&self, kind: &'static str, name: &str) -> Result<usize> {
        self.commits
            .len()
            .checked_sub(1)
            .ok_or_else(|| TargetError::NoHead {
                kind,
                name: name.to_string(),
            })
    }

    fn last_tree(&self) -> BTreeMap<String, Vec<u8>> {
        self.commits
            .last()
            .map(|c| c.files.clone())
            .unwrap_or_default()
    }

    fn add_parents(&mut self, path: &str) {
        let mut parent = path;
        while let Some(idx) = parent.rfind('/') {
            parent = &parent[..idx];
            self.dirs.insert(parent.to_string());
        }
    }
}

fn is_under(path: &str, dir: &str) -> bool {
    path.len() > dir.len() + 1 && path.starts_with(dir) && path.as_bytes()[dir.len()] == b'/'
}

impl TargetRepository for MemoryRepository {
    fn init(&mut self) -> Result<()> {
        self.initialized = true;
        Ok(())
    }

    fn write_file(&mut self, path: &str, content: &[u8]) -> Result<()> {
        self.check(path)?;
        self.add_parents(path);
        self.files.insert(path.to_string(), content.to_vec());
        Ok(())
    }

    fn create_dir(&mut self, path: &str) -> Result<()> {
        self.check(path)?;
        self.add_parents(path);
        self.dirs.insert(path.to_string());
        Ok(())
    }

    fn remove_file(&mut self, path: &str) -> Result<()> {
        self.check(path)?;
        self.files.remove(path);
        Ok(())
    }

    fn remove_dir(&mut self, path: &str) -> Result<()> {
        self.check(path)?;
        self.files.retain(|p, _| !is_under(p, path));
        self.dirs.retain(|d| d != path && !is_under(d, path));
        Ok(())
    }

    fn rename(&mut self, from: &str, to: &str) -> Result<()> {
        self.check(from)?;
        self.check(to)?;
        if let Some(content) = self.files.remove(from) {
            self.add_parents(to);
            self.files.insert(to.to_string(), content);
            return Ok(());
        }
        if !self.dirs.contains(from) {
            return Err(TargetError::FileNotFound {
                path: from.to_string(),
            });
        }

        let moved: Vec<String> = self
            .files
            .keys()
            .filter(|p| is_under(p, from))
            .cloned()
            .collect();
        for old in moved {
            if let Some(content) = self.files.remove(&old) {
                self.files.insert(format!("{}{}", to, &old[from.len()..]), content);
            }
        }
        let moved_dirs: Vec<String> = self
            .dirs
            .iter()
            .filter(|d| *d == from || is_under(d, from))
            .cloned()
            .collect();
        for old in moved_dirs {
            self.dirs.remove(&old);
            self.dirs.insert(format!("{}{}", to, &old[from.len()..]));
        }
        self.add_parents(to);
        Ok(())
    }

    fn copy_file(&mut self, from: &str, to: &str) -> Result<()> {
        self.check(from)?;
        self.check(to)?;
        let content = self
            .files
            .get(from)
            .cloned()
            .ok_or_else(|| TargetError::FileNotFound {
                path: from.to_string(),
            })?;
        self.add_parents(to);
        self.files.insert(to.to_string(), content);
        Ok(())
    }

    fn commit(
        &mut self,
        author: &Author,
        timestamp: DateTime<Utc>,
        message: &str,
    ) -> Result<Option<CommitId>> {
        if self.files == self.last_tree() {
            return Ok(None);
        }
        let id = CommitId(format!("{:040x}", self.commits.len() + 1));
        self.commits.push(RecordedCommit {
            id: id.clone(),
            author: author.clone(),
            timestamp,
            message: message.to_string(),
            files: self.files.clone(),
        });
        Ok(Some(id))
    }

    fn create_tag(
        &mut self,
        name: &str,
        _tagger: &Author,
        _timestamp: DateTime<Utc>,
        message: &str,
    ) -> Result<()> {
        let head = self.head("tag", name)?;
        if self.tags.contains_key(name) {
            return Err(TargetError::RefExists(name.to_string()));
        }
        self.tags.insert(name.to_string(), (head, message.to_string()));
        Ok(())
    }

    fn create_branch(&mut self, name: &str) -> Result<()> {
        let head = self.head("branch", name)?;
        if self.branches.contains_key(name) {
            return Err(TargetError::RefExists(name.to_string()));
        }
        self.branches.insert(name.to_string(), head);
        Ok(())
    }

    fn discard_changes(&mut self) -> Result<()> {
        self.files = self.last_tree();
        self.dirs.clear();
        let paths: Vec<String> = self.files.keys().cloned().collect();
        for path in paths {
            self.add_parents(&path);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
