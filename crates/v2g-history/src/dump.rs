// dump.rs: Legacy repository backed by an exported history dump.
//
// Layout of a dump directory:
//
//   <dir>/manifest.json   items with their raw history records
//   <dir>/data/<ref>      one file per payload reference
//
// The manifest is loaded eagerly into an InMemoryRepository index; payloads
// are read lazily from disk when the exporter asks for them.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ReaderError, Result};
use crate::event::PayloadRef;
use crate::item::Item;
use crate::memory::InMemoryRepository;
use crate::reader::{LegacyRepository, RawAction};

/// Name of the manifest file inside a dump directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Name of the payload directory inside a dump directory.
pub const DATA_DIR: &str = "data";

/// On-disk manifest format.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DumpManifest {
    pub items: Vec<DumpItem>,
}

/// One item in the manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DumpItem {
    #[serde(flatten)]
    pub item: Item,

    #[serde(default)]
    pub history: Vec<RawAction>,
}

/// Legacy repository read from a dump directory.
pub struct DumpRepository {
    root: PathBuf,
    index: InMemoryRepository,
}

impl DumpRepository {
    /// Open the dump at `dir`.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let root = dir.as_ref().to_path_buf();
        let manifest_path = root.join(MANIFEST_FILE);
        let json = fs::read_to_string(&manifest_path).map_err(|source| ReaderError::IoError {
            path: manifest_path.clone(),
            source,
        })?;
        let manifest: DumpManifest = serde_json::from_str(&json)?;

        let mut index = InMemoryRepository::empty();
        for entry in manifest.items {
            // Re-normalize paths written by hand.
            let item = Item::new(entry.item.id.as_str(), entry.item.kind, entry.item.path);
            let id = item.id.clone();
            index.insert(item);
            for action in entry.history {
                index.push_action(&id, action);
            }
        }

        tracing::info!(
            "opened history dump at {} ({} items)",
            root.display(),
            index.len()
        );
        Ok(Self { root, index })
    }

    /// Directory the dump was opened from.
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Resolve a payload reference to a file under `data/`.
    /// Rejects references that would escape the data directory.
    fn payload_path(&self, payload: &PayloadRef) -> Result<PathBuf> {
        let reference = payload.as_str();
        if reference.is_empty()
            || reference.contains("..")
            || reference.contains('/')
            || reference.contains('\\')
        {
            return Err(ReaderError::PayloadNotFound(reference.to_string()));
        }
        Ok(self.root.join(DATA_DIR).join(reference))
    }
}

impl LegacyRepository for DumpRepository {
    fn get_item(&self, path: &str) -> Result<Item> {
        self.index.get_item(path)
    }

    fn children(&self, project: &Item) -> Result<Vec<Item>> {
        self.index.children(project)
    }

    fn list_history(&self, item: &Item) -> Result<Vec<RawAction>> {
        self.index.list_history(item)
    }

    fn read_payload(&self, payload: &PayloadRef) -> Result<Vec<u8>> {
        let path = self.payload_path(payload)?;
        if !path.exists() {
            return Err(ReaderError::PayloadNotFound(payload.to_string()));
        }
        fs::read(&path).map_err(|source| ReaderError::IoError { path, source })
    }

    fn name(&self) -> &str {
        "dump"
    }
}
