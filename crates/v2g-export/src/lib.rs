//! Changeset replay into the target repository.
//!
//! The [`Exporter`] walks sealed changesets in order and turns each into one
//! commit on a [`TargetRepository`], keeping a [`PathMapping`] from legacy
//! item ids to working-tree paths as items are renamed, shared and deleted.
//! Labels become annotated tags and branch points become branches.
//!
//! Two sinks are built in: [`GitRepository`] drives the `git` binary, and
//! [`MemoryRepository`] records the tree and commit log in memory for tests
//! and dry runs.

pub mod error;
pub mod exporter;
pub mod git;
pub mod memory;
pub mod path_map;
pub mod refs;
pub mod target;

pub use error::TargetError;
pub use exporter::{ExportOptions, ExportStats, Exporter};
pub use git::GitRepository;
pub use memory::{MemoryRepository, RecordedCommit};
pub use path_map::PathMapping;
pub use refs::RefNamer;
pub use target::{Author, CommitId, TargetRepository};
