//! # v2g-history
//!
//! The read side of the migration: what the legacy repository contains and
//! how its history becomes one ordered stream of [`RevisionEvent`]s.
//!
//! ## Key components
//!
//! - [`Item`] / [`RevisionEvent`]: immutable value types for legacy files,
//!   projects and the actions recorded against them.
//! - [`LegacyRepository`]: the boundary to the physical database reader.
//!   [`InMemoryRepository`] backs tests; [`DumpRepository`] reads an exported
//!   history dump from disk.
//! - [`RevisionCollector`]: walks a project tree on a [`v2g_queue::WorkQueue`]
//!   and delivers every event in global timestamp order.

pub mod collector;
pub mod dump;
pub mod error;
pub mod event;
pub mod filter;
pub mod item;
pub mod memory;
pub mod reader;

pub use collector::RevisionCollector;
pub use dump::DumpRepository;
pub use error::ReaderError;
pub use event::{Action, PayloadRef, RevisionEvent};
pub use filter::ExcludeFilter;
pub use item::{Item, ItemId, ItemKind};
pub use memory::InMemoryRepository;
pub use reader::{open_project, LegacyRepository, RawAction, RawActionKind};
