//! # v2g-changeset
//!
//! Turns the per-file event stream of the legacy repository into logical,
//! multi-file commits.
//!
//! The legacy store records one event per file per action and has no notion
//! of an atomic commit. [`ChangesetBuilder`] reconstructs commits with a
//! time/comment heuristic governed by [`Thresholds`]: consecutive events by
//! the same user join one [`Changeset`] when they are close in time, or a
//! little further apart but carry the identical comment.

pub mod builder;
pub mod changeset;

pub use builder::{BuildStats, ChangesetBuilder, Thresholds};
pub use changeset::{Changeset, ChangesetId};
