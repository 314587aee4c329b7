//! # v2g-migrate
//!
//! Drives a whole migration: opens the selected legacy project, collects its
//! history, clusters it into changesets and replays them into the target.
//!
//! [`run_migration`] writes a git repository; [`run_migration_into`] accepts
//! any [`v2g_export::TargetRepository`], which is how dry runs and tests use
//! the in-memory sink.

pub mod config;
pub mod error;
pub mod pipeline;

pub use config::MigrationConfig;
pub use error::MigrationError;
pub use pipeline::{run_migration, run_migration_into, MigrationOutcome};
