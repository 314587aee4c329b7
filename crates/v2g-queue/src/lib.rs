//! # v2g-queue
//!
//! Bounded work execution for the migration pipeline.
//!
//! A [`WorkQueue`] runs submitted tasks on at most N worker threads. Task
//! errors and panics are captured as [`TaskFailure`] records instead of
//! unwinding into the caller, so one bad item never stops its siblings.
//! [`WorkQueue::wait_idle`] is the barrier between pipeline stages.
//!
//! ```rust
//! use v2g_queue::{Stage, WorkQueue};
//!
//! let queue = WorkQueue::new(4);
//! queue.submit(Stage::Collect, "$/Project/a.txt", || Ok(()));
//! queue.submit(Stage::Collect, "$/Project/b.txt", || anyhow::bail!("unreadable"));
//! queue.wait_idle();
//! assert_eq!(queue.fetch_failures().map(|f| f.len()), Some(1));
//! ```

pub mod failure;
pub mod queue;

pub use failure::{Stage, TaskFailure};
pub use queue::WorkQueue;
