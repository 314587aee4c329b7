// failure.rs: Failure records accumulated across pipeline stages.
//
// A TaskFailure is never thrown across a stage boundary. Workers capture
// it, log it, and park it on the queue until the driver asks for the list.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which pipeline stage produced a failure.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Reading item history from the legacy repository.
    Collect,
    /// Clustering events into changesets.
    Build,
    /// Replaying changesets into the target repository.
    Export,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Collect => "collect",
            Stage::Build => "build",
            Stage::Export => "export",
        };
        f.write_str(name)
    }
}

/// A recorded, non-fatal error attributable to one stage and one entity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskFailure {
    /// Stage that was running when the failure happened.
    pub stage: Stage,

    /// The item path or changeset identity the failure belongs to.
    pub subject: String,

    /// Rendered cause chain.
    pub cause: String,
}

impl TaskFailure {
    pub fn new(stage: Stage, subject: impl Into<String>, cause: impl Into<String>) -> Self {
        Self {
            stage,
            subject: subject.into(),
            cause: cause.into(),
        }
    }

    /// Build a failure from an error, keeping its whole context chain.
    pub fn from_error(stage: Stage, subject: impl Into<String>, error: &anyhow::Error) -> Self {
        Self::new(stage, subject, format!("{:#}", error))
    }
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.stage, self.subject, self.cause)
    }
}
