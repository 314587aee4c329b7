//! Migration settings, loaded from an optional TOML file.

use std::path::Path;

use serde::{Deserialize, Serialize};
use v2g_changeset::Thresholds;

use crate::error::{MigrationError, Result};

/// Tunables for one migration run.
///
/// ```toml
/// any_comment_threshold_secs = 30
/// same_comment_threshold_secs = 600
/// email_domain = "example.com"
/// exclude = ["*.scc", "$/Project/bin"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Events of one user closer than this always join one changeset.
    #[serde(default = "default_any_comment_threshold")]
    pub any_comment_threshold_secs: i64,

    /// Events of one user with the identical comment closer than this join
    /// one changeset.
    #[serde(default = "default_same_comment_threshold")]
    pub same_comment_threshold_secs: i64,

    /// Domain for generated author emails.
    #[serde(default = "default_email_domain")]
    pub email_domain: String,

    /// Parallel history readers.
    #[serde(default = "default_workers")]
    pub collector_workers: usize,

    /// Parallel content reads within one changeset.
    #[serde(default = "default_workers")]
    pub content_workers: usize,

    /// Glob patterns of legacy paths to leave out.
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Branch the migrated history is written to.
    #[serde(default = "default_branch")]
    pub default_branch: String,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            any_comment_threshold_secs: default_any_comment_threshold(),
            same_comment_threshold_secs: default_same_comment_threshold(),
            email_domain: default_email_domain(),
            collector_workers: default_workers(),
            content_workers: default_workers(),
            exclude: Vec::new(),
            default_branch: default_branch(),
        }
    }
}

// Serde default functions
fn default_any_comment_threshold() -> i64 {
    30
}

fn default_same_comment_threshold() -> i64 {
    600
}

fn default_email_domain() -> String {
    "localhost".to_string()
}

fn default_workers() -> usize {
    1
}

fn default_branch() -> String {
    "main".to_string()
}

impl MigrationConfig {
    /// Load settings from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let origin = || format!("file {}", path.display());
        let content = std::fs::read_to_string(path).map_err(|e| MigrationError::Config {
            origin: origin(),
            reason: e.to_string(),
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| MigrationError::Config {
            origin: origin(),
            reason: e.to_string(),
        })?;
        config
            .checked_thresholds()
            .map_err(|reason| MigrationError::Config {
                origin: origin(),
                reason,
            })?;
        Ok(config)
    }

    /// Try to load settings, returning defaults if the file is missing or
    /// malformed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                if path.exists() {
                    tracing::warn!("{}; using defaults", e);
                }
                Self::default()
            }
        }
    }

    /// Clustering windows. Fails for negative values and for values too
    /// large to represent as a duration.
    pub fn thresholds(&self) -> Result<Thresholds> {
        self.checked_thresholds()
            .map_err(|reason| MigrationError::Config {
                origin: "settings".to_string(),
                reason,
            })
    }

    fn checked_thresholds(&self) -> std::result::Result<Thresholds, String> {
        let windows = [
            ("any_comment_threshold_secs", self.any_comment_threshold_secs),
            ("same_comment_threshold_secs", self.same_comment_threshold_secs),
        ];
        for (name, secs) in windows {
            if secs < 0 {
                return Err(format!("{} must not be negative (got {})", name, secs));
            }
        }
        Thresholds::try_from_secs(
            self.any_comment_threshold_secs,
            self.same_comment_threshold_secs,
        )
        .ok_or_else(|| {
            format!(
                "thresholds {}s and {}s are out of range",
                self.any_comment_threshold_secs, self.same_comment_threshold_secs
            )
        })
    }
}
