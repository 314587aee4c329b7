// git.rs: Target repository backed by the git command-line tool.
//
// File operations go straight to the working tree with std::fs; git is only
// invoked to stage, commit, tag and branch. Author and committer identity
// and dates are passed through the GIT_* environment so the host's git
// configuration never leaks into migrated history.

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::process::Command;

use chrono::{DateTime, Utc};

use crate::error::{Result, TargetError};
use crate::target::{Author, CommitId, TargetRepository};

/// Git working tree used as the migration target.
pub struct GitRepository {
    /// Working directory for git operations
    work_dir: PathBuf,
    default_branch: String,
}

impl GitRepository {
    /// Create a sink for the given working directory. Nothing touches disk
    /// until [`TargetRepository::init`].
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            default_branch: "main".to_string(),
        }
    }

    /// Set the branch the history is written to and return self.
    pub fn with_default_branch(mut self, branch: impl Into<String>) -> Self {
        self.default_branch = branch.into();
        self
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Run a git command in the working directory
    fn git_cmd(&self, args: &[&str]) -> Result<String> {
        self.git_cmd_env(args, &[])
    }

    fn git_cmd_env(&self, args: &[&str], envs: &[(&str, String)]) -> Result<String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.work_dir)
            .envs(envs.iter().map(|(k, v)| (*k, v.as_str())))
            .output()
            .map_err(|source| TargetError::IoError {
                path: self.work_dir.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TargetError::VcsError(format!(
                "git {} failed: {}",
                args.join(" "),
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn has_head(&self) -> bool {
        self.git_cmd(&["rev-parse", "--verify", "-q", "HEAD"]).is_ok()
    }

    fn ref_exists(&self, full_ref: &str) -> bool {
        self.git_cmd(&["rev-parse", "--verify", "-q", full_ref]).is_ok()
    }

    /// Resolve a relative path inside the working tree.
    /// Rejects absolute paths and parent-directory components.
    fn resolve_path(&self, relative_path: &str) -> Result<PathBuf> {
        let relative = Path::new(relative_path);
        let escapes = relative_path.is_empty()
            || relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(TargetError::PathTraversal {
                path: relative_path.to_string(),
            });
        }
        Ok(self.work_dir.join(relative))
    }

    fn create_parent(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| TargetError::IoError {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        Ok(())
    }
}

/// GIT_* environment for a commit or tag by `author` at `timestamp`.
fn identity_env(author: &Author, timestamp: DateTime<Utc>) -> Vec<(&'static str, String)> {
    // Git's raw date format: seconds since the epoch plus a zone offset.
    let date = format!("{} +0000", timestamp.timestamp());
    vec![
        ("GIT_AUTHOR_NAME", author.name.clone()),
        ("GIT_AUTHOR_EMAIL", author.email.clone()),
        ("GIT_AUTHOR_DATE", date.clone()),
        ("GIT_COMMITTER_NAME", author.name.clone()),
        ("GIT_COMMITTER_EMAIL", author.email.clone()),
        ("GIT_COMMITTER_DATE", date),
    ]
}

impl TargetRepository for GitRepository {
    fn init(&mut self) -> Result<()> {
        fs::create_dir_all(&self.work_dir).map_err(|source| TargetError::IoError {
            path: self.work_dir.clone(),
            source,
        })?;

        tracing::info!("GitRepository: initializing {}", self.work_dir.display());
        self.git_cmd(&["init", "-q"])?;
        let head_ref = format!("refs/heads/{}", self.default_branch);
        self.git_cmd(&["symbolic-ref", "HEAD", &head_ref])?;

        // Keep content byte-for-byte and never prompt for signing keys.
        self.git_cmd(&["config", "core.autocrlf", "false"])?;
        self.git_cmd(&["config", "commit.gpgsign", "false"])?;
        self.git_cmd(&["config", "tag.gpgsign", "false"])?;
        Ok(())
    }

    fn write_file(&mut self, path: &str, content: &[u8]) -> Result<()> {
        let full_path = self.resolve_path(path)?;
        Self::create_parent(&full_path)?;
        fs::write(&full_path, content).map_err(|source| TargetError::IoError {
            path: full_path,
            source,
        })
    }

    fn create_dir(&mut self, path: &str) -> Result<()> {
        let full_path = self.resolve_path(path)?;
        fs::create_dir_all(&full_path).map_err(|source| TargetError::IoError {
            path: full_path,
            source,
        })
    }

    fn remove_file(&mut self, path: &str) -> Result<()> {
        let full_path = self.resolve_path(path)?;
        if !full_path.is_file() {
            tracing::debug!("GitRepository: {} already absent", path);
            return Ok(());
        }
        fs::remove_file(&full_path).map_err(|source| TargetError::IoError {
            path: full_path,
            source,
        })
    }

    fn remove_dir(&mut self, path: &str) -> Result<()> {
        let full_path = self.resolve_path(path)?;
        if !full_path.is_dir() {
            tracing::debug!("GitRepository: {} already absent", path);
            return Ok(());
        }
        fs::remove_dir_all(&full_path).map_err(|source| TargetError::IoError {
            path: full_path,
            source,
        })
    }

    fn rename(&mut self, from: &str, to: &str) -> Result<()> {
        let from_path = self.resolve_path(from)?;
        let to_path = self.resolve_path(to)?;
        if !from_path.exists() {
            return Err(TargetError::FileNotFound {
                path: from.to_string(),
            });
        }
        Self::create_parent(&to_path)?;
        fs::rename(&from_path, &to_path).map_err(|source| TargetError::IoError {
            path: from_path,
            source,
        })
    }

    fn copy_file(&mut self, from: &str, to: &str) -> Result<()> {
        let from_path = self.resolve_path(from)?;
        let to_path = self.resolve_path(to)?;
        if !from_path.is_file() {
            return Err(TargetError::FileNotFound {
                path: from.to_string(),
            });
        }
        Self::create_parent(&to_path)?;
        fs::copy(&from_path, &to_path)
            .map(|_| ())
            .map_err(|source| TargetError::IoError {
                path: to_path,
                source,
            })
    }

    fn commit(
        &mut self,
        author: &Author,
        timestamp: DateTime<Utc>,
        message: &str,
    ) -> Result<Option<CommitId>> {
        self.git_cmd(&["add", "-A"])?;

        let status = self.git_cmd(&["status", "--porcelain"])?;
        if status.is_empty() {
            return Ok(None);
        }

        self.git_cmd_env(
            &["commit", "-q", "--allow-empty-message", "-m", message],
            &identity_env(author, timestamp),
        )?;

        let commit_id = CommitId(self.git_cmd(&["rev-parse", "HEAD"])?);
        tracing::debug!("GitRepository: committed {} as {}", commit_id.short(), author);
        Ok(Some(commit_id))
    }

    fn create_tag(
        &mut self,
        name: &str,
        tagger: &Author,
        timestamp: DateTime<Utc>,
        message: &str,
    ) -> Result<()> {
        if !self.has_head() {
            return Err(TargetError::NoHead {
                kind: "tag",
                name: name.to_string(),
            });
        }
        if self.ref_exists(&format!("refs/tags/{}", name)) {
            return Err(TargetError::RefExists(name.to_string()));
        }
        let message = if message.trim().is_empty() { name } else { message };
        self.git_cmd_env(
            &["tag", "-a", name, "-m", message],
            &identity_env(tagger, timestamp),
        )?;
        Ok(())
    }

    fn create_branch(&mut self, name: &str) -> Result<()> {
        if !self.has_head() {
            return Err(TargetError::NoHead {
                kind: "branch",
                name: name.to_string(),
            });
        }
        if self.ref_exists(&format!("refs/heads/{}", name)) {
            return Err(TargetError::RefExists(name.to_string()));
        }
        self.git_cmd(&["branch", name])?;
        Ok(())
    }

    fn discard_changes(&mut self) -> Result<()> {
        if self.has_head() {
            self.git_cmd(&["reset", "-q", "--hard", "HEAD"])?;
        } else {
            self.git_cmd(&["read-tree", "--empty"])?;
        }
        self.git_cmd(&["clean", "-q", "-f", "-d"])?;
        Ok(())
    }

    fn name(&self) -> &str {
        "git"
    }
}
