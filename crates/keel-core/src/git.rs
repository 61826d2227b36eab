//! Git tag operations for release workflows.
//!
//! Shells out to `git` for all operations. This ensures we inherit the user's
//! SSH keys, credential helpers, hooks, and other configuration.

use std::process::Command;

use camino::{Utf8Path, Utf8PathBuf};
use semver::Version;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::cleanup::TagStore;
use crate::version::latest_stable;

/// Errors from git operations.
#[derive(Error, Debug)]
pub enum GitError {
    /// Failed to execute the `git` command.
    #[error("failed to run git: {0}")]
    Exec(#[from] std::io::Error),

    /// `git` returned a non-zero exit code.
    #[error("git {command} failed: {stderr}")]
    Command {
        /// The git subcommand that failed (e.g., "tag").
        command: String,
        /// Captured stderr.
        stderr: String,
    },

    /// Not inside a git repository.
    #[error("not a git repository (or any parent up to mount point)")]
    NotARepo,
}

/// Result alias for git operations.
pub type GitResult<T> = Result<T, GitError>;

/// Tags in `repo` starting with `prefix`, newest version first.
#[instrument(skip_all, fields(%repo, %prefix))]
pub fn list_tags(repo: &Utf8Path, prefix: &str) -> GitResult<Vec<String>> {
    let pattern = format!("{prefix}*");
    let output = git(
        repo,
        &["tag", "--list", &pattern, "--sort=-version:refname"],
    )?;
    let tags: Vec<String> = output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect();
    debug!(count = tags.len(), "listed tags");
    Ok(tags)
}

/// Highest stable version among the tags in `repo`.
///
/// Returns `None` when no tag parses as a stable version.
#[instrument(skip_all, fields(%repo, %prefix))]
pub fn latest_stable_tag(repo: &Utf8Path, prefix: &str) -> GitResult<Option<Version>> {
    let tags = list_tags(repo, prefix)?;
    let latest = latest_stable(tags.iter().map(String::as_str), prefix);
    debug!(latest = ?latest.as_ref().map(ToString::to_string), "latest stable tag");
    Ok(latest)
}

/// Get the remote URL for a named remote (default: `"origin"`).
#[instrument(skip(repo))]
pub fn remote_url(repo: &Utf8Path, remote: &str) -> GitResult<Option<String>> {
    match git(repo, &["remote", "get-url", remote]) {
        Ok(url) => {
            let url = url.trim().to_string();
            debug!(%remote, %url, "remote URL");
            Ok(Some(url))
        }
        Err(GitError::Command { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Parse owner and repo from a git remote URL.
///
/// Handles both HTTPS and SSH formats:
/// - `https://github.com/owner/repo.git`
/// - `git@github.com:owner/repo.git`
///
/// Returns `None` if the URL cannot be parsed.
pub fn parse_owner_repo(url: &str) -> Option<(String, String)> {
    let path = url.strip_prefix("git@").map_or_else(
        || {
            url.split("//")
                .nth(1)
                .and_then(|after_scheme| after_scheme.split_once('/').map(|(_, path)| path))
        },
        |rest| rest.split_once(':').map(|(_, path)| path),
    )?;

    let path = path.strip_suffix(".git").unwrap_or(path);
    let (owner, repo) = path.split_once('/')?;

    if owner.is_empty() || repo.is_empty() || repo.contains('/') {
        return None;
    }

    Some((owner.to_string(), repo.to_string()))
}

/// Check if `repo` is inside a git work tree.
#[instrument(skip_all)]
pub fn is_inside_repo(repo: &Utf8Path) -> GitResult<bool> {
    match git(repo, &["rev-parse", "--is-inside-work-tree"]) {
        Ok(output) => Ok(output.trim() == "true"),
        Err(GitError::Command { .. } | GitError::NotARepo) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Tag store backed by the local repository and, optionally, a remote.
#[derive(Debug, Clone)]
pub struct GitTags {
    repo: Utf8PathBuf,
    remote: Option<String>,
}

impl GitTags {
    /// Delete tags in `repo` only.
    pub fn local(repo: impl Into<Utf8PathBuf>) -> Self {
        Self {
            repo: repo.into(),
            remote: None,
        }
    }

    /// Delete tags in `repo` and push the deletion to `remote`.
    pub fn with_remote(repo: impl Into<Utf8PathBuf>, remote: impl Into<String>) -> Self {
        Self {
            repo: repo.into(),
            remote: Some(remote.into()),
        }
    }
}

impl TagStore for GitTags {
    type Error = GitError;

    /// Remote first: a failed push leaves the local tag in place, so the
    /// next run still lists it and retries.
    #[instrument(skip(self))]
    fn delete_tag(&self, name: &str) -> GitResult<()> {
        if let Some(remote) = &self.remote {
            let refspec = format!(":refs/tags/{name}");
            git(&self.repo, &["push", remote, &refspec])?;
        }
        git(&self.repo, &["tag", "-d", name])?;
        info!(tag = name, remote = ?self.remote, "deleted tag");
        Ok(())
    }
}

/// Run a git command in `repo` and return its stdout.
fn git(repo: &Utf8Path, args: &[&str]) -> GitResult<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(repo.as_std_path())
        .output()?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if stderr.contains("not a git repository") {
            return Err(GitError::NotARepo);
        }

        Err(GitError::Command {
            command: args.first().unwrap_or(&"").to_string(),
            stderr,
        })
    }
}
