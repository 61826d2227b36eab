//! Hosted release records through the GitHub CLI.
//!
//! Shells out to `gh api` so authentication, hosts and proxies follow the
//! user's `gh` setup.

use std::process::Command;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::cleanup::{ReleaseRecord, ReleaseStore};
use crate::git::{self, GitError};

/// Errors from GitHub operations.
#[derive(Error, Debug)]
pub enum GithubError {
    /// Failed to execute the `gh` command.
    #[error("failed to run gh: {0}")]
    Exec(#[from] std::io::Error),

    /// `gh` returned a non-zero exit code.
    #[error("gh {endpoint} failed: {stderr}")]
    Command {
        /// API endpoint requested.
        endpoint: String,
        /// Captured stderr.
        stderr: String,
    },

    /// The API returned something other than release records.
    #[error("unexpected response from {endpoint}: {source}")]
    Parse {
        /// API endpoint requested.
        endpoint: String,
        /// Underlying JSON error.
        source: serde_json::Error,
    },

    /// The remote is missing or does not look like `owner/repo`.
    #[error("cannot determine GitHub repository from remote `{0}`")]
    UnknownRepo(String),

    /// Looking up the remote failed.
    #[error(transparent)]
    Git(#[from] GitError),
}

/// Result alias for GitHub operations.
pub type GithubResult<T> = Result<T, GithubError>;

/// Release store for one GitHub repository.
#[derive(Debug, Clone)]
pub struct GhReleases {
    workdir: Utf8PathBuf,
    owner: String,
    repo: String,
}

impl GhReleases {
    /// Store for `owner/repo`, running `gh` from `workdir`.
    pub fn new(
        workdir: impl Into<Utf8PathBuf>,
        owner: impl Into<String>,
        repo: impl Into<String>,
    ) -> Self {
        Self {
            workdir: workdir.into(),
            owner: owner.into(),
            repo: repo.into(),
        }
    }

    /// Store for the repository `remote` points at.
    #[instrument(skip(workdir))]
    pub fn from_remote(workdir: &Utf8Path, remote: &str) -> GithubResult<Self> {
        let url = git::remote_url(workdir, remote)?
            .ok_or_else(|| GithubError::UnknownRepo(remote.to_owned()))?;
        let (owner, repo) = git::parse_owner_repo(&url)
            .ok_or_else(|| GithubError::UnknownRepo(remote.to_owned()))?;
        debug!(%owner, %repo, "resolved GitHub repository");
        Ok(Self::new(workdir, owner, repo))
    }

    /// `owner/repo` slug.
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    /// Every release record, across all pages.
    #[instrument(skip(self), fields(repo = %self.slug()))]
    pub fn list_releases(&self) -> GithubResult<Vec<ReleaseRecord>> {
        let endpoint = format!("repos/{}/releases?per_page=100", self.slug());
        let output = self.gh_api(&["--paginate", &endpoint])?;
        let releases = parse_pages(&output).map_err(|source| GithubError::Parse {
            endpoint: endpoint.clone(),
            source,
        })?;
        debug!(count = releases.len(), "listed releases");
        Ok(releases)
    }

    fn gh_api(&self, args: &[&str]) -> GithubResult<String> {
        let output = Command::new("gh")
            .arg("api")
            .args(args)
            .current_dir(self.workdir.as_std_path())
            .output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(GithubError::Command {
                endpoint: args.last().copied().unwrap_or_default().to_owned(),
                stderr,
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl ReleaseStore for GhReleases {
    type Error = GithubError;

    #[instrument(skip(self), fields(repo = %self.slug()))]
    fn delete_release(&self, id: u64) -> GithubResult<()> {
        let endpoint = format!("repos/{}/releases/{id}", self.slug());
        self.gh_api(&["-X", "DELETE", &endpoint])?;
        info!(id, "deleted release");
        Ok(())
    }
}

/// `gh api --paginate` prints one JSON array per page, back to back.
fn parse_pages(output: &str) -> serde_json::Result<Vec<ReleaseRecord>> {
    let mut releases = Vec::new();
    for page in serde_json::Deserializer::from_str(output).into_iter::<Vec<ReleaseRecord>>() {
        releases.extend(page?);
    }
    Ok(releases)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_concatenated_pages() {
        let output = r#"[{"id": 1, "tag_name": "v1.0.0", "published_at": "2026-01-01T00:00:00Z", "prerelease": false}]
[{"id": 2, "tag_name": "v1.1.0-rc.1", "published_at": null, "prerelease": true, "draft": true}]
"#;
        let releases = parse_pages(output).unwrap();
        assert_eq!(releases.len(), 2);
        assert_eq!(releases[1].tag_name, "v1.1.0-rc.1");
        assert!(releases[1].published_at.is_none());
    }

    #[test]
    fn empty_output_is_no_releases() {
        assert!(parse_pages("").unwrap().is_empty());
        assert!(parse_pages("[]\n").unwrap().is_empty());
    }

    #[test]
    fn garbage_is_parse_error() {
        assert!(parse_pages("{\"message\": \"Not Found\"}").is_err());
    }

    #[test]
    fn slug_joins_owner_and_repo() {
        assert_eq!(GhReleases::new(".", "keel-rs", "keel").slug(), "keel-rs/keel");
    }
}
