//! Retention and cleanup of old releases.
//!
//! Releases, tags and published artifacts are classified by [`ReleaseType`]
//! from their version text, then a per-type [`CleanupPolicy`] keeps the `N`
//! most recent of each and deletes the rest. Every deletion is independent:
//! a failure becomes an entry in [`CleanupResult::warnings`] and the run
//! moves on.
//!
//! The engine never talks to git or the hosting API itself; it drives a
//! [`TagStore`] and a [`ReleaseStore`] supplied by the caller.

mod policy;

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::ecosystem::{Ecosystem, EcosystemContext, EcosystemKind};

pub use policy::{
    Candidate, CleanupConfig, CleanupPolicy, ReleaseType, classify, select_for_cleanup,
};

/// A hosted release entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ReleaseRecord {
    /// Hosting-side identifier used for deletion.
    pub id: u64,
    /// Tag the release points at.
    pub tag_name: String,
    /// Publication time; drafts have none.
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    /// Whether the host marks it as a prerelease.
    #[serde(default)]
    pub prerelease: bool,
}

/// Release records order by publication time; unpublished drafts sort oldest.
impl Candidate for ReleaseRecord {
    fn name(&self) -> &str {
        &self.tag_name
    }

    fn cmp_recency(&self, other: &Self) -> Ordering {
        self.published_at
            .cmp(&other.published_at)
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// Deletes hosted release records.
pub trait ReleaseStore {
    /// Error reported for a failed deletion.
    type Error: fmt::Display;

    /// Delete the release with `id`.
    fn delete_release(&self, id: u64) -> Result<(), Self::Error>;
}

/// Deletes tags.
pub trait TagStore {
    /// Error reported for a failed deletion.
    type Error: fmt::Display;

    /// Delete the tag `name`.
    fn delete_tag(&self, name: &str) -> Result<(), Self::Error>;
}

/// A package whose published artifacts may be cleaned up.
pub struct PackageTarget<'a> {
    /// Display name used in results and warnings.
    pub name: String,
    /// The package's ecosystem implementation.
    pub ecosystem: &'a dyn Ecosystem,
    /// Context passed to the ecosystem's unpublisher.
    pub ctx: EcosystemContext,
}

impl fmt::Debug for PackageTarget<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackageTarget")
            .field("name", &self.name)
            .field("ecosystem", &self.ecosystem.kind())
            .field("ctx", &self.ctx)
            .finish()
    }
}

/// Everything one cleanup run operates on.
#[derive(Debug)]
pub struct CleanupRequest<'a> {
    /// Per-type policies.
    pub config: &'a CleanupConfig,
    /// Tag prefix stripped before classification.
    pub tag_prefix: &'a str,
    /// Known hosted releases.
    pub releases: &'a [ReleaseRecord],
    /// Known tag names.
    pub tags: &'a [String],
    /// Packages whose published artifacts are eligible.
    pub packages: &'a [PackageTarget<'a>],
    /// Report what would be deleted without deleting.
    pub dry_run: bool,
}

/// Outcome of a cleanup run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupResult {
    /// Tags deleted (or that would be, in dry-run).
    pub tags_deleted: Vec<String>,
    /// Tag names of release records deleted.
    pub releases_deleted: Vec<String>,
    /// `package@version` entries unpublished.
    pub packages_unpublished: Vec<String>,
    /// Non-fatal failures and skipped work.
    pub warnings: Vec<String>,
    /// Whether this was a dry run.
    pub dry_run: bool,
}

impl CleanupResult {
    /// Whether nothing was (or would be) deleted.
    pub fn is_empty(&self) -> bool {
        self.tags_deleted.is_empty()
            && self.releases_deleted.is_empty()
            && self.packages_unpublished.is_empty()
    }
}

/// Apply the retention policy across releases, tags and published artifacts.
///
/// Never fails: every deletion error is recorded as a warning.
#[instrument(skip_all, fields(dry_run = request.dry_run))]
pub fn run_cleanup<R, T>(request: &CleanupRequest<'_>, releases: &R, tags: &T) -> CleanupResult
where
    R: ReleaseStore,
    T: TagStore,
{
    let mut result = CleanupResult {
        dry_run: request.dry_run,
        ..CleanupResult::default()
    };
    let mut unsupported_warned: BTreeSet<EcosystemKind> = BTreeSet::new();

    for release_type in ReleaseType::ALL {
        let policy = request.config.policy(release_type);
        if !policy.is_active() {
            debug!(%release_type, "no active policy");
            continue;
        }

        let stale_releases = select_for_cleanup(
            request.releases,
            release_type,
            policy.keep,
            request.tag_prefix,
        );

        if policy.releases {
            for record in &stale_releases {
                delete_release(request, releases, record, &mut result);
            }
        }

        if policy.tags {
            let stale_tags =
                select_for_cleanup(request.tags, release_type, policy.keep, request.tag_prefix);
            for tag in stale_tags {
                delete_tag(request, tags, tag, &mut result);
            }
        }

        if policy.published {
            for package in request.packages {
                let Some(unpublisher) = package.ecosystem.unpublisher() else {
                    let kind = package.ecosystem.kind();
                    if unsupported_warned.insert(kind) {
                        let reason = package.ecosystem.unpublish_unsupported_reason();
                        warn!(ecosystem = %kind, reason, "cannot unpublish");
                        result.warnings.push(format!(
                            "{kind}: cannot unpublish published versions: {reason}"
                        ));
                    }
                    continue;
                };

                for record in &stale_releases {
                    let version = record
                        .tag_name
                        .strip_prefix(request.tag_prefix)
                        .unwrap_or(record.tag_name.as_str());
                    let entry = format!("{}@{version}", package.name);

                    if request.dry_run {
                        info!(%entry, "dry run: would unpublish");
                        result.packages_unpublished.push(entry);
                        continue;
                    }
                    match unpublisher.unpublish(&package.ctx, version) {
                        Ok(true) => result.packages_unpublished.push(entry),
                        Ok(false) => debug!(%entry, "nothing published to remove"),
                        Err(e) => {
                            warn!(%entry, error = %e, "unpublish failed");
                            result.warnings.push(format!("failed to unpublish {entry}: {e}"));
                        }
                    }
                }
            }
        }
    }

    info!(
        tags = result.tags_deleted.len(),
        releases = result.releases_deleted.len(),
        unpublished = result.packages_unpublished.len(),
        warnings = result.warnings.len(),
        "cleanup finished"
    );
    result
}

fn delete_release<R: ReleaseStore>(
    request: &CleanupRequest<'_>,
    store: &R,
    record: &ReleaseRecord,
    result: &mut CleanupResult,
) {
    if request.dry_run {
        info!(tag = %record.tag_name, id = record.id, "dry run: would delete release");
        result.releases_deleted.push(record.tag_name.clone());
        return;
    }
    match store.delete_release(record.id) {
        Ok(()) => {
            info!(tag = %record.tag_name, id = record.id, "deleted release");
            result.releases_deleted.push(record.tag_name.clone());
        }
        Err(e) => {
            warn!(tag = %record.tag_name, error = %e, "release deletion failed");
            result
                .warnings
                .push(format!("failed to delete release {}: {e}", record.tag_name));
        }
    }
}

fn delete_tag<T: TagStore>(
    request: &CleanupRequest<'_>,
    store: &T,
    tag: &str,
    result: &mut CleanupResult,
) {
    if request.dry_run {
        info!(%tag, "dry run: would delete tag");
        result.tags_deleted.push(tag.to_owned());
        return;
    }
    match store.delete_tag(tag) {
        Ok(()) => {
            info!(%tag, "deleted tag");
            result.tags_deleted.push(tag.to_owned());
        }
        Err(e) => {
            warn!(%tag, error = %e, "tag deletion failed");
            result.warnings.push(format!("failed to delete tag {tag}: {e}"));
        }
    }
}
