//! Label resolution: turn merged pull-request labels into a bump decision.
//!
//! Two steps, both pure:
//!
//! 1. [`extract_release_labels`] narrows every PR's labels to the configured
//!    release labels, applying the skip consensus rule.
//! 2. [`resolve_bump`] picks the highest-priority bump type and prerelease
//!    channel from that set.
//!
//! # Example
//!
//! ```
//! use keel_core::labels::{LabelConfig, PullRequest, extract_release_labels, resolve_bump};
//! use keel_core::version::BumpType;
//!
//! let config = LabelConfig::default();
//! let prs = vec![PullRequest::with_labels(1, ["release:minor"])];
//! let decision = resolve_bump(&extract_release_labels(&prs, &config), &config);
//! assert_eq!(decision.bump, Some(BumpType::Minor));
//! ```

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::version::{BumpType, PrereleaseChannel};

/// Label strings for each release role.
///
/// Matching is exact and case-sensitive.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct LabelConfig {
    /// Label requesting a major bump.
    pub major: String,
    /// Label requesting a minor bump.
    pub minor: String,
    /// Label requesting a patch bump.
    pub patch: String,
    /// Label marking a PR as not release-worthy.
    pub skip: String,
    /// Label requesting an alpha prerelease.
    pub alpha: String,
    /// Label requesting a beta prerelease.
    pub beta: String,
    /// Label requesting a release candidate.
    pub rc: String,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            major: "release:major".into(),
            minor: "release:minor".into(),
            patch: "release:patch".into(),
            skip: "release:skip".into(),
            alpha: "release:alpha".into(),
            beta: "release:beta".into(),
            rc: "release:rc".into(),
        }
    }
}

impl LabelConfig {
    /// Whether `label` is one of the seven configured release labels.
    pub fn is_release_label(&self, label: &str) -> bool {
        [
            &self.major,
            &self.minor,
            &self.patch,
            &self.skip,
            &self.alpha,
            &self.beta,
            &self.rc,
        ]
        .into_iter()
        .any(|configured| configured == label)
    }
}

/// A merged pull request, as far as release decisions are concerned.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PullRequest {
    /// PR number.
    pub number: u64,
    /// Merge time, if reported.
    #[serde(default)]
    pub merged_at: Option<DateTime<Utc>>,
    /// Label names on the PR.
    #[serde(default, deserialize_with = "de::labels")]
    pub labels: Vec<String>,
}

impl PullRequest {
    /// Build a PR record from a number and label names.
    pub fn with_labels<I, S>(number: u64, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            number,
            merged_at: None,
            labels: labels.into_iter().map(Into::into).collect(),
        }
    }

    fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }
}

/// Outcome of label resolution for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BumpDecision {
    /// Highest bump type requested, or `None` when no bump label was present.
    pub bump: Option<BumpType>,
    /// Whether the whole batch opted out of a release.
    pub skip: bool,
    /// Highest prerelease channel requested.
    pub prerelease: Option<PrereleaseChannel>,
}

impl BumpDecision {
    /// The terminal "do not release" decision.
    pub const fn skipped() -> Self {
        Self {
            bump: None,
            skip: true,
            prerelease: None,
        }
    }
}

/// Collect the configured release labels present across `prs`.
///
/// The skip label survives only when every PR carries it: a single PR
/// without it means the batch holds release-worthy change.
#[instrument(skip_all, fields(prs = prs.len()))]
pub fn extract_release_labels(prs: &[PullRequest], config: &LabelConfig) -> BTreeSet<String> {
    let mut labels: BTreeSet<String> = prs
        .iter()
        .flat_map(|pr| pr.labels.iter())
        .filter(|label| config.is_release_label(label))
        .cloned()
        .collect();

    let unanimous_skip = !prs.is_empty() && prs.iter().all(|pr| pr.has_label(&config.skip));
    if !unanimous_skip && labels.remove(&config.skip) {
        debug!(skip = %config.skip, "skip label dropped, not every PR carries it");
    }

    debug!(?labels, "extracted release labels");
    labels
}

/// Resolve a set of release labels into a [`BumpDecision`].
#[instrument(skip_all)]
pub fn resolve_bump(labels: &BTreeSet<String>, config: &LabelConfig) -> BumpDecision {
    if labels.contains(&config.skip) {
        debug!("skip label present");
        return BumpDecision::skipped();
    }

    let bump = [
        (&config.major, BumpType::Major),
        (&config.minor, BumpType::Minor),
        (&config.patch, BumpType::Patch),
    ]
    .into_iter()
    .find_map(|(label, bump)| labels.contains(label).then_some(bump));

    let prerelease = [
        (&config.rc, PrereleaseChannel::Rc),
        (&config.beta, PrereleaseChannel::Beta),
        (&config.alpha, PrereleaseChannel::Alpha),
    ]
    .into_iter()
    .find_map(|(label, channel)| labels.contains(label).then_some(channel));

    let decision = BumpDecision {
        bump,
        skip: false,
        prerelease,
    };
    debug!(?decision, "resolved bump decision");
    decision
}

mod de {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Label {
        Name(String),
        Object { name: String },
    }

    /// Accept labels as plain strings or as `{ "name": ... }` objects.
    pub(super) fn labels<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Vec::<Label>::deserialize(deserializer)?;
        Ok(raw
            .into_iter()
            .map(|label| match label {
                Label::Name(name) | Label::Object { name } => name,
            })
            .collect())
    }
}
