//! Release-type classification and keep-N selection.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::version::parse_version;

/// Release track a version or tag belongs to, derived from its text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseType {
    /// Development snapshot (`-dev.`).
    Dev,
    /// Alpha prerelease.
    Alpha,
    /// Beta prerelease.
    Beta,
    /// Release candidate.
    Rc,
    /// Anything without a prerelease marker.
    Stable,
}

impl ReleaseType {
    /// Every release type, in cleanup processing order.
    pub const ALL: [Self; 5] = [Self::Dev, Self::Alpha, Self::Beta, Self::Rc, Self::Stable];

    /// Prerelease types in marker priority order, paired with their marker.
    const MARKERS: [(Self, &'static str); 4] = [
        (Self::Dev, "dev"),
        (Self::Alpha, "alpha"),
        (Self::Beta, "beta"),
        (Self::Rc, "rc"),
    ];
}

impl fmt::Display for ReleaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dev => write!(f, "dev"),
            Self::Alpha => write!(f, "alpha"),
            Self::Beta => write!(f, "beta"),
            Self::Rc => write!(f, "rc"),
            Self::Stable => write!(f, "stable"),
        }
    }
}

/// Classify a tag or bare version string.
///
/// `prefix` is stripped first so `v1.2.3-rc.1` and `1.2.3-rc.1` classify
/// the same way. The first marker found in `dev`, `alpha`, `beta`, `rc`
/// order wins.
pub fn classify(version_or_tag: &str, prefix: &str) -> ReleaseType {
    let version = version_or_tag
        .strip_prefix(prefix)
        .unwrap_or(version_or_tag);
    ReleaseType::MARKERS
        .iter()
        .find(|(_, marker)| version.contains(marker))
        .map_or(ReleaseType::Stable, |(release_type, _)| *release_type)
}

/// What to clean up for one release type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupPolicy {
    /// Delete git tags.
    pub tags: bool,
    /// Delete hosted release records.
    pub releases: bool,
    /// Unpublish registry artifacts.
    pub published: bool,
    /// Most recent items to retain. `0` retains everything.
    pub keep: usize,
}

impl CleanupPolicy {
    /// Whether this policy can delete anything at all.
    pub const fn is_active(&self) -> bool {
        self.keep > 0 && (self.tags || self.releases || self.published)
    }
}

/// Per-type cleanup policies, keyed by release type (`[cleanup.rc]`).
///
/// Types without an entry get the inactive default policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CleanupConfig(pub BTreeMap<ReleaseType, CleanupPolicy>);

impl CleanupConfig {
    /// Policy for `release_type`.
    pub fn policy(&self, release_type: ReleaseType) -> CleanupPolicy {
        self.0.get(&release_type).copied().unwrap_or_default()
    }

    /// Set the policy for `release_type`.
    #[must_use]
    pub fn with(mut self, release_type: ReleaseType, policy: CleanupPolicy) -> Self {
        self.0.insert(release_type, policy);
        self
    }

    /// Whether any release type has an active policy.
    pub fn is_active(&self) -> bool {
        self.0.values().any(CleanupPolicy::is_active)
    }
}

/// Something retention can select: it has a name to classify and an
/// ordering by recency.
pub trait Candidate {
    /// Text classified by [`classify`] (tag name).
    fn name(&self) -> &str;

    /// Recency ordering; `Greater` means `self` is newer.
    fn cmp_recency(&self, other: &Self) -> Ordering;
}

/// Tags carry no timestamp, so their names stand in for recency: tags that
/// parse as versions order by semver precedence, the rest by plain text.
impl Candidate for String {
    fn name(&self) -> &str {
        self
    }

    fn cmp_recency(&self, other: &Self) -> Ordering {
        let parse = |tag: &str| {
            parse_version(tag.trim_start_matches(|c: char| !c.is_ascii_digit())).ok()
        };
        match (parse(self), parse(other)) {
            (Some(a), Some(b)) => a.cmp_precedence(&b).then_with(|| self.cmp(other)),
            _ => self.cmp(other),
        }
    }
}

/// Items of `release_type` beyond the `keep` most recent.
///
/// `keep == 0` retains everything and selects nothing. The result is
/// newest first.
pub fn select_for_cleanup<'a, T: Candidate>(
    items: &'a [T],
    release_type: ReleaseType,
    keep: usize,
    prefix: &str,
) -> Vec<&'a T> {
    if keep == 0 {
        return Vec::new();
    }
    let mut matching: Vec<&T> = items
        .iter()
        .filter(|item| classify(item.name(), prefix) == release_type)
        .collect();
    if matching.len() <= keep {
        return Vec::new();
    }
    matching.sort_by(|a, b| b.cmp_recency(a));
    let selected = matching.split_off(keep);
    debug!(
        %release_type,
        keep,
        selected = selected.len(),
        "selected items for cleanup"
    );
    selected
}
