//! Version transitions: parsing, bumping, comparison, and prerelease minting.
//!
//! Everything here is pure. Versions are [`semver::Version`] values and every
//! transition returns a new value; nothing is mutated in place.
//!
//! # Example
//!
//! ```
//! use keel_core::version::{BumpType, bump, parse_version};
//!
//! let current = parse_version("v1.4.2-rc.1").unwrap();
//! assert_eq!(bump(&current, BumpType::Minor).unwrap().to_string(), "1.5.0");
//! ```

mod prerelease;

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use semver::Version;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::labels::BumpDecision;

pub use prerelease::{
    PrereleaseChannel, create_prerelease, create_prerelease_at, monotonic_now, prerelease_token,
};

/// Errors from version operations.
#[derive(Error, Debug)]
pub enum VersionError {
    /// Failed to parse a semver string.
    #[error("invalid version {input:?}: {source}")]
    InvalidSemver {
        /// The text that failed to parse.
        input: String,
        /// Underlying parser error.
        source: semver::Error,
    },

    /// A prerelease identifier could not be built.
    #[error("invalid prerelease identifier {0:?}")]
    InvalidPrerelease(String),

    /// Bumping would exceed the largest representable component.
    #[error("cannot apply {bump} bump to {version}: component overflow")]
    Overflow {
        /// Version being bumped.
        version: Version,
        /// Requested bump.
        bump: BumpType,
    },
}

/// Result alias for version operations.
pub type VersionResult<T> = Result<T, VersionError>;

/// Semver bump type.
///
/// Variants are declared lowest first, so the derived ordering gives
/// `Major > Minor > Patch`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum BumpType {
    /// Patch release (x.y.Z).
    Patch,
    /// Minor release (x.Y.0).
    Minor,
    /// Major release (X.0.0).
    Major,
}

impl std::fmt::Display for BumpType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Patch => write!(f, "patch"),
            Self::Minor => write!(f, "minor"),
            Self::Major => write!(f, "major"),
        }
    }
}

/// Parse a version string, stripping an optional `v` prefix.
///
/// Anything short of three numeric components (`1.2`, `v3`) is rejected.
pub fn parse_version(s: &str) -> VersionResult<Version> {
    let trimmed = s.trim();
    let bare = trimmed.strip_prefix('v').unwrap_or(trimmed);
    Version::parse(bare).map_err(|source| VersionError::InvalidSemver {
        input: s.to_owned(),
        source,
    })
}

/// The `major.minor.patch` core of a version with prerelease and build dropped.
pub const fn strip(version: &Version) -> Version {
    Version::new(version.major, version.minor, version.patch)
}

/// Compute the next version by applying a bump type.
///
/// Always bumps from the stripped core, so `1.2.3-rc.1` bumped by patch is
/// `1.2.4`, never `1.2.3`. A component already at `u64::MAX` is an
/// [`VersionError::Overflow`].
pub fn bump(current: &Version, bump: BumpType) -> VersionResult<Version> {
    let next = match bump {
        BumpType::Patch => current
            .patch
            .checked_add(1)
            .map(|patch| Version::new(current.major, current.minor, patch)),
        BumpType::Minor => current
            .minor
            .checked_add(1)
            .map(|minor| Version::new(current.major, minor, 0)),
        BumpType::Major => current
            .major
            .checked_add(1)
            .map(|major| Version::new(major, 0, 0)),
    };
    next.ok_or_else(|| VersionError::Overflow {
        version: current.clone(),
        bump,
    })
}

/// Semver precedence; build metadata does not participate.
pub fn compare(a: &Version, b: &Version) -> Ordering {
    a.cmp_precedence(b)
}

/// Whether the version carries a prerelease component.
///
/// Build metadata alone (`1.0.0+sha.abc`) is still a stable version.
pub fn is_prerelease(version: &Version) -> bool {
    !version.pre.is_empty()
}

/// Highest stable version among tag names carrying `tag_prefix`.
///
/// Tags that do not parse as versions, and prerelease tags, are ignored.
pub fn latest_stable<'a, I>(tags: I, tag_prefix: &str) -> Option<Version>
where
    I: IntoIterator<Item = &'a str>,
{
    tags.into_iter()
        .filter_map(|tag| tag.strip_prefix(tag_prefix))
        .filter_map(|bare| Version::parse(bare).ok())
        .filter(|v| !is_prerelease(v))
        .max_by(compare)
}

/// Compute the next release version from a label decision.
///
/// Returns `None` when the decision is a skip. The bump type falls back to
/// `default_bump` when no bump label was present. With `dev` set, a `dev`
/// prerelease is minted regardless of any prerelease label.
#[instrument(skip(decision), fields(skip = decision.skip))]
pub fn next_version(
    previous: &Version,
    decision: &BumpDecision,
    default_bump: BumpType,
    dev: bool,
    now: DateTime<Utc>,
) -> VersionResult<Option<Version>> {
    if decision.skip {
        debug!("skip decision, no next version");
        return Ok(None);
    }

    let bump_type = decision.bump.unwrap_or(default_bump);
    let base = bump(previous, bump_type)?;

    let channel = if dev {
        Some(PrereleaseChannel::Dev)
    } else {
        decision.prerelease
    };

    let next = match channel {
        Some(channel) => create_prerelease_at(&base, channel, now)?,
        None => base,
    };
    debug!(%previous, %next, %bump_type, ?channel, "computed next version");
    Ok(Some(next))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn v(s: &str) -> Version {
        parse_version(s).unwrap()
    }

    #[test]
    fn bump_patch() {
        assert_eq!(bump(&v("1.2.3"), BumpType::Patch).unwrap(), Version::new(1, 2, 4));
    }

    #[test]
    fn bump_minor() {
        assert_eq!(bump(&v("1.2.3"), BumpType::Minor).unwrap(), Version::new(1, 3, 0));
    }

    #[test]
    fn bump_major() {
        assert_eq!(bump(&v("1.2.3"), BumpType::Major).unwrap(), Version::new(2, 0, 0));
    }

    #[test]
    fn bump_discards_prerelease_and_build() {
        let current = v("1.2.3-beta.4+sha.abc");
        assert_eq!(bump(&current, BumpType::Major).unwrap(), Version::new(2, 0, 0));
        assert_eq!(bump(&current, BumpType::Minor).unwrap(), Version::new(1, 3, 0));
        assert_eq!(bump(&current, BumpType::Patch).unwrap(), Version::new(1, 2, 4));
    }

    #[test]
    fn bump_from_zero() {
        let zero = Version::new(0, 1, 0);
        assert_eq!(bump(&zero, BumpType::Patch).unwrap(), Version::new(0, 1, 1));
        assert_eq!(bump(&zero, BumpType::Minor).unwrap(), Version::new(0, 2, 0));
        assert_eq!(bump(&zero, BumpType::Major).unwrap(), Version::new(1, 0, 0));
    }

    #[test]
    fn bump_overflow_is_an_error() {
        let max = u64::MAX;
        assert!(matches!(
            bump(&v(&format!("{max}.0.0")), BumpType::Major),
            Err(VersionError::Overflow { .. })
        ));
        assert!(bump(&v(&format!("1.{max}.0")), BumpType::Minor).is_err());
        assert!(bump(&v(&format!("1.2.{max}")), BumpType::Patch).is_err());
        assert_eq!(
            bump(&v(&format!("1.2.{max}")), BumpType::Minor).unwrap(),
            Version::new(1, 3, 0)
        );
    }

    #[test]
    fn next_version_reports_overflow() {
        let decision = BumpDecision {
            bump: Some(BumpType::Major),
            ..BumpDecision::default()
        };
        let previous = v(&format!("{}.0.0", u64::MAX));
        assert!(next_version(&previous, &decision, BumpType::Patch, false, Utc::now()).is_err());
    }

    #[test]
    fn bump_type_ordering() {
        assert!(BumpType::Major > BumpType::Minor);
        assert!(BumpType::Minor > BumpType::Patch);
    }

    #[test]
    fn parse_with_v_prefix() {
        assert_eq!(parse_version("v1.2.3").unwrap(), Version::new(1, 2, 3));
    }

    #[test]
    fn parse_without_v_prefix() {
        assert_eq!(parse_version("1.2.3").unwrap(), Version::new(1, 2, 3));
    }

    #[test]
    fn parse_rejects_short_versions() {
        assert!(parse_version("1.2").is_err());
        assert!(parse_version("v3").is_err());
        assert!(parse_version("").is_err());
    }

    #[test]
    fn parse_invalid_reports_input() {
        let err = parse_version("not-a-version").unwrap_err();
        assert!(err.to_string().contains("not-a-version"));
    }

    #[test]
    fn stable_outranks_prerelease_of_same_core() {
        for pre in ["1.2.3-alpha.1", "1.2.3-rc.9", "1.2.3-dev.20260101000000000"] {
            assert_eq!(compare(&v("1.2.3"), &v(pre)), Ordering::Greater, "{pre}");
            assert_eq!(compare(&v(pre), &v("1.2.3")), Ordering::Less, "{pre}");
        }
    }

    #[test]
    fn compare_ignores_build_metadata() {
        assert_eq!(compare(&v("1.0.0+a"), &v("1.0.0+b")), Ordering::Equal);
        assert_eq!(compare(&v("1.0.0"), &v("1.0.1")), Ordering::Less);
    }

    #[test]
    fn is_prerelease_ignores_build() {
        assert!(is_prerelease(&v("1.0.0-rc.1")));
        assert!(!is_prerelease(&v("1.0.0+build.7")));
        assert!(!is_prerelease(&v("1.0.0")));
    }

    #[test]
    fn latest_stable_skips_prereleases_and_junk() {
        let tags = ["v1.0.0", "v1.10.0", "v1.9.3", "v2.0.0-rc.1", "nightly", "1.50.0"];
        assert_eq!(latest_stable(tags, "v"), Some(Version::new(1, 10, 0)));
    }

    #[test]
    fn latest_stable_none_without_tags() {
        assert_eq!(latest_stable(std::iter::empty(), "v"), None);
    }

    #[test]
    fn next_version_minor_label() {
        let decision = BumpDecision {
            bump: Some(BumpType::Minor),
            skip: false,
            prerelease: None,
        };
        let next = next_version(&v("1.4.2"), &decision, BumpType::Patch, false, Utc::now())
            .unwrap()
            .unwrap();
        assert_eq!(next, Version::new(1, 5, 0));
    }

    #[test]
    fn next_version_with_beta_mints_increasing_tokens() {
        let decision = BumpDecision {
            bump: Some(BumpType::Minor),
            skip: false,
            prerelease: Some(PrereleaseChannel::Beta),
        };
        let earlier = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 1).unwrap();

        let first = next_version(&v("1.4.2"), &decision, BumpType::Patch, false, earlier)
            .unwrap()
            .unwrap();
        let second = next_version(&v("1.4.2"), &decision, BumpType::Patch, false, later)
            .unwrap()
            .unwrap();

        assert!(first.to_string().starts_with("1.5.0-beta."));
        assert!(second.to_string().starts_with("1.5.0-beta."));
        assert!(first.pre.as_str() < second.pre.as_str());
    }

    #[test]
    fn next_version_skip_is_none() {
        let decision = BumpDecision {
            bump: None,
            skip: true,
            prerelease: None,
        };
        let next = next_version(&v("1.4.2"), &decision, BumpType::Patch, false, Utc::now());
        assert!(next.unwrap().is_none());
    }

    #[test]
    fn next_version_falls_back_to_default_bump() {
        let decision = BumpDecision::default();
        let next = next_version(&v("1.4.2"), &decision, BumpType::Patch, false, Utc::now())
            .unwrap()
            .unwrap();
        assert_eq!(next, Version::new(1, 4, 3));
    }

    #[test]
    fn dev_mode_overrides_prerelease_label() {
        let decision = BumpDecision {
            bump: None,
            skip: false,
            prerelease: Some(PrereleaseChannel::Rc),
        };
        let next = next_version(&v("0.3.0"), &decision, BumpType::Minor, true, Utc::now())
            .unwrap()
            .unwrap();
        assert!(next.to_string().starts_with("0.4.0-dev."), "{next}");
    }
}
