//! Prerelease channels and identifier minting.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use semver::{Prerelease, Version};
use serde::{Deserialize, Serialize};

use super::{VersionError, VersionResult, strip};

/// Layout of the sortable prerelease token: UTC time down to nanoseconds.
///
/// Every field is zero-padded, so tokens have a fixed width of 23 digits and
/// compare lexicographically in creation order.
const TOKEN_FORMAT: &str = "%Y%m%d%H%M%S%9f";

/// Last instant handed out by [`monotonic_now`], in nanoseconds since the epoch.
static LAST_MINTED: AtomicI64 = AtomicI64::new(i64::MIN);

/// A prerelease track, ordered by proximity to stable (`Rc` highest).
///
/// `Dev` is chosen by run mode, never by a pull-request label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrereleaseChannel {
    /// Development snapshot.
    Dev,
    /// Alpha prerelease.
    Alpha,
    /// Beta prerelease.
    Beta,
    /// Release candidate.
    Rc,
}

impl PrereleaseChannel {
    /// Identifier used as the first prerelease component.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Dev => "dev",
            Self::Alpha => "alpha",
            Self::Beta => "beta",
            Self::Rc => "rc",
        }
    }
}

impl std::fmt::Display for PrereleaseChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The sortable suffix for a prerelease minted at `at`.
pub fn prerelease_token(at: DateTime<Utc>) -> String {
    at.format(TOKEN_FORMAT).to_string()
}

/// The current time, strictly later than any earlier call in this process.
///
/// A clock reading equal to (or behind) the previous one is moved one
/// nanosecond past it, so tokens minted back to back never collide.
pub fn monotonic_now() -> DateTime<Utc> {
    let now = Utc::now();
    let Some(nanos) = now.timestamp_nanos_opt() else {
        return now;
    };
    let next = |last: i64| nanos.max(last.saturating_add(1));
    let previous = match LAST_MINTED.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
        Some(next(last))
    }) {
        Ok(last) | Err(last) => last,
    };
    DateTime::from_timestamp_nanos(next(previous))
}

/// Mint `{major}.{minor}.{patch}-{channel}.{token}` using [`monotonic_now`].
pub fn create_prerelease(version: &Version, channel: PrereleaseChannel) -> VersionResult<Version> {
    create_prerelease_at(version, channel, monotonic_now())
}

/// Mint a prerelease of `version` for `channel` stamped with `at`.
///
/// Any existing prerelease or build metadata on `version` is dropped first.
pub fn create_prerelease_at(
    version: &Version,
    channel: PrereleaseChannel,
    at: DateTime<Utc>,
) -> VersionResult<Version> {
    let ident = format!("{channel}.{}", prerelease_token(at));
    let pre = Prerelease::new(&ident).map_err(|_| VersionError::InvalidPrerelease(ident))?;

    let mut next = strip(version);
    next.pre = pre;
    Ok(next)
}
