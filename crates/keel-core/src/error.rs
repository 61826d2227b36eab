//! Configuration error types for keel-core.
//!
//! Each engine module defines its own error enum next to its code
//! ([`crate::version::VersionError`], [`crate::ecosystem::EcosystemError`],
//! [`crate::git::GitError`], [`crate::github::GithubError`]).

use thiserror::Error;

/// Errors that can occur when working with configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error("invalid configuration: {0}")]
    Deserialize(#[from] Box<figment::Error>),
}

/// Result type alias using [`ConfigError`].
pub type ConfigResult<T> = Result<T, ConfigError>;
