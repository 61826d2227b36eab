//! Core library for keel.
//!
//! This crate decides release versions from pull-request labels, reads and
//! writes versions across package ecosystems, and retires old releases under
//! a retention policy. The `keel` CLI is a thin layer over it.
//!
//! # Modules
//!
//! - [`version`] - Version parsing, bumping, comparison and prerelease minting
//! - [`labels`] - Pull-request labels to bump decision
//! - [`ecosystem`] - Per-ecosystem manifest access behind one trait
//! - [`cleanup`] - Retention policy and release cleanup
//! - [`config`] - Configuration loading and management
//! - [`git`] - Git tag operations
//! - [`github`] - Hosted release records via the `gh` CLI
//! - [`error`] - Configuration error types
//!
//! # Quick Start
//!
//! ```
//! use chrono::Utc;
//! use keel_core::labels::{LabelConfig, PullRequest, extract_release_labels, resolve_bump};
//! use keel_core::version::{BumpType, next_version, parse_version};
//!
//! let config = LabelConfig::default();
//! let prs = vec![PullRequest::with_labels(42, ["release:minor"])];
//! let decision = resolve_bump(&extract_release_labels(&prs, &config), &config);
//!
//! let previous = parse_version("1.4.2").unwrap();
//! let next = next_version(&previous, &decision, BumpType::Patch, false, Utc::now()).unwrap();
//! assert_eq!(next.unwrap().to_string(), "1.5.0");
//! ```
#![deny(unsafe_code)]

pub mod cleanup;

pub mod config;

pub mod ecosystem;

pub mod error;

pub mod git;

pub mod github;

pub mod labels;

pub mod version;

pub use config::{Config, ConfigLoader, LogLevel};

pub use error::{ConfigError, ConfigResult};

// Re-export semver so downstream crates don't need a direct dependency.
pub use semver;
