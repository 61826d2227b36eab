//! Ecosystem capability abstraction.
//!
//! Every package ecosystem (Cargo, npm, Python, ...) implements the
//! [`Ecosystem`] contract: detect a manifest, read and write its version, and
//! list the files a version change touches. Publishing, unpublishing and a
//! post-write hook are optional capabilities surfaced as `Option<&dyn ...>`;
//! a `None` means "skip this step", never an error.
//!
//! Implementations are looked up by [`EcosystemKind`] through an
//! [`EcosystemRegistry`].
//!
//! # Example
//!
//! ```no_run
//! use camino::Utf8Path;
//! use keel_core::ecosystem::{EcosystemContext, EcosystemRegistry};
//!
//! let registry = EcosystemRegistry::builtin();
//! let path = Utf8Path::new("crates/app");
//! if let Some(ecosystem) = registry.detect(path) {
//!     let ctx = EcosystemContext::new(path);
//!     println!("{} {}", ecosystem.kind(), ecosystem.read_version(&ctx).unwrap());
//! }
//! ```

mod cargo;
mod custom;
mod docker;
mod go;
mod npm;
mod python;

use std::collections::BTreeMap;
use std::fmt;
use std::process::Command;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub use cargo::{Cargo, MAX_WORKSPACE_DEPTH};
pub use custom::{Custom, DEFAULT_VERSION_FILE};
pub use docker::Docker;
pub use go::Go;
pub use npm::Npm;
pub use python::Python;

/// Version reported by ecosystems that keep no version in their files.
pub const UNVERSIONED: &str = "0.0.0";

/// Errors from ecosystem operations.
#[derive(Error, Debug)]
pub enum EcosystemError {
    /// The manifest (or version file) does not exist.
    #[error("manifest not found: {0}")]
    ManifestNotFound(Utf8PathBuf),

    /// The manifest exists but declares no version.
    #[error("no version field in {0}")]
    VersionNotFound(Utf8PathBuf),

    /// The manifest could not be parsed.
    #[error("failed to parse {path}: {message}")]
    Parse {
        /// File that failed to parse.
        path: Utf8PathBuf,
        /// Parser error details.
        message: String,
    },

    /// A member inherits its version but no workspace root declares one.
    #[error(
        "{member} inherits its version from the workspace, but no workspace root \
         with a version was found within {depth} parent directories"
    )]
    WorkspaceRootNotFound {
        /// The member manifest.
        member: Utf8PathBuf,
        /// How many directories were searched.
        depth: usize,
    },

    /// Reading or writing a file failed.
    #[error("i/o error on {path}: {source}")]
    Io {
        /// File being accessed.
        path: Utf8PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// A required command-line tool is not on `PATH`.
    #[error("`{0}` not found on PATH")]
    ToolMissing(String),

    /// A command-line tool exited unsuccessfully.
    #[error("{tool} failed: {message}")]
    ToolFailed {
        /// Command that failed.
        tool: String,
        /// Error details.
        message: String,
    },

    /// A registry HTTP call failed.
    #[error("registry request failed: {0}")]
    Registry(String),

    /// The operation needs configuration the package does not have.
    #[error("{ecosystem} package is missing `{field}`")]
    MissingSetting {
        /// Ecosystem reporting the gap.
        ecosystem: EcosystemKind,
        /// Name of the missing setting.
        field: &'static str,
    },
}

/// Result alias for ecosystem operations.
pub type EcosystemResult<T> = Result<T, EcosystemError>;

/// A recognized package ecosystem.
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
pub enum EcosystemKind {
    /// Rust crate (`Cargo.toml`).
    Cargo,
    /// npm package (`package.json`).
    Npm,
    /// Python project (`pyproject.toml`).
    Python,
    /// Go module (`go.mod`), versioned purely by tags.
    Go,
    /// Container image (`Dockerfile`), versioned purely by tags.
    Docker,
    /// User-defined plain-text version file.
    Custom,
}

impl fmt::Display for EcosystemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cargo => write!(f, "cargo"),
            Self::Npm => write!(f, "npm"),
            Self::Python => write!(f, "python"),
            Self::Go => write!(f, "go"),
            Self::Docker => write!(f, "docker"),
            Self::Custom => write!(f, "custom"),
        }
    }
}

impl EcosystemKind {
    /// Filename that signals this ecosystem when found in a directory.
    pub const fn marker_file(self) -> &'static str {
        match self {
            Self::Cargo => "Cargo.toml",
            Self::Npm => "package.json",
            Self::Python => "pyproject.toml",
            Self::Go => "go.mod",
            Self::Docker => "Dockerfile",
            Self::Custom => DEFAULT_VERSION_FILE,
        }
    }

    /// Auto-detectable ecosystems, in detection priority order.
    ///
    /// `Custom` is absent: a bare `VERSION` file is too generic to claim.
    pub const DETECTABLE: &[Self] = &[Self::Cargo, Self::Npm, Self::Python, Self::Go, Self::Docker];
}

/// Registry login for ecosystems that talk to a registry API directly.
#[derive(Clone, PartialEq, Eq)]
pub struct RegistryCredentials {
    /// Account name, when the registry needs one.
    pub username: Option<String>,
    /// Secret token or password.
    pub token: String,
}

impl fmt::Debug for RegistryCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryCredentials")
            .field("username", &self.username)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Everything an ecosystem call needs to know about one package.
#[derive(Debug, Clone, Default)]
pub struct EcosystemContext {
    /// Directory holding the package manifest.
    pub package_path: Utf8PathBuf,
    /// Overrides the version file (custom ecosystem).
    pub version_file: Option<Utf8PathBuf>,
    /// Log intended mutations instead of performing them.
    pub dry_run: bool,
    /// Registry credentials for API-driven operations.
    pub credentials: Option<RegistryCredentials>,
    /// Published artifact name when it differs from the manifest (e.g. a
    /// Docker image repository).
    pub artifact: Option<String>,
}

impl EcosystemContext {
    /// Context for the package at `package_path` with everything else unset.
    pub fn new(package_path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            package_path: package_path.into(),
            ..Self::default()
        }
    }

    /// Set dry-run mode.
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Path of `file` inside the package directory.
    pub fn path_of(&self, file: &str) -> Utf8PathBuf {
        self.package_path.join(file)
    }
}

/// The uniform contract every ecosystem implements.
pub trait Ecosystem: Send + Sync {
    /// Which ecosystem this is.
    fn kind(&self) -> EcosystemKind;

    /// Whether `path` holds this ecosystem's manifest.
    fn detect(&self, path: &Utf8Path) -> bool {
        path.join(self.kind().marker_file()).is_file()
    }

    /// Current version of the package.
    fn read_version(&self, ctx: &EcosystemContext) -> EcosystemResult<String>;

    /// Replace the package version, touching nothing else.
    fn write_version(&self, ctx: &EcosystemContext, version: &str) -> EcosystemResult<()>;

    /// Files changed by a version write, relative to the package directory.
    fn version_files(&self, ctx: &EcosystemContext) -> EcosystemResult<Vec<Utf8PathBuf>>;

    /// Publishing capability, if the ecosystem has one.
    fn publisher(&self) -> Option<&dyn Publisher> {
        None
    }

    /// Unpublishing capability, if the registry allows deletion.
    fn unpublisher(&self) -> Option<&dyn Unpublisher> {
        None
    }

    /// Hook to run after a version write (e.g. lockfile refresh).
    fn post_write_hook(&self) -> Option<&dyn PostWriteHook> {
        None
    }

    /// Why published versions cannot be removed, for cleanup warnings.
    fn unpublish_unsupported_reason(&self) -> &'static str {
        "registry does not support deleting published versions"
    }
}

/// Push the package to its registry.
pub trait Publisher {
    /// Publish `version` of the package.
    fn publish(&self, ctx: &EcosystemContext, version: &str) -> EcosystemResult<()>;
}

/// Remove a published version from the registry.
pub trait Unpublisher {
    /// Delete `version`. `Ok(false)` means the registry had nothing to delete.
    fn unpublish(&self, ctx: &EcosystemContext, version: &str) -> EcosystemResult<bool>;
}

/// Follow-up work after the version was written.
pub trait PostWriteHook {
    /// Run the hook for the package in `ctx`.
    fn after_write(&self, ctx: &EcosystemContext) -> EcosystemResult<()>;
}

/// Name → implementation lookup for ecosystems.
pub struct EcosystemRegistry {
    entries: BTreeMap<EcosystemKind, Box<dyn Ecosystem>>,
}

impl fmt::Debug for EcosystemRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries.keys()).finish()
    }
}

impl Default for EcosystemRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl EcosystemRegistry {
    /// A registry with no ecosystems.
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// A registry holding every built-in ecosystem.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(Cargo));
        registry.register(Box::new(Npm));
        registry.register(Box::new(Python));
        registry.register(Box::new(Go));
        registry.register(Box::new(Docker));
        registry.register(Box::new(Custom));
        registry
    }

    /// Add or replace the implementation for its kind.
    pub fn register(&mut self, ecosystem: Box<dyn Ecosystem>) {
        self.entries.insert(ecosystem.kind(), ecosystem);
    }

    /// Implementation for `kind`.
    pub fn get(&self, kind: EcosystemKind) -> Option<&dyn Ecosystem> {
        self.entries.get(&kind).map(|ecosystem| &**ecosystem)
    }

    /// First auto-detectable ecosystem whose manifest is in `path`.
    pub fn detect(&self, path: &Utf8Path) -> Option<&dyn Ecosystem> {
        EcosystemKind::DETECTABLE
            .iter()
            .filter_map(|kind| self.get(*kind))
            .find(|ecosystem| ecosystem.detect(path))
            .inspect(|ecosystem| debug!(kind = %ecosystem.kind(), %path, "detected ecosystem"))
    }
}

// ──────────────────────────────────────────────
// Shared helpers
// ──────────────────────────────────────────────

/// Read a manifest, mapping a missing file to [`EcosystemError::ManifestNotFound`].
pub(crate) fn read_manifest(path: &Utf8Path) -> EcosystemResult<String> {
    std::fs::read_to_string(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            EcosystemError::ManifestNotFound(path.to_path_buf())
        } else {
            EcosystemError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })
}

pub(crate) fn write_manifest(path: &Utf8Path, contents: &str) -> EcosystemResult<()> {
    std::fs::write(path, contents).map_err(|source| EcosystemError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// The subset of `candidates` that exist in the package directory.
pub(crate) fn present_files(ctx: &EcosystemContext, candidates: &[&str]) -> Vec<Utf8PathBuf> {
    candidates
        .iter()
        .filter(|name| ctx.path_of(name).is_file())
        .map(|name| Utf8PathBuf::from(*name))
        .collect()
}

/// Run a command-line tool inside the package directory, returning stdout.
pub(crate) fn run_tool(ctx: &EcosystemContext, program: &str, args: &[&str]) -> EcosystemResult<String> {
    if which::which(program).is_err() {
        return Err(EcosystemError::ToolMissing(program.to_owned()));
    }

    let command_line = std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ");
    debug!(command = %command_line, cwd = %ctx.package_path, "running tool");

    let output = Command::new(program)
        .args(args)
        .current_dir(ctx.package_path.as_std_path())
        .output()
        .map_err(|e| EcosystemError::ToolFailed {
            tool: command_line.clone(),
            message: format!("failed to execute: {e}"),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(EcosystemError::ToolFailed {
            tool: command_line,
            message: stderr,
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
