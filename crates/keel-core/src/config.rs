//! Configuration loading and discovery.
//!
//! [`ConfigLoader`] layers defaults, the user config file, the nearest
//! project config file and any explicit files with figment. TOML, YAML and
//! JSON are accepted; the format follows the extension.
//!
//! Project config is `.keel.<ext>` or `keel.<ext>` in the working directory
//! or an ancestor, stopping at the repository root (`.git`). User config is
//! `config.<ext>` in the platform config directory (`~/.config/keel/`).
//!
//! # Example
//! ```no_run
//! use camino::Utf8PathBuf;
//! use keel_core::config::{Config, ConfigLoader};
//!
//! let cwd = std::env::current_dir().unwrap();
//! let cwd = Utf8PathBuf::try_from(cwd).expect("current directory is not valid UTF-8");
//! let config = ConfigLoader::new()
//!     .with_project_search(&cwd)
//!     .load()
//!     .unwrap();
//! ```

use camino::{Utf8Path, Utf8PathBuf};
use figment::Figment;
use figment::providers::{Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};

use crate::cleanup::CleanupConfig;
use crate::ecosystem::{Ecosystem, EcosystemContext, EcosystemKind, EcosystemRegistry};
use crate::error::{ConfigError, ConfigResult};
use crate::labels::LabelConfig;
use crate::version::BumpType;

/// The configuration for keel.
///
/// Deserialized from config files found during discovery (TOML, YAML, or JSON).
/// Every section has defaults, so an empty file is a valid configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Log level for the application (e.g., "debug", "info", "warn", "error").
    pub log_level: LogLevel,
    /// Directory for JSONL log files (falls back to platform defaults if unset).
    pub log_dir: Option<Utf8PathBuf>,
    /// Release label names.
    pub labels: LabelConfig,
    /// Tagging and bump defaults.
    pub release: ReleaseConfig,
    /// Packages to version, in release order.
    pub packages: Vec<PackageConfig>,
    /// Retention policy per release type.
    pub cleanup: CleanupConfig,
}

impl Config {
    /// Configured packages, or the working directory as a single
    /// auto-detected package when none are listed.
    pub fn packages_or_root(&self) -> Vec<PackageConfig> {
        if self.packages.is_empty() {
            vec![PackageConfig::at(".")]
        } else {
            self.packages.clone()
        }
    }
}

/// Release workflow configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReleaseConfig {
    /// Prefix put in front of versions to form tag names (default: `"v"`).
    pub tag_prefix: String,
    /// Bump applied when no bump label is present (default: patch).
    pub default_bump: BumpType,
    /// Remote that tag deletions are pushed to (default: `"origin"`).
    pub remote: String,
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        Self {
            tag_prefix: "v".to_string(),
            default_bump: BumpType::Patch,
            remote: "origin".to_string(),
        }
    }
}

/// One versioned package.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct PackageConfig {
    /// Package directory, relative to the project root.
    pub path: Utf8PathBuf,
    /// Ecosystem override; auto-detected from marker files when unset.
    #[serde(default)]
    pub ecosystem: Option<EcosystemKind>,
    /// Version file for the custom ecosystem, relative to `path`.
    #[serde(default)]
    pub version_file: Option<Utf8PathBuf>,
    /// Published artifact name (e.g. Docker image repository).
    #[serde(default)]
    pub artifact: Option<String>,
}

impl PackageConfig {
    /// A package at `path` with everything else auto-detected.
    pub fn at(path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            path: path.into(),
            ecosystem: None,
            version_file: None,
            artifact: None,
        }
    }

    /// Ecosystem for this package: the configured one, else detection.
    pub fn resolve<'r>(
        &self,
        registry: &'r EcosystemRegistry,
        root: &Utf8Path,
    ) -> Option<&'r dyn Ecosystem> {
        match self.ecosystem {
            Some(kind) => registry.get(kind),
            None => registry.detect(&root.join(&self.path)),
        }
    }

    /// Ecosystem context for this package under `root`.
    pub fn context(&self, root: &Utf8Path, dry_run: bool) -> EcosystemContext {
        EcosystemContext {
            package_path: root.join(&self.path),
            version_file: self.version_file.clone(),
            dry_run,
            credentials: None,
            artifact: self.artifact.clone(),
        }
    }

    /// Display name: the artifact if set, else the path.
    pub fn name(&self) -> String {
        self.artifact
            .clone()
            .unwrap_or_else(|| self.path.to_string())
    }
}

/// Log level configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Verbose output for debugging and development.
    Debug,
    /// Standard operational information (default).
    #[default]
    Info,
    /// Warnings about potential issues.
    Warn,
    /// Errors that indicate failures.
    Error,
}

impl LogLevel {
    /// Returns the log level as a lowercase string slice.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Config file formats, in order of preference within one directory.
const CONFIG_EXTENSIONS: [&str; 4] = ["toml", "yaml", "yml", "json"];

/// Application name for XDG directory lookup and config file names.
const APP_NAME: &str = "keel";

/// Project config file names tried in one directory, best first: for each
/// format the dotfile wins over the plain name.
fn project_candidates(dir: &Utf8Path) -> impl Iterator<Item = Utf8PathBuf> + '_ {
    CONFIG_EXTENSIONS.into_iter().flat_map(move |ext| {
        [
            dir.join(format!(".{APP_NAME}.{ext}")),
            dir.join(format!("{APP_NAME}.{ext}")),
        ]
    })
}

/// Builder that layers config sources with figment.
///
/// Layers, lowest precedence first: defaults, user config, the nearest
/// project config, then explicit files in the order they were added.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    search_from: Option<Utf8PathBuf>,
    user_config: bool,
    boundary: Option<String>,
    explicit: Vec<Utf8PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Loader with user config enabled and `.git` as the search boundary.
    pub fn new() -> Self {
        Self {
            search_from: None,
            user_config: true,
            boundary: Some(".git".to_string()),
            explicit: Vec::new(),
        }
    }

    /// Look for project config in `path` and its ancestors.
    #[must_use]
    pub fn with_project_search<P: AsRef<Utf8Path>>(mut self, path: P) -> Self {
        self.search_from = Some(path.as_ref().to_path_buf());
        self
    }

    /// Whether `~/.config/keel/config.<ext>` takes part.
    #[must_use]
    pub const fn with_user_config(mut self, include: bool) -> Self {
        self.user_config = include;
        self
    }

    /// Stop the ancestor walk at the first directory containing `marker`.
    /// That directory is still searched.
    #[must_use]
    pub fn with_boundary_marker<S: Into<String>>(mut self, marker: S) -> Self {
        self.boundary = Some(marker.into());
        self
    }

    /// Walk all the way to the filesystem root.
    #[must_use]
    pub fn without_boundary_marker(mut self) -> Self {
        self.boundary = None;
        self
    }

    /// Layer `path` on top of everything discovered.
    #[must_use]
    pub fn with_file<P: AsRef<Utf8Path>>(mut self, path: P) -> Self {
        self.explicit.push(path.as_ref().to_path_buf());
        self
    }

    /// Files that will be merged, lowest precedence first.
    pub fn sources(&self) -> Vec<Utf8PathBuf> {
        let user = self
            .user_config
            .then(find_user_config)
            .flatten();
        let project = self
            .search_from
            .as_deref()
            .and_then(|start| self.discover(start));
        user.into_iter()
            .chain(project)
            .chain(self.explicit.iter().cloned())
            .collect()
    }

    /// Merge every source over the defaults and deserialize.
    #[tracing::instrument(skip(self), fields(search_from = ?self.search_from))]
    pub fn load(self) -> ConfigResult<Config> {
        let sources = self.sources();
        tracing::debug!(?sources, "loading configuration");

        let config: Config = sources
            .iter()
            .fold(
                Figment::new().merge(Serialized::defaults(Config::default())),
                |figment, path| merge_file(figment, path),
            )
            .extract()
            .map_err(|e| ConfigError::Deserialize(Box::new(e)))?;

        tracing::info!(
            log_level = config.log_level.as_str(),
            packages = config.packages.len(),
            "configuration loaded"
        );
        Ok(config)
    }

    /// Nearest project config at or above `start`.
    fn discover(&self, start: &Utf8Path) -> Option<Utf8PathBuf> {
        for dir in start.ancestors() {
            if let Some(found) = project_candidates(dir).find(|path| path.is_file()) {
                return Some(found);
            }
            if self
                .boundary
                .as_ref()
                .is_some_and(|marker| dir.join(marker).exists())
            {
                tracing::debug!(%dir, "config search stopped at boundary");
                break;
            }
        }
        None
    }
}

/// Format follows the file extension; anything unrecognized is read as TOML.
fn merge_file(figment: Figment, path: &Utf8Path) -> Figment {
    match path.extension() {
        Some("yaml" | "yml") => figment.merge(Yaml::file_exact(path.as_str())),
        Some("json") => figment.merge(Json::file_exact(path.as_str())),
        _ => figment.merge(Toml::file_exact(path.as_str())),
    }
}

fn find_user_config() -> Option<Utf8PathBuf> {
    let dir = user_config_dir()?;
    CONFIG_EXTENSIONS
        .into_iter()
        .map(|ext| dir.join(format!("config.{ext}")))
        .find(|path| path.is_file())
}

/// Project config that a loader searching from `start` would use.
pub fn find_project_config<P: AsRef<Utf8Path>>(start: P) -> Option<Utf8PathBuf> {
    ConfigLoader::new().discover(start.as_ref())
}

/// Per-user config directory (`~/.config/keel/` on Linux,
/// `~/Library/Application Support/keel/` on macOS).
pub fn user_config_dir() -> Option<Utf8PathBuf> {
    let dirs = directories::ProjectDirs::from("", "", APP_NAME)?;
    Utf8PathBuf::from_path_buf(dirs.config_dir().to_path_buf()).ok()
}
