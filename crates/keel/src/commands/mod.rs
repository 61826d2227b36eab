//! Command implementations

pub mod cleanup;

pub mod info;

pub mod next;

pub mod publish;

pub mod set_version;

use anyhow::anyhow;
use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use indicatif::{ProgressBar, ProgressStyle};
use keel_core::config::{Config, PackageConfig};
use keel_core::ecosystem::{Ecosystem, EcosystemContext, EcosystemRegistry, RegistryCredentials};
use std::time::Duration;

/// Registry account name for API-driven unpublishing.
pub const ENV_REGISTRY_USERNAME: &str = "KEEL_REGISTRY_USERNAME";
/// Registry token or password for API-driven unpublishing.
pub const ENV_REGISTRY_TOKEN: &str = "KEEL_REGISTRY_TOKEN";

/// A configured package paired with its ecosystem.
pub struct ResolvedPackage<'r> {
    /// The package entry from configuration.
    pub config: PackageConfig,
    /// Ecosystem implementation handling it.
    pub ecosystem: &'r dyn Ecosystem,
}

impl ResolvedPackage<'_> {
    /// Ecosystem context under `root`, with registry credentials from the
    /// environment.
    pub fn context(&self, root: &Utf8Path, dry_run: bool) -> EcosystemContext {
        EcosystemContext {
            credentials: registry_credentials(),
            ..self.config.context(root, dry_run)
        }
    }
}

/// Resolve every configured package (or the project root when none are
/// configured) in declared order.
///
/// A package whose ecosystem can be neither read from config nor detected
/// is an error.
pub fn resolve_packages<'r>(
    registry: &'r EcosystemRegistry,
    config: &Config,
    root: &Utf8Path,
) -> anyhow::Result<Vec<ResolvedPackage<'r>>> {
    config
        .packages_or_root()
        .into_iter()
        .map(|package| {
            let ecosystem = package.resolve(registry, root).ok_or_else(|| {
                anyhow!(
                    "no ecosystem detected for package `{}`; set `ecosystem` in its [[packages]] entry",
                    package.path
                )
            })?;
            Ok(ResolvedPackage {
                config: package,
                ecosystem,
            })
        })
        .collect()
}

/// Credentials from `KEEL_REGISTRY_USERNAME` / `KEEL_REGISTRY_TOKEN`.
pub fn registry_credentials() -> Option<RegistryCredentials> {
    credentials_from(
        std::env::var(ENV_REGISTRY_USERNAME).ok(),
        std::env::var(ENV_REGISTRY_TOKEN).ok(),
    )
}

fn credentials_from(username: Option<String>, token: Option<String>) -> Option<RegistryCredentials> {
    let token = token.filter(|t| !t.is_empty())?;
    Some(RegistryCredentials {
        username: username.filter(|u| !u.is_empty()),
        token,
    })
}

/// `path` with `.` and `..` folded away, shown relative to `root` when it
/// lies inside it.
pub fn display_path(root: &Utf8Path, path: &Utf8Path) -> Utf8PathBuf {
    let mut normalized = Utf8PathBuf::new();
    for component in path.components() {
        match component {
            Utf8Component::CurDir => {}
            Utf8Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push("..");
                }
            }
            other => normalized.push(other.as_str()),
        }
    }
    match normalized.strip_prefix(root) {
        Ok(relative) if relative.as_str().is_empty() => Utf8PathBuf::from("."),
        Ok(relative) => relative.to_path_buf(),
        Err(_) => normalized,
    }
}

/// A steady spinner on stderr, hidden when output is JSON.
pub fn spinner(message: impl Into<String>, hidden: bool) -> ProgressBar {
    if hidden {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.into());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_core::ecosystem::EcosystemKind;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn credentials_need_a_token() {
        assert!(credentials_from(Some("me".into()), None).is_none());
        assert!(credentials_from(Some("me".into()), Some(String::new())).is_none());

        let creds = credentials_from(Some(String::new()), Some("s3cret".into())).unwrap();
        assert_eq!(creds.username, None);
        assert_eq!(creds.token, "s3cret");
    }

    #[test]
    fn display_path_folds_parent_dirs() {
        let root = Utf8Path::new("/work/repo");
        assert_eq!(
            display_path(root, Utf8Path::new("/work/repo/crates/app/../../Cargo.lock")),
            Utf8PathBuf::from("Cargo.lock")
        );
        assert_eq!(
            display_path(root, Utf8Path::new("/work/repo/./web/package.json")),
            Utf8PathBuf::from("web/package.json")
        );
        assert_eq!(
            display_path(root, Utf8Path::new("/elsewhere/VERSION")),
            Utf8PathBuf::from("/elsewhere/VERSION")
        );
        assert_eq!(display_path(root, root), Utf8PathBuf::from("."));
    }

    #[test]
    fn resolve_packages_detects_root() {
        let tmp = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();
        fs::write(root.join("package.json"), r#"{"version": "1.0.0"}"#).unwrap();

        let registry = EcosystemRegistry::builtin();
        let packages = resolve_packages(&registry, &Config::default(), &root).unwrap();
        assert_eq!(packages.len(), 1);
        assert_eq!(packages[0].ecosystem.kind(), EcosystemKind::Npm);
    }

    #[test]
    fn resolve_packages_rejects_undetectable() {
        let tmp = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();
        let registry = EcosystemRegistry::builtin();
        let err = resolve_packages(&registry, &Config::default(), &root)
            .err()
            .unwrap();
        assert!(err.to_string().contains("no ecosystem detected"));
    }
}
