//! Info command: show package, config, and detected package information.

use camino::{Utf8Path, Utf8PathBuf};
use clap::Args;
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::{debug, instrument};

use keel_core::config::{self, Config};
use keel_core::ecosystem::EcosystemRegistry;

/// Arguments for the `info` subcommand.
#[derive(Args, Debug, Default)]
pub struct InfoArgs {
    // No subcommand-specific arguments; uses global --json flag
}

#[derive(Serialize)]
struct PackageInfo {
    name: &'static str,
    version: &'static str,
    #[serde(skip_serializing_if = "str::is_empty")]
    description: &'static str,
    #[serde(skip_serializing_if = "str::is_empty")]
    repository: &'static str,
    #[serde(skip_serializing_if = "str::is_empty")]
    license: &'static str,
}

impl PackageInfo {
    const fn new() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            description: env!("CARGO_PKG_DESCRIPTION"),
            repository: env!("CARGO_PKG_REPOSITORY"),
            license: env!("CARGO_PKG_LICENSE"),
        }
    }
}

#[derive(Serialize)]
struct ConfigInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    config_file: Option<String>,
    log_level: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    log_dir: Option<String>,
    tag_prefix: String,
    default_bump: String,
    remote: String,
    cleanup_active: bool,
}

impl ConfigInfo {
    fn from_config(config: &Config, cwd: &Utf8Path) -> Self {
        Self {
            config_file: config::find_project_config(cwd).map(|p| p.to_string()),
            log_level: config.log_level.as_str().to_string(),
            log_dir: config.log_dir.as_ref().map(|p| p.to_string()),
            tag_prefix: config.release.tag_prefix.clone(),
            default_bump: config.release.default_bump.to_string(),
            remote: config.release.remote.clone(),
            cleanup_active: config.cleanup.is_active(),
        }
    }
}

/// One configured (or auto-detected) package as seen right now.
#[derive(Serialize)]
struct DetectedPackage {
    path: Utf8PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    ecosystem: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    publishes: bool,
    unpublishes: bool,
}

impl DetectedPackage {
    fn gather(config: &Config, cwd: &Utf8Path) -> Vec<Self> {
        let registry = EcosystemRegistry::builtin();
        config
            .packages_or_root()
            .into_iter()
            .map(|package| {
                let Some(ecosystem) = package.resolve(&registry, cwd) else {
                    return Self {
                        path: package.path,
                        ecosystem: None,
                        version: None,
                        error: Some("no ecosystem detected".into()),
                        publishes: false,
                        unpublishes: false,
                    };
                };
                let ctx = package.context(cwd, true);
                let (version, error) = match ecosystem.read_version(&ctx) {
                    Ok(version) => (Some(version), None),
                    Err(err) => (None, Some(err.to_string())),
                };
                Self {
                    path: package.path,
                    ecosystem: Some(ecosystem.kind().to_string()),
                    version,
                    error,
                    publishes: ecosystem.publisher().is_some(),
                    unpublishes: ecosystem.unpublisher().is_some(),
                }
            })
            .collect()
    }
}

#[derive(Serialize)]
struct FullInfo {
    #[serde(flatten)]
    package: PackageInfo,
    config: ConfigInfo,
    packages: Vec<DetectedPackage>,
}

/// Print package information.
///
/// # Arguments
/// * `global_json` - Global `--json` flag from CLI
/// * `config` - Loaded configuration
/// * `cwd` - Current working directory for config discovery and detection
#[instrument(name = "cmd_info", skip_all, fields(json_output))]
pub fn cmd_info(
    _args: InfoArgs,
    global_json: bool,
    config: &Config,
    cwd: &Utf8Path,
) -> anyhow::Result<()> {
    debug!(json_output = global_json, "executing info command");

    let info = FullInfo {
        package: PackageInfo::new(),
        config: ConfigInfo::from_config(config, cwd),
        packages: DetectedPackage::gather(config, cwd),
    };

    if global_json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!(
        "{} {}",
        info.package.name.bold(),
        info.package.version.green()
    );
    if !info.package.description.is_empty() {
        println!("{}", info.package.description);
    }
    if !info.package.license.is_empty() {
        println!("{}: {}", "License".dimmed(), info.package.license);
    }
    if !info.package.repository.is_empty() {
        println!("{}: {}", "Repository".dimmed(), info.package.repository.cyan());
    }

    println!();
    println!("{}", "Configuration".bold().underline());
    match info.config.config_file {
        Some(ref path) => println!("{}: {}", "Config file".dimmed(), path.cyan()),
        None => println!("{}: {}", "Config file".dimmed(), "none loaded".yellow()),
    }
    println!("{}: {}", "Log level".dimmed(), info.config.log_level);
    if let Some(ref dir) = info.config.log_dir {
        println!("{}: {}", "Log directory".dimmed(), dir);
    }
    println!("{}: {}", "Tag prefix".dimmed(), info.config.tag_prefix.cyan());
    println!("{}: {}", "Default bump".dimmed(), info.config.default_bump);
    println!("{}: {}", "Remote".dimmed(), info.config.remote);
    println!(
        "{}: {}",
        "Cleanup".dimmed(),
        if info.config.cleanup_active {
            "active"
        } else {
            "off"
        }
    );

    println!();
    println!("{}", "Packages".bold().underline());
    for package in &info.packages {
        match (&package.ecosystem, &package.version) {
            (Some(ecosystem), Some(version)) => println!(
                "  {} {} {} ({})",
                "●".green(),
                package.path.as_str().bold(),
                version.green(),
                ecosystem.cyan()
            ),
            (Some(ecosystem), None) => println!(
                "  {} {} ({}): {}",
                "●".yellow(),
                package.path.as_str().bold(),
                ecosystem.cyan(),
                package.error.as_deref().unwrap_or_default().yellow()
            ),
            (None, _) => println!(
                "  {} {} {}",
                "○".yellow(),
                package.path.as_str().bold(),
                "no recognized ecosystem".yellow()
            ),
        }
    }

    Ok(())
}
