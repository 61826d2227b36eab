//! Publish command: push every package that has a registry to it.

use anyhow::{Context, bail};
use camino::{Utf8Path, Utf8PathBuf};
use clap::Args;
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use keel_core::config::Config;
use keel_core::ecosystem::{EcosystemContext, EcosystemRegistry, UNVERSIONED};
use keel_core::git;
use keel_core::version::parse_version;

use super::{ResolvedPackage, resolve_packages, spinner};

/// Arguments for the `publish` subcommand.
#[derive(Args, Debug, Default)]
pub struct PublishArgs {
    /// Version to publish (defaults to each package's manifest version, or
    /// the latest stable tag for ecosystems without one)
    #[arg(long, value_name = "VERSION")]
    pub version: Option<String>,

    /// Log what would be published without publishing
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
enum Status {
    Published,
    Skipped,
    Failed,
}

#[derive(Debug, Serialize)]
struct PackageReport {
    path: Utf8PathBuf,
    ecosystem: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<String>,
    status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Publish each package in declared order.
///
/// A failing package does not stop the others; the command fails at the end
/// if any package failed.
#[instrument(name = "cmd_publish", skip_all, fields(json_output, dry_run = args.dry_run))]
pub fn cmd_publish(
    args: PublishArgs,
    global_json: bool,
    config: &Config,
    cwd: &Utf8Path,
) -> anyhow::Result<()> {
    debug!(json_output = global_json, "executing publish command");

    let explicit = args
        .version
        .as_deref()
        .map(parse_version)
        .transpose()
        .context("invalid --version")?
        .map(|v| v.to_string());
    let registry = EcosystemRegistry::builtin();
    let packages = resolve_packages(&registry, config, cwd)?;

    let mut reports = Vec::with_capacity(packages.len());
    for package in &packages {
        let pb = spinner(format!("Publishing {}", package.config.name()), global_json);
        let report = publish_one(package, explicit.as_deref(), args.dry_run, config, cwd);
        pb.finish_and_clear();
        if !global_json {
            print_report(&report, args.dry_run);
        }
        reports.push(report);
    }

    if global_json {
        let doc = serde_json::json!({
            "dry_run": args.dry_run,
            "packages": reports,
        });
        println!("{}", serde_json::to_string_pretty(&doc)?);
    }

    let failed = reports.iter().filter(|r| r.status == Status::Failed).count();
    if failed > 0 {
        bail!("{failed} of {} package(s) failed to publish", reports.len());
    }
    Ok(())
}

fn publish_one(
    package: &ResolvedPackage<'_>,
    explicit: Option<&str>,
    dry_run: bool,
    config: &Config,
    root: &Utf8Path,
) -> PackageReport {
    let kind = package.ecosystem.kind();
    let mut report = PackageReport {
        path: package.config.path.clone(),
        ecosystem: kind.to_string(),
        version: None,
        status: Status::Skipped,
        error: None,
    };

    let Some(publisher) = package.ecosystem.publisher() else {
        debug!(path = %report.path, ecosystem = %kind, "no publish step");
        return report;
    };

    let ctx = package.context(root, dry_run);
    let outcome = package_version(package, &ctx, explicit, config, root).and_then(|version| {
        report.version = Some(version.clone());
        publisher
            .publish(&ctx, &version)
            .with_context(|| format!("{kind} publish failed"))
    });

    match outcome {
        Ok(()) => {
            info!(
                path = %report.path,
                ecosystem = %kind,
                version = ?report.version,
                dry_run,
                "published"
            );
            report.status = Status::Published;
        }
        Err(err) => {
            let message = format!("{err:#}");
            warn!(path = %report.path, ecosystem = %kind, error = %message, "publish failed");
            report.status = Status::Failed;
            report.error = Some(message);
        }
    }
    report
}

/// Version to publish: explicit, else the manifest's, else (for ecosystems
/// that keep no version in a manifest) the latest stable tag.
fn package_version(
    package: &ResolvedPackage<'_>,
    ctx: &EcosystemContext,
    explicit: Option<&str>,
    config: &Config,
    root: &Utf8Path,
) -> anyhow::Result<String> {
    if let Some(version) = explicit {
        return Ok(version.to_string());
    }
    let version = package
        .ecosystem
        .read_version(ctx)
        .context("failed to read package version")?;
    if version != UNVERSIONED {
        return Ok(version);
    }
    git::latest_stable_tag(root, &config.release.tag_prefix)
        .context("failed to read tags")?
        .map(|v| v.to_string())
        .context("package has no version and no stable tag exists; pass --version")
}

fn print_report(report: &PackageReport, dry_run: bool) {
    let version = report.version.as_deref().unwrap_or("-");
    match report.status {
        Status::Published => {
            let verb = if dry_run { "Would publish" } else { "Published" };
            println!(
                "  {} {verb} {} {} ({})",
                "✓".green(),
                report.path.as_str().bold(),
                version.green(),
                report.ecosystem.dimmed()
            );
        }
        Status::Skipped => println!(
            "  {} {} ({}): nothing to publish",
            "○".yellow(),
            report.path.as_str().bold(),
            report.ecosystem.dimmed()
        ),
        Status::Failed => println!(
            "  {} {} ({}): {}",
            "✗".red(),
            report.path.as_str().bold(),
            report.ecosystem.dimmed(),
            report.error.as_deref().unwrap_or("unknown error").red()
        ),
    }
}
