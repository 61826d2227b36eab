//! Set-version command: write one version into every configured package.

use std::collections::BTreeSet;

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use clap::Args;
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::{debug, info, instrument};

use keel_core::config::Config;
use keel_core::ecosystem::EcosystemRegistry;
use keel_core::version::parse_version;

use super::{ResolvedPackage, display_path, resolve_packages};

/// Arguments for the `set-version` subcommand.
#[derive(Args, Debug, Default)]
pub struct SetVersionArgs {
    /// Version to write (e.g., "1.2.3" or "v1.2.3-rc.20260101120000000")
    #[arg(value_name = "VERSION")]
    pub version: String,

    /// Log what would change without touching any file
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Serialize)]
struct SetVersionOutcome {
    version: String,
    dry_run: bool,
    packages: Vec<PackageOutcome>,
    files: BTreeSet<Utf8PathBuf>,
}

#[derive(Debug, Serialize)]
struct PackageOutcome {
    path: Utf8PathBuf,
    ecosystem: String,
}

/// Write the version, run post-write hooks, and list the files to stage.
#[instrument(name = "cmd_set_version", skip_all, fields(json_output, version = %args.version))]
pub fn cmd_set_version(
    args: SetVersionArgs,
    global_json: bool,
    config: &Config,
    cwd: &Utf8Path,
) -> anyhow::Result<()> {
    debug!(json_output = global_json, "executing set-version command");

    let version = parse_version(&args.version).context("invalid version")?;
    let registry = EcosystemRegistry::builtin();
    let packages = resolve_packages(&registry, config, cwd)?;
    let outcome = apply(&packages, &version.to_string(), args.dry_run, cwd)?;

    if global_json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    let verb = if outcome.dry_run { "Would set" } else { "Set" };
    for package in &outcome.packages {
        println!(
            "  {} {verb} {} ({}) to {}",
            "✓".green(),
            package.path.as_str().bold(),
            package.ecosystem.dimmed(),
            outcome.version.green().bold()
        );
    }
    if !outcome.files.is_empty() {
        println!();
        println!("{}", "Files to stage".bold().underline());
        for file in &outcome.files {
            println!("  {} {}", "→".dimmed(), file.as_str().cyan());
        }
    }
    Ok(())
}

fn apply(
    packages: &[ResolvedPackage<'_>],
    version: &str,
    dry_run: bool,
    root: &Utf8Path,
) -> anyhow::Result<SetVersionOutcome> {
    let mut outcome = SetVersionOutcome {
        version: version.to_string(),
        dry_run,
        packages: Vec::new(),
        files: BTreeSet::new(),
    };

    for package in packages {
        let ctx = package.context(root, dry_run);
        let path = &package.config.path;
        let kind = package.ecosystem.kind();

        package
            .ecosystem
            .write_version(&ctx, version)
            .with_context(|| format!("failed to write version for {path} ({kind})"))?;
        if let Some(hook) = package.ecosystem.post_write_hook() {
            hook.after_write(&ctx)
                .with_context(|| format!("post-write hook failed for {path} ({kind})"))?;
        }

        let files = package
            .ecosystem
            .version_files(&ctx)
            .with_context(|| format!("failed to list version files for {path}"))?;
        outcome.files.extend(
            files
                .iter()
                .map(|file| display_path(root, &ctx.package_path.join(file))),
        );
        info!(%path, ecosystem = %kind, version, dry_run, "version set");
        outcome.packages.push(PackageOutcome {
            path: path.clone(),
            ecosystem: kind.to_string(),
        });
    }
    Ok(outcome)
}
