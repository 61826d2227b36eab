//! Cleanup command: retire old releases under the configured retention policy.

use anyhow::{Context, bail};
use camino::Utf8Path;
use clap::Args;
use inquire::Confirm;
use owo_colors::OwoColorize;
use tracing::{debug, instrument};

use keel_core::cleanup::{
    CleanupConfig, CleanupPolicy, CleanupRequest, CleanupResult, PackageTarget, ReleaseRecord,
    ReleaseStore, ReleaseType, run_cleanup,
};
use keel_core::config::Config;
use keel_core::ecosystem::EcosystemRegistry;
use keel_core::git::{self, GitTags};
use keel_core::github::{GhReleases, GithubError, GithubResult};

use super::{ResolvedPackage, resolve_packages, spinner};

/// Arguments for the `cleanup` subcommand.
#[derive(Args, Debug, Default)]
pub struct CleanupArgs {
    /// Show what would be deleted without deleting anything
    #[arg(long)]
    pub dry_run: bool,

    /// Delete without asking for confirmation
    #[arg(short, long)]
    pub yes: bool,
}

/// Release store that is only contacted when the policy touches hosted
/// releases or published artifacts.
enum HostedReleases {
    Github(GhReleases),
    Untouched,
}

impl HostedReleases {
    fn list(&self) -> GithubResult<Vec<ReleaseRecord>> {
        match self {
            Self::Github(gh) => gh.list_releases(),
            Self::Untouched => Ok(Vec::new()),
        }
    }
}

impl ReleaseStore for HostedReleases {
    type Error = GithubError;

    fn delete_release(&self, id: u64) -> GithubResult<()> {
        match self {
            Self::Github(gh) => gh.delete_release(id),
            Self::Untouched => Ok(()),
        }
    }
}

/// Apply the retention policy.
///
/// The plan is computed first without side effects; unless `--dry-run`,
/// `--yes` or `--json` is given the user confirms it before anything is
/// deleted.
#[instrument(name = "cmd_cleanup", skip_all, fields(json_output, dry_run = args.dry_run))]
pub fn cmd_cleanup(
    args: CleanupArgs,
    global_json: bool,
    config: &Config,
    cwd: &Utf8Path,
) -> anyhow::Result<()> {
    debug!(json_output = global_json, "executing cleanup command");

    if !config.cleanup.is_active() {
        if global_json {
            let empty = CleanupResult {
                dry_run: args.dry_run,
                ..CleanupResult::default()
            };
            println!("{}", serde_json::to_string_pretty(&empty)?);
        } else {
            println!("{}", "No active cleanup policy configured.".yellow());
        }
        return Ok(());
    }

    let prefix = config.release.tag_prefix.as_str();
    let remote = config.release.remote.as_str();

    let pb = spinner("Listing tags and releases...", global_json);
    let tags = git::list_tags(cwd, prefix).context("failed to list tags")?;
    let hosted = if needs_hosted_releases(&config.cleanup) {
        let gh = GhReleases::from_remote(cwd, remote)
            .context("failed to determine the hosted repository")?;
        HostedReleases::Github(gh)
    } else {
        HostedReleases::Untouched
    };
    let releases = hosted.list().context("failed to list releases")?;
    pb.finish_and_clear();

    let registry = EcosystemRegistry::builtin();
    let packages = if needs_packages(&config.cleanup) {
        resolve_packages(&registry, config, cwd)?
    } else {
        Vec::new()
    };
    let tag_store = GitTags::with_remote(cwd, remote);

    let plan_targets = targets(&packages, cwd, true);
    let plan = run_cleanup(
        &CleanupRequest {
            config: &config.cleanup,
            tag_prefix: prefix,
            releases: &releases,
            tags: &tags,
            packages: &plan_targets,
            dry_run: true,
        },
        &hosted,
        &tag_store,
    );

    if args.dry_run || plan.is_empty() {
        let plan = CleanupResult {
            dry_run: args.dry_run,
            ..plan
        };
        return print_result(&plan, global_json);
    }

    if !args.yes && !global_json {
        if !std::io::IsTerminal::is_terminal(&std::io::stdin()) {
            bail!("refusing to delete without confirmation in a non-interactive session; pass --yes");
        }
        print_result(&plan, false)?;
        let count = plan.tags_deleted.len()
            + plan.releases_deleted.len()
            + plan.packages_unpublished.len();
        let proceed = Confirm::new(&format!("Delete {count} item(s)?"))
            .with_default(false)
            .with_help_message("Deleted tags, releases and published versions cannot be restored")
            .prompt()
            .context("confirmation prompt failed")?;
        if !proceed {
            println!("{}", "Cancelled.".yellow());
            return Ok(());
        }
    }

    let pb = spinner("Cleaning up...", global_json);
    let live_targets = targets(&packages, cwd, false);
    let result = run_cleanup(
        &CleanupRequest {
            config: &config.cleanup,
            tag_prefix: prefix,
            releases: &releases,
            tags: &tags,
            packages: &live_targets,
            dry_run: false,
        },
        &hosted,
        &tag_store,
    );
    pb.finish_and_clear();

    print_result(&result, global_json)
}

fn active_policies(config: &CleanupConfig) -> impl Iterator<Item = CleanupPolicy> + '_ {
    ReleaseType::ALL
        .into_iter()
        .map(|release_type| config.policy(release_type))
        .filter(|policy| policy.is_active())
}

/// Hosted releases are needed to delete them and to know which published
/// versions belong to a release type.
fn needs_hosted_releases(config: &CleanupConfig) -> bool {
    active_policies(config).any(|policy| policy.releases || policy.published)
}

fn needs_packages(config: &CleanupConfig) -> bool {
    active_policies(config).any(|policy| policy.published)
}

fn targets<'r>(
    packages: &[ResolvedPackage<'r>],
    root: &Utf8Path,
    dry_run: bool,
) -> Vec<PackageTarget<'r>> {
    packages
        .iter()
        .map(|package| PackageTarget {
            name: package.config.name(),
            ecosystem: package.ecosystem,
            ctx: package.context(root, dry_run),
        })
        .collect()
}

fn print_result(result: &CleanupResult, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }

    if result.is_empty() {
        println!("{}", "Nothing to clean up.".green());
    } else {
        let heading = if result.dry_run {
            "Would delete"
        } else {
            "Deleted"
        };
        println!("{}", heading.bold().underline());
        let sections = [
            ("Releases", &result.releases_deleted),
            ("Tags", &result.tags_deleted),
            ("Published", &result.packages_unpublished),
        ];
        for (label, items) in sections {
            if items.is_empty() {
                continue;
            }
            println!("{} ({}):", label.dimmed(), items.len());
            for item in items {
                println!("  {} {}", "-".red(), item);
            }
        }
    }

    for warning in &result.warnings {
        println!("  {} {}", "!".yellow(), warning.yellow());
    }
    Ok(())
}
