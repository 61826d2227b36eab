//! Next command: merged pull requests in, next version out.

use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::{debug, instrument};

use keel_core::config::Config;
use keel_core::git;
use keel_core::labels::{BumpDecision, PullRequest, extract_release_labels, resolve_bump};
use keel_core::semver::Version;
use keel_core::version::{monotonic_now, next_version, parse_version};

/// Arguments for the `next` subcommand.
#[derive(Args, Debug, Default)]
pub struct NextArgs {
    /// JSON array of merged pull requests (`-` reads stdin), as printed by
    /// `gh pr list --state merged --json number,labels,mergedAt`
    #[arg(long, value_name = "FILE|-")]
    pub prs: Option<PathBuf>,

    /// Previous release version (defaults to the latest stable tag)
    #[arg(long, value_name = "VERSION")]
    pub previous: Option<String>,

    /// Mint a dev prerelease instead of a regular release
    #[arg(long)]
    pub dev: bool,
}

#[derive(Debug, Serialize)]
struct NextReport {
    labels: BTreeSet<String>,
    decision: BumpDecision,
    previous: String,
    next: Option<String>,
}

/// Compute and print the next version.
///
/// A skip decision prints `skip` and succeeds.
#[instrument(name = "cmd_next", skip_all, fields(json_output))]
pub fn cmd_next(
    args: NextArgs,
    global_json: bool,
    config: &Config,
    cwd: &camino::Utf8Path,
) -> anyhow::Result<()> {
    debug!(json_output = global_json, "executing next command");

    let prs = match args.prs.as_deref() {
        Some(source) => read_prs(source)?,
        None => Vec::new(),
    };
    let previous = previous_version(args.previous.as_deref(), config, cwd)?;
    let report = plan(&prs, previous, args.dev, config)?;

    if global_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    match report.next {
        None => println!("skip"),
        Some(ref next) => {
            if !report.labels.is_empty() {
                let labels: Vec<&str> = report.labels.iter().map(String::as_str).collect();
                eprintln!("{}: {}", "Labels".dimmed(), labels.join(", "));
            }
            eprintln!(
                "{}: {} → {}",
                "Version".bold(),
                report.previous.dimmed(),
                next.green().bold()
            );
            println!("{next}");
        }
    }
    Ok(())
}

fn plan(
    prs: &[PullRequest],
    previous: Version,
    dev: bool,
    config: &Config,
) -> anyhow::Result<NextReport> {
    let labels = extract_release_labels(prs, &config.labels);
    let decision = resolve_bump(&labels, &config.labels);
    let next = next_version(
        &previous,
        &decision,
        config.release.default_bump,
        dev,
        monotonic_now(),
    )
    .context("failed to compute next version")?;

    Ok(NextReport {
        labels,
        decision,
        previous: previous.to_string(),
        next: next.map(|v| v.to_string()),
    })
}

/// `--previous`, else the latest stable tag, else `0.0.0` for a first release.
fn previous_version(
    explicit: Option<&str>,
    config: &Config,
    cwd: &camino::Utf8Path,
) -> anyhow::Result<Version> {
    if let Some(text) = explicit {
        return parse_version(text).context("invalid --previous version");
    }
    match git::latest_stable_tag(cwd, &config.release.tag_prefix) {
        Ok(Some(version)) => Ok(version),
        Ok(None) => {
            debug!("no stable tag, treating as first release");
            Ok(Version::new(0, 0, 0))
        }
        Err(err) => Err(err).context("failed to read tags; pass --previous to skip tag lookup"),
    }
}

fn read_prs(source: &std::path::Path) -> anyhow::Result<Vec<PullRequest>> {
    let text = if source.as_os_str() == "-" {
        std::io::read_to_string(std::io::stdin()).context("failed to read pull requests from stdin")?
    } else {
        std::fs::read_to_string(source)
            .with_context(|| format!("failed to read {}", source.display()))?
    };
    parse_prs(&text)
}

fn parse_prs(text: &str) -> anyhow::Result<Vec<PullRequest>> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(text).context("pull requests must be a JSON array of {number, labels}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_core::labels::LabelConfig;
    use keel_core::version::BumpType;

    fn prs(json: &str) -> Vec<PullRequest> {
        parse_prs(json).unwrap()
    }

    #[test]
    fn minor_label_bumps_minor() {
        let prs = prs(r#"[{"number": 1, "labels": [{"name": "release:minor"}]},
                         {"number": 2, "labels": ["release:patch", "docs"]}]"#);
        let report = plan(&prs, Version::new(1, 4, 2), false, &Config::default()).unwrap();
        assert_eq!(report.next.as_deref(), Some("1.5.0"));
        assert_eq!(report.decision.bump, Some(BumpType::Minor));
        assert!(!report.labels.contains("docs"));
    }

    #[test]
    fn unanimous_skip_has_no_next() {
        let prs = prs(r#"[{"number": 1, "labels": ["release:skip"]}]"#);
        let report = plan(&prs, Version::new(1, 0, 0), false, &Config::default()).unwrap();
        assert!(report.decision.skip);
        assert!(report.next.is_none());
    }

    #[test]
    fn empty_batch_uses_default_bump() {
        let mut config = Config::default();
        config.release.default_bump = BumpType::Minor;
        let report = plan(&[], Version::new(0, 3, 1), false, &config).unwrap();
        assert_eq!(report.next.as_deref(), Some("0.4.0"));
    }

    #[test]
    fn dev_flag_mints_dev_prerelease() {
        let report = plan(&[], Version::new(2, 0, 0), true, &Config::default()).unwrap();
        let next = report.next.unwrap();
        assert!(next.starts_with("2.0.1-dev."), "{next}");
    }

    #[test]
    fn custom_label_names_are_honored() {
        let config = Config {
            labels: LabelConfig {
                major: "breaking".into(),
                ..LabelConfig::default()
            },
            ..Config::default()
        };
        let prs = prs(r#"[{"number": 7, "labels": ["breaking"]}]"#);
        let report = plan(&prs, Version::new(1, 2, 3), false, &config).unwrap();
        assert_eq!(report.next.as_deref(), Some("2.0.0"));
    }

    #[test]
    fn blank_input_is_empty_batch() {
        assert!(parse_prs("  \n").unwrap().is_empty());
        assert!(parse_prs("{\"number\": 1}").is_err());
    }

    #[test]
    fn explicit_previous_wins() {
        let cwd = camino::Utf8PathBuf::from("/nonexistent");
        let previous = previous_version(Some("v3.1.4"), &Config::default(), &cwd).unwrap();
        assert_eq!(previous, Version::new(3, 1, 4));
        assert!(previous_version(Some("three"), &Config::default(), &cwd).is_err());
    }
}
