//! keel CLI
#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use keel::{Cli, Commands, commands};
use keel_core::config::{Config, ConfigLoader};
use tracing::debug;

mod observability;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    cli.color.apply();

    if let Some(ref dir) = cli.chdir {
        std::env::set_current_dir(dir)
            .with_context(|| format!("failed to change directory to {}", dir.display()))?;
    }
    let cwd = std::env::current_dir().context("failed to determine current directory")?;
    let cwd = utf8(cwd, "current directory")?;
    let config = load_config(&cli, &cwd)?;

    let obs_config = observability::ObservabilityConfig::from_env_with_overrides(
        config.log_dir.as_ref().map(|dir| dir.as_std_path().to_path_buf()),
    );
    let env_filter = observability::env_filter(cli.quiet, cli.verbose, config.log_level.as_str());
    let _guard = observability::init_observability(&obs_config, env_filter)
        .context("failed to initialize logging")?;

    debug!(
        verbose = cli.verbose,
        quiet = cli.quiet,
        json = cli.json,
        color = ?cli.color,
        chdir = ?cli.chdir,
        "CLI initialized"
    );

    let json = cli.json;
    let result = match cli.command {
        Commands::Next(args) => commands::next::cmd_next(args, json, &config, &cwd),
        Commands::SetVersion(args) => {
            commands::set_version::cmd_set_version(args, json, &config, &cwd)
        }
        Commands::Publish(args) => commands::publish::cmd_publish(args, json, &config, &cwd),
        Commands::Cleanup(args) => commands::cleanup::cmd_cleanup(args, json, &config, &cwd),
        Commands::Info(args) => commands::info::cmd_info(args, json, &config, &cwd),
    };
    if let Err(ref err) = result {
        tracing::error!(error = %format!("{err:#}"), "command failed");
    }
    result
}

/// Discovered config plus the `--config` file, if given.
fn load_config(cli: &Cli, cwd: &Utf8Path) -> anyhow::Result<Config> {
    let mut loader = ConfigLoader::new().with_project_search(cwd);
    if let Some(ref path) = cli.config {
        loader = loader.with_file(utf8(path.clone(), "config path")?);
    }
    loader.load().context("failed to load configuration")
}

fn utf8(path: PathBuf, what: &str) -> anyhow::Result<Utf8PathBuf> {
    Utf8PathBuf::try_from(path).map_err(|e| {
        anyhow::anyhow!("{what} is not valid UTF-8: {}", e.into_path_buf().display())
    })
}
