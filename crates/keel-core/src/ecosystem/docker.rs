//! Container images (`Dockerfile`).
//!
//! Images carry no version in any file; the release tag is the image tag.
//! Publishing shells out to `docker`, unpublishing talks to the Docker Hub
//! API directly since the CLI cannot delete remote tags.

use std::time::Duration;

use camino::Utf8PathBuf;
use serde::Deserialize;
use tracing::{debug, info, instrument};

use super::{
    Ecosystem, EcosystemContext, EcosystemError, EcosystemKind, EcosystemResult, Publisher,
    RegistryCredentials, UNVERSIONED, Unpublisher, run_tool,
};

const HUB_API: &str = "https://hub.docker.com/v2";
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Container images pushed to Docker Hub.
#[derive(Debug, Clone, Copy, Default)]
pub struct Docker;

impl Docker {
    fn repository(ctx: &EcosystemContext) -> EcosystemResult<&str> {
        ctx.artifact
            .as_deref()
            .ok_or(EcosystemError::MissingSetting {
                ecosystem: EcosystemKind::Docker,
                field: "artifact",
            })
    }
}

impl Ecosystem for Docker {
    fn kind(&self) -> EcosystemKind {
        EcosystemKind::Docker
    }

    fn read_version(&self, ctx: &EcosystemContext) -> EcosystemResult<String> {
        debug!(package = %ctx.package_path, "images carry no version, reporting sentinel");
        Ok(UNVERSIONED.to_owned())
    }

    fn write_version(&self, ctx: &EcosystemContext, version: &str) -> EcosystemResult<()> {
        info!(package = %ctx.package_path, %version, "image version lives in tags, nothing to write");
        Ok(())
    }

    fn version_files(&self, _ctx: &EcosystemContext) -> EcosystemResult<Vec<Utf8PathBuf>> {
        Ok(Vec::new())
    }

    fn publisher(&self) -> Option<&dyn Publisher> {
        Some(self)
    }

    fn unpublisher(&self) -> Option<&dyn Unpublisher> {
        Some(self)
    }
}

impl Publisher for Docker {
    #[instrument(skip_all, fields(package = %ctx.package_path, %version))]
    fn publish(&self, ctx: &EcosystemContext, version: &str) -> EcosystemResult<()> {
        let image = format!("{}:{version}", Self::repository(ctx)?);
        if ctx.dry_run {
            info!(%image, "dry run: would build and push image");
            return Ok(());
        }
        run_tool(ctx, "docker", &["build", "-t", &image, "."])?;
        run_tool(ctx, "docker", &["push", &image])?;
        info!(%image, "pushed image");
        Ok(())
    }
}

impl Unpublisher for Docker {
    #[instrument(skip_all, fields(package = %ctx.package_path, %version))]
    fn unpublish(&self, ctx: &EcosystemContext, version: &str) -> EcosystemResult<bool> {
        let repository = Self::repository(ctx)?;
        let url = format!("{HUB_API}/repositories/{repository}/tags/{version}/");

        if ctx.dry_run {
            info!(%url, "dry run: would delete image tag");
            return Ok(true);
        }

        let credentials = ctx
            .credentials
            .as_ref()
            .ok_or(EcosystemError::MissingSetting {
                ecosystem: EcosystemKind::Docker,
                field: "credentials",
            })?;

        let agent = agent();
        let jwt = login(&agent, credentials)?;

        match agent
            .delete(&url)
            .header("Authorization", &format!("JWT {jwt}"))
            .call()
        {
            Ok(_) => {
                info!(%repository, tag = %version, "deleted image tag");
                Ok(true)
            }
            Err(ureq::Error::StatusCode(404)) => {
                debug!(%repository, tag = %version, "image tag not on registry");
                Ok(false)
            }
            Err(e) => Err(EcosystemError::Registry(format!("DELETE {url}: {e}"))),
        }
    }
}

// ──────────────────────────────────────────────
// Docker Hub API
// ──────────────────────────────────────────────

#[derive(Deserialize)]
struct LoginResponse {
    token: String,
}

fn agent() -> ureq::Agent {
    let config = ureq::Agent::config_builder()
        .timeout_global(Some(HTTP_TIMEOUT))
        .build();
    ureq::Agent::new_with_config(config)
}

/// Exchange username + token for a short-lived Hub JWT.
fn login(agent: &ureq::Agent, credentials: &RegistryCredentials) -> EcosystemResult<String> {
    let username = credentials
        .username
        .as_deref()
        .ok_or(EcosystemError::MissingSetting {
            ecosystem: EcosystemKind::Docker,
            field: "registry username",
        })?;
    let body = serde_json::json!({
        "username": username,
        "password": credentials.token,
    })
    .to_string();

    let url = format!("{HUB_API}/users/login");
    let mut resp = agent
        .post(&url)
        .header("Content-Type", "application/json")
        .send(body.as_bytes())
        .map_err(|e| EcosystemError::Registry(format!("POST {url}: {e}")))?;
    let text = resp
        .body_mut()
        .read_to_string()
        .map_err(|e| EcosystemError::Registry(format!("read login response: {e}")))?;
    parse_login(&text)
}

fn parse_login(text: &str) -> EcosystemResult<String> {
    serde_json::from_str::<LoginResponse>(text)
        .map(|resp| resp.token)
        .map_err(|e| EcosystemError::Registry(format!("unexpected login response: {e}")))
}
