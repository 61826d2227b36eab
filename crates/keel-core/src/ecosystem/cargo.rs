//! Cargo ecosystem, including workspace version inheritance.
//!
//! A member crate may declare `version.workspace = true` (or the inline
//! `version = { workspace = true }`). Its version then lives in the
//! `[workspace.package]` table of a root `Cargo.toml` somewhere above it, and
//! both reads and writes are redirected there. The member file is never
//! touched.

use camino::{Utf8Path, Utf8PathBuf};
use toml_edit::{DocumentMut, Item, Value};
use tracing::{debug, info, instrument};

use super::{
    Ecosystem, EcosystemContext, EcosystemError, EcosystemKind, EcosystemResult, PostWriteHook,
    Publisher, read_manifest, run_tool, write_manifest,
};

/// How many parent directories the workspace-root search may climb.
pub const MAX_WORKSPACE_DEPTH: usize = 10;

const MANIFEST: &str = "Cargo.toml";
const LOCKFILE: &str = "Cargo.lock";

/// Rust crates published to crates.io.
#[derive(Debug, Clone, Copy, Default)]
pub struct Cargo;

/// Where a crate's version is actually stored.
#[derive(Debug, Clone, PartialEq, Eq)]
enum VersionSource {
    /// `[package] version` in the crate's own manifest.
    Local { manifest: Utf8PathBuf },
    /// `[workspace.package] version` in a root manifest `depth` levels up.
    Workspace { manifest: Utf8PathBuf, depth: usize },
}

impl VersionSource {
    fn manifest(&self) -> &Utf8Path {
        match self {
            Self::Local { manifest } | Self::Workspace { manifest, .. } => manifest,
        }
    }
}

impl Ecosystem for Cargo {
    fn kind(&self) -> EcosystemKind {
        EcosystemKind::Cargo
    }

    #[instrument(skip_all, fields(package = %ctx.package_path))]
    fn read_version(&self, ctx: &EcosystemContext) -> EcosystemResult<String> {
        let source = resolve_source(ctx)?;
        let doc = parse(source.manifest())?;
        let version = match &source {
            VersionSource::Local { .. } => doc
                .get("package")
                .and_then(|package| package.get("version"))
                .and_then(Item::as_str),
            VersionSource::Workspace { .. } => workspace_version(&doc),
        };
        let version = version.ok_or_else(|| EcosystemError::VersionNotFound(source.manifest().to_path_buf()))?;
        debug!(%version, manifest = %source.manifest(), "read cargo version");
        Ok(version.to_owned())
    }

    #[instrument(skip_all, fields(package = %ctx.package_path, %version))]
    fn write_version(&self, ctx: &EcosystemContext, version: &str) -> EcosystemResult<()> {
        let source = resolve_source(ctx)?;
        let manifest = source.manifest();

        if ctx.dry_run {
            info!(%manifest, %version, "dry run: would write cargo version");
            return Ok(());
        }

        let mut doc = parse(manifest)?;
        let item = match &source {
            VersionSource::Local { .. } => doc
                .get_mut("package")
                .and_then(|package| package.get_mut("version")),
            VersionSource::Workspace { .. } => doc
                .get_mut("workspace")
                .and_then(|workspace| workspace.get_mut("package"))
                .and_then(|package| package.get_mut("version")),
        };
        let Some(value) = item.and_then(Item::as_value_mut) else {
            return Err(EcosystemError::VersionNotFound(manifest.to_path_buf()));
        };
        replace_keeping_decor(value, version);

        write_manifest(manifest, &doc.to_string())?;
        info!(%manifest, %version, "wrote cargo version");
        Ok(())
    }

    fn version_files(&self, ctx: &EcosystemContext) -> EcosystemResult<Vec<Utf8PathBuf>> {
        let source = resolve_source(ctx)?;
        let mut files = Vec::new();
        match source {
            VersionSource::Local { .. } => {
                files.push(Utf8PathBuf::from(MANIFEST));
                if let Some(depth) = nearest_lockfile(&search_start(ctx)) {
                    files.push(relative_up(depth, LOCKFILE));
                }
            }
            VersionSource::Workspace { manifest, depth } => {
                files.push(relative_up(depth, MANIFEST));
                if manifest.with_file_name(LOCKFILE).is_file() {
                    files.push(relative_up(depth, LOCKFILE));
                }
            }
        }
        Ok(files)
    }

    fn publisher(&self) -> Option<&dyn Publisher> {
        Some(self)
    }

    fn post_write_hook(&self) -> Option<&dyn PostWriteHook> {
        Some(self)
    }

    fn unpublish_unsupported_reason(&self) -> &'static str {
        "crates.io supports only yank, not deletion"
    }
}

impl Publisher for Cargo {
    #[instrument(skip_all, fields(package = %ctx.package_path, %version))]
    fn publish(&self, ctx: &EcosystemContext, version: &str) -> EcosystemResult<()> {
        if ctx.dry_run {
            info!("dry run: would run `cargo publish`");
            return Ok(());
        }
        run_tool(ctx, "cargo", &["publish"])?;
        info!("published crate");
        Ok(())
    }
}

impl PostWriteHook for Cargo {
    fn after_write(&self, ctx: &EcosystemContext) -> EcosystemResult<()> {
        if nearest_lockfile(&search_start(ctx)).is_none() {
            debug!("no Cargo.lock, skipping lockfile refresh");
            return Ok(());
        }
        if ctx.dry_run {
            info!("dry run: would run `cargo update --workspace --offline`");
            return Ok(());
        }
        run_tool(ctx, "cargo", &["update", "--workspace", "--offline"])?;
        Ok(())
    }
}

// ──────────────────────────────────────────────
// Internal helpers
// ──────────────────────────────────────────────

fn parse(path: &Utf8Path) -> EcosystemResult<DocumentMut> {
    read_manifest(path)?
        .parse::<DocumentMut>()
        .map_err(|e| EcosystemError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}

fn workspace_version(doc: &DocumentMut) -> Option<&str> {
    doc.get("workspace")
        .and_then(|workspace| workspace.get("package"))
        .and_then(|package| package.get("version"))
        .and_then(Item::as_str)
}

/// `version.workspace = true` in either dotted or inline-table form.
fn inherits_version(doc: &DocumentMut) -> bool {
    doc.get("package")
        .and_then(|package| package.get("version"))
        .and_then(Item::as_table_like)
        .and_then(|version| version.get("workspace"))
        .and_then(Item::as_bool)
        .unwrap_or(false)
}

/// Absolute starting directory for upward searches.
fn search_start(ctx: &EcosystemContext) -> Utf8PathBuf {
    ctx.package_path
        .canonicalize_utf8()
        .unwrap_or_else(|_| ctx.package_path.clone())
}

fn resolve_source(ctx: &EcosystemContext) -> EcosystemResult<VersionSource> {
    let manifest = ctx.path_of(MANIFEST);
    let doc = parse(&manifest)?;

    let virtual_root = doc.get("package").is_none() && workspace_version(&doc).is_some();
    if !inherits_version(&doc) && !virtual_root {
        return Ok(VersionSource::Local { manifest });
    }

    let start = search_start(ctx);
    let (root, depth) =
        find_workspace_root(&start).ok_or_else(|| EcosystemError::WorkspaceRootNotFound {
            member: manifest.clone(),
            depth: MAX_WORKSPACE_DEPTH,
        })?;
    debug!(member = %manifest, %root, depth, "version inherited from workspace");
    Ok(VersionSource::Workspace {
        manifest: root,
        depth,
    })
}

/// Walk from `start` upward looking for a manifest with `[workspace.package] version`.
fn find_workspace_root(start: &Utf8Path) -> Option<(Utf8PathBuf, usize)> {
    let mut dir = Some(start);
    for depth in 0..=MAX_WORKSPACE_DEPTH {
        let current = dir?;
        let candidate = current.join(MANIFEST);
        if candidate.is_file() {
            match parse(&candidate) {
                Ok(doc) if workspace_version(&doc).is_some() => return Some((candidate, depth)),
                Ok(_) => {}
                Err(e) => debug!(%candidate, error = %e, "skipping unreadable manifest"),
            }
        }
        dir = current.parent();
    }
    None
}

/// Depth of the closest directory at or above `start` holding a `Cargo.lock`.
fn nearest_lockfile(start: &Utf8Path) -> Option<usize> {
    start
        .ancestors()
        .take(MAX_WORKSPACE_DEPTH + 1)
        .position(|dir| dir.join(LOCKFILE).is_file())
}

/// `../` repeated `depth` times, then `file`.
fn relative_up(depth: usize, file: &str) -> Utf8PathBuf {
    let mut path = Utf8PathBuf::new();
    for _ in 0..depth {
        path.push("..");
    }
    path.push(file);
    path
}

/// Swap a string value in place, keeping its surrounding whitespace and comments.
fn replace_keeping_decor(value: &mut Value, version: &str) {
    let decor = value.decor().clone();
    *value = Value::from(version);
    *value.decor_mut() = decor;
}
