//! Python ecosystem (`pyproject.toml`).
//!
//! The version is read from `[project] version` (PEP 621), falling back to
//! `[tool.poetry] version` for older Poetry projects.

use camino::{Utf8Path, Utf8PathBuf};
use toml_edit::{DocumentMut, Item, Value};
use tracing::{debug, info, instrument};

use super::{
    Ecosystem, EcosystemContext, EcosystemError, EcosystemKind, EcosystemResult, PostWriteHook,
    Publisher, present_files, read_manifest, run_tool, write_manifest,
};

const MANIFEST: &str = "pyproject.toml";
const LOCKFILES: &[&str] = &["poetry.lock", "uv.lock", "pdm.lock"];

/// Tables that may hold the version, in lookup order.
const VERSION_TABLES: &[&[&str]] = &[&["project"], &["tool", "poetry"]];

/// Python projects published to PyPI.
#[derive(Debug, Clone, Copy, Default)]
pub struct Python;

impl Ecosystem for Python {
    fn kind(&self) -> EcosystemKind {
        EcosystemKind::Python
    }

    fn read_version(&self, ctx: &EcosystemContext) -> EcosystemResult<String> {
        let path = ctx.path_of(MANIFEST);
        let doc = parse(&path)?;
        let version = VERSION_TABLES
            .iter()
            .find_map(|keys| lookup(&doc, keys).and_then(Item::as_str))
            .ok_or_else(|| EcosystemError::VersionNotFound(path.clone()))?;
        debug!(%version, %path, "read python version");
        Ok(version.to_owned())
    }

    #[instrument(skip_all, fields(package = %ctx.package_path, %version))]
    fn write_version(&self, ctx: &EcosystemContext, version: &str) -> EcosystemResult<()> {
        let path = ctx.path_of(MANIFEST);
        let mut doc = parse(&path)?;

        let Some(keys) = VERSION_TABLES
            .iter()
            .find(|keys| lookup(&doc, keys).and_then(Item::as_str).is_some())
        else {
            return Err(EcosystemError::VersionNotFound(path));
        };

        if ctx.dry_run {
            info!(%path, table = %keys.join("."), "dry run: would write python version");
            return Ok(());
        }

        let value = lookup_mut(&mut doc, keys)
            .and_then(Item::as_value_mut)
            .ok_or_else(|| EcosystemError::VersionNotFound(path.clone()))?;
        let decor = value.decor().clone();
        *value = Value::from(version);
        *value.decor_mut() = decor;

        write_manifest(&path, &doc.to_string())?;
        info!(%path, "wrote python version");
        Ok(())
    }

    fn version_files(&self, ctx: &EcosystemContext) -> EcosystemResult<Vec<Utf8PathBuf>> {
        let mut files = vec![Utf8PathBuf::from(MANIFEST)];
        files.extend(present_files(ctx, LOCKFILES));
        Ok(files)
    }

    fn publisher(&self) -> Option<&dyn Publisher> {
        Some(self)
    }

    fn post_write_hook(&self) -> Option<&dyn PostWriteHook> {
        Some(self)
    }

    fn unpublish_unsupported_reason(&self) -> &'static str {
        "PyPI does not allow deleting releases through its upload API"
    }
}

impl Publisher for Python {
    #[instrument(skip_all, fields(package = %ctx.package_path, %version))]
    fn publish(&self, ctx: &EcosystemContext, version: &str) -> EcosystemResult<()> {
        if ctx.dry_run {
            info!("dry run: would build and upload distributions");
            return Ok(());
        }
        run_tool(ctx, "python3", &["-m", "build"])?;

        let dists = built_distributions(&ctx.path_of("dist"), version)?;
        if dists.is_empty() {
            return Err(EcosystemError::ToolFailed {
                tool: "python3 -m build".into(),
                message: format!("no distributions for {version} in dist/"),
            });
        }
        let mut args = vec!["-m", "twine", "upload"];
        args.extend(dists.iter().map(String::as_str));
        run_tool(ctx, "python3", &args)?;
        info!(count = dists.len(), "uploaded distributions");
        Ok(())
    }
}

impl PostWriteHook for Python {
    fn after_write(&self, ctx: &EcosystemContext) -> EcosystemResult<()> {
        for lockfile in present_files(ctx, LOCKFILES) {
            let (program, args): (&str, &[&str]) = match lockfile.as_str() {
                "uv.lock" => ("uv", &["lock"]),
                "poetry.lock" => ("poetry", &["lock"]),
                _ => ("pdm", &["lock"]),
            };
            if ctx.dry_run {
                info!(%lockfile, %program, "dry run: would refresh lockfile");
                continue;
            }
            run_tool(ctx, program, args)?;
        }
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

fn lookup<'a>(doc: &'a DocumentMut, keys: &[&str]) -> Option<&'a Item> {
    let (first, rest) = keys.split_first()?;
    let table = rest
        .iter()
        .try_fold(doc.get(first)?, |item, key| item.get(key))?;
    table.get("version")
}

fn lookup_mut<'a>(doc: &'a mut DocumentMut, keys: &[&str]) -> Option<&'a mut Item> {
    let (first, rest) = keys.split_first()?;
    let table = rest
        .iter()
        .try_fold(doc.get_mut(first)?, |item, key| item.get_mut(key))?;
    table.get_mut("version")
}

/// Files in `dist/` whose names carry `-{version}`.
fn built_distributions(dist: &Utf8Path, version: &str) -> EcosystemResult<Vec<String>> {
    let entries = dist.read_dir_utf8().map_err(|source| EcosystemError::Io {
        path: dist.to_path_buf(),
        source,
    })?;
    let marker = format!("-{version}");
    let mut files: Vec<String> = entries
        .filter_map(Result::ok)
        .filter(|entry| entry.file_name().contains(&marker))
        .map(|entry| format!("dist/{}", entry.file_name()))
        .collect();
    files.sort();
    Ok(files)
}
