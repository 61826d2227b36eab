//! npm ecosystem (`package.json`).
//!
//! Writes splice the new version string into the raw text in place of the
//! old one, so indentation, line endings and every other byte survive.

use std::ops::Range;

use camino::{Utf8Path, Utf8PathBuf};
use serde_json::{Map, Value};
use tracing::{debug, info, instrument};

use super::{
    Ecosystem, EcosystemContext, EcosystemError, EcosystemKind, EcosystemResult, PostWriteHook,
    Publisher, Unpublisher, present_files, read_manifest, run_tool, write_manifest,
};

const MANIFEST: &str = "package.json";
const LOCKFILES: &[&str] = &["package-lock.json", "npm-shrinkwrap.json"];

/// JavaScript packages published to the npm registry.
#[derive(Debug, Clone, Copy, Default)]
pub struct Npm;

impl Ecosystem for Npm {
    fn kind(&self) -> EcosystemKind {
        EcosystemKind::Npm
    }

    fn read_version(&self, ctx: &EcosystemContext) -> EcosystemResult<String> {
        let path = ctx.path_of(MANIFEST);
        let (_, manifest) = load(&path)?;
        let version = string_field(&manifest, "version")
            .ok_or_else(|| EcosystemError::VersionNotFound(path.clone()))?;
        debug!(%version, %path, "read npm version");
        Ok(version.to_owned())
    }

    #[instrument(skip_all, fields(package = %ctx.package_path, %version))]
    fn write_version(&self, ctx: &EcosystemContext, version: &str) -> EcosystemResult<()> {
        let path = ctx.path_of(MANIFEST);
        let (raw, manifest) = load(&path)?;
        let span = string_field(&manifest, "version")
            .and_then(|_| version_span(&raw))
            .ok_or_else(|| EcosystemError::VersionNotFound(path.clone()))?;

        if ctx.dry_run {
            info!(%path, "dry run: would write npm version");
            return Ok(());
        }

        let quoted = serde_json::to_string(version).map_err(|e| EcosystemError::Parse {
            path: path.clone(),
            message: e.to_string(),
        })?;
        let mut rendered = String::with_capacity(raw.len() + quoted.len());
        rendered.push_str(&raw[..span.start]);
        rendered.push_str(&quoted);
        rendered.push_str(&raw[span.end..]);
        write_manifest(&path, &rendered)?;
        info!(%path, "wrote npm version");
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

    fn unpublisher(&self) -> Option<&dyn Unpublisher> {
        Some(self)
    }

    fn post_write_hook(&self) -> Option<&dyn PostWriteHook> {
        Some(self)
    }
}

impl Publisher for Npm {
    #[instrument(skip_all, fields(package = %ctx.package_path, %version))]
    fn publish(&self, ctx: &EcosystemContext, version: &str) -> EcosystemResult<()> {
        let dist_tag = dist_tag(version);
        if ctx.dry_run {
            info!(%dist_tag, "dry run: would run `npm publish`");
            return Ok(());
        }
        run_tool(ctx, "npm", &["publish", "--tag", &dist_tag])?;
        info!(%dist_tag, "published npm package");
        Ok(())
    }
}

impl Unpublisher for Npm {
    #[instrument(skip_all, fields(package = %ctx.package_path, %version))]
    fn unpublish(&self, ctx: &EcosystemContext, version: &str) -> EcosystemResult<bool> {
        let path = ctx.path_of(MANIFEST);
        let (_, manifest) = load(&path)?;
        let name = string_field(&manifest, "name").ok_or_else(|| EcosystemError::Parse {
            path: path.clone(),
            message: "missing `name`".into(),
        })?;
        let spec = format!("{name}@{version}");

        if ctx.dry_run {
            info!(%spec, "dry run: would run `npm unpublish`");
            return Ok(true);
        }

        match run_tool(ctx, "npm", &["unpublish", &spec]) {
            Ok(_) => {
                info!(%spec, "unpublished npm version");
                Ok(true)
            }
            Err(EcosystemError::ToolFailed { message, .. }) if message.contains("E404") => {
                debug!(%spec, "version not on registry");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}

impl PostWriteHook for Npm {
    fn after_write(&self, ctx: &EcosystemContext) -> EcosystemResult<()> {
        if present_files(ctx, LOCKFILES).is_empty() {
            debug!("no npm lockfile, skipping refresh");
            return Ok(());
        }
        if ctx.dry_run {
            info!("dry run: would refresh npm lockfile");
            return Ok(());
        }
        run_tool(
            ctx,
            "npm",
            &["install", "--package-lock-only", "--ignore-scripts"],
        )?;
        Ok(())
    }
}

// ──────────────────────────────────────────────
// Internal helpers
// ──────────────────────────────────────────────

/// Read `package.json`, returning the raw text and its top-level object.
fn load(path: &Utf8Path) -> EcosystemResult<(String, Map<String, Value>)> {
    let raw = read_manifest(path)?;
    let parse_err = |message: String| EcosystemError::Parse {
        path: path.to_path_buf(),
        message,
    };
    match serde_json::from_str::<Value>(&raw).map_err(|e| parse_err(e.to_string()))? {
        Value::Object(map) => Ok((raw, map)),
        _ => Err(parse_err("top level is not an object".into())),
    }
}

fn string_field<'a>(manifest: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    manifest.get(key).and_then(Value::as_str)
}

/// Byte range, quotes included, of the top-level `"version"` string in `raw`.
///
/// The last occurrence wins, matching how the parser treats duplicate keys.
/// `None` when the key is absent or its value is not a string.
fn version_span(raw: &str) -> Option<Range<usize>> {
    let bytes = raw.as_bytes();
    let mut depth = 0usize;
    let mut found = None;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'"' => {
                let end = string_end(bytes, i)?;
                let colon = skip_whitespace(bytes, end);
                if depth == 1 && bytes.get(colon) == Some(&b':') {
                    let key: String = serde_json::from_str(&raw[i..end]).ok()?;
                    if key == "version" {
                        let value = skip_whitespace(bytes, colon + 1);
                        found = match bytes.get(value) {
                            Some(b'"') => Some(value..string_end(bytes, value)?),
                            _ => None,
                        };
                    }
                }
                i = end;
                continue;
            }
            b'{' | b'[' => depth += 1,
            b'}' | b']' => depth = depth.saturating_sub(1),
            _ => {}
        }
        i += 1;
    }
    found
}

/// Index just past the closing quote of the string opening at `start`.
fn string_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'"' => return Some(i + 1),
            _ => i += 1,
        }
    }
    None
}

fn skip_whitespace(bytes: &[u8], mut i: usize) -> usize {
    while bytes.get(i).is_some_and(u8::is_ascii_whitespace) {
        i += 1;
    }
    i
}

/// npm dist-tag for a version: the prerelease channel, or `latest`.
fn dist_tag(version: &str) -> String {
    semver::Version::parse(version.trim_start_matches('v'))
        .ok()
        .and_then(|v| {
            v.pre
                .as_str()
                .split('.')
                .next()
                .filter(|ident| !ident.is_empty())
                .map(str::to_owned)
        })
        .unwrap_or_else(|| "latest".to_owned())
}
