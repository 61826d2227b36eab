//! User-defined plain-text version file.
//!
//! The file holds nothing but the version, e.g. `1.4.2\n`. Its location
//! defaults to `VERSION` and can be overridden per package.

use camino::Utf8PathBuf;
use tracing::{info, instrument, warn};

use super::{
    Ecosystem, EcosystemContext, EcosystemError, EcosystemKind, EcosystemResult, UNVERSIONED,
    write_manifest,
};
use crate::version::parse_version;

/// Version file used when a package does not name one.
pub const DEFAULT_VERSION_FILE: &str = "VERSION";

/// Packages versioned by a single plain-text file.
#[derive(Debug, Clone, Copy, Default)]
pub struct Custom;

impl Custom {
    fn file(ctx: &EcosystemContext) -> Utf8PathBuf {
        ctx.version_file
            .clone()
            .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_VERSION_FILE))
    }
}

impl Ecosystem for Custom {
    fn kind(&self) -> EcosystemKind {
        EcosystemKind::Custom
    }

    fn read_version(&self, ctx: &EcosystemContext) -> EcosystemResult<String> {
        let path = ctx.package_path.join(Self::file(ctx));
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(%path, error = %e, "version file unreadable, using placeholder {UNVERSIONED}");
                return Ok(UNVERSIONED.to_owned());
            }
        };

        let text = raw.trim();
        match parse_version(text) {
            Ok(_) => Ok(text.to_owned()),
            Err(e) => {
                warn!(%path, error = %e, "version file is not semver, using placeholder {UNVERSIONED}");
                Ok(UNVERSIONED.to_owned())
            }
        }
    }

    #[instrument(skip_all, fields(package = %ctx.package_path, %version))]
    fn write_version(&self, ctx: &EcosystemContext, version: &str) -> EcosystemResult<()> {
        let path = ctx.package_path.join(Self::file(ctx));

        if ctx.dry_run {
            info!(%path, "dry run: would write version file");
            return Ok(());
        }

        let newline = match std::fs::read_to_string(&path) {
            Ok(existing) => existing.ends_with('\n'),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
            Err(source) => return Err(EcosystemError::Io { path, source }),
        };
        let contents = if newline {
            format!("{version}\n")
        } else {
            version.to_owned()
        };
        write_manifest(&path, &contents)?;
        info!(%path, "wrote version file");
        Ok(())
    }

    fn version_files(&self, ctx: &EcosystemContext) -> EcosystemResult<Vec<Utf8PathBuf>> {
        Ok(vec![Self::file(ctx)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8Path;
    use std::fs;
    use tempfile::TempDir;

    fn utf8_tmp(tmp: &TempDir) -> &Utf8Path {
        Utf8Path::from_path(tmp.path()).expect("tempdir is UTF-8")
    }

    #[test]
    fn reads_trimmed_version() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("VERSION"), "  2.1.0\n").unwrap();
        let ctx = EcosystemContext::new(utf8_tmp(&tmp));
        assert_eq!(Custom.read_version(&ctx).unwrap(), "2.1.0");
    }

    #[test]
    fn missing_file_is_placeholder() {
        let tmp = TempDir::new().unwrap();
        let ctx = EcosystemContext::new(utf8_tmp(&tmp));
        assert_eq!(Custom.read_version(&ctx).unwrap(), UNVERSIONED);
    }

    #[test]
    fn garbage_is_placeholder() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("VERSION"), "not a version\n").unwrap();
        let ctx = EcosystemContext::new(utf8_tmp(&tmp));
        assert_eq!(Custom.read_version(&ctx).unwrap(), UNVERSIONED);
    }

    #[test]
    fn honours_version_file_override() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("meta")).unwrap();
        fs::write(tmp.path().join("meta/version.txt"), "0.3.0").unwrap();

        let mut ctx = EcosystemContext::new(utf8_tmp(&tmp));
        ctx.version_file = Some("meta/version.txt".into());
        assert_eq!(Custom.read_version(&ctx).unwrap(), "0.3.0");
        assert_eq!(
            Custom.version_files(&ctx).unwrap(),
            vec![Utf8PathBuf::from("meta/version.txt")]
        );

        Custom.write_version(&ctx, "0.4.0").unwrap();
        assert_eq!(
            fs::read_to_string(tmp.path().join("meta/version.txt")).unwrap(),
            "0.4.0"
        );
    }

    #[test]
    fn write_preserves_trailing_newline() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("VERSION"), "1.0.0\n").unwrap();
        let ctx = EcosystemContext::new(utf8_tmp(&tmp));
        Custom.write_version(&ctx, "1.1.0").unwrap();
        assert_eq!(
            fs::read_to_string(tmp.path().join("VERSION")).unwrap(),
            "1.1.0\n"
        );
    }

    #[test]
    fn dry_run_does_not_create_file() {
        let tmp = TempDir::new().unwrap();
        let ctx = EcosystemContext::new(utf8_tmp(&tmp)).with_dry_run(true);
        Custom.write_version(&ctx, "1.0.0").unwrap();
        assert!(!tmp.path().join("VERSION").exists());
    }
}
