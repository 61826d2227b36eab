//! Go modules (`go.mod`).
//!
//! Go has no version field: the module proxy serves whatever tags the VCS
//! holds, so the tag created for a release *is* the published version.

use camino::Utf8PathBuf;
use tracing::{debug, info};

use super::{Ecosystem, EcosystemContext, EcosystemKind, EcosystemResult, UNVERSIONED};

/// Go modules, versioned purely by tags.
#[derive(Debug, Clone, Copy, Default)]
pub struct Go;

impl Ecosystem for Go {
    fn kind(&self) -> EcosystemKind {
        EcosystemKind::Go
    }

    fn read_version(&self, ctx: &EcosystemContext) -> EcosystemResult<String> {
        debug!(package = %ctx.package_path, "go modules carry no version, reporting sentinel");
        Ok(UNVERSIONED.to_owned())
    }

    fn write_version(&self, ctx: &EcosystemContext, version: &str) -> EcosystemResult<()> {
        info!(package = %ctx.package_path, %version, "go version lives in tags, nothing to write");
        Ok(())
    }

    fn version_files(&self, _ctx: &EcosystemContext) -> EcosystemResult<Vec<Utf8PathBuf>> {
        Ok(Vec::new())
    }

    fn unpublish_unsupported_reason(&self) -> &'static str {
        "Go modules are served from VCS tags; nothing to unpublish"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8Path;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn reports_sentinel_and_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        let root = Utf8Path::from_path(tmp.path()).unwrap();
        let gomod = "module example.com/app\n\ngo 1.22\n";
        fs::write(root.join("go.mod"), gomod).unwrap();

        let ctx = EcosystemContext::new(root);
        assert!(Go.detect(root));
        assert_eq!(Go.read_version(&ctx).unwrap(), UNVERSIONED);

        Go.write_version(&ctx, "1.4.0").unwrap();
        assert_eq!(fs::read_to_string(root.join("go.mod")).unwrap(), gomod);
        assert!(Go.version_files(&ctx).unwrap().is_empty());
    }

    #[test]
    fn go_has_no_capabilities() {
        assert!(Go.publisher().is_none());
        assert!(Go.unpublisher().is_none());
        assert!(Go.post_write_hook().is_none());
    }
}
