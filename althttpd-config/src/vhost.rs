//! Virtual-host directory resolution (§6): the sanitized `Host` header picks
//! a content root by directory name, falling back to a site-wide default,
//! falling back again to the standalone root itself when neither exists
//! (single-site mode).

use std::path::{Path, PathBuf};

/// Resolves the content root for a sanitized, port-stripped `host`, per the
/// search order `<host>.website` → `default.website` → `standalone_root`.
///
/// This never touches the filesystem itself beyond `Path::is_dir` checks;
/// callers in the pipeline are expected to already hold an async context, so
/// the directory checks are deliberately synchronous metadata calls kept
/// fast enough not to need `tokio::fs` (mirrors how the teacher's own
/// config-driven dispatch, `servente_http_handling::config`, treats
/// directory layout as settled once at startup, not per-request I/O).
#[must_use]
pub fn resolve_content_root(standalone_root: &Path, host: &str) -> PathBuf {
    let per_host = standalone_root.join(format!("{host}.website"));
    if per_host.is_dir() {
        return per_host;
    }

    let default_site = standalone_root.join("default.website");
    if default_site.is_dir() {
        return default_site;
    }

    standalone_root.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn prefers_per_host_directory_when_present() {
        let root = TempDir::new().unwrap();
        fs::create_dir(root.path().join("example.com.website")).unwrap();
        fs::create_dir(root.path().join("default.website")).unwrap();

        let resolved = resolve_content_root(root.path(), "example.com");
        assert_eq!(resolved, root.path().join("example.com.website"));
    }

    #[test]
    fn falls_back_to_default_site_when_host_unknown() {
        let root = TempDir::new().unwrap();
        fs::create_dir(root.path().join("default.website")).unwrap();

        let resolved = resolve_content_root(root.path(), "unknown.example");
        assert_eq!(resolved, root.path().join("default.website"));
    }

    #[test]
    fn falls_back_to_standalone_root_in_single_site_mode() {
        let root = TempDir::new().unwrap();

        let resolved = resolve_content_root(root.path(), "anything.example");
        assert_eq!(resolved, root.path());
    }
}
