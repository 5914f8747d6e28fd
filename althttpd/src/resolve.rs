//! Filesystem resolution of a sanitized `script_uri` inside a content root
//! (§4.9 step 10): walking the URL segment by segment, the `not-found.html`
//! ancestor search on a missed segment, the directory index search, and the
//! trailing-slash redirect for a directory hit.
//!
//! Grounded on the teacher's `servente_resources::cache` directory-walking
//! shape (resolve one path component at a time, `stat`-ing as you go),
//! generalized here to also search ancestors for a fallback page and to stop
//! early at the first regular file, since this server's URLs can carry
//! trailing `PATH_INFO` a static file server never needs to understand.

use std::path::{Path, PathBuf};

use tokio::fs;

const DIRECTORY_INDEX_NAMES: [&str; 3] = ["home", "index.html", "index.cgi"];

#[derive(Debug)]
pub enum ResolveOutcome {
    /// `file_path` is a readable regular file; `path_info` is whatever
    /// trailed it (joined with `/`, no leading slash).
    Found { file_path: PathBuf, dir_path: PathBuf, path_info: String },
    /// A `stat` failure part-way through the walk found a `not-found.html`
    /// in some ancestor directory; redirect there.
    FallbackRedirect(String),
    /// The walk ended at a directory with an index file, but the original
    /// request URI lacked a trailing slash.
    NeedsTrailingSlash,
    /// Nothing resolved and no `not-found.html` fallback existed either.
    NotFound,
}

/// Resolves `script_uri` against `content_root`. `ends_with_slash` is
/// whether the *original* request URI (before any index-append) ended in
/// `/`, which only matters when the walk lands on a directory.
pub async fn resolve(content_root: &Path, script_uri: &str, ends_with_slash: bool) -> ResolveOutcome {
    let segments: Vec<&str> = script_uri.split('/').filter(|s| !s.is_empty()).collect();

    let mut current = content_root.to_path_buf();
    for (index, segment) in segments.iter().enumerate() {
        let candidate = current.join(segment);
        match fs::metadata(&candidate).await {
            Ok(meta) if meta.is_file() => {
                if !is_readable(&meta) {
                    return ResolveOutcome::NotFound;
                }
                let path_info = segments[index + 1..].join("/");
                return ResolveOutcome::Found { file_path: candidate, dir_path: current, path_info };
            }
            Ok(meta) if meta.is_dir() => {
                current = candidate;
            }
            Ok(_) => return ResolveOutcome::NotFound,
            Err(_) => {
                return match find_fallback_redirect(content_root, &current).await {
                    Some(target) => ResolveOutcome::FallbackRedirect(target),
                    None => ResolveOutcome::NotFound,
                };
            }
        }
    }

    // The walk consumed every segment without hitting a file: `current` is a
    // directory. Try the fixed index-file search order.
    for name in DIRECTORY_INDEX_NAMES {
        let candidate = current.join(name);
        if let Ok(meta) = fs::metadata(&candidate).await {
            if meta.is_file() && is_readable(&meta) {
                if !ends_with_slash {
                    return ResolveOutcome::NeedsTrailingSlash;
                }
                return ResolveOutcome::Found { file_path: candidate, dir_path: current, path_info: String::new() };
            }
        }
    }

    ResolveOutcome::NotFound
}

/// Walks from `start_dir` up to (and including) `content_root` looking for a
/// `not-found.html`; returns the site-relative URL to redirect to.
async fn find_fallback_redirect(content_root: &Path, start_dir: &Path) -> Option<String> {
    let mut dir = start_dir.to_path_buf();
    loop {
        let candidate = dir.join("not-found.html");
        if fs::metadata(&candidate).await.map(|m| m.is_file()).unwrap_or(false) {
            let relative = candidate.strip_prefix(content_root).ok()?;
            return Some(format!("/{}", relative.to_string_lossy()));
        }
        if dir == content_root {
            return None;
        }
        dir = dir.parent()?.to_path_buf();
    }
}

#[cfg(unix)]
fn is_readable(meta: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o444 != 0
}

#[cfg(not(unix))]
fn is_readable(_meta: &std::fs::Metadata) -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn resolves_a_plain_file() {
        let root = TempDir::new().unwrap();
        std::fs::write(root.path().join("index.html"), b"hi").unwrap();

        let outcome = resolve(root.path(), "/index.html", true).await;
        match outcome {
            ResolveOutcome::Found { file_path, path_info, .. } => {
                assert_eq!(file_path, root.path().join("index.html"));
                assert_eq!(path_info, "");
            }
            other => panic!("expected Found, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn trailing_segments_past_a_file_become_path_info() {
        let root = TempDir::new().unwrap();
        std::fs::write(root.path().join("app.cgi"), b"#!/bin/sh\n").unwrap();

        let outcome = resolve(root.path(), "/app.cgi/extra/segments", true).await;
        match outcome {
            ResolveOutcome::Found { path_info, .. } => assert_eq!(path_info, "extra/segments"),
            other => panic!("expected Found, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn directory_without_trailing_slash_redirects() {
        let root = TempDir::new().unwrap();
        std::fs::create_dir(root.path().join("deep")).unwrap();
        std::fs::write(root.path().join("deep/index.html"), b"hi").unwrap();

        assert!(matches!(resolve(root.path(), "/deep", false).await, ResolveOutcome::NeedsTrailingSlash));
        assert!(matches!(resolve(root.path(), "/deep/", true).await, ResolveOutcome::Found { .. }));
    }

    #[tokio::test]
    async fn directory_without_any_index_is_not_found() {
        let root = TempDir::new().unwrap();
        std::fs::create_dir(root.path().join("empty")).unwrap();

        assert!(matches!(resolve(root.path(), "/empty/", true).await, ResolveOutcome::NotFound));
    }

    #[tokio::test]
    async fn missing_segment_falls_back_to_ancestor_not_found_html() {
        let root = TempDir::new().unwrap();
        std::fs::write(root.path().join("not-found.html"), b"gone").unwrap();

        let outcome = resolve(root.path(), "/does/not/exist", true).await;
        assert!(matches!(outcome, ResolveOutcome::FallbackRedirect(ref target) if target == "/not-found.html"));
    }

    #[tokio::test]
    async fn missing_segment_without_any_not_found_html_is_plain_404() {
        let root = TempDir::new().unwrap();

        let outcome = resolve(root.path(), "/does/not/exist", true).await;
        assert!(matches!(outcome, ResolveOutcome::NotFound));
    }
}
