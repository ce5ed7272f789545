//! Path sandbox: maps logical cache keys to physical paths that are
//! provably contained in the cache root.
//!
//! Containment is enforced twice. `safe_cache_path` performs a purely
//! lexical check when the key is derived, and `canonical_containment`
//! re-resolves the real path at the moment a file is opened, which closes
//! the window where a path component was swapped for a symlink between
//! derivation and use.

use std::path::{Path, PathBuf};

use crate::error::CacheError;

/// Resolve `key` to an absolute path under `root`.
///
/// The key is treated as a `/`-separated relative path. Rejected outright:
/// `..` segments, absolute paths, backslashes, drive-letter prefixes,
/// NUL/control bytes and empty keys. `.` and empty segments are collapsed.
pub fn safe_cache_path(root: &Path, key: &str) -> Result<PathBuf, CacheError> {
    let reject = || CacheError::PathTraversal {
        key: key.to_string(),
    };

    if key.is_empty() || key.bytes().any(|b| b < 0x20 || b == 0x7f) {
        return Err(reject());
    }
    // Backslashes and drive letters are never legal in a key, even on
    // platforms where they would not act as separators.
    if key.contains('\\') || key.starts_with('/') {
        return Err(reject());
    }
    if key.len() >= 2 && key.as_bytes()[1] == b':' {
        return Err(reject());
    }

    let mut out = root.to_path_buf();
    let mut depth = 0usize;
    for segment in key.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return Err(reject()),
            seg => {
                out.push(seg);
                depth += 1;
            }
        }
    }
    if depth == 0 {
        return Err(reject());
    }

    Ok(out)
}

/// Canonicalize `path` and verify the real file still lives under `root`.
///
/// Must be called with an existing file, immediately before it is opened.
/// A missing file maps to `MissingEntry`; a file whose canonical form has
/// escaped the root (symlinked component) maps to `PathTraversal`.
pub async fn canonical_containment(root: &Path, path: &Path) -> Result<PathBuf, CacheError> {
    let root_real = tokio::fs::canonicalize(root).await?;
    let real = match tokio::fs::canonicalize(path).await {
        Ok(p) => p,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(CacheError::MissingEntry {
                path: path.display().to_string(),
            });
        }
        Err(e) => return Err(e.into()),
    };

    if !real.starts_with(&root_real) {
        return Err(CacheError::PathTraversal {
            key: path.display().to_string(),
        });
    }
    Ok(real)
}
