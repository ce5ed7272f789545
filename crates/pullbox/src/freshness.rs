//! Freshness policy: decides whether a cache entry needs an upstream
//! refresh based on its artifact class and a per-registry TTL.

use std::time::{Duration, SystemTime};

/// How an artifact behaves once cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactClass {
    /// Refreshable descriptor (registry index, JSON manifest, checksum
    /// file). Subject to TTL re-validation.
    Metadata,
    /// Binary artifact (jar, wheel, tarball). Cached forever once fetched.
    Immutable,
}

/// Filesystem facts about a cache entry, taken from a single stat call so
/// the existence and size checks cannot race each other.
#[derive(Debug, Clone, Copy)]
pub struct EntryStat {
    pub size: u64,
    pub modified: SystemTime,
}

impl EntryStat {
    /// Derive an `EntryStat` from filesystem metadata.
    ///
    /// Zero-byte files are treated as absent: the atomic writer never
    /// publishes a partial file, so an empty entry can only be debris from
    /// outside interference.
    pub fn from_metadata(meta: &std::fs::Metadata) -> Option<Self> {
        if !meta.is_file() || meta.len() == 0 {
            return None;
        }
        let modified = meta.modified().ok()?;
        Some(Self {
            size: meta.len(),
            modified,
        })
    }
}

/// Whether `entry` must be refreshed from upstream.
///
/// A missing entry is always stale. Immutable entries never go stale, and
/// `ttl == 0` pins metadata entries as immutable too. Otherwise an entry is
/// stale once its age reaches the TTL (age == ttl counts as stale).
pub fn is_stale(
    entry: Option<&EntryStat>,
    class: ArtifactClass,
    ttl: Duration,
    now: SystemTime,
) -> bool {
    let Some(entry) = entry else {
        return true;
    };
    if class == ArtifactClass::Immutable || ttl.is_zero() {
        return false;
    }
    match now.duration_since(entry.modified) {
        Ok(age) => age >= ttl,
        // Entry mtime is in the future (clock skew); treat as fresh.
        Err(_) => false,
    }
}
