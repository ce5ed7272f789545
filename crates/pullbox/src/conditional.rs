//! Conditional response builder: derives validators from a cache file and
//! answers `If-None-Match` / `If-Modified-Since` negotiation.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::error::CacheError;
use crate::sandbox;

/// Client-supplied cache validators, straight from the request headers.
#[derive(Debug, Clone, Default)]
pub struct Validators {
    pub if_none_match: Option<String>,
    pub if_modified_since: Option<String>,
}

impl Validators {
    pub fn none() -> Self {
        Self::default()
    }
}

/// Outcome of resolving a key: either a full body or a bare 304, always
/// with the current validators attached.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub not_modified: bool,
    pub etag: String,
    pub last_modified: String,
    pub body: Bytes,
    pub file_name: String,
}

const IMF_FIXDATE: &str = "%a, %d %b %Y %H:%M:%S GMT";

fn format_http_date(t: SystemTime) -> String {
    let dt: DateTime<Utc> = t.into();
    dt.format(IMF_FIXDATE).to_string()
}

/// Strong validator over name, mtime and size. Stable across restarts and
/// collision-resistant enough for clients that only need consistency.
fn make_etag(name: &str, modified: SystemTime, size: u64) -> String {
    let mtime = modified
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(format!(
        "{name}-{}.{:09}-{size}",
        mtime.as_secs(),
        mtime.subsec_nanos()
    ));
    hex::encode(hasher.finalize())
}

/// `If-Modified-Since` matches when the entry is not newer than the given
/// date. Falls back to exact string comparison for unparseable dates, which
/// still satisfies clients that echo our own header back.
fn modified_since_matches(header: &str, last_modified: &str, modified: SystemTime) -> bool {
    if header == last_modified {
        return true;
    }
    if let Ok(since) = DateTime::parse_from_rfc2822(header) {
        let entry: DateTime<Utc> = modified.into();
        // Header dates have second granularity.
        return entry.timestamp() <= since.timestamp();
    }
    false
}

/// Build the response for a cached file, honoring the client validators.
///
/// The path is re-canonicalized against the cache root here, immediately
/// before the read, rather than trusting a path computed earlier in the
/// request lifecycle.
pub async fn build(
    root: &Path,
    path: &Path,
    validators: &Validators,
) -> Result<CachedResponse, CacheError> {
    let real = sandbox::canonical_containment(root, path).await?;

    let meta = tokio::fs::metadata(&real).await?;
    let modified = meta.modified().map_err(CacheError::from)?;
    let file_name = real
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let etag = make_etag(&file_name, modified, meta.len());
    let last_modified = format_http_date(modified);

    // Per RFC 7232, a present If-None-Match makes If-Modified-Since
    // irrelevant: an entry replaced within one mtime second still gets a
    // full body when the client's ETag no longer matches.
    let not_modified = match (&validators.if_none_match, &validators.if_modified_since) {
        (Some(inm), _) => inm == &etag,
        (None, Some(ims)) => modified_since_matches(ims, &last_modified, modified),
        (None, None) => false,
    };

    if not_modified {
        return Ok(CachedResponse {
            not_modified: true,
            etag,
            last_modified,
            body: Bytes::new(),
            file_name,
        });
    }

    let body = Bytes::from(tokio::fs::read(&real).await?);
    Ok(CachedResponse {
        not_modified: false,
        etag,
        last_modified,
        body,
        file_name,
    })
}
