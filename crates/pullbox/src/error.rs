use thiserror::Error;

/// Errors produced while resolving a cache key.
///
/// The enum is `Clone` so that a single in-flight fetch can report the same
/// failure to every request waiting on it. I/O and transport errors are
/// therefore carried as rendered strings rather than source errors.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// The requested key would resolve outside the cache root.
    #[error("path traversal rejected for key: {key}")]
    PathTraversal { key: String },

    /// The entry is not present locally and no fetch was attempted.
    #[error("cache entry not found: {path}")]
    MissingEntry { path: String },

    /// Upstream returned 404 for the artifact.
    #[error("not found upstream: {url}")]
    UpstreamNotFound { url: String },

    /// Upstream returned a non-2xx, non-404 status.
    #[error("upstream returned status {status}")]
    UpstreamStatus { status: u16 },

    /// Transport-level failure (timeout, connection reset) after the retry
    /// budget was exhausted.
    #[error("upstream request failed: {reason}")]
    Transient { reason: String },

    /// Local filesystem failure (disk full, permissions).
    #[error("local i/o failure: {reason}")]
    LocalIo { reason: String },
}

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        CacheError::LocalIo {
            reason: err.to_string(),
        }
    }
}
