use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the cache resolver.
///
/// The cache root and network budget are explicit values handed to the
/// resolver at construction so tests can run with isolated roots.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Base directory under which every cached file must reside.
    pub cache_root: PathBuf,

    /// Per-attempt timeout for upstream requests.
    pub request_timeout: Duration,

    /// Number of retries after the first failed attempt. Retries apply to
    /// transport errors and 5xx responses only.
    pub max_retries: u32,

    /// Base delay for exponential backoff between retries.
    pub retry_delay_base: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            cache_root: PathBuf::from("cache"),
            request_timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_delay_base: Duration::from_millis(250),
        }
    }
}
