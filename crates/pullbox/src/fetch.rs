//! Atomic fetch-and-store: pulls an artifact from upstream with a bounded
//! retry budget and commits it to the cache via temp-write-then-rename, so
//! concurrent readers never observe a partially written file.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use reqwest::{Client, StatusCode};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::config::ResolverConfig;
use crate::error::CacheError;

/// Transform applied to the response body before it is written to the
/// cache (PyPI simple-index link rewriting).
pub type BodyTransform = Arc<dyn Fn(Bytes) -> Bytes + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpstreamMethod {
    Get,
    Post,
}

/// One upstream request to satisfy a cache miss.
#[derive(Clone)]
pub struct UpstreamRequest {
    pub url: String,
    pub method: UpstreamMethod,
    pub body: Option<Bytes>,
    pub transform: Option<BodyTransform>,
}

impl UpstreamRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: UpstreamMethod::Get,
            body: None,
            transform: None,
        }
    }

    pub fn post(url: impl Into<String>, body: Bytes) -> Self {
        Self {
            url: url.into(),
            method: UpstreamMethod::Post,
            body: Some(body),
            transform: None,
        }
    }

    pub fn with_transform(mut self, transform: BodyTransform) -> Self {
        self.transform = Some(transform);
        self
    }
}

impl std::fmt::Debug for UpstreamRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamRequest")
            .field("url", &self.url)
            .field("method", &self.method)
            .field("has_body", &self.body.is_some())
            .field("has_transform", &self.transform.is_some())
            .finish()
    }
}

/// Build the shared reqwest client used for all upstream calls.
pub fn create_client(config: &ResolverConfig) -> Result<Client, CacheError> {
    Client::builder()
        .pool_max_idle_per_host(5)
        .redirect(reqwest::redirect::Policy::limited(10))
        .connect_timeout(config.request_timeout)
        .build()
        .map_err(|e| CacheError::Transient {
            reason: e.to_string(),
        })
}

/// Performs upstream fetches and atomic cache writes. The sole writer of
/// the cache tree.
pub struct Fetcher {
    client: Client,
    cache_root: PathBuf,
    request_timeout: Duration,
    max_retries: u32,
    retry_delay_base: Duration,
}

impl Fetcher {
    pub fn new(client: Client, config: &ResolverConfig) -> Self {
        Self {
            client,
            cache_root: config.cache_root.clone(),
            request_timeout: config.request_timeout,
            max_retries: config.max_retries,
            retry_delay_base: config.retry_delay_base,
        }
    }

    /// Fetch `request` and commit the body to `dest`.
    ///
    /// Transport errors and 5xx responses are retried up to the configured
    /// budget with exponential delay; 404 and other 4xx responses fail
    /// immediately. The write is temp-file-then-rename in the destination
    /// directory, so a crash mid-write never publishes a partial file.
    pub async fn fetch_and_store(
        &self,
        request: &UpstreamRequest,
        dest: &Path,
    ) -> Result<(), CacheError> {
        // Defense in depth alongside the sandbox: the resolver only hands
        // us sandboxed paths, but refuse anything else outright.
        if !dest.starts_with(&self.cache_root) {
            warn!(dest = %dest.display(), "refused fetch destination outside cache root");
            return Err(CacheError::PathTraversal {
                key: dest.display().to_string(),
            });
        }

        let response = self.send_with_retries(request).await?;

        let mut body = response
            .bytes()
            .await
            .map_err(|e| CacheError::Transient {
                reason: e.to_string(),
            })?;
        if let Some(transform) = &request.transform {
            body = transform(body);
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        write_atomic(dest, &body).await?;

        debug!(url = %request.url, dest = %dest.display(), bytes = body.len(), "cached upstream artifact");
        Ok(())
    }

    /// Issue the request, retrying on 5xx and transport errors.
    async fn send_with_retries(
        &self,
        request: &UpstreamRequest,
    ) -> Result<reqwest::Response, CacheError> {
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            let builder = match request.method {
                UpstreamMethod::Get => self.client.get(&request.url),
                UpstreamMethod::Post => {
                    let mut b = self.client.post(&request.url);
                    if let Some(body) = &request.body {
                        b = b.body(body.clone());
                    }
                    b
                }
            };

            match builder.timeout(self.request_timeout).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }
                    if status == StatusCode::NOT_FOUND {
                        return Err(CacheError::UpstreamNotFound {
                            url: request.url.clone(),
                        });
                    }
                    if status.is_client_error() {
                        // Non-retryable client errors.
                        return Err(CacheError::UpstreamStatus {
                            status: status.as_u16(),
                        });
                    }
                    if attempts > self.max_retries {
                        warn!(
                            url = %request.url,
                            status = status.as_u16(),
                            attempts,
                            "retry budget exhausted"
                        );
                        return Err(CacheError::UpstreamStatus {
                            status: status.as_u16(),
                        });
                    }
                }
                Err(e) => {
                    if !e.is_connect() && !e.is_timeout() && !e.is_request() {
                        return Err(CacheError::Transient {
                            reason: e.to_string(),
                        });
                    }
                    if attempts > self.max_retries {
                        warn!(url = %request.url, error = %e, attempts, "retry budget exhausted");
                        return Err(CacheError::Transient {
                            reason: e.to_string(),
                        });
                    }
                }
            }

            let delay = self.retry_delay_base * 2u32.pow(attempts.saturating_sub(1));
            tokio::time::sleep(delay).await;
        }
    }
}

/// Write `data` to a uniquely named temp file in the destination directory,
/// flush it to disk, then rename onto `dest`.
async fn write_atomic(dest: &Path, data: &[u8]) -> Result<(), CacheError> {
    let parent = dest.parent().ok_or_else(|| CacheError::LocalIo {
        reason: format!("destination has no parent: {}", dest.display()),
    })?;
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "artifact".to_string());
    // Unique suffix per writer so racing fetches of one key never share a
    // temp file; the last rename wins with a complete copy either way.
    let tmp = parent.join(format!(".{name}.{}.tmp", uuid::Uuid::new_v4().simple()));

    let result = async {
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(data).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&tmp, dest).await?;
        Ok::<_, std::io::Error>(())
    }
    .await;

    if result.is_err() {
        let _ = tokio::fs::remove_file(&tmp).await;
    }
    result.map_err(CacheError::from)
}
