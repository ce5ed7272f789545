//! Cache resolver: composes the path sandbox, freshness policy, atomic
//! fetch-and-store and conditional response builder into the single
//! `resolve(key) -> response` operation shared by all registry adapters.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use reqwest::Client;
use tracing::{debug, warn};

use crate::conditional::{self, CachedResponse, Validators};
use crate::config::ResolverConfig;
use crate::error::CacheError;
use crate::fetch::{self, Fetcher, UpstreamRequest};
use crate::freshness::{self, ArtifactClass, EntryStat};
use crate::sandbox;

type SharedFetch = Shared<BoxFuture<'static, Result<(), CacheError>>>;

/// Resolves artifact keys against the cache, fetching from upstream on
/// miss or staleness.
///
/// Concurrent fetches of the same key are deduplicated: the first request
/// spawns the fetch and later arrivals await the same completion signal.
/// The fetch itself runs in a detached task, so a client disconnect aborts
/// only the response stream and the cache still gets warmed.
pub struct CacheResolver {
    config: Arc<ResolverConfig>,
    fetcher: Arc<Fetcher>,
    inflight: Mutex<HashMap<PathBuf, SharedFetch>>,
}

impl CacheResolver {
    pub fn new(config: ResolverConfig) -> Result<Self, CacheError> {
        let client = fetch::create_client(&config)?;
        Ok(Self::with_client(config, client))
    }

    pub fn with_client(config: ResolverConfig, client: Client) -> Self {
        let fetcher = Arc::new(Fetcher::new(client, &config));
        Self {
            config: Arc::new(config),
            fetcher,
            inflight: Mutex::new(HashMap::new()),
        }
    }

    pub fn cache_root(&self) -> &Path {
        &self.config.cache_root
    }

    /// Resolve `key` to a response.
    ///
    /// State machine: absent -> fetch -> respond; present and fresh ->
    /// respond; present and stale -> fetch, serving the stale entry if the
    /// refresh fails upstream. `UpstreamNotFound` is authoritative and is
    /// never masked by a stale entry, and local I/O failures are fatal.
    pub async fn resolve(
        &self,
        key: &str,
        class: ArtifactClass,
        ttl: Duration,
        upstream: UpstreamRequest,
        validators: &Validators,
    ) -> Result<CachedResponse, CacheError> {
        let dest = sandbox::safe_cache_path(&self.config.cache_root, key)?;

        let stat = match tokio::fs::metadata(&dest).await {
            Ok(meta) => EntryStat::from_metadata(&meta),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };

        if freshness::is_stale(stat.as_ref(), class, ttl, SystemTime::now()) {
            match self.fetch_deduped(&dest, upstream).await {
                Ok(()) => {}
                Err(e @ (CacheError::UpstreamStatus { .. } | CacheError::Transient { .. }))
                    if stat.is_some() =>
                {
                    // Availability over strict freshness: keep serving the
                    // stale entry when the refresh fails upstream.
                    warn!(key, error = %e, "refresh failed, serving stale entry");
                }
                Err(e) => return Err(e),
            }
        }

        conditional::build(&self.config.cache_root, &dest, validators).await
    }

    /// Single-flight fetch for one destination path.
    ///
    /// The in-flight map holds a `Shared` future per destination; the lock
    /// guards only map access, never the network call.
    async fn fetch_deduped(
        &self,
        dest: &Path,
        upstream: UpstreamRequest,
    ) -> Result<(), CacheError> {
        let fut = {
            let mut inflight = self.inflight.lock();
            if let Some(existing) = inflight.get(dest) {
                debug!(dest = %dest.display(), "joining in-flight fetch");
                existing.clone()
            } else {
                let fetcher = self.fetcher.clone();
                let target = dest.to_path_buf();
                let handle =
                    tokio::spawn(
                        async move { fetcher.fetch_and_store(&upstream, &target).await },
                    );
                let fut: SharedFetch = async move {
                    match handle.await {
                        Ok(result) => result,
                        Err(e) => Err(CacheError::LocalIo {
                            reason: format!("fetch task failed: {e}"),
                        }),
                    }
                }
                .boxed()
                .shared();
                inflight.insert(dest.to_path_buf(), fut.clone());
                fut
            }
        };

        let result = fut.clone().await;
        self.release_inflight(dest, &fut);
        result
    }

    /// Drop the in-flight entry for `dest`, but only if it is still the
    /// future this waiter awaited. A waiter returning late from a completed
    /// fetch must not evict a newer fetch already registered for the key.
    fn release_inflight(&self, dest: &Path, fut: &SharedFetch) {
        let mut inflight = self.inflight.lock();
        if inflight.get(dest).is_some_and(|current| current.ptr_eq(fut)) {
            inflight.remove(dest);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::ScriptedUpstream;

    fn resolver(root: &Path) -> CacheResolver {
        CacheResolver::new(ResolverConfig {
            cache_root: root.to_path_buf(),
            request_timeout: Duration::from_secs(5),
            max_retries: 1,
            retry_delay_base: Duration::from_millis(5),
        })
        .unwrap()
    }

    fn age_file(path: &Path, age: Duration) {
        let file = std::fs::File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - age).unwrap();
    }

    const HOUR: Duration = Duration::from_secs(3600);

    #[tokio::test]
    async fn miss_then_hit_fetches_once() {
        let dir = tempfile::tempdir().unwrap();
        let upstream = ScriptedUpstream::spawn(vec![(200, b"jar bytes".to_vec())]).await;
        let resolver = resolver(dir.path());

        let key = "maven/org/x/1.0/x-1.0.jar";
        let first = resolver
            .resolve(
                key,
                ArtifactClass::Immutable,
                HOUR,
                UpstreamRequest::get(upstream.url("/x-1.0.jar")),
                &Validators::none(),
            )
            .await
            .unwrap();
        assert_eq!(first.body.as_ref(), b"jar bytes");

        let second = resolver
            .resolve(
                key,
                ArtifactClass::Immutable,
                HOUR,
                UpstreamRequest::get(upstream.url("/x-1.0.jar")),
                &Validators::none(),
            )
            .await
            .unwrap();
        assert_eq!(second.body, first.body);
        assert_eq!(upstream.hits(), 1, "second request must be a pure cache hit");
    }

    #[tokio::test]
    async fn immutable_entry_never_refetched() {
        let dir = tempfile::tempdir().unwrap();
        let upstream = ScriptedUpstream::spawn(vec![(200, b"wheel".to_vec())]).await;
        let resolver = resolver(dir.path());

        let key = "pypi/packages/foo-1.0-py3-none-any.whl";
        resolver
            .resolve(
                key,
                ArtifactClass::Immutable,
                HOUR,
                UpstreamRequest::get(upstream.url("/foo.whl")),
                &Validators::none(),
            )
            .await
            .unwrap();

        // Age the entry far beyond any TTL.
        age_file(&dir.path().join(key), 1000 * HOUR);

        let resp = resolver
            .resolve(
                key,
                ArtifactClass::Immutable,
                HOUR,
                UpstreamRequest::get(upstream.url("/foo.whl")),
                &Validators::none(),
            )
            .await
            .unwrap();
        assert_eq!(resp.body.as_ref(), b"wheel");
        assert_eq!(upstream.hits(), 1);
    }

    #[tokio::test]
    async fn stale_metadata_refreshes_from_upstream() {
        let dir = tempfile::tempdir().unwrap();
        let upstream = ScriptedUpstream::spawn(vec![
            (200, b"v1".to_vec()),
            (200, b"v2".to_vec()),
        ])
        .await;
        let resolver = resolver(dir.path());

        let key = "npm/left-pad/index.json";
        let req = || UpstreamRequest::get(upstream.url("/left-pad"));

        resolver
            .resolve(key, ArtifactClass::Metadata, HOUR, req(), &Validators::none())
            .await
            .unwrap();
        age_file(&dir.path().join(key), 2 * HOUR);

        let resp = resolver
            .resolve(key, ArtifactClass::Metadata, HOUR, req(), &Validators::none())
            .await
            .unwrap();
        assert_eq!(resp.body.as_ref(), b"v2");
        assert_eq!(upstream.hits(), 2);
    }

    #[tokio::test]
    async fn stale_entry_served_when_refresh_fails() {
        let dir = tempfile::tempdir().unwrap();
        let upstream = ScriptedUpstream::spawn(vec![
            (200, b"old metadata".to_vec()),
            (500, b"boom".to_vec()),
        ])
        .await;
        let resolver = resolver(dir.path());

        let key = "pypi/requests/index.json";
        let req = || UpstreamRequest::get(upstream.url("/requests/json"));

        resolver
            .resolve(key, ArtifactClass::Metadata, HOUR, req(), &Validators::none())
            .await
            .unwrap();
        age_file(&dir.path().join(key), 2 * HOUR);

        let resp = resolver
            .resolve(key, ArtifactClass::Metadata, HOUR, req(), &Validators::none())
            .await
            .unwrap();
        assert!(!resp.not_modified);
        assert_eq!(resp.body.as_ref(), b"old metadata", "stale entry must still be served");
    }

    #[tokio::test]
    async fn absent_entry_with_failed_fetch_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let upstream = ScriptedUpstream::spawn(vec![(500, b"boom".to_vec())]).await;
        let resolver = resolver(dir.path());

        let err = resolver
            .resolve(
                "npm/ghost/index.json",
                ArtifactClass::Metadata,
                HOUR,
                UpstreamRequest::get(upstream.url("/ghost")),
                &Validators::none(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::UpstreamStatus { status: 500 }));
    }

    #[tokio::test]
    async fn upstream_404_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let upstream = ScriptedUpstream::spawn(vec![(404, b"missing".to_vec())]).await;
        let resolver = resolver(dir.path());

        let err = resolver
            .resolve(
                "maven/org/x/9.9/x-9.9.jar",
                ArtifactClass::Immutable,
                HOUR,
                UpstreamRequest::get(upstream.url("/x-9.9.jar")),
                &Validators::none(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::UpstreamNotFound { .. }));
    }

    #[tokio::test]
    async fn traversal_key_is_rejected_before_any_io() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = resolver(dir.path());

        let err = resolver
            .resolve(
                "maven/../../etc/passwd",
                ArtifactClass::Immutable,
                HOUR,
                UpstreamRequest::get("http://127.0.0.1:1/unused"),
                &Validators::none(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::PathTraversal { .. }));
    }

    #[tokio::test]
    async fn conditional_round_trip_through_resolver() {
        let dir = tempfile::tempdir().unwrap();
        let upstream = ScriptedUpstream::spawn(vec![(200, b"{}".to_vec())]).await;
        let resolver = resolver(dir.path());

        let key = "npm/react/index.json";
        let first = resolver
            .resolve(
                key,
                ArtifactClass::Metadata,
                HOUR,
                UpstreamRequest::get(upstream.url("/react")),
                &Validators::none(),
            )
            .await
            .unwrap();

        let second = resolver
            .resolve(
                key,
                ArtifactClass::Metadata,
                HOUR,
                UpstreamRequest::get(upstream.url("/react")),
                &Validators {
                    if_none_match: Some(first.etag.clone()),
                    if_modified_since: None,
                },
            )
            .await
            .unwrap();
        assert!(second.not_modified);
        assert!(second.body.is_empty());
    }

    #[tokio::test]
    async fn late_waiter_does_not_evict_newer_inflight_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = resolver(dir.path());
        let dest = dir.path().join("maven/org/x/1.0/x-1.0.jar");

        let finished: SharedFetch = async { Ok(()) }.boxed().shared();
        let newer: SharedFetch = futures::future::pending().boxed().shared();
        resolver.inflight.lock().insert(dest.clone(), newer.clone());

        // A waiter from an earlier, already-completed fetch releases its
        // handle: the newer entry must survive.
        resolver.release_inflight(&dest, &finished);
        assert!(
            resolver
                .inflight
                .lock()
                .get(&dest)
                .is_some_and(|f| f.ptr_eq(&newer))
        );

        // The owning waiter releases it for real.
        resolver.release_inflight(&dest, &newer);
        assert!(resolver.inflight.lock().is_empty());
    }

    #[tokio::test]
    async fn concurrent_misses_share_one_upstream_call() {
        let dir = tempfile::tempdir().unwrap();
        let upstream = ScriptedUpstream::spawn(vec![(200, b"shared".to_vec())]).await;
        let resolver = Arc::new(resolver(dir.path()));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let resolver = resolver.clone();
            let url = upstream.url("/shared.jar");
            tasks.push(tokio::spawn(async move {
                resolver
                    .resolve(
                        "maven/org/shared/1.0/shared-1.0.jar",
                        ArtifactClass::Immutable,
                        HOUR,
                        UpstreamRequest::get(url),
                        &Validators::none(),
                    )
                    .await
            }));
        }
        for task in tasks {
            let resp = task.await.unwrap().unwrap();
            assert_eq!(resp.body.as_ref(), b"shared");
        }
        assert_eq!(upstream.hits(), 1, "in-flight fetches must be deduplicated");
    }
}
