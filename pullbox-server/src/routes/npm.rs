//! npm adapter.
//!
//! Scoped package names (`@scope/name`) contain a slash, so a single
//! wildcard dispatcher splits metadata requests from tarball requests on
//! the registry's `/-/` separator. The upstream metadata URL percent-
//! encodes the scoped slash (`@scope%2Fname`) as the registry requires,
//! while the cache key keeps the readable nested form.

use axum::Router;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::Response;
use axum::routing::{get, post};
use bytes::Bytes;
use pullbox_engine::{ArtifactClass, UpstreamRequest, Validators};
use sha2::{Digest, Sha256};

use crate::error::ApiError;
use crate::routes::{file_response, validators_from};
use crate::state::AppState;
use crate::validate;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/-/npm/v1/security/advisories/bulk", post(advisories_bulk))
        .route("/{*path}", get(dispatch))
}

/// Percent-encode a package name for the registry URL scheme: the slash
/// in a scoped name becomes `%2F`, everything else is left as-is.
fn encode_package_name(name: &str) -> String {
    name.replacen('/', "%2F", 1)
}

async fn dispatch(
    State(state): State<AppState>,
    Path(path): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    match path.split_once("/-/") {
        Some((package, tarball)) => serve_tarball(state, package, tarball, headers).await,
        None => serve_metadata(state, &path, headers).await,
    }
}

async fn serve_metadata(
    state: AppState,
    package: &str,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    if !validate::valid_npm_package_name(package) {
        return Err(ApiError::InvalidName(package.to_string()));
    }

    let cached = state
        .resolver
        .resolve(
            &format!("npm/{package}/index.json"),
            ArtifactClass::Metadata,
            state.registries.npm_ttl,
            UpstreamRequest::get(format!(
                "{}/{}",
                state.registries.npm_upstream,
                encode_package_name(package)
            )),
            &validators_from(&headers),
        )
        .await?;
    Ok(file_response(cached, "application/json", false))
}

/// Tarballs are fetched on demand only, never prefetched alongside the
/// metadata. Dist URLs use the literal (unencoded) package name.
async fn serve_tarball(
    state: AppState,
    package: &str,
    tarball: &str,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    if !validate::valid_npm_package_name(package) {
        return Err(ApiError::InvalidName(package.to_string()));
    }
    if !validate::valid_tarball_name(tarball) {
        return Err(ApiError::InvalidName(tarball.to_string()));
    }

    let cached = state
        .resolver
        .resolve(
            &format!("npm/{package}/-/{tarball}"),
            ArtifactClass::Immutable,
            state.registries.npm_ttl,
            UpstreamRequest::get(format!(
                "{}/{package}/-/{tarball}",
                state.registries.npm_upstream
            )),
            &validators_from(&headers),
        )
        .await?;
    Ok(file_response(cached, "application/gzip", false))
}

/// Bulk security-advisory lookup: a POST whose cache key is the hash of
/// the request body rather than a URL path.
async fn advisories_bulk(State(state): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
    let digest = hex::encode(Sha256::digest(&body));

    let cached = state
        .resolver
        .resolve(
            &format!("npm/-/advisories/{digest}.json"),
            ArtifactClass::Metadata,
            state.registries.npm_ttl,
            UpstreamRequest::post(
                format!(
                    "{}/-/npm/v1/security/advisories/bulk",
                    state.registries.npm_upstream
                ),
                body,
            ),
            &Validators::none(),
        )
        .await?;
    Ok(file_response(cached, "application/json", false))
}
