//! PyPI adapter: three sub-shapes share the resolver — simple-index HTML
//! (rewritten before caching), JSON metadata, and immutable package files
//! served from the files host.

use std::sync::Arc;

use axum::Router;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::Response;
use axum::routing::get;
use bytes::Bytes;
use pullbox_engine::{ArtifactClass, UpstreamRequest};

use crate::error::ApiError;
use crate::rewrite;
use crate::routes::{file_response, validators_from};
use crate::state::AppState;
use crate::validate;

/// File suffixes served as attachments so browsers download rather than
/// render them.
const ATTACHMENT_SUFFIXES: [&str; 4] = [".whl", ".zip", ".gz", ".tar"];

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/simple/", get(root_index))
        .route("/simple/{package}/", get(package_index))
        .route("/packages/{*path}", get(package_file))
        .route("/{package}/json", get(package_json))
        .route("/{package}/{version}/json", get(version_json))
}

async fn root_index(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let cached = state
        .resolver
        .resolve(
            "pypi/simple/index.html",
            ArtifactClass::Metadata,
            state.registries.pypi_ttl,
            UpstreamRequest::get(format!("{}/simple/", state.registries.pypi_upstream)),
            &validators_from(&headers),
        )
        .await?;
    Ok(file_response(cached, "text/html", false))
}

async fn package_index(
    State(state): State<AppState>,
    Path(package): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    if !validate::valid_pypi_package_name(&package) {
        return Err(ApiError::InvalidName(package));
    }

    // Package links are rerouted through this proxy before the page is
    // cached, so the stored copy is already self-contained.
    let transform = Arc::new(|body: Bytes| {
        let html = String::from_utf8_lossy(&body);
        Bytes::from(rewrite::rewrite_index_html(&html, "/pypi"))
    });

    let cached = state
        .resolver
        .resolve(
            &format!("pypi/simple/{package}/index.html"),
            ArtifactClass::Metadata,
            state.registries.pypi_ttl,
            UpstreamRequest::get(format!(
                "{}/simple/{package}/",
                state.registries.pypi_upstream
            ))
            .with_transform(transform),
            &validators_from(&headers),
        )
        .await?;
    Ok(file_response(cached, "text/html", false))
}

async fn package_file(
    State(state): State<AppState>,
    Path(path): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    if !validate::valid_pypi_file_path(&path) {
        return Err(ApiError::InvalidName(path));
    }

    // Some rewritten pages historically carried a doubled prefix; the
    // upstream path never includes it.
    let upstream_path = path.strip_prefix("packages/").unwrap_or(&path);

    let cached = state
        .resolver
        .resolve(
            &format!("pypi/packages/{path}"),
            ArtifactClass::Immutable,
            state.registries.pypi_ttl,
            UpstreamRequest::get(format!(
                "{}/packages/{upstream_path}",
                state.registries.pypi_files_upstream
            )),
            &validators_from(&headers),
        )
        .await?;

    let attachment = ATTACHMENT_SUFFIXES
        .iter()
        .any(|suffix| cached.file_name.ends_with(suffix));
    Ok(file_response(cached, "application/octet-stream", attachment))
}

async fn package_json(
    State(state): State<AppState>,
    Path(package): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    if !validate::valid_pypi_package_name(&package) {
        return Err(ApiError::InvalidName(package));
    }

    let cached = state
        .resolver
        .resolve(
            &format!("pypi/{package}/index.json"),
            ArtifactClass::Metadata,
            state.registries.pypi_ttl,
            UpstreamRequest::get(format!(
                "{}/pypi/{package}/json",
                state.registries.pypi_upstream
            )),
            &validators_from(&headers),
        )
        .await?;
    Ok(file_response(cached, "application/json", false))
}

async fn version_json(
    State(state): State<AppState>,
    Path((package, version)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    if !validate::valid_pypi_package_name(&package) {
        return Err(ApiError::InvalidName(package));
    }
    if !validate::valid_version_string(&version) {
        return Err(ApiError::InvalidName(version));
    }

    let cached = state
        .resolver
        .resolve(
            &format!("pypi/{package}/{version}/index.json"),
            ArtifactClass::Metadata,
            state.registries.pypi_ttl,
            UpstreamRequest::get(format!(
                "{}/pypi/{package}/{version}/json",
                state.registries.pypi_upstream
            )),
            &validators_from(&headers),
        )
        .await?;
    Ok(file_response(cached, "application/json", false))
}
