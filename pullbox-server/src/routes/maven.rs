//! Maven adapter: the cache key mirrors the upstream repository path
//! verbatim, so `groupId` segments arrive already slash-separated.

use axum::Router;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::Response;
use axum::routing::get;
use pullbox_engine::{ArtifactClass, UpstreamRequest};

use crate::error::ApiError;
use crate::routes::{file_response, validators_from};
use crate::state::AppState;
use crate::validate;

/// Extensions that identify refreshable repository metadata; everything
/// else (jars, aars, signatures over them) is a versioned immutable file.
const METADATA_EXTENSIONS: [&str; 4] = ["xml", "pom", "sha1", "md5"];

pub fn router() -> Router<AppState> {
    Router::new().route("/{*path}", get(serve))
}

fn classify(path: &str) -> ArtifactClass {
    let ext = path.rsplit('.').next().unwrap_or_default();
    if METADATA_EXTENSIONS
        .iter()
        .any(|m| ext.eq_ignore_ascii_case(m))
    {
        ArtifactClass::Metadata
    } else {
        ArtifactClass::Immutable
    }
}

async fn serve(
    State(state): State<AppState>,
    Path(path): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    if !validate::valid_maven_path(&path) {
        return Err(ApiError::InvalidName(path));
    }

    let cached = state
        .resolver
        .resolve(
            &format!("maven/{path}"),
            classify(&path),
            state.registries.maven_ttl,
            UpstreamRequest::get(format!("{}/{path}", state.registries.maven_upstream)),
            &validators_from(&headers),
        )
        .await?;

    Ok(file_response(cached, "application/octet-stream", false))
}
