//! Registry adapters: each module translates its protocol's request shape
//! into a `(key, class, upstream URL)` triple and hands it to the shared
//! cache resolver.

pub mod maven;
pub mod npm;
pub mod pypi;

use axum::body::Body;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use pullbox_engine::{CachedResponse, Validators};

/// Pull the conditional-GET validators out of the request headers.
pub(crate) fn validators_from(headers: &HeaderMap) -> Validators {
    let text = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
    };
    Validators {
        if_none_match: text(header::IF_NONE_MATCH),
        if_modified_since: text(header::IF_MODIFIED_SINCE),
    }
}

/// Turn a resolver result into an HTTP response: bare 304, or 200 with
/// the entry's validators attached.
pub(crate) fn file_response(
    cached: CachedResponse,
    content_type: &str,
    attachment: bool,
) -> Response {
    if cached.not_modified {
        return StatusCode::NOT_MODIFIED.into_response();
    }

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::ETAG, &cached.etag)
        .header(header::LAST_MODIFIED, &cached.last_modified);
    if attachment {
        builder = builder.header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", cached.file_name),
        );
    }
    builder
        .body(Body::from(cached.body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
