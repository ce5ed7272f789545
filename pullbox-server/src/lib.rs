//! # Pullbox server
//!
//! HTTP surface of the pullbox registry proxy: the three registry
//! adapters mounted under `/maven2`, `/pypi` and `/npm`, all funneling
//! into the shared cache resolver from `pullbox-engine`.

pub mod cli;
pub mod error;
pub mod rewrite;
pub mod routes;
pub mod state;
pub mod validate;

use axum::Json;
use axum::Router;
use axum::routing::get;
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the complete router.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(health))
        .nest("/maven2", routes::maven::router())
        .nest("/pypi", routes::pypi::router())
        .nest("/npm", routes::npm::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "message": "Local caching proxy for Maven, PyPI and npm",
    }))
}
