pub mod health;
pub mod networks;
pub mod storagepools;
pub mod templates;

use crate::{api_docs::ApiDoc, state::AppState};
use axum::{routing::get, Json, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use url::Url;
use utoipa::OpenApi;
use vm_catalog::Catalog;

pub fn create_app(catalog: Catalog) -> Router {
    let state = AppState::new(catalog);

    // Allow CORS for local development (frontend on different port)
    let cors = CorsLayer::permissive();

    Router::new()
        .merge(health::routes())
        .route("/api-docs/openapi.json", get(openapi_spec))
        .merge(templates::routes())
        .merge(networks::routes())
        .merge(storagepools::routes())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn openapi_spec() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Build an absolute path from raw segments, percent-encoding each one
pub(crate) fn location(segments: &[&str]) -> String {
    let mut url = Url::parse("http://localhost/").expect("static base URL is valid");
    if let Ok(mut path) = url.path_segments_mut() {
        path.clear().extend(segments);
    }
    url.path().to_string()
}
