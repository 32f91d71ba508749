use super::location;
use crate::{error::ApiResult, state::AppState};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use vm_catalog::{CreateNetworkRequest, NetworkInfo};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/networks", get(list_networks).post(create_network))
        .route(
            "/api/v1/networks/{name}",
            get(get_network).delete(delete_network),
        )
        .route("/api/v1/networks/{name}/activate", post(activate_network))
        .route(
            "/api/v1/networks/{name}/deactivate",
            post(deactivate_network),
        )
}

#[utoipa::path(
    get,
    path = "/api/v1/networks",
    tag = "networks",
    responses((status = 200, description = "All networks", body = [NetworkInfo]))
)]
pub(crate) async fn list_networks(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<NetworkInfo>>> {
    Ok(Json(state.catalog.list_networks().await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/networks",
    tag = "networks",
    request_body = CreateNetworkRequest,
    responses(
        (status = 201, description = "Network created", body = NetworkInfo),
        (status = 400, description = "Invalid network")
    )
)]
pub(crate) async fn create_network(
    State(state): State<AppState>,
    payload: Result<Json<CreateNetworkRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(req) = payload?;
    let network = state.catalog.create_network(req).await?;
    let location = location(&["api", "v1", "networks", network.network.name.as_str()]);

    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(network),
    )
        .into_response())
}

#[utoipa::path(
    get,
    path = "/api/v1/networks/{name}",
    tag = "networks",
    params(("name" = String, Path, description = "Network name")),
    responses(
        (status = 200, description = "Network", body = NetworkInfo),
        (status = 404, description = "No such network")
    )
)]
pub(crate) async fn get_network(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<NetworkInfo>> {
    Ok(Json(state.catalog.get_network(&name).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/networks/{name}/activate",
    tag = "networks",
    params(("name" = String, Path, description = "Network name")),
    responses((status = 200, description = "Network activated", body = NetworkInfo))
)]
pub(crate) async fn activate_network(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<NetworkInfo>> {
    Ok(Json(state.catalog.activate_network(&name).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/networks/{name}/deactivate",
    tag = "networks",
    params(("name" = String, Path, description = "Network name")),
    responses((status = 200, description = "Network deactivated", body = NetworkInfo))
)]
pub(crate) async fn deactivate_network(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<NetworkInfo>> {
    Ok(Json(state.catalog.deactivate_network(&name).await?))
}

/// Refused while a template references the network or it is active
#[utoipa::path(
    delete,
    path = "/api/v1/networks/{name}",
    tag = "networks",
    params(("name" = String, Path, description = "Network name")),
    responses(
        (status = 204, description = "Network deleted"),
        (status = 400, description = "Network in use or active"),
        (status = 404, description = "No such network")
    )
)]
pub(crate) async fn delete_network(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<StatusCode> {
    state.catalog.delete_network(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}
