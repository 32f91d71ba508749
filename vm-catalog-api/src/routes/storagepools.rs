use super::location;
use crate::{error::ApiResult, state::AppState};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use vm_catalog::{
    CreateStoragePoolRequest, StoragePoolInfo, StorageVolume, UpdateStoragePoolRequest,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/v1/storagepools",
            get(list_storagepools).post(create_storagepool),
        )
        .route(
            "/api/v1/storagepools/{name}",
            get(get_storagepool)
                .put(update_storagepool)
                .delete(delete_storagepool),
        )
        .route(
            "/api/v1/storagepools/{name}/activate",
            post(activate_storagepool),
        )
        .route(
            "/api/v1/storagepools/{name}/deactivate",
            post(deactivate_storagepool),
        )
        .route(
            "/api/v1/storagepools/{name}/storagevolumes",
            get(list_storagevolumes),
        )
}

#[utoipa::path(
    get,
    path = "/api/v1/storagepools",
    tag = "storagepools",
    responses((status = 200, description = "All storage pools", body = [StoragePoolInfo]))
)]
pub(crate) async fn list_storagepools(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<StoragePoolInfo>>> {
    Ok(Json(state.catalog.list_storagepools().await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/storagepools",
    tag = "storagepools",
    request_body = CreateStoragePoolRequest,
    responses(
        (status = 201, description = "Storage pool created", body = StoragePoolInfo),
        (status = 400, description = "Invalid storage pool")
    )
)]
pub(crate) async fn create_storagepool(
    State(state): State<AppState>,
    payload: Result<Json<CreateStoragePoolRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(req) = payload?;
    let pool = state.catalog.create_storagepool(req).await?;
    let location = location(&["api", "v1", "storagepools", pool.name.as_str()]);

    Ok((StatusCode::CREATED, [(header::LOCATION, location)], Json(pool)).into_response())
}

#[utoipa::path(
    get,
    path = "/api/v1/storagepools/{name}",
    tag = "storagepools",
    params(("name" = String, Path, description = "Storage pool name")),
    responses(
        (status = 200, description = "Storage pool", body = StoragePoolInfo),
        (status = 404, description = "No such storage pool")
    )
)]
pub(crate) async fn get_storagepool(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<StoragePoolInfo>> {
    Ok(Json(state.catalog.get_storagepool(&name).await?))
}

#[utoipa::path(
    put,
    path = "/api/v1/storagepools/{name}",
    tag = "storagepools",
    params(("name" = String, Path, description = "Storage pool name")),
    request_body = UpdateStoragePoolRequest,
    responses(
        (status = 200, description = "Storage pool updated", body = StoragePoolInfo),
        (status = 400, description = "Pool can not be extended")
    )
)]
pub(crate) async fn update_storagepool(
    State(state): State<AppState>,
    Path(name): Path<String>,
    payload: Result<Json<UpdateStoragePoolRequest>, JsonRejection>,
) -> ApiResult<Json<StoragePoolInfo>> {
    let Json(update) = payload?;
    Ok(Json(state.catalog.update_storagepool(&name, update).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/storagepools/{name}/activate",
    tag = "storagepools",
    params(("name" = String, Path, description = "Storage pool name")),
    responses((status = 200, description = "Storage pool activated", body = StoragePoolInfo))
)]
pub(crate) async fn activate_storagepool(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<StoragePoolInfo>> {
    Ok(Json(state.catalog.activate_storagepool(&name).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/storagepools/{name}/deactivate",
    tag = "storagepools",
    params(("name" = String, Path, description = "Storage pool name")),
    responses((status = 200, description = "Storage pool deactivated", body = StoragePoolInfo))
)]
pub(crate) async fn deactivate_storagepool(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<StoragePoolInfo>> {
    Ok(Json(state.catalog.deactivate_storagepool(&name).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/storagepools/{name}/storagevolumes",
    tag = "storagepools",
    params(("name" = String, Path, description = "Storage pool name")),
    responses((status = 200, description = "Volumes in the pool", body = [StorageVolume]))
)]
pub(crate) async fn list_storagevolumes(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<Vec<StorageVolume>>> {
    Ok(Json(state.catalog.list_storagevolumes(&name).await?))
}

#[utoipa::path(
    delete,
    path = "/api/v1/storagepools/{name}",
    tag = "storagepools",
    params(("name" = String, Path, description = "Storage pool name")),
    responses(
        (status = 204, description = "Storage pool deleted"),
        (status = 400, description = "Storage pool in use or active"),
        (status = 404, description = "No such storage pool")
    )
)]
pub(crate) async fn delete_storagepool(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<StatusCode> {
    state.catalog.delete_storagepool(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}
