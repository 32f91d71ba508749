use super::location;
use crate::{error::ApiResult, state::AppState};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use vm_catalog::{CreateTemplateRequest, TemplateInfo, UpdateTemplateRequest};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/v1/templates",
            get(list_templates).post(create_template),
        )
        .route(
            "/api/v1/templates/{name}",
            get(get_template)
                .put(update_template)
                .delete(delete_template),
        )
        .route("/api/v1/templates/{name}/clone", post(clone_template))
}

fn template_location(name: &str) -> String {
    location(&["api", "v1", "templates", name])
}

#[utoipa::path(
    get,
    path = "/api/v1/templates",
    tag = "templates",
    responses((status = 200, description = "All templates", body = [TemplateInfo]))
)]
pub(crate) async fn list_templates(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<TemplateInfo>>> {
    let templates = state.catalog.list_templates().await?;
    Ok(Json(templates))
}

#[utoipa::path(
    post,
    path = "/api/v1/templates",
    tag = "templates",
    request_body = CreateTemplateRequest,
    responses(
        (status = 201, description = "Template created", body = TemplateInfo),
        (status = 400, description = "Invalid template")
    )
)]
pub(crate) async fn create_template(
    State(state): State<AppState>,
    payload: Result<Json<CreateTemplateRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(req) = payload?;
    let template = state.catalog.create_template(req).await?;
    let location = template_location(&template.template.name);

    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(template),
    )
        .into_response())
}

#[utoipa::path(
    get,
    path = "/api/v1/templates/{name}",
    tag = "templates",
    params(("name" = String, Path, description = "Template name")),
    responses(
        (status = 200, description = "Template with its integrity report", body = TemplateInfo),
        (status = 404, description = "No such template")
    )
)]
pub(crate) async fn get_template(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<TemplateInfo>> {
    let template = state.catalog.get_template(&name).await?;
    Ok(Json(template))
}

/// Partial update; a rename answers with a redirect to the new location
#[utoipa::path(
    put,
    path = "/api/v1/templates/{name}",
    tag = "templates",
    params(("name" = String, Path, description = "Template name")),
    request_body = UpdateTemplateRequest,
    responses(
        (status = 200, description = "Template updated", body = TemplateInfo),
        (status = 303, description = "Template renamed"),
        (status = 400, description = "Invalid update"),
        (status = 404, description = "No such template")
    )
)]
pub(crate) async fn update_template(
    State(state): State<AppState>,
    Path(name): Path<String>,
    payload: Result<Json<UpdateTemplateRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(update) = payload?;
    let outcome = state.catalog.update_template(&name, update).await?;

    if outcome.renamed_from.is_some() {
        let location = template_location(&outcome.template.template.name);
        return Ok(Redirect::to(&location).into_response());
    }

    Ok(Json(outcome.template).into_response())
}

#[utoipa::path(
    delete,
    path = "/api/v1/templates/{name}",
    tag = "templates",
    params(("name" = String, Path, description = "Template name")),
    responses(
        (status = 204, description = "Template deleted"),
        (status = 404, description = "No such template")
    )
)]
pub(crate) async fn delete_template(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<StatusCode> {
    state.catalog.delete_template(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/v1/templates/{name}/clone",
    tag = "templates",
    params(("name" = String, Path, description = "Template to copy")),
    responses(
        (status = 303, description = "Redirect to the copy"),
        (status = 404, description = "No such template")
    )
)]
pub(crate) async fn clone_template(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Redirect> {
    let clone = state.catalog.clone_template(&name).await?;
    Ok(Redirect::to(&template_location(&clone.template.name)))
}
