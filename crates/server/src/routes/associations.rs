use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::Json as ResponseJson,
    routing::{delete, get, post},
};
use db::models::association::{Association, AssociationFilter};
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{
    AppState,
    error::ApiError,
    extract::{AdminAuth, ApiPath, ApiQuery, AssociationForm, Auth},
};

/// Directory of associations, filterable by `category` and `search`.
pub async fn list_associations(
    State(state): State<AppState>,
    auth: Auth,
    ApiQuery(filter): ApiQuery<AssociationFilter>,
) -> Result<ResponseJson<ApiResponse<Vec<Association>>>, ApiError> {
    let associations = state
        .associations()
        .list(&auth.principal, &filter)
        .await?;
    Ok(ResponseJson(ApiResponse::success(associations)))
}

pub async fn get_association(
    State(state): State<AppState>,
    auth: Auth,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<ResponseJson<ApiResponse<Association>>, ApiError> {
    let association = state.associations().get(&auth.principal, id).await?;
    Ok(ResponseJson(ApiResponse::success(association)))
}

pub async fn create_association(
    State(state): State<AppState>,
    AdminAuth(admin): AdminAuth,
    form: AssociationForm,
) -> Result<(StatusCode, ResponseJson<ApiResponse<Association>>), ApiError> {
    let association = state
        .associations()
        .create(&admin, form.fields, form.logo)
        .await?;
    Ok((
        StatusCode::CREATED,
        ResponseJson(ApiResponse::success_with_message(
            association,
            "Association created successfully",
        )),
    ))
}

pub async fn update_association(
    State(state): State<AppState>,
    AdminAuth(admin): AdminAuth,
    ApiPath(id): ApiPath<Uuid>,
    form: AssociationForm,
) -> Result<ResponseJson<ApiResponse<Association>>, ApiError> {
    let association = state
        .associations()
        .update(&admin, id, form.fields, form.logo)
        .await?;
    Ok(ResponseJson(ApiResponse::success_with_message(
        association,
        "Association updated successfully",
    )))
}

pub async fn delete_association(
    State(state): State<AppState>,
    AdminAuth(admin): AdminAuth,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    state.associations().delete(&admin, id).await?;
    Ok(ResponseJson(ApiResponse::success_with_message(
        (),
        "Association deleted successfully",
    )))
}

pub async fn list_trashed_associations(
    State(state): State<AppState>,
    AdminAuth(admin): AdminAuth,
) -> Result<ResponseJson<ApiResponse<Vec<Association>>>, ApiError> {
    let associations = state.associations().list_deleted(&admin).await?;
    Ok(ResponseJson(ApiResponse::success(associations)))
}

pub async fn restore_association(
    State(state): State<AppState>,
    AdminAuth(admin): AdminAuth,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<ResponseJson<ApiResponse<Association>>, ApiError> {
    let association = state.associations().restore(&admin, id).await?;
    Ok(ResponseJson(ApiResponse::success_with_message(
        association,
        "Association restored",
    )))
}

pub async fn force_delete_association(
    State(state): State<AppState>,
    AdminAuth(admin): AdminAuth,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    state.associations().force_delete(&admin, id).await?;
    Ok(ResponseJson(ApiResponse::success_with_message(
        (),
        "Association permanently deleted",
    )))
}

pub fn router() -> Router<AppState> {
    Router::new().nest(
        "/associations",
        Router::new()
            .route("/", get(list_associations).post(create_association))
            .route("/trashed/all", get(list_trashed_associations))
            .route(
                "/{id}",
                get(get_association)
                    .put(update_association)
                    .delete(delete_association),
            )
            .route("/{id}/restore", post(restore_association))
            .route("/{id}/force", delete(force_delete_association)),
    )
}
