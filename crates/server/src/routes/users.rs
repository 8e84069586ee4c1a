use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::Json as ResponseJson,
    routing::{delete, get, post},
};
use db::models::user::User;
use services::services::users::{RegisterUser, UpdateUserRequest};
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{
    AppState,
    error::ApiError,
    extract::{AdminAuth, ApiJson, ApiPath},
};

pub async fn list_users(
    State(state): State<AppState>,
    AdminAuth(admin): AdminAuth,
) -> Result<ResponseJson<ApiResponse<Vec<User>>>, ApiError> {
    let users = state.users().list(&admin).await?;
    Ok(ResponseJson(ApiResponse::success(users)))
}

pub async fn create_user(
    State(state): State<AppState>,
    AdminAuth(admin): AdminAuth,
    ApiJson(payload): ApiJson<RegisterUser>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<User>>), ApiError> {
    let user = state.users().create(&admin, payload).await?;
    Ok((
        StatusCode::CREATED,
        ResponseJson(ApiResponse::success_with_message(
            user,
            "User created successfully",
        )),
    ))
}

pub async fn get_user(
    State(state): State<AppState>,
    AdminAuth(admin): AdminAuth,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<ResponseJson<ApiResponse<User>>, ApiError> {
    let user = state.users().get(&admin, id).await?;
    Ok(ResponseJson(ApiResponse::success(user)))
}

pub async fn update_user(
    State(state): State<AppState>,
    AdminAuth(admin): AdminAuth,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<UpdateUserRequest>,
) -> Result<ResponseJson<ApiResponse<User>>, ApiError> {
    let user = state.users().update(&admin, id, payload).await?;
    Ok(ResponseJson(ApiResponse::success_with_message(
        user,
        "User updated successfully",
    )))
}

pub async fn delete_user(
    State(state): State<AppState>,
    AdminAuth(admin): AdminAuth,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    state.users().delete(&admin, id).await?;
    Ok(ResponseJson(ApiResponse::success_with_message(
        (),
        "User deleted successfully",
    )))
}

pub async fn list_deleted_users(
    State(state): State<AppState>,
    AdminAuth(admin): AdminAuth,
) -> Result<ResponseJson<ApiResponse<Vec<User>>>, ApiError> {
    let users = state.users().list_deleted(&admin).await?;
    Ok(ResponseJson(ApiResponse::success(users)))
}

pub async fn restore_user(
    State(state): State<AppState>,
    AdminAuth(admin): AdminAuth,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<ResponseJson<ApiResponse<User>>, ApiError> {
    let user = state.users().restore(&admin, id).await?;
    Ok(ResponseJson(ApiResponse::success_with_message(
        user,
        "User restored successfully",
    )))
}

pub async fn force_delete_user(
    State(state): State<AppState>,
    AdminAuth(admin): AdminAuth,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    state.users().force_delete(&admin, id).await?;
    Ok(ResponseJson(ApiResponse::success_with_message(
        (),
        "User permanently deleted",
    )))
}

pub fn router() -> Router<AppState> {
    Router::new().nest(
        "/users",
        Router::new()
            .route("/", get(list_users).post(create_user))
            .route("/deleted", get(list_deleted_users))
            .route(
                "/{id}",
                get(get_user).put(update_user).delete(delete_user),
            )
            .route("/{id}/restore", post(restore_user))
            .route("/{id}/force", delete(force_delete_user)),
    )
}
