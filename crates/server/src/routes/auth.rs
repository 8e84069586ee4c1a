//! Registration, login and logout for both kinds of account.

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::Json as ResponseJson,
    routing::post,
};
use db::models::{association::Association, message::Party, user::User};
use serde::Serialize;
use services::services::{auth::Credentials, users::RegisterUser};
use ts_rs::TS;
use utils::response::ApiResponse;

use crate::{
    AppState,
    error::ApiError,
    extract::{ApiJson, AssociationForm, Auth},
};

#[derive(Debug, Serialize, TS)]
pub struct UserSession {
    pub user: User,
    pub token: String,
}

#[derive(Debug, Serialize, TS)]
pub struct AssociationSession {
    pub association: Association,
    pub token: String,
}

pub async fn register(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegisterUser>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<UserSession>>), ApiError> {
    let user = state.users().register(payload).await?;
    let token = state
        .auth()
        .issue_token(Party::user(user.id), "auth_token")
        .await?;
    Ok((
        StatusCode::CREATED,
        ResponseJson(ApiResponse::success_with_message(
            UserSession { user, token },
            "User registered successfully",
        )),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(credentials): ApiJson<Credentials>,
) -> Result<ResponseJson<ApiResponse<UserSession>>, ApiError> {
    let (user, token) = state.auth().login_user(credentials).await?;
    Ok(ResponseJson(ApiResponse::success(UserSession { user, token })))
}

pub async fn register_association(
    State(state): State<AppState>,
    form: AssociationForm,
) -> Result<(StatusCode, ResponseJson<ApiResponse<AssociationSession>>), ApiError> {
    let association = state
        .associations()
        .register(form.fields, form.logo)
        .await?;
    let token = state
        .auth()
        .issue_token(Party::association(association.id), "auth_token")
        .await?;
    Ok((
        StatusCode::CREATED,
        ResponseJson(ApiResponse::success_with_message(
            AssociationSession { association, token },
            "Association registered successfully",
        )),
    ))
}

pub async fn login_association(
    State(state): State<AppState>,
    ApiJson(credentials): ApiJson<Credentials>,
) -> Result<ResponseJson<ApiResponse<AssociationSession>>, ApiError> {
    let (association, token) = state.auth().login_association(credentials).await?;
    Ok(ResponseJson(ApiResponse::success(AssociationSession {
        association,
        token,
    })))
}

/// Revokes only the token used for this request.
pub async fn logout(
    State(state): State<AppState>,
    auth: Auth,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    state.auth().logout(auth.token_id).await?;
    Ok(ResponseJson(ApiResponse::success_with_message(
        (),
        "Successfully logged out",
    )))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/association/register", post(register_association))
        .route("/association/login", post(login_association))
}
