use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::message::{Message, Party};
use serde::Serialize;
use services::services::chat::{Conversation, Inbox, SendMessage};
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{
    AppState,
    error::ApiError,
    extract::{ApiJson, ApiPath, AssociationAuth, Auth, UserAuth},
};

#[derive(Debug, Serialize, TS)]
pub struct MarkedRead {
    pub updated: u64,
}

pub async fn conversation(
    State(state): State<AppState>,
    UserAuth(user): UserAuth,
    ApiPath(association_id): ApiPath<Uuid>,
) -> Result<ResponseJson<ApiResponse<Conversation>>, ApiError> {
    let conversation = state.chat().conversation(&user, association_id).await?;
    Ok(ResponseJson(ApiResponse::success(conversation)))
}

pub async fn send_to_association(
    State(state): State<AppState>,
    UserAuth(user): UserAuth,
    ApiPath(association_id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<SendMessage>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<Message>>), ApiError> {
    let message = state
        .chat()
        .send_to_association(&user, association_id, payload)
        .await?;
    Ok((
        StatusCode::CREATED,
        ResponseJson(ApiResponse::success_with_message(
            message,
            "Message sent successfully",
        )),
    ))
}

pub async fn send_to_user(
    State(state): State<AppState>,
    AssociationAuth(association): AssociationAuth,
    ApiPath(user_id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<SendMessage>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<Message>>), ApiError> {
    let message = state
        .chat()
        .send_to_user(&association, user_id, payload)
        .await?;
    Ok((
        StatusCode::CREATED,
        ResponseJson(ApiResponse::success_with_message(
            message,
            "Message sent successfully",
        )),
    ))
}

/// Marks everything `sender_id` sent to the caller as read.
pub async fn mark_read(
    State(state): State<AppState>,
    auth: Auth,
    ApiPath(sender_id): ApiPath<Uuid>,
) -> Result<ResponseJson<ApiResponse<MarkedRead>>, ApiError> {
    let updated = state
        .chat()
        .mark_read(auth.principal.party(), sender_id)
        .await?;
    Ok(ResponseJson(ApiResponse::success_with_message(
        MarkedRead { updated },
        "Messages marked as read",
    )))
}

pub async fn user_inbox(
    State(state): State<AppState>,
    UserAuth(user): UserAuth,
) -> Result<ResponseJson<ApiResponse<Inbox>>, ApiError> {
    let inbox = state.chat().inbox(Party::user(user.id)).await?;
    Ok(ResponseJson(ApiResponse::success(inbox)))
}

pub async fn association_inbox(
    State(state): State<AppState>,
    AssociationAuth(association): AssociationAuth,
) -> Result<ResponseJson<ApiResponse<Inbox>>, ApiError> {
    let inbox = state
        .chat()
        .inbox(Party::association(association.id))
        .await?;
    Ok(ResponseJson(ApiResponse::success(inbox)))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .nest(
            "/chat",
            Router::new()
                .route("/association/{id}", get(conversation))
                .route("/association/{id}/send", post(send_to_association))
                .route("/user/{id}/send", post(send_to_user))
                .route("/mark-read/{id}", post(mark_read)),
        )
        .route("/user/messages", get(user_inbox))
        .route("/association/messages", get(association_inbox))
}
