//! Donor offers (`/offers`) and recipient requests (`/requests`). Both kinds
//! share handlers; the route decides which [`OfferKind`] they act on.

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::Json as ResponseJson,
    routing::{get, patch, post},
};
use db::models::offer::{Offer, OfferKind, OfferWithAssociation, OfferWithUser};
use services::services::donations::{SubmitOffer, UpdateOfferStatus};
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{
    AppState,
    error::ApiError,
    extract::{ApiJson, ApiPath, Auth},
};

async fn submit(
    kind: OfferKind,
    state: AppState,
    auth: Auth,
    payload: SubmitOffer,
) -> Result<(StatusCode, ResponseJson<ApiResponse<Offer>>), ApiError> {
    let offer = state
        .donations()
        .submit(kind, &auth.principal, payload)
        .await?;
    let message = match kind {
        OfferKind::Donation => "Offer created successfully",
        OfferKind::Recipient => "Request created successfully",
    };
    Ok((
        StatusCode::CREATED,
        ResponseJson(ApiResponse::success_with_message(offer, message)),
    ))
}

async fn received(
    kind: OfferKind,
    state: AppState,
    auth: Auth,
    association_id: Uuid,
) -> Result<ResponseJson<ApiResponse<Vec<OfferWithUser>>>, ApiError> {
    let offers = state
        .donations()
        .list_for_association(kind, &auth.principal, association_id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(offers)))
}

async fn decide(
    kind: OfferKind,
    state: AppState,
    auth: Auth,
    id: Uuid,
    payload: UpdateOfferStatus,
) -> Result<ResponseJson<ApiResponse<Offer>>, ApiError> {
    let offer = state
        .donations()
        .update_status(kind, &auth.principal, id, payload)
        .await?;
    Ok(ResponseJson(ApiResponse::success_with_message(
        offer,
        "Offer status updated successfully",
    )))
}

async fn mine(
    kind: OfferKind,
    state: AppState,
    auth: Auth,
) -> Result<ResponseJson<ApiResponse<Vec<OfferWithAssociation>>>, ApiError> {
    let offers = state.donations().list_mine(kind, &auth.principal).await?;
    Ok(ResponseJson(ApiResponse::success(offers)))
}

pub async fn create_offer(
    State(state): State<AppState>,
    auth: Auth,
    ApiJson(payload): ApiJson<SubmitOffer>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<Offer>>), ApiError> {
    submit(OfferKind::Donation, state, auth, payload).await
}

pub async fn association_offers(
    State(state): State<AppState>,
    auth: Auth,
    ApiPath(association_id): ApiPath<Uuid>,
) -> Result<ResponseJson<ApiResponse<Vec<OfferWithUser>>>, ApiError> {
    received(OfferKind::Donation, state, auth, association_id).await
}

pub async fn update_offer_status(
    State(state): State<AppState>,
    auth: Auth,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<UpdateOfferStatus>,
) -> Result<ResponseJson<ApiResponse<Offer>>, ApiError> {
    decide(OfferKind::Donation, state, auth, id, payload).await
}

pub async fn donor_offers(
    State(state): State<AppState>,
    auth: Auth,
) -> Result<ResponseJson<ApiResponse<Vec<OfferWithAssociation>>>, ApiError> {
    mine(OfferKind::Donation, state, auth).await
}

pub async fn create_request(
    State(state): State<AppState>,
    auth: Auth,
    ApiJson(payload): ApiJson<SubmitOffer>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<Offer>>), ApiError> {
    submit(OfferKind::Recipient, state, auth, payload).await
}

pub async fn association_requests(
    State(state): State<AppState>,
    auth: Auth,
    ApiPath(association_id): ApiPath<Uuid>,
) -> Result<ResponseJson<ApiResponse<Vec<OfferWithUser>>>, ApiError> {
    received(OfferKind::Recipient, state, auth, association_id).await
}

pub async fn update_request_status(
    State(state): State<AppState>,
    auth: Auth,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<UpdateOfferStatus>,
) -> Result<ResponseJson<ApiResponse<Offer>>, ApiError> {
    decide(OfferKind::Recipient, state, auth, id, payload).await
}

pub async fn recipient_requests(
    State(state): State<AppState>,
    auth: Auth,
) -> Result<ResponseJson<ApiResponse<Vec<OfferWithAssociation>>>, ApiError> {
    mine(OfferKind::Recipient, state, auth).await
}

pub async fn user_requests(
    State(state): State<AppState>,
    auth: Auth,
    ApiPath(user_id): ApiPath<Uuid>,
) -> Result<ResponseJson<ApiResponse<Vec<OfferWithAssociation>>>, ApiError> {
    let requests = state
        .donations()
        .list_for_user(OfferKind::Recipient, &auth.principal, user_id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(requests)))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/offers", post(create_offer))
        .route("/offers/{id}/status", patch(update_offer_status))
        .route("/association/{id}/offers", get(association_offers))
        .route("/donor/offers", get(donor_offers))
        .route("/requests", post(create_request))
        .route("/requests/{id}/status", patch(update_request_status))
        .route("/association/{id}/requests", get(association_requests))
        .route("/recipient/requests", get(recipient_requests))
        .route("/user/{id}/requests", get(user_requests))
}
