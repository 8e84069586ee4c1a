//! The caller's own account, whichever kind of principal it is.

use axum::{Router, extract::State, response::Json as ResponseJson, routing::get};
use db::models::{association::Association, user::User};
use serde::Serialize;
use serde_json::Value;
use services::services::{
    associations::{AssociationFields, AssociationServiceError},
    auth::Principal,
    users::UpdateUserRequest,
};
use ts_rs::TS;
use utils::response::ApiResponse;

use crate::{
    AppState,
    error::ApiError,
    extract::{ApiJson, AssociationForm, Auth},
};

#[derive(Debug, Serialize, TS)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Profile {
    User(User),
    Association(Association),
}

impl From<Principal> for Profile {
    fn from(principal: Principal) -> Self {
        match principal {
            Principal::User(user) => Profile::User(user),
            Principal::Association(association) => Profile::Association(association),
        }
    }
}

pub async fn get_me(auth: Auth) -> ResponseJson<ApiResponse<Profile>> {
    ResponseJson(ApiResponse::success(auth.principal.into()))
}

/// Partial profile update; the body shape follows the principal kind.
pub async fn update_me(
    State(state): State<AppState>,
    auth: Auth,
    ApiJson(body): ApiJson<Value>,
) -> Result<ResponseJson<ApiResponse<Profile>>, ApiError> {
    let profile = match &auth.principal {
        Principal::User(user) => {
            let payload: UpdateUserRequest = serde_json::from_value(body)
                .map_err(|e| ApiError::BadRequest(e.to_string()))?;
            let updated = state
                .users()
                .update(&auth.principal, user.id, payload)
                .await?;
            Profile::User(updated)
        }
        Principal::Association(association) => {
            let fields: AssociationFields = serde_json::from_value(body)
                .map_err(|e| ApiError::BadRequest(e.to_string()))?;
            let updated = state
                .associations()
                .update(&auth.principal, association.id, fields, None)
                .await?;
            Profile::Association(updated)
        }
    };
    Ok(ResponseJson(ApiResponse::success_with_message(
        profile,
        "Profile updated successfully",
    )))
}

pub async fn delete_me(
    State(state): State<AppState>,
    auth: Auth,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    // A user who owns an association closes the association, not the user.
    let owns_association = match &auth.principal {
        Principal::User(user) => Association::find_by_owner(&state.db().pool, user.id)
            .await?
            .is_some(),
        Principal::Association(_) => true,
    };
    let message = match &auth.principal {
        Principal::User(user) if !owns_association => {
            state.users().delete_self(user).await?;
            "Your account was deleted"
        }
        _ => {
            state.associations().delete_self(&auth.principal).await?;
            "Your organization account was deleted"
        }
    };
    Ok(ResponseJson(ApiResponse::success_with_message((), message)))
}

/// The association the caller acts for: itself, or the one its user owns.
pub async fn get_my_association(
    State(state): State<AppState>,
    auth: Auth,
) -> Result<ResponseJson<ApiResponse<Association>>, ApiError> {
    let association = owned_association(&state, &auth.principal).await?;
    Ok(ResponseJson(ApiResponse::success(association)))
}

pub async fn update_my_association(
    State(state): State<AppState>,
    auth: Auth,
    form: AssociationForm,
) -> Result<ResponseJson<ApiResponse<Association>>, ApiError> {
    let association = owned_association(&state, &auth.principal).await?;
    let updated = state
        .associations()
        .update(&auth.principal, association.id, form.fields, form.logo)
        .await?;
    Ok(ResponseJson(ApiResponse::success_with_message(
        updated,
        "Association updated successfully",
    )))
}

async fn owned_association(
    state: &AppState,
    principal: &Principal,
) -> Result<Association, ApiError> {
    match state.associations().find_owned_by(principal).await {
        Err(AssociationServiceError::NotFound) => Err(ApiError::NotFound(
            "No association found for this user".to_string(),
        )),
        other => Ok(other?),
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/me", get(get_me).put(update_me).delete(delete_me))
        .route(
            "/me/association",
            get(get_my_association).put(update_my_association),
        )
}
