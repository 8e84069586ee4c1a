//! Request extractors: bearer-token principals and request bodies that
//! answer with the standard error envelope.

use axum::{
    extract::{FromRequest, FromRequestParts, Multipart, Request},
    http::{header, request::Parts},
};
use db::models::{association::Association, user::User};
use services::services::{
    associations::AssociationFields,
    auth::{Authenticated, Principal},
    logo_storage::LogoUpload,
};
use uuid::Uuid;

use crate::{AppState, error::ApiError};

#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Any authenticated principal.
pub struct Auth {
    pub principal: Principal,
    pub token_id: Uuid,
}

impl FromRequestParts<AppState> for Auth {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let token = bearer_token(parts).ok_or(ApiError::Unauthorized("Unauthenticated."))?;
        let Authenticated {
            principal,
            token_id,
        } = state.auth().authenticate(token).await?;
        Ok(Auth {
            principal,
            token_id,
        })
    }
}

/// An authenticated user account (not an association).
pub struct UserAuth(pub User);

impl FromRequestParts<AppState> for UserAuth {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        match Auth::from_request_parts(parts, state).await?.principal {
            Principal::User(user) => Ok(UserAuth(user)),
            Principal::Association(_) => Err(ApiError::Forbidden("Only users can do this.")),
        }
    }
}

pub struct AssociationAuth(pub Association);

impl FromRequestParts<AppState> for AssociationAuth {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        match Auth::from_request_parts(parts, state).await?.principal {
            Principal::Association(association) => Ok(AssociationAuth(association)),
            Principal::User(_) => Err(ApiError::Forbidden("Unauthorized")),
        }
    }
}

/// An admin user. The principal is kept whole so it can be handed to services.
pub struct AdminAuth(pub Principal);

impl FromRequestParts<AppState> for AdminAuth {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let auth = Auth::from_request_parts(parts, state).await?;
        if !auth.principal.is_admin() {
            return Err(ApiError::Forbidden("Unauthorized"));
        }
        Ok(AdminAuth(auth.principal))
    }
}

/// Association form body, either JSON or `multipart/form-data` with an
/// optional `logo_url` (or `logo`) file part.
pub struct AssociationForm {
    pub fields: AssociationFields,
    pub logo: Option<LogoUpload>,
}

impl<S> FromRequest<S> for AssociationForm
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, ApiError> {
        let is_multipart = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("multipart/form-data"));
        if !is_multipart {
            let ApiJson(fields) = ApiJson::<AssociationFields>::from_request(req, state).await?;
            return Ok(AssociationForm { fields, logo: None });
        }

        let mut multipart = Multipart::from_request(req, state).await?;
        let mut fields = AssociationFields::default();
        let mut logo = None;
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            if name == "logo_url" || name == "logo" {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await?;
                if !bytes.is_empty() {
                    logo = Some(LogoUpload {
                        file_name,
                        content_type,
                        bytes: bytes.to_vec(),
                    });
                }
                continue;
            }

            let slot = match name.as_str() {
                "name" => &mut fields.name,
                "email" => &mut fields.email,
                "password" => &mut fields.password,
                "password_confirmation" => &mut fields.password_confirmation,
                "phone" => &mut fields.phone,
                "address" => &mut fields.address,
                "description" => &mut fields.description,
                "category" => &mut fields.category,
                _ => continue,
            };
            *slot = Some(field.text().await?);
        }
        Ok(AssociationForm { fields, logo })
    }
}
