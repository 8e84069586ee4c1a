use axum::{
    Json,
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use services::services::{
    associations::AssociationServiceError, auth::AuthError, chat::ChatError,
    database_validator::DatabaseValidationError, donations::DonationError,
    logo_storage::LogoStorageError, users::UserServiceError,
};
use thiserror::Error;
use utils::{response::ApiResponse, validation::ValidationErrors};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    User(#[from] UserServiceError),
    #[error(transparent)]
    Association(#[from] AssociationServiceError),
    #[error(transparent)]
    Donation(#[from] DonationError),
    #[error(transparent)]
    Chat(#[from] ChatError),
    #[error(transparent)]
    Storage(#[from] LogoStorageError),
    #[error(transparent)]
    Schema(#[from] DatabaseValidationError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    #[error(transparent)]
    Json(#[from] JsonRejection),
    #[error(transparent)]
    Multipart(#[from] MultipartError),
    #[error(transparent)]
    MultipartRejection(#[from] MultipartRejection),
    #[error(transparent)]
    Path(#[from] PathRejection),
    #[error(transparent)]
    Query(#[from] QueryRejection),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(&'static str),
    #[error("{0}")]
    Forbidden(&'static str),
    #[error("{0}")]
    NotFound(String),
}

enum Failure<'a> {
    Status(StatusCode, String),
    Invalid(&'a ValidationErrors),
    Database(&'a sqlx::Error),
}

impl ApiError {
    fn classify(&self) -> Failure<'_> {
        use Failure::*;
        match self {
            ApiError::Auth(e) => auth_failure(e),
            ApiError::User(e) => match e {
                UserServiceError::Database(db) => Database(db),
                UserServiceError::Validation(errors) => Invalid(errors),
                UserServiceError::Auth(inner) => auth_failure(inner),
                UserServiceError::NotFound => Status(StatusCode::NOT_FOUND, e.to_string()),
                UserServiceError::Forbidden(_) => Status(StatusCode::FORBIDDEN, e.to_string()),
            },
            ApiError::Association(e) => match e {
                AssociationServiceError::Database(db) => Database(db),
                AssociationServiceError::Validation(errors) => Invalid(errors),
                AssociationServiceError::Auth(inner) => auth_failure(inner),
                AssociationServiceError::Storage(inner) => storage_failure(inner),
                AssociationServiceError::NotFound => Status(StatusCode::NOT_FOUND, e.to_string()),
                AssociationServiceError::Forbidden(_) => {
                    Status(StatusCode::FORBIDDEN, e.to_string())
                }
            },
            ApiError::Donation(e) => match e {
                DonationError::Database(db) => Database(db),
                DonationError::Validation(errors) => Invalid(errors),
                DonationError::NotFound(_) => Status(StatusCode::NOT_FOUND, e.to_string()),
                DonationError::Forbidden(_) => Status(StatusCode::FORBIDDEN, e.to_string()),
                DonationError::InvalidTransition(_) => {
                    Status(StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
                }
            },
            ApiError::Chat(e) => match e {
                ChatError::Database(db) => Database(db),
                ChatError::Validation(errors) => Invalid(errors),
                ChatError::NotFound(_) => Status(StatusCode::NOT_FOUND, e.to_string()),
            },
            ApiError::Storage(e) => storage_failure(e),
            ApiError::Schema(e) => match e {
                DatabaseValidationError::Database(db) => Database(db),
                DatabaseValidationError::MissingTables(_) => {
                    Status(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
                }
            },
            ApiError::Database(db) => Database(db),
            ApiError::Validation(errors) => Invalid(errors),
            ApiError::Json(rejection) => Status(rejection.status(), rejection.body_text()),
            ApiError::Multipart(rejection) => Status(rejection.status(), rejection.body_text()),
            ApiError::MultipartRejection(rejection) => {
                Status(rejection.status(), rejection.body_text())
            }
            ApiError::Path(rejection) => Status(rejection.status(), rejection.body_text()),
            ApiError::Query(rejection) => Status(rejection.status(), rejection.body_text()),
            ApiError::BadRequest(message) => Status(StatusCode::BAD_REQUEST, message.clone()),
            ApiError::Unauthorized(message) => {
                Status(StatusCode::UNAUTHORIZED, message.to_string())
            }
            ApiError::Forbidden(message) => Status(StatusCode::FORBIDDEN, message.to_string()),
            ApiError::NotFound(message) => Status(StatusCode::NOT_FOUND, message.clone()),
        }
    }
}

fn auth_failure(e: &AuthError) -> Failure<'_> {
    match e {
        AuthError::Database(db) => Failure::Database(db),
        AuthError::Validation(errors) => Failure::Invalid(errors),
        AuthError::InvalidCredentials | AuthError::Unauthenticated => {
            Failure::Status(StatusCode::UNAUTHORIZED, e.to_string())
        }
        AuthError::PasswordHash(_) => {
            Failure::Status(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

fn storage_failure(e: &LogoStorageError) -> Failure<'_> {
    match e {
        LogoStorageError::Validation(errors) => Failure::Invalid(errors),
        LogoStorageError::Io(_) => Failure::Status(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self.classify() {
            Failure::Invalid(errors) => {
                let body = ApiResponse::<(), ValidationErrors>::error_with_data(
                    "The given data was invalid.",
                    errors.clone(),
                );
                (StatusCode::UNPROCESSABLE_ENTITY, Json(body)).into_response()
            }
            Failure::Database(sqlx::Error::RowNotFound) => (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::<()>::error("Resource not found")),
            )
                .into_response(),
            Failure::Database(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                tracing::warn!(error = %db, "Unique constraint violated");
                (
                    StatusCode::CONFLICT,
                    Json(ApiResponse::<()>::error("Resource already exists")),
                )
                    .into_response()
            }
            Failure::Database(e) => {
                tracing::error!(error = %e, "Database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ApiResponse::<()>::error("Internal server error")),
                )
                    .into_response()
            }
            Failure::Status(status, message) => {
                if status.is_server_error() {
                    tracing::error!(error = %message, "Request failed");
                }
                (status, Json(ApiResponse::<()>::error(&message))).into_response()
            }
        }
    }
}
