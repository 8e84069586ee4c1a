use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json as ResponseJson, Response},
    routing::get,
};
use services::services::database_validator::{DatabaseValidator, SchemaReport};
use utils::response::ApiResponse;

use crate::{AppState, error::ApiError};

pub async fn health(State(state): State<AppState>) -> Result<Response, ApiError> {
    let report = DatabaseValidator::new(state.db().pool.clone())
        .report()
        .await?;

    if report.is_ok() {
        let message = report.summary();
        let body = ApiResponse::<SchemaReport>::success_with_message(report, message);
        Ok(ResponseJson(body).into_response())
    } else {
        let body = ApiResponse::<(), SchemaReport>::error_with_data(&report.summary(), report);
        Ok((StatusCode::SERVICE_UNAVAILABLE, ResponseJson(body)).into_response())
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
