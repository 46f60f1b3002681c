use crate::dtos::StatusResponse;
use axum::Json;

/// `GET /status`: fixed availability payload, independent of the upstream.
pub async fn status() -> Json<StatusResponse> {
    Json(StatusResponse::current())
}
