use crate::dtos::{SearchParams, SearchRequest};
use crate::services::metrics::{record_search, record_upstream_latency};
use crate::startup::AppState;
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use service_core::error::AppError;
use service_core::middleware::tracing::RequestId;
use std::time::Instant;

/// `POST /search` with `{ "query": "..." }`.
#[tracing::instrument(skip_all, fields(request_id = %request_id.as_str()))]
pub async fn search_post(
    State(state): State<AppState>,
    request_id: RequestId,
    body: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(request) = body.map_err(|rejection| reject(&state, rejection.body_text()))?;
    forward(&state, &request, &request_id).await
}

/// `GET /search?q=...`, for manual checks from a browser.
#[tracing::instrument(skip_all, fields(request_id = %request_id.as_str()))]
pub async fn search_get(
    State(state): State<AppState>,
    request_id: RequestId,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Response, AppError> {
    let Query(params) = params.map_err(|rejection| reject(&state, rejection.body_text()))?;
    forward(&state, &SearchRequest::from(params), &request_id).await
}

/// Unreadable request: same error shape and metric as an invalid query.
fn reject(state: &AppState, reason: String) -> AppError {
    record_search(state.search.name(), "invalid");
    tracing::info!(error = %reason, "Rejected search request");
    AppError::BadRequest(anyhow::anyhow!(reason))
}

/// Validate, forward, relay. Invalid input never reaches the upstream.
async fn forward(
    state: &AppState,
    request: &SearchRequest,
    request_id: &RequestId,
) -> Result<Response, AppError> {
    let provider = state.search.name();

    let query = request.validated_query().map_err(|e| {
        record_search(provider, "invalid");
        tracing::info!(error = %e, "Rejected search request");
        e
    })?;

    let started = Instant::now();
    let result = state.search.search(query, Some(request_id.as_str())).await;
    record_upstream_latency(provider, started.elapsed());

    match result {
        Ok(payload) => {
            record_search(provider, "success");
            tracing::info!(
                provider,
                query_len = query.len(),
                body_len = payload.body.len(),
                "Search forwarded"
            );
            Ok((
                StatusCode::OK,
                [(header::CONTENT_TYPE, payload.content_type)],
                payload.body,
            )
                .into_response())
        }
        Err(e) => {
            record_search(provider, e.kind());
            tracing::error!(provider, error = %e, "Upstream search failed");
            Err(e.into())
        }
    }
}
