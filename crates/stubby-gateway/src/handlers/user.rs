use crate::error::Result;
use crate::model::UserUrlResponse;
use crate::principal::CurrentUser;
use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use stubby_core::{CoreError, ShortCode};
use stubby_deleter::DeleteRequest;
use tracing::debug;

pub async fn user_urls_handler(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
) -> Result<Response> {
    let urls = state
        .bounded(state.store().get_user_urls(&principal))
        .await?;
    if urls.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    let body: Vec<UserUrlResponse> = urls
        .into_iter()
        .map(|url| UserUrlResponse {
            short_url: state.short_url(&url.short_url),
            original_url: url.original_url,
        })
        .collect();
    Ok(Json(body).into_response())
}

/// Accepts a JSON array of short codes and queues them for deletion.
pub async fn delete_user_urls_handler(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    Json(codes): Json<Vec<String>>,
) -> Result<StatusCode> {
    let codes = codes
        .into_iter()
        .map(ShortCode::new)
        .collect::<std::result::Result<Vec<_>, CoreError>>()?;

    debug!(principal = %principal, count = codes.len(), "queueing delete batch");
    state
        .deletes()
        .try_enqueue(DeleteRequest::new(principal, codes))?;
    Ok(StatusCode::ACCEPTED)
}
