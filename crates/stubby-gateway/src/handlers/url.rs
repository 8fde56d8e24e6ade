use crate::error::{AppError, Result};
use crate::model::{BatchShortenItem, BatchShortenResult, ShortenRequest, ShortenResponse};
use crate::principal::CurrentUser;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use stubby_core::{NewUrl, ShortCode, StoreError};
use tracing::debug;

pub async fn redirect_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Redirect> {
    let code = ShortCode::new(id)?;
    let original_url = state.bounded(state.store().get_url(&code)).await?;
    debug!(code = %code, "redirecting");
    Ok(Redirect::temporary(&original_url))
}

/// Plain-text variant: the body is the URL, stored byte for byte, and the
/// response is the short URL.
pub async fn shorten_text_handler(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    body: String,
) -> Result<Response> {
    if body.trim().is_empty() {
        return Err(AppError::BadRequest("empty url".to_string()));
    }

    let (status, short_url) = shorten(&state, &principal, &body).await?;
    Ok((status, [(header::CONTENT_TYPE, "text/plain")], short_url).into_response())
}

pub async fn shorten_json_handler(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    Json(request): Json<ShortenRequest>,
) -> Result<Response> {
    if request.url.trim().is_empty() {
        return Err(AppError::BadRequest("empty url".to_string()));
    }

    let (status, result) = shorten(&state, &principal, &request.url).await?;
    Ok((status, Json(ShortenResponse { result })).into_response())
}

pub async fn batch_shorten_handler(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    Json(items): Json<Vec<BatchShortenItem>>,
) -> Result<Response> {
    if items.is_empty() {
        return Err(AppError::BadRequest("write at least one url".to_string()));
    }

    let urls: Vec<NewUrl> = items
        .iter()
        .map(|item| NewUrl::from_url(item.original_url.as_str()))
        .collect();
    state
        .bounded(state.store().add_url_batch(&principal, &urls))
        .await?;

    let results: Vec<BatchShortenResult> = items
        .into_iter()
        .zip(&urls)
        .map(|(item, url)| BatchShortenResult {
            correlation_id: item.correlation_id,
            short_url: state.short_url(&url.short_url),
        })
        .collect();
    debug!(principal = %principal, count = results.len(), "shortened url batch");
    Ok((StatusCode::CREATED, Json(results)).into_response())
}

/// Stores `original_url` for `principal`.
///
/// A conflict still yields the short URL, with `409 Conflict` instead of
/// `201 Created`.
async fn shorten(
    state: &AppState,
    principal: &stubby_core::Principal,
    original_url: &str,
) -> Result<(StatusCode, String)> {
    let code = ShortCode::from_url(original_url);
    let short_url = state.short_url(&code);

    match state
        .bounded(state.store().add_url(principal, original_url, &code))
        .await
    {
        Ok(()) => {
            debug!(code = %code, principal = %principal, "shortened url");
            Ok((StatusCode::CREATED, short_url))
        }
        Err(StoreError::Conflict(_)) => Ok((StatusCode::CONFLICT, short_url)),
        Err(err) => Err(err.into()),
    }
}
