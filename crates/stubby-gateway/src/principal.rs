use crate::error::AppError;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use stubby_core::Principal;

/// Header carrying the caller's identity, set by the upstream authenticator.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Extracts the [`Principal`] for the current request.
///
/// A missing, blank or non-UTF-8 header is rejected with
/// [`CoreError::NoPrincipal`](stubby_core::CoreError::NoPrincipal).
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Principal);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        Ok(Self(Principal::new(id)?))
    }
}
