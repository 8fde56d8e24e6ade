use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use stubby_core::{CoreError, StoreError};
use stubby_deleter::DeleterError;
use thiserror::Error;
use tracing::error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Deleter(#[from] DeleterError),
    #[error("bad request: {0}")]
    BadRequest(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Core(CoreError::InvalidShortCode(_)) => StatusCode::BAD_REQUEST,
            AppError::Core(CoreError::NoPrincipal) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Store(StoreError::Conflict(_)) => StatusCode::CONFLICT,
            AppError::Store(StoreError::NotFound(_)) => StatusCode::BAD_REQUEST,
            AppError::Store(StoreError::Deleted(_)) => StatusCode::GONE,
            AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Deleter(DeleterError::QueueFull) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Deleter(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            // Details stay in the log; clients only see the status text.
            error!(error = %self, status = status.as_u16(), "request failed");
            let body = status.canonical_reason().unwrap_or("Internal Server Error");
            return (status, body).into_response();
        }
        (status, self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn store_errors_map_to_client_statuses() {
        let cases = [
            (StoreError::Conflict("a".into()), StatusCode::CONFLICT),
            (StoreError::NotFound("a".into()), StatusCode::BAD_REQUEST),
            (StoreError::Deleted("a".into()), StatusCode::GONE),
            (
                StoreError::DeadlineExceeded(Duration::from_millis(10)),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (StoreError::Closed, StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).status(), status);
        }
    }

    #[test]
    fn missing_principal_is_a_server_error() {
        assert_eq!(
            AppError::from(CoreError::NoPrincipal).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::from(CoreError::InvalidShortCode("x".into())).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn full_queue_is_unavailable() {
        assert_eq!(
            AppError::from(DeleterError::QueueFull).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AppError::from(DeleterError::Closed).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn server_errors_hide_backend_details() {
        let err = AppError::from(StoreError::Query(
            "relation \"urls\" does not exist".to_string(),
        ));

        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"Internal Server Error");
    }

    #[tokio::test]
    async fn client_errors_keep_their_message() {
        let response = AppError::from(CoreError::InvalidShortCode("bad".into())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"invalid short code: bad");
    }
}
