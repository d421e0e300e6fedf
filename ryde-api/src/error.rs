use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use ryde_booking::BookingError;
use ryde_notify::NotifyError;
use serde_json::json;

#[derive(Debug)]
pub enum AppError {
    AuthenticationError(String),
    AuthorizationError(String),
    ValidationError(String),
    NotFoundError(String),
    ConflictError(String),
    ServiceUnavailable(String),
    InternalServerError(String),
    Anyhow(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::AuthenticationError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::AuthorizationError(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::ConflictError(msg) => (StatusCode::CONFLICT, msg),
            AppError::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        match err {
            BookingError::Validation(_) => AppError::ValidationError(err.to_string()),
            // the conflict message carries the blocking range
            BookingError::Conflict { .. } => AppError::ConflictError(err.to_string()),
            BookingError::InvalidTransition { .. } => AppError::ConflictError(err.to_string()),
            BookingError::PaymentPending => AppError::ConflictError(err.to_string()),
            BookingError::Authorization => AppError::AuthorizationError(err.to_string()),
            BookingError::NotFound(_) => AppError::NotFoundError(err.to_string()),
            BookingError::Busy => AppError::ServiceUnavailable(err.to_string()),
            BookingError::Persistence(msg) => AppError::InternalServerError(msg),
        }
    }
}

impl From<NotifyError> for AppError {
    fn from(err: NotifyError) -> Self {
        match err {
            NotifyError::Authorization => AppError::AuthorizationError(err.to_string()),
            NotifyError::NotFound(_) => AppError::NotFoundError(err.to_string()),
            NotifyError::UnknownEvent(_) => AppError::ValidationError(err.to_string()),
            NotifyError::Persistence(msg) => AppError::InternalServerError(msg),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Anyhow(err)
    }
}
