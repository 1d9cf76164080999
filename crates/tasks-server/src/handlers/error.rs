//! Domain errors as HTTP responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tasks_core::Error;

const INTERNAL_ERROR_MESSAGE: &str = "Something went wrong with your request. Please try again later.";

/// Rejection of a task request, rendered as a plain-text body
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    Core(Error),
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError::Core(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message).into_response(),
            ApiError::Core(e) if e.is_client_error() => (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
            ApiError::Core(e) if e.is_not_found() => (StatusCode::NOT_FOUND, e.to_string()).into_response(),
            ApiError::Core(e) => {
                tracing::error!("Request failed: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_MESSAGE).into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(e: Error) -> StatusCode {
        ApiError::from(e).into_response().status()
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status(Error::InvalidParameter("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status(Error::EntityAlreadyExists("Task".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status(Error::EntityNotFound("gone".into())), StatusCode::NOT_FOUND);
        assert_eq!(status(Error::Serialization("bad".into())), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(status(Error::InvalidRangeSize(0)), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            ApiError::NotFound("Task 1 not found".into()).into_response().status(),
            StatusCode::NOT_FOUND
        );
    }
}
