//! Error types and handling for the ABAP refactor function.
//!
//! Failures are carried internally as [`AppError`], a tagged error with an
//! [`ErrorKind`] and a message. They become plain-text HTTP responses only in
//! the [`IntoResponse`] implementation.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::services::CompletionError;

/// Coarse classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Required environment values are absent
    Configuration,
    /// Malformed or missing request payload
    Validation,
    /// Unsupported HTTP method
    Method,
    /// Upstream answered but returned no usable text
    UpstreamProtocol,
    /// Upstream call failed
    UpstreamTransport,
}

/// Main error type for the application.
#[derive(Error, Debug)]
pub enum AppError {
    /// Vertex AI coordinates are incomplete
    #[error("Environment variables not set correctly.")]
    Config,

    /// Method other than OPTIONS or POST
    #[error("Method Not Allowed")]
    MethodNotAllowed,

    /// Body absent or without `abapCode`
    #[error("Bad Request: Missing abapCode in request body")]
    MissingAbapCode,

    /// `abapCode` is not a string or is blank
    #[error("Bad Request: abapCode must be a non-empty string")]
    InvalidAbapCode,

    /// Body exceeds the configured read limit
    #[error("Bad Request: request body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },

    /// Completion result had no candidate text
    #[error("Error: No valid response from the model")]
    NoValidResponse,

    /// Completion call failed
    #[error("Error processing request: {0}")]
    Upstream(#[from] CompletionError),
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Config => ErrorKind::Configuration,
            AppError::MethodNotAllowed => ErrorKind::Method,
            AppError::MissingAbapCode
            | AppError::InvalidAbapCode
            | AppError::BodyTooLarge { .. } => ErrorKind::Validation,
            AppError::NoValidResponse => ErrorKind::UpstreamProtocol,
            AppError::Upstream(_) => ErrorKind::UpstreamTransport,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::Configuration
            | ErrorKind::UpstreamProtocol
            | ErrorKind::UpstreamTransport => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Method => StatusCode::METHOD_NOT_ALLOWED,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match self.kind() {
            ErrorKind::Validation | ErrorKind::Method => {
                tracing::warn!(status = status.as_u16(), "{}", self)
            }
            _ => tracing::error!(status = status.as_u16(), "{}", self),
        }

        (
            status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.to_string(),
        )
            .into_response()
    }
}

/// Convenience type alias for Results using [`AppError`].
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            AppError::Config.to_string(),
            "Environment variables not set correctly."
        );
        assert_eq!(AppError::MethodNotAllowed.to_string(), "Method Not Allowed");
        assert_eq!(
            AppError::MissingAbapCode.to_string(),
            "Bad Request: Missing abapCode in request body"
        );
        assert_eq!(
            AppError::InvalidAbapCode.to_string(),
            "Bad Request: abapCode must be a non-empty string"
        );
        assert_eq!(
            AppError::NoValidResponse.to_string(),
            "Error: No valid response from the model"
        );
        assert_eq!(
            AppError::BodyTooLarge { limit: 1024 }.to_string(),
            "Bad Request: request body exceeds 1024 bytes"
        );
    }

    #[test]
    fn test_upstream_display_includes_message() {
        let err = AppError::from(CompletionError::Other("quota exceeded".to_string()));
        assert_eq!(err.to_string(), "Error processing request: quota exceeded");
        assert_eq!(err.kind(), ErrorKind::UpstreamTransport);
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(AppError::Config.kind(), ErrorKind::Configuration);
        assert_eq!(AppError::MissingAbapCode.kind(), ErrorKind::Validation);
        assert_eq!(AppError::InvalidAbapCode.kind(), ErrorKind::Validation);
        assert_eq!(
            AppError::BodyTooLarge { limit: 1 }.kind(),
            ErrorKind::Validation
        );
        assert_eq!(AppError::NoValidResponse.kind(), ErrorKind::UpstreamProtocol);
        assert_eq!(AppError::MethodNotAllowed.kind(), ErrorKind::Method);
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::Config.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::MethodNotAllowed.into_response().status(),
            StatusCode::METHOD_NOT_ALLOWED
        );
        assert_eq!(
            AppError::MissingAbapCode.into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::NoValidResponse.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_response_is_plain_text() {
        let response = AppError::InvalidAbapCode.into_response();
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/plain; charset=utf-8"
        );
        assert_eq!(
            body_text(response).await,
            "Bad Request: abapCode must be a non-empty string"
        );
    }
}
