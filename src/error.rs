use axum::extract::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use std::fmt::Debug;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("unauthorized")]
    Unauthorized,

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("{reason}")]
    RateLimited {
        reason: String,
        remaining: u32,
        daily_limit: u32,
    },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("authorization policy error: {0}")]
    Policy(#[from] oso::OsoError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl Error {
    /// Client-facing codes start at 100; anything below is an internal failure.
    pub fn code(&self) -> i32 {
        match self {
            Self::Config(_) => 1,
            Self::Database(_) => 2,
            Self::Policy(_) => 3,
            Self::Unexpected(_) => 5,
            Self::InvalidState(_) => 100,
            Self::Validation(_) => 101,
            Self::Unauthorized => 102,
            Self::NotFound(_) => 103,
            Self::Conflict(_) => 104,
            Self::RateLimited { .. } => 105,
        }
    }

    pub fn is_invalid_state(&self) -> bool {
        matches!(self, Self::InvalidState(_))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::InvalidState(_) | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = match &self {
            Self::RateLimited {
                reason,
                remaining,
                daily_limit,
            } => json!({
                "code": self.code(),
                "error": reason,
                "remaining": remaining,
                "daily_limit": daily_limit,
            }),
            _ if status.is_server_error() => json!({
                "code": self.code(),
                "error": "Internal Server Error",
            }),
            _ => json!({
                "code": self.code(),
                "error": self.to_string(),
            }),
        };

        (status, Json(body)).into_response()
    }
}

pub fn invalid_state_error(message: impl Into<String>) -> Error {
    Error::InvalidState(message.into())
}

pub fn invalid_input_error(message: impl Into<String>) -> Error {
    Error::Validation(message.into())
}

pub fn conflict_error(message: impl Into<String>) -> Error {
    Error::Conflict(message.into())
}

pub fn unexpected_error<T: Debug>(err: T) -> Error {
    Error::Unexpected(format!("{:?}", err))
}

#[test]
fn error_codes_split_internal_and_client_failures() {
    assert!(Error::Config("x".into()).code() < 100);
    assert!(Error::Unexpected("x".into()).code() < 100);
    assert!(Error::Conflict("x".into()).code() >= 100);
    assert!(Error::RateLimited {
        reason: "limit".into(),
        remaining: 0,
        daily_limit: 2
    }
    .code()
        >= 100);
}

#[test]
fn error_statuses() {
    assert_eq!(Error::Unauthorized.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        Error::Conflict("booking already confirmed".into()).status(),
        StatusCode::CONFLICT
    );
    assert_eq!(
        Error::NotFound("booking").into_response().status(),
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        Error::Unexpected("boom".into()).into_response().status(),
        StatusCode::INTERNAL_SERVER_ERROR
    );
}
