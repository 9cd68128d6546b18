use axum::Json;
use axum::response::{IntoResponse, Response};
use http::StatusCode;
use log::{error, warn};
use serde_json::json;
use thiserror::Error;

/// Errors surfaced by the store, the aggregation engine and the HTTP layer.
#[derive(Debug, Error)]
pub enum Error {
    /// Unknown or inactive entity id
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed time window or day count
    #[error("invalid range: {0}")]
    InvalidRange(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("missing or invalid bearer token")]
    Unauthorized,

    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Unique constraint violated
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(diesel::result::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::InvalidRange(_) | Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::Unauthorized => StatusCode::UNAUTHORIZED,
            Error::Forbidden(_) => StatusCode::FORBIDDEN,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::Database(_) | Error::Pool(_) | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Error::NotFound(_) => "NOT_FOUND",
            Error::InvalidRange(_) => "INVALID_RANGE",
            Error::Validation(_) => "VALIDATION_ERROR",
            Error::Unauthorized => "UNAUTHORIZED",
            Error::Forbidden(_) => "FORBIDDEN",
            Error::Conflict(_) => "CONFLICT",
            Error::Database(_) => "DATABASE_ERROR",
            Error::Pool(_) => "POOL_ERROR",
            Error::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<diesel::result::Error> for Error {
    fn from(value: diesel::result::Error) -> Self {
        use diesel::result::{DatabaseErrorKind, Error as DieselError};

        match value {
            DieselError::NotFound => Error::NotFound("record".to_string()),
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                Error::Conflict(info.message().to_string())
            }
            DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, info) => {
                Error::Validation(info.message().to_string())
            }
            DieselError::DatabaseError(DatabaseErrorKind::CheckViolation, info) => {
                Error::Validation(info.message().to_string())
            }
            other => Error::Database(other),
        }
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(value: validator::ValidationErrors) -> Self {
        Error::Validation(value.to_string())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();
        let message = self.to_string();

        if status.is_server_error() {
            error!("request failed ({code}): {message}");
        } else {
            warn!("request rejected ({code}): {message}");
        }

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message,
                "status": status.as_u16(),
            }
        }));
        (status, body).into_response()
    }
}
