use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Failures of the login / refresh / logout flows.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown email or wrong password. The two causes are deliberately
    /// indistinguishable.
    #[error("Неверные учетные данные")]
    InvalidCredentials,

    /// No active session, or the presented refresh token is not the one
    /// currently stored.
    #[error("Доступ запрещен")]
    Unauthorized,

    /// Bad signature, malformed payload, wrong kind or expired.
    #[error("Доступ запрещен")]
    InvalidToken,

    #[error("Пользователь с таким email уже существует")]
    EmailTaken,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Внутренняя ошибка сервера")]
    Internal(#[source] anyhow::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Auth(AuthError::InvalidCredentials)
            | Self::Auth(AuthError::Unauthorized)
            | Self::Auth(AuthError::InvalidToken) => StatusCode::UNAUTHORIZED,
            Self::Auth(AuthError::EmailTaken) => StatusCode::CONFLICT,
            Self::Auth(AuthError::Internal(_)) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    fn public_message(&self) -> String {
        match self {
            Self::Auth(AuthError::Internal(_)) | Self::Internal(_) => {
                "Внутренняя ошибка сервера".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(e: anyhow::Error) -> Self {
        Self::Internal(e)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        Self::Internal(e.into())
    }
}

impl From<JsonRejection> for AppError {
    fn from(e: JsonRejection) -> Self {
        Self::Validation(e.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(e: QueryRejection) -> Self {
        Self::Validation(e.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(e: PathRejection) -> Self {
        Self::Validation(e.body_text())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub status_code: u16,
    pub message: String,
    pub error: &'static str,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = ?self, "request failed");
        }
        let body = ErrorBody {
            status_code: status.as_u16(),
            message: self.public_message(),
            error: status.canonical_reason().unwrap_or("Error"),
        };
        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_errors_map_to_401() {
        for e in [
            AuthError::InvalidCredentials,
            AuthError::Unauthorized,
            AuthError::InvalidToken,
        ] {
            assert_eq!(AppError::from(e).status_code(), StatusCode::UNAUTHORIZED);
        }
    }

    #[test]
    fn session_failures_share_a_message() {
        assert_eq!(AuthError::Unauthorized.to_string(), "Доступ запрещен");
        assert_eq!(AuthError::InvalidToken.to_string(), "Доступ запрещен");
    }

    #[test]
    fn other_statuses() {
        assert_eq!(
            AppError::from(AuthError::EmailTaken).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::validation("bad").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::not_found("gone").status_code(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn internal_cause_is_not_exposed() {
        let err = AppError::from(AuthError::Internal(anyhow::anyhow!("db password is hunter2")));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.public_message().contains("hunter2"));
    }
}
