use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{error, warn};

use crate::error::RepoError;

/// Error type returned by every handler. Renders as
/// `{"success": false, "message": ...}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Repo(#[from] RepoError),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Attached to 5xx responses as an extension. Only a development build
/// copies `stack` into the body, see [`crate::app`].
#[derive(Debug, Clone)]
pub struct ErrorDetail {
    pub message: String,
    pub stack: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Repo(repo) => match repo {
                RepoError::Connection(_) => StatusCode::SERVICE_UNAVAILABLE,
                RepoError::DuplicateKey { .. } => StatusCode::CONFLICT,
                RepoError::NoFields
                | RepoError::UnknownField(_)
                | RepoError::InvalidField { .. } => StatusCode::BAD_REQUEST,
                RepoError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show a client. Server-side failures are logged in full
    /// and replaced by a generic text.
    fn public_message(&self) -> String {
        match self {
            ApiError::Repo(RepoError::DuplicateKey { .. }) => {
                "A user with this email already exists".into()
            }
            ApiError::Repo(RepoError::Connection(e)) => {
                error!(error = %e, "database unavailable");
                "Service temporarily unavailable".into()
            }
            ApiError::Repo(RepoError::Database(e)) => {
                error!(error = %e, "database error");
                "Internal Server Error".into()
            }
            ApiError::Internal(e) => {
                error!(error = ?e, "internal error");
                "Internal Server Error".into()
            }
            other => other.to_string(),
        }
    }

    fn detail(&self) -> String {
        match self {
            ApiError::Internal(e) => format!("{e:#}"),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_client_error() {
            warn!(%status, error = %self, "request rejected");
        }
        let message = self.public_message();
        let body = Json(json!({
            "success": false,
            "message": message,
        }));
        let mut res = (status, body).into_response();
        if status.is_server_error() {
            res.extensions_mut().insert(ErrorDetail {
                message,
                stack: self.detail(),
            });
        }
        res
    }
}
