// src/error.rs
use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

/// Request-level failure taxonomy. Row-level ingestion problems never become
/// a `CrmError`; they are collected on the execution instead.
#[derive(Debug, thiserror::Error)]
pub enum CrmError {
    #[error("{0}")]
    Validation(String),
    /// Missing credentials or bearer token.
    #[error("{0}")]
    Unauthenticated(String),
    /// Credentials or token were presented but rejected.
    #[error("{0}")]
    InvalidCredentials(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("upstream failure: {0}")]
    Upstream(String),
    #[error("store error: {0}")]
    Store(#[source] anyhow::Error),
}

pub type CrmResult<T> = Result<T, CrmError>;

impl CrmError {
    pub fn status(&self) -> StatusCode {
        match self {
            CrmError::Validation(_) => StatusCode::BAD_REQUEST,
            CrmError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            CrmError::InvalidCredentials(_) | CrmError::Forbidden(_) => StatusCode::FORBIDDEN,
            CrmError::NotFound(_) => StatusCode::NOT_FOUND,
            CrmError::Conflict(_) => StatusCode::CONFLICT,
            CrmError::Upstream(_) => StatusCode::BAD_GATEWAY,
            CrmError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn lead_not_found() -> Self {
        CrmError::NotFound("Lead not found".into())
    }
}

impl From<anyhow::Error> for CrmError {
    fn from(e: anyhow::Error) -> Self {
        CrmError::Store(e)
    }
}

// Extractor rejections become validation errors so every error body stays JSON.
impl From<JsonRejection> for CrmError {
    fn from(rejection: JsonRejection) -> Self {
        CrmError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for CrmError {
    fn from(rejection: QueryRejection) -> Self {
        CrmError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for CrmError {
    fn from(rejection: PathRejection) -> Self {
        CrmError::Validation(rejection.body_text())
    }
}

impl IntoResponse for CrmError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(target: "api", error = ?self, "request failed");
        } else {
            tracing::debug!(target: "api", %status, error = %self, "request rejected");
        }
        let body = serde_json::json!({ "error": self.to_string() });
        (status, Json(body)).into_response()
    }
}
