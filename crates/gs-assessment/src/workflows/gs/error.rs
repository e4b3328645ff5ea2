use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use super::assessment::Decision;
use super::domain::GsStage;
use super::repository::{ExternalServiceError, RepositoryError};

/// Error raised by the GS workflow managers.
#[derive(Debug, thiserror::Error)]
pub enum GsError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("{stage} stage cannot be completed: {reason}")]
    OutOfOrder { stage: GsStage, reason: String },
    #[error("invalid transition: {0}")]
    InvalidTransition(String),
    #[error("decision already finalized by {} at {}", .0.decided_by, .0.decided_at)]
    AlreadyFinalized(Box<Decision>),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("caller {caller} may not {action}")]
    Forbidden { caller: String, action: String },
    #[error(transparent)]
    ExternalService(#[from] ExternalServiceError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl GsError {
    pub const fn kind(&self) -> &'static str {
        match self {
            GsError::Validation(_) => "validation_error",
            GsError::OutOfOrder { .. } => "out_of_order",
            GsError::InvalidTransition(_) => "invalid_transition",
            GsError::AlreadyFinalized(_) => "already_finalized",
            GsError::NotFound(_) => "not_found",
            GsError::Forbidden { .. } => "forbidden",
            GsError::ExternalService(_) => "external_service_error",
            GsError::Repository(_) => "persistence_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            GsError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            GsError::OutOfOrder { .. }
            | GsError::InvalidTransition(_)
            | GsError::AlreadyFinalized(_) => StatusCode::CONFLICT,
            GsError::NotFound(_) | GsError::Repository(RepositoryError::NotFound) => {
                StatusCode::NOT_FOUND
            }
            GsError::Forbidden { .. } => StatusCode::FORBIDDEN,
            GsError::ExternalService(_) => StatusCode::BAD_GATEWAY,
            GsError::Repository(RepositoryError::VersionConflict)
            | GsError::Repository(RepositoryError::Unavailable(_)) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            GsError::Repository(RepositoryError::Conflict) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GsError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let mut body = json!({
            "error": self.kind(),
            "message": self.to_string(),
        });
        if let GsError::AlreadyFinalized(decision) = &self {
            body["decision"] = json!(decision);
        }
        (status, Json(body)).into_response()
    }
}
