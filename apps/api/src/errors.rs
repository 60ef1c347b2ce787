#![allow(dead_code)]

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::analysis::AnalysisError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Status code for each terminal analysis error kind. Callers always receive
/// the kind and a human-readable cause; no partial result is ever returned.
fn analysis_status(error: &AnalysisError) -> StatusCode {
    match error {
        AnalysisError::DocumentParse(_) => StatusCode::UNPROCESSABLE_ENTITY,
        AnalysisError::UnknownPromptVersion(_) | AnalysisError::InvalidFramework(_) => {
            StatusCode::BAD_REQUEST
        }
        AnalysisError::Selection(_) => StatusCode::SERVICE_UNAVAILABLE,
        AnalysisError::ProvidersExhausted { .. } => StatusCode::BAD_GATEWAY,
        AnalysisError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND".to_string(), msg.clone())
            }
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR".to_string(),
                msg.clone(),
            ),
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR".to_string(),
                    "A database error occurred".to_string(),
                )
            }
            AppError::Analysis(e) => (analysis_status(e), e.kind().to_uppercase(), e.to_string()),
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR".to_string(),
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::DocumentParseError;
    use crate::providers::SelectionError;

    #[test]
    fn test_document_parse_maps_to_422() {
        let err = AnalysisError::DocumentParse(DocumentParseError::TooShort { chars: 3 });
        assert_eq!(analysis_status(&err), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_configuration_errors_map_to_503() {
        let err = AnalysisError::Selection(SelectionError::NoProviderConfigured);
        assert_eq!(analysis_status(&err), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_timeout_maps_to_504() {
        let err = AnalysisError::Timeout { elapsed_ms: 1000 };
        assert_eq!(analysis_status(&err), StatusCode::GATEWAY_TIMEOUT);
    }
}
