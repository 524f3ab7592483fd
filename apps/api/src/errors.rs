use axum::{
    extract::{
        multipart::MultipartRejection,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

use crate::llm_client::LlmError;

pub const MISSING_API_KEY_MESSAGE: &str =
    "OpenAI API key is not configured. Please set the OPENAI_API_KEY environment variable.";

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
///
/// Every variant renders as `{ "error": string, "details"?: string }`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    /// The upload was accepted but no usable text came out of it.
    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Upstream error: {message}")]
    Upstream {
        message: String,
        details: Option<String>,
    },

    /// Upstream failure after the certificate text was extracted; carries the preview
    /// so the caller can still show what was read.
    #[error("Analysis failed: {message}")]
    AnalysisFailed {
        message: String,
        text_length: usize,
        text_preview: String,
    },

    #[error("Persistence is not configured")]
    PersistenceDisabled,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Maps an upstream failure to a response, keeping the configuration case distinct.
    pub fn from_llm(message: &str, err: LlmError) -> Self {
        match err {
            LlmError::MissingApiKey => AppError::Configuration(MISSING_API_KEY_MESSAGE.to_string()),
            other => AppError::Upstream {
                message: message.to_string(),
                details: Some(other.to_string()),
            },
        }
    }
}

impl From<LlmError> for AppError {
    fn from(err: LlmError) -> Self {
        AppError::from_llm("Failed to get response from AI", err)
    }
}

// Extractor rejections render through the same envelope as handler errors.

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<MultipartRejection> for AppError {
    fn from(rejection: MultipartRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body): (StatusCode, Value) = match self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            AppError::Extraction(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            AppError::Configuration(msg) => {
                tracing::error!("Configuration error: {msg}");
                (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": msg }))
            }
            AppError::Upstream { message, details } => {
                tracing::error!("Upstream error: {message} ({details:?})");
                let mut body = json!({ "error": message });
                if let Some(details) = details {
                    body["details"] = Value::String(details);
                }
                (StatusCode::INTERNAL_SERVER_ERROR, body)
            }
            AppError::AnalysisFailed {
                message,
                text_length,
                text_preview,
            } => {
                tracing::error!("Analysis failed: {message}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({
                        "error": message,
                        "textLength": text_length,
                        "textPreview": text_preview,
                    }),
                )
            }
            AppError::PersistenceDisabled => (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({
                    "error": "Persistence is not configured",
                    "details": "Set DATABASE_URL to enable certificate and chat storage",
                }),
            ),
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "A database error occurred" }),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "An internal server error occurred" }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(err: AppError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_validation_is_bad_request_with_envelope() {
        let (status, body) = body_json(AppError::Validation("Missing required fields".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing required fields");
        assert!(body.get("details").is_none());
    }

    #[tokio::test]
    async fn test_missing_api_key_maps_to_configuration_500() {
        let (status, body) = body_json(AppError::from(LlmError::MissingApiKey)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().contains("OPENAI_API_KEY"));
    }

    #[tokio::test]
    async fn test_upstream_error_carries_details() {
        let err = AppError::from_llm(
            "Failed to get response from AI",
            LlmError::Api {
                status: 502,
                message: "bad gateway".into(),
            },
        );
        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Failed to get response from AI");
        assert!(body["details"].as_str().unwrap().contains("502"));
    }

    #[tokio::test]
    async fn test_analysis_failure_keeps_text_preview() {
        let (status, body) = body_json(AppError::AnalysisFailed {
            message: "Failed to parse AI analysis. Please try again.".into(),
            text_length: 42,
            text_preview: "GIA Report".into(),
        })
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["textLength"], 42);
        assert_eq!(body["textPreview"], "GIA Report");
    }

    #[tokio::test]
    async fn test_persistence_disabled_is_503() {
        let (status, _) = body_json(AppError::PersistenceDisabled).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
