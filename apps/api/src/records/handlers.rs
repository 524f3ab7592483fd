//! Axum route handlers for the persistence endpoints.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::llm_client::Role;
use crate::models::analysis::AnalysisWithCertificate;
use crate::models::certificate::{CertificateRow, CertificateWithAnalyses};
use crate::models::chat::{ChatMessageRow, ChatSessionRow, ChatSessionWithMessages};
use crate::records::queries::{self, NewAnalysis, NewCertificate};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserQuery {
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateQuery {
    pub certificate_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionQuery {
    pub certificate_id: Option<String>,
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendMessageRequest {
    pub certificate_id: Option<Uuid>,
    #[serde(default)]
    pub user_id: String,
    pub role: Role,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct AppendMessageResponse {
    pub session: ChatSessionRow,
    pub message: ChatMessageRow,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/certificates
pub async fn handle_create_certificate(
    State(state): State<AppState>,
    request: Result<Json<NewCertificate>, JsonRejection>,
) -> Result<Json<CertificateRow>, AppError> {
    let Json(request) = request?;
    if request.user_id.trim().is_empty() || request.certificate_number.trim().is_empty() {
        return Err(AppError::Validation(
            "userId and certificateNumber are required".to_string(),
        ));
    }

    let certificate = queries::insert_certificate(state.db()?, &request).await?;
    info!("Stored certificate {} for user {}", certificate.id, certificate.user_id);
    Ok(Json(certificate))
}

/// GET /api/certificates?userId=
pub async fn handle_list_certificates(
    State(state): State<AppState>,
    query: Result<Query<UserQuery>, QueryRejection>,
) -> Result<Json<Vec<CertificateWithAnalyses>>, AppError> {
    let Query(query) = query?;
    let user_id = required(query.user_id, "User ID is required")?;
    let certificates = queries::certificates_for_user(state.db()?, &user_id).await?;
    Ok(Json(certificates))
}

/// POST /api/analyses
pub async fn handle_create_analysis(
    State(state): State<AppState>,
    request: Result<Json<NewAnalysis>, JsonRejection>,
) -> Result<Json<AnalysisWithCertificate>, AppError> {
    let Json(request) = request?;
    if request.certificate_id.is_none() || request.user_id.trim().is_empty() {
        return Err(AppError::Validation(
            "certificateId and userId are required".to_string(),
        ));
    }

    let analysis = queries::insert_analysis(state.db()?, &request)
        .await
        .map_err(missing_certificate)?;
    Ok(Json(analysis))
}

/// GET /api/analyses?certificateId=
///
/// Latest analysis for the certificate, 404 if there is none.
pub async fn handle_latest_analysis(
    State(state): State<AppState>,
    query: Result<Query<CertificateQuery>, QueryRejection>,
) -> Result<Json<AnalysisWithCertificate>, AppError> {
    let Query(query) = query?;
    let certificate_id = parse_id(required(
        query.certificate_id,
        "Certificate ID is required",
    )?)?;

    queries::latest_analysis(state.db()?, certificate_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Analysis not found".to_string()))
}

/// POST /api/chat-sessions/messages
///
/// Appends one message to the (certificate, user) session, creating it first if needed.
pub async fn handle_append_message(
    State(state): State<AppState>,
    request: Result<Json<AppendMessageRequest>, JsonRejection>,
) -> Result<Json<AppendMessageResponse>, AppError> {
    let Json(request) = request?;
    let certificate_id = match request.certificate_id {
        Some(id) if !request.user_id.trim().is_empty() => id,
        _ => {
            return Err(AppError::Validation(
                "certificateId and userId are required".to_string(),
            ))
        }
    };
    if request.content.trim().is_empty() {
        return Err(AppError::Validation("Message content is required".to_string()));
    }

    let pool = state.db()?;
    let session = queries::find_or_create_session(pool, certificate_id, &request.user_id)
        .await
        .map_err(missing_certificate)?;
    let message =
        queries::append_message(pool, session.id, request.role, &request.content).await?;

    Ok(Json(AppendMessageResponse { session, message }))
}

/// GET /api/chat-sessions?certificateId=&userId=
pub async fn handle_get_session(
    State(state): State<AppState>,
    query: Result<Query<SessionQuery>, QueryRejection>,
) -> Result<Json<ChatSessionWithMessages>, AppError> {
    let Query(query) = query?;
    let certificate_id = parse_id(required(
        query.certificate_id,
        "Certificate ID is required",
    )?)?;
    let user_id = required(query.user_id, "User ID is required")?;

    queries::session_with_messages(state.db()?, certificate_id, &user_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Chat session not found".to_string()))
}

fn required(value: Option<String>, message: &str) -> Result<String, AppError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::Validation(message.to_string()))
}

/// A foreign key violation on insert means the referenced certificate is gone.
fn missing_certificate(err: sqlx::Error) -> AppError {
    match err {
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
            AppError::NotFound("Certificate not found".to_string())
        }
        other => AppError::Database(other),
    }
}

fn parse_id(raw: String) -> Result<Uuid, AppError> {
    Uuid::parse_str(&raw)
        .map_err(|_| AppError::Validation(format!("Invalid certificate ID: {raw}")))
}
