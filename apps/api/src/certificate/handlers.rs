//! Axum route handlers for certificate upload and analysis.

use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    response::Response,
    Json,
};
use serde::Serialize;
use tracing::{error, info};

use crate::certificate::analysis::{analyze_structured, stream_narrative, AnalysisReport};
use crate::certificate::ingest::{extract_certificate_text, read_pdf_upload, CertificateText};
use crate::certificate::specs::CertificateSpecs;
use crate::chat::relay::event_stream_response;
use crate::errors::{AppError, MISSING_API_KEY_MESSAGE};
use crate::llm_client::LlmError;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResponse {
    pub message: String,
    pub analysis: AnalysisReport,
    pub specifications: CertificateSpecs,
    /// Full extracted text; the chat flow sends it back with every question.
    pub certificate_text: String,
    pub text_length: usize,
    pub text_preview: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedTextResponse {
    pub message: String,
    pub text_length: usize,
    pub text_preview: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/analyze
///
/// Multipart upload (`file`) → extracted text → structured LLM analysis.
/// Specifications the model leaves out are filled by the regex extractor.
pub async fn handle_analyze(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<AnalyzeResponse>, AppError> {
    let text = upload_text(&state, &mut multipart?).await?;

    let result = analyze_structured(state.llm.as_ref(), &state.spec_extractor, text.as_str())
        .await
        .map_err(|e| analysis_failure(e, &text))?;

    info!(
        "Analysis complete for certificate '{}'",
        result.specifications.certificate_number
    );

    Ok(Json(AnalyzeResponse {
        message: "Certificate analyzed successfully".to_string(),
        analysis: result.analysis,
        specifications: result.specifications,
        text_length: text.length(),
        text_preview: text.preview(),
        certificate_text: text.into_string(),
    }))
}

/// POST /api/analyze/text
///
/// Diagnostic mode: extraction only, no LLM call.
pub async fn handle_extract_text(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ExtractedTextResponse>, AppError> {
    let text = upload_text(&state, &mut multipart?).await?;

    Ok(Json(ExtractedTextResponse {
        message: "Text extracted successfully".to_string(),
        text_length: text.length(),
        text_preview: text.preview(),
    }))
}

/// POST /api/analyze/narrative
///
/// Streams the sectioned plain-language analysis as `text/event-stream`.
pub async fn handle_analyze_narrative(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, AppError> {
    let text = upload_text(&state, &mut multipart?).await?;

    let stream = stream_narrative(state.llm.as_ref(), text.as_str())
        .await
        .map_err(|e| analysis_failure(e, &text))?;

    Ok(event_stream_response(stream))
}

async fn upload_text(
    state: &AppState,
    multipart: &mut Multipart,
) -> Result<CertificateText, AppError> {
    let upload = read_pdf_upload(multipart).await?;
    extract_certificate_text(state.pdf.as_ref(), upload).await
}

/// Upstream failures after extraction keep the preview in the error body.
fn analysis_failure(err: LlmError, text: &CertificateText) -> AppError {
    let message = match &err {
        LlmError::MissingApiKey => {
            return AppError::Configuration(MISSING_API_KEY_MESSAGE.to_string());
        }
        LlmError::Parse(_) | LlmError::EmptyContent => "Failed to parse AI analysis. Please try again.",
        LlmError::Http(_) | LlmError::Api { .. } => {
            "Failed to analyze the certificate with AI. Please try again later."
        }
    };
    error!("Certificate analysis failed: {err}");

    AppError::AnalysisFailed {
        message: message.to_string(),
        text_length: text.length(),
        text_preview: text.preview(),
    }
}
