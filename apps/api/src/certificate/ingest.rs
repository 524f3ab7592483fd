//! Certificate ingestion: multipart upload → validated PDF bytes → raw text.

use async_trait::async_trait;
use axum::extract::Multipart;
use bytes::Bytes;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::errors::AppError;

const PDF_MIME: &str = "application/pdf";
const UPLOAD_FIELD: &str = "file";
const PREVIEW_CHARS: usize = 500;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("PDF parse error: {0}")]
    Pdf(String),

    #[error("Extraction task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Turns document bytes into plain text. Carried in `AppState` as
/// `Arc<dyn TextExtractor>`.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract_text(&self, bytes: Bytes) -> Result<String, ExtractError>;
}

/// `pdf-extract` backed extractor. Parsing is CPU-bound, so it runs inside
/// `tokio::task::spawn_blocking`.
pub struct PdfTextExtractor;

#[async_trait]
impl TextExtractor for PdfTextExtractor {
    async fn extract_text(&self, bytes: Bytes) -> Result<String, ExtractError> {
        tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
            .await?
            .map_err(|e| ExtractError::Pdf(e.to_string()))
    }
}

/// A PDF accepted from the `file` multipart field.
#[derive(Debug)]
pub struct CertificateUpload {
    pub file_name: Option<String>,
    pub bytes: Bytes,
}

/// Text extracted from an uploaded certificate. Never empty.
#[derive(Debug, Clone)]
pub struct CertificateText(String);

impl CertificateText {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Length in characters.
    pub fn length(&self) -> usize {
        self.0.chars().count()
    }

    /// First 500 characters, for diagnostics and error envelopes.
    pub fn preview(&self) -> String {
        self.0.chars().take(PREVIEW_CHARS).collect()
    }
}

/// Reads the `file` field from a multipart body and checks it is a PDF.
/// Other fields are skipped.
pub async fn read_pdf_upload(multipart: &mut Multipart) -> Result<CertificateUpload, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {e}")))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().unwrap_or("").to_string();
        if !is_pdf(&content_type) {
            warn!("Rejected upload {file_name:?} with content type '{content_type}'");
            return Err(AppError::Validation("Please upload a PDF file".to_string()));
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Failed to read uploaded file: {e}")))?;
        if bytes.is_empty() {
            return Err(AppError::Validation("No file provided".to_string()));
        }

        info!("Processing file {:?} ({} bytes)", file_name, bytes.len());
        return Ok(CertificateUpload { file_name, bytes });
    }

    Err(AppError::Validation("No file provided".to_string()))
}

/// Runs the extractor and rejects uploads without usable text.
pub async fn extract_certificate_text(
    extractor: &dyn TextExtractor,
    upload: CertificateUpload,
) -> Result<CertificateText, AppError> {
    let text = extractor.extract_text(upload.bytes).await.map_err(|e| {
        warn!("Error parsing PDF {:?}: {e}", upload.file_name);
        AppError::Extraction(
            "Failed to parse the PDF file. Please ensure it is a valid PDF.".to_string(),
        )
    })?;

    if text.trim().is_empty() {
        warn!("Extracted text is empty for {:?}", upload.file_name);
        return Err(AppError::Extraction(
            "Could not extract text from the PDF. Please ensure it is a valid certificate."
                .to_string(),
        ));
    }

    let text = CertificateText(text);
    debug!("Extracted {} characters from PDF", text.length());
    Ok(text)
}

fn is_pdf(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(|mime| mime.trim().eq_ignore_ascii_case(PDF_MIME))
        .unwrap_or(false)
}
