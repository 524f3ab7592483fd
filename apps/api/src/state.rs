use std::sync::Arc;

use sqlx::PgPool;

use crate::certificate::extractor::SpecExtractor;
use crate::certificate::ingest::TextExtractor;
use crate::config::Config;
use crate::errors::AppError;
use crate::llm_client::ChatCompletions;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// `None` when `DATABASE_URL` is unset; persistence endpoints then answer 503.
    pub db: Option<PgPool>,
    /// Chat-completion backend. `LlmClient` in production, a fake in tests.
    pub llm: Arc<dyn ChatCompletions>,
    /// PDF → text. Default: `PdfTextExtractor`.
    pub pdf: Arc<dyn TextExtractor>,
    /// Compiled once at startup.
    pub spec_extractor: Arc<SpecExtractor>,
    pub config: Config,
}

impl AppState {
    pub fn db(&self) -> Result<&PgPool, AppError> {
        self.db.as_ref().ok_or(AppError::PersistenceDisabled)
    }
}
