//! Test doubles shared by the unit tests of several modules.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use serde_json::{json, Value};
use sqlx::PgPool;

use crate::certificate::extractor::SpecExtractor;
use crate::certificate::ingest::{ExtractError, TextExtractor};
use crate::config::Config;
use crate::db::create_pool;
use crate::llm_client::{ChatCompletions, CompletionRequest, CompletionStream, LlmError};
use crate::state::AppState;

pub const SAMPLE_CERTIFICATE_TEXT: &str = "\
GIA NATURAL DIAMOND GRADING REPORT
Date: November 14, 2023
GIA Report Number: 2141438171
Shape and Cutting Style: Round Brilliant
Measurements: 6.47 - 6.50 x 4.01 mm
GRADING RESULTS
Carat Weight: 1.01 carat
Color Grade: D
Clarity Grade: VS1
Cut Grade: EXCELLENT
ADDITIONAL GRADING INFORMATION
Polish: Excellent
Symmetry: Excellent
Fluorescence: None";

enum Behavior {
    Reply(String),
    Stream(Vec<String>),
    StreamThenFail(Vec<String>),
    MissingKey,
    ApiError(u16),
}

/// Scripted `ChatCompletions` that records every call.
pub struct FakeCompletions {
    behavior: Behavior,
    calls: AtomicUsize,
    last_request: Mutex<Option<CompletionRequest>>,
}

impl FakeCompletions {
    fn with(behavior: Behavior) -> Self {
        Self {
            behavior,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn replying(text: &str) -> Self {
        Self::with(Behavior::Reply(text.to_string()))
    }

    /// Streams the given raw body chunks verbatim.
    pub fn streaming(chunks: &[&str]) -> Self {
        Self::with(Behavior::Stream(chunks.iter().map(|c| c.to_string()).collect()))
    }

    /// Streams the chunks, then fails the body mid-stream.
    pub fn streaming_then_failing(chunks: &[&str]) -> Self {
        Self::with(Behavior::StreamThenFail(
            chunks.iter().map(|c| c.to_string()).collect(),
        ))
    }

    pub fn missing_key() -> Self {
        Self::with(Behavior::MissingKey)
    }

    pub fn api_error(status: u16) -> Self {
        Self::with(Behavior::ApiError(status))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.last_request.lock().unwrap().clone()
    }

    fn record(&self, request: &CompletionRequest) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());
    }

    fn scripted_error(&self) -> LlmError {
        match self.behavior {
            Behavior::MissingKey => LlmError::MissingApiKey,
            Behavior::ApiError(status) => LlmError::Api {
                status,
                message: "upstream unavailable".into(),
            },
            _ => LlmError::EmptyContent,
        }
    }
}

#[async_trait]
impl ChatCompletions for FakeCompletions {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        self.record(request);
        match &self.behavior {
            Behavior::Reply(text) => Ok(text.clone()),
            _ => Err(self.scripted_error()),
        }
    }

    async fn stream(&self, request: &CompletionRequest) -> Result<CompletionStream, LlmError> {
        self.record(request);
        match &self.behavior {
            Behavior::Stream(chunks) => {
                let items: Vec<Result<Bytes, LlmError>> =
                    chunks.iter().map(|c| Ok(Bytes::from(c.clone()))).collect();
                Ok(stream::iter(items).boxed())
            }
            Behavior::StreamThenFail(chunks) => {
                let mut items: Vec<Result<Bytes, LlmError>> =
                    chunks.iter().map(|c| Ok(Bytes::from(c.clone()))).collect();
                items.push(Err(LlmError::Api {
                    status: 502,
                    message: "connection reset".into(),
                }));
                Ok(stream::iter(items).boxed())
            }
            _ => Err(self.scripted_error()),
        }
    }
}

/// Extractor returning fixed text (or failing) regardless of the bytes.
pub struct FakeTextExtractor {
    text: Option<String>,
    calls: AtomicUsize,
}

impl FakeTextExtractor {
    pub fn returning(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            text: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextExtractor for FakeTextExtractor {
    async fn extract_text(&self, _bytes: Bytes) -> Result<String, ExtractError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.text
            .clone()
            .ok_or_else(|| ExtractError::Pdf("invalid xref table".into()))
    }
}

/// One upstream-style SSE line carrying `fragment`.
pub fn sse_chunk(fragment: &str) -> String {
    format!(
        "data: {}\n\n",
        json!({ "choices": [{ "index": 0, "delta": { "content": fragment } }] })
    )
}

pub const SSE_DONE: &str = "data: [DONE]\n\n";

/// A structured-mode reply with the given `specifications` value.
pub fn structured_reply(specifications: Value) -> String {
    json!({
        "specifications": specifications,
        "analysis": {
            "overview": "An exceptional, colorless round diamond.",
            "detailedAnalysis": {
                "cut": "Excellent cut, like a perfectly tuned piano.",
                "color": "D is the top of the scale, as clear as spring water.",
                "clarity": "VS1 inclusions are invisible without magnification.",
                "carat": "Just over one carat, about the weight of a paperclip."
            },
            "notableFeatures": ["No fluorescence"],
            "potentialConcerns": ["Premium pricing for D color"],
            "questionsForJeweler": ["Can I see the stone under natural light?"]
        }
    })
    .to_string()
}

pub fn test_state(llm: Arc<FakeCompletions>, pdf: Arc<FakeTextExtractor>) -> AppState {
    AppState {
        db: None,
        llm,
        pdf,
        spec_extractor: Arc::new(SpecExtractor::new().unwrap()),
        config: Config::default(),
    }
}

/// Migrated pool for tests that need Postgres; `None` when `DATABASE_URL` is unset.
pub async fn test_pool() -> Option<PgPool> {
    let url = std::env::var("DATABASE_URL")
        .ok()
        .filter(|url| !url.trim().is_empty())?;
    Some(create_pool(&url).await.unwrap())
}
