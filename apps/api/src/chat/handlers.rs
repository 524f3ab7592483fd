//! Axum route handler for follow-up chat about an analyzed certificate.

use axum::{
    extract::{rejection::JsonRejection, State},
    response::{IntoResponse, Response},
    Json,
};
use tracing::info;

use crate::chat::prompts::system_message;
use crate::chat::relay::event_stream_response;
use crate::chat::{ChatReply, ChatRequest};
use crate::errors::AppError;
use crate::llm_client::{ChatMessage, CompletionRequest, CHAT_MODEL};
use crate::state::AppState;

const CHAT_TEMPERATURE: f32 = 0.7;
const CHAT_MAX_TOKENS: u32 = 800;

/// Upstream messages: system preamble, prior turns in order, then the new question.
pub fn chat_completion_request(request: &ChatRequest) -> CompletionRequest {
    let mut messages = Vec::with_capacity(request.conversation_history.len() + 2);
    messages.push(ChatMessage::system(system_message(&request.certificate_text)));
    messages.extend(request.conversation_history.iter().cloned());
    messages.push(ChatMessage::user(request.message.clone()));

    CompletionRequest::new(CHAT_MODEL, messages)
        .temperature(CHAT_TEMPERATURE)
        .max_tokens(CHAT_MAX_TOKENS)
}

/// POST /api/chat
///
/// `stream: true` relays the upstream event stream; otherwise waits for the full
/// completion and returns `{ "response": ... }`.
pub async fn handle_chat(
    State(state): State<AppState>,
    request: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(request) = request?;
    if request.message.trim().is_empty() || request.certificate_text.trim().is_empty() {
        return Err(AppError::Validation("Missing required fields".to_string()));
    }

    info!(
        "Chat request (stream: {}, history: {} messages)",
        request.stream,
        request.conversation_history.len()
    );

    let completion = chat_completion_request(&request);

    if request.stream {
        let stream = state.llm.stream(&completion).await?;
        return Ok(event_stream_response(stream));
    }

    let response = state.llm.complete(&completion).await?;
    Ok(Json(ChatReply { response }).into_response())
}
