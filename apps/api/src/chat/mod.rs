pub mod handlers;
pub mod prompts;
pub mod relay;

use serde::{Deserialize, Serialize};

use crate::llm_client::ChatMessage;

/// Body of `POST /api/chat`. Missing fields deserialize as empty and are
/// rejected by the handler.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub certificate_text: String,
    #[serde(default)]
    pub stream: bool,
    /// Prior turns, oldest first. The server prepends its own system message.
    #[serde(default)]
    pub conversation_history: Vec<ChatMessage>,
}

/// Non-streaming reply of `POST /api/chat`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReply {
    pub response: String,
}
