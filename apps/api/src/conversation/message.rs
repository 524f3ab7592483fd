use serde::{Deserialize, Serialize};

use crate::llm_client::{ChatMessage, Role};

pub type MessageId = u64;

/// Suggested follow-ups shown under messages flagged with `include_quick_questions`.
pub const QUICK_QUESTIONS: [&str; 4] = [
    "Explain the color grade in detail",
    "Is this diamond eye-clean?",
    "What's a fair price for this diamond?",
    "Compare to average diamonds of this size",
];

/// Shown in place of an answer when a question could not be sent.
pub const APOLOGY: &str = "Sorry, I encountered an error. Please try again.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub include_quick_questions: bool,
}

impl Message {
    pub fn new(id: MessageId, role: Role, content: impl Into<String>) -> Self {
        Self {
            id,
            role,
            content: content.into(),
            include_quick_questions: false,
        }
    }

    pub fn with_quick_questions(mut self) -> Self {
        self.include_quick_questions = true;
        self
    }

    pub fn to_chat_message(&self) -> ChatMessage {
        ChatMessage {
            role: self.role,
            content: self.content.clone(),
        }
    }
}
