//! Ordered, append-only message log keyed by message id.

use std::collections::HashMap;

use crate::chat::prompts::system_message;
use crate::conversation::message::{Message, MessageId, APOLOGY};
use crate::llm_client::{ChatMessage, Role};

/// Messages in insertion order plus an id → position index. An update carrying
/// a known id replaces that message in place; anything else is appended.
#[derive(Debug, Default, Clone)]
pub struct ConversationLog {
    messages: Vec<Message>,
    index: HashMap<MessageId, usize>,
    next_id: MessageId,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A log whose first entry is the hidden system preamble for `certificate_text`.
    pub fn for_certificate(certificate_text: &str) -> Self {
        let mut log = Self::new();
        log.push(Role::System, system_message(certificate_text));
        log
    }

    /// Ids are handed out in increasing order and never reused.
    pub fn allocate_id(&mut self) -> MessageId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn push(&mut self, role: Role, content: impl Into<String>) -> MessageId {
        let id = self.allocate_id();
        self.upsert(Message::new(id, role, content));
        id
    }

    pub fn push_apology(&mut self) -> MessageId {
        self.push(Role::Assistant, APOLOGY)
    }

    pub fn upsert(&mut self, message: Message) {
        self.next_id = self.next_id.max(message.id + 1);
        match self.index.get(&message.id) {
            Some(&pos) => self.messages[pos] = message,
            None => {
                self.index.insert(message.id, self.messages.len());
                self.messages.push(message);
            }
        }
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.index.get(&id).map(|&pos| &self.messages[pos])
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Everything except system messages.
    pub fn visible(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|m| m.role != Role::System)
    }

    /// Prior turns as sent in `conversationHistory`. The server supplies its own
    /// system message, so the preamble is left out.
    pub fn history(&self) -> Vec<ChatMessage> {
        self.visible().map(Message::to_chat_message).collect()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
