//! Assistant conversation transcript

use tracing::warn;
use visionary_common::chat::WELCOME_MESSAGE_ID;
use visionary_common::time::now_millis;
use visionary_common::{ChatMessage, MessageKind, Sender};

use crate::{Assistant, Role, Turn, ASSISTANT_WELCOME, CHAT_APOLOGY};

/// Running conversation with the assistant
///
/// Opens with a model welcome message. The welcome is shown to the user but
/// not sent as history, so every request's history starts with a user turn.
#[derive(Debug, Clone)]
pub struct AssistantTranscript {
    messages: Vec<ChatMessage>,
}

impl Default for AssistantTranscript {
    fn default() -> Self {
        Self::new(ASSISTANT_WELCOME)
    }
}

impl AssistantTranscript {
    pub fn new(welcome: &str) -> Self {
        let welcome = ChatMessage {
            id: WELCOME_MESSAGE_ID.to_string(),
            sender: Sender::Assistant,
            content: welcome.to_string(),
            timestamp: now_millis(),
            kind: MessageKind::Text,
        };
        Self {
            messages: vec![welcome],
        }
    }

    /// Rebuild from messages a client sent back
    pub fn from_messages(messages: Vec<ChatMessage>) -> Self {
        if messages.is_empty() {
            Self::default()
        } else {
            Self { messages }
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn into_messages(self) -> Vec<ChatMessage> {
        self.messages
    }

    /// Prior turns in model-API form, welcome excluded
    pub fn history(&self) -> Vec<Turn> {
        self.messages
            .iter()
            .filter(|m| m.id != WELCOME_MESSAGE_ID)
            .map(|m| Turn {
                role: match m.sender {
                    Sender::Assistant => Role::Model,
                    Sender::Customer | Sender::Admin => Role::User,
                },
                text: m.content.clone(),
            })
            .collect()
    }

    /// Append the user's message and the assistant's reply
    ///
    /// Blank input is ignored and returns `None`. A failed call appends the
    /// canned apology instead of a reply; the user turn is kept either way.
    pub async fn ask(&mut self, assistant: &dyn Assistant, text: &str) -> Option<&ChatMessage> {
        if text.trim().is_empty() {
            return None;
        }

        let history = self.history();
        self.messages
            .push(ChatMessage::text(Sender::Customer, text, now_millis()));

        let reply = match assistant.chat(&history, text).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Assistant chat failed: {}", e);
                CHAT_APOLOGY.to_string()
            }
        };

        self.messages
            .push(ChatMessage::text(Sender::Assistant, reply, now_millis()));
        self.messages.last()
    }
}
