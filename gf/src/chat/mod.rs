//! Chat collaborators that produce generated content
//!
//! A [`ChatRequest`] collects the conversation a task wants answered; a
//! [`ChatClient`] executes it. [`OpenAiChat`] speaks the OpenAI chat
//! completion protocol (which Anthropic's API and local servers such as LM
//! Studio are close enough to); [`CopyChat`] is a pseudo model that just
//! echoes the inputs, useful for plumbing tests and dry pipelines.

mod copy;
mod error;
mod openai;

pub use copy::{CopyChat, MODEL_COPY};
pub use error::ChatError;
pub use openai::{DEFAULT_MAX_TOKENS, DEFAULT_MODEL, OPENAI_URL, OpenAiChat};

use serde::Serialize;

/// A message role in a chat conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single message of a chat conversation.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

/// The conversation a generation task wants the AI to complete.
///
/// Messages are kept in insertion order, except that system messages go to
/// the front; the prompt is conventionally the last user message.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub max_tokens: Option<u32>,
    pub messages: Vec<ChatMessage>,
}

impl ChatRequest {
    pub fn new() -> Self {
        ChatRequest::default()
    }

    pub fn max_tokens(&mut self, max_tokens: u32) -> &mut Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Adds a system message at the front of the conversation. Empty
    /// messages are dropped.
    pub fn system_msg(&mut self, text: &str) -> &mut Self {
        if !text.is_empty() {
            self.messages.insert(
                0,
                ChatMessage {
                    role: Role::System,
                    content: text.to_owned(),
                },
            );
        }
        self
    }

    pub fn user_msg(&mut self, text: &str) -> &mut Self {
        if !text.is_empty() {
            self.messages.push(ChatMessage {
                role: Role::User,
                content: text.to_owned(),
            });
        }
        self
    }

    pub fn assistant_msg(&mut self, text: &str) -> &mut Self {
        if !text.is_empty() {
            self.messages.push(ChatMessage {
                role: Role::Assistant,
                content: text.to_owned(),
            });
        }
        self
    }
}

/// Executes chat requests against some model.
pub trait ChatClient {
    /// Sends the request and returns the model's answer, with a wrapping
    /// code block stripped if the whole answer is one.
    fn execute(&self, request: &ChatRequest) -> Result<String, ChatError>;

    /// The request body that would be sent, for `--show` style debugging.
    fn serialize(&self, request: &ChatRequest) -> Result<String, ChatError>;
}
