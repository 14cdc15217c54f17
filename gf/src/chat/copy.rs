//! The `copy` pseudo model
//!
//! Instead of calling an AI it concatenates the assistant messages of the
//! request, which for a generation task are exactly the uncluttered input
//! contents. That makes whole pipelines runnable without an API key, for
//! wiring tests and for collecting what would be sent.

use tracing::debug;

use super::{ChatClient, ChatError, ChatRequest, Role};

/// Model name that selects [`CopyChat`] instead of a real AI.
pub const MODEL_COPY: &str = "copy";

/// Pseudo chat client that echoes the request's assistant messages.
#[derive(Debug, Default)]
pub struct CopyChat;

impl ChatClient for CopyChat {
    fn execute(&self, request: &ChatRequest) -> Result<String, ChatError> {
        debug!(messages = request.messages.len(), "copy model run");
        let mut result = String::new();
        for message in &request.messages {
            if message.role == Role::Assistant {
                if !result.is_empty() {
                    result.push('\n');
                }
                result.push_str(&message.content);
            }
        }
        Ok(result)
    }

    fn serialize(&self, request: &ChatRequest) -> Result<String, ChatError> {
        Ok(serde_json::to_string_pretty(&request.messages)?)
    }
}
