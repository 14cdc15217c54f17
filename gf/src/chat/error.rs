//! Chat client errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("chat API returned status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("chat request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("could not parse chat response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("could not find answer in chat response: {0}")]
    InvalidResponse(String),

    #[error("no API key given; set {env} or pass a key explicitly")]
    MissingApiKey { env: &'static str },

    #[error("chat stopped for reason {finish_reason:?}{hint}")]
    Truncated {
        finish_reason: String,
        hint: &'static str,
    },
}
