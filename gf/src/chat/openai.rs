//! OpenAI-style chat completion client
//!
//! Speaks the OpenAI chat completion protocol and the near-identical
//! Anthropic messages API; local servers such as LM Studio accept the OpenAI
//! format too. Which dialect to use is decided from the URL.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ChatClient, ChatError, ChatMessage, ChatRequest, Role};

/// The OpenAI chat completion endpoint.
pub const OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_MAX_TOKENS: u32 = 2048;

const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";
const ENV_ANTHROPIC_API_KEY: &str = "ANTHROPIC_API_KEY";
const ENV_ANTHROPIC_VERSION: &str = "ANTHROPIC_API_VERSION";
const ANTHROPIC_DEFAULT_VERSION: &str = "2023-06-01";

/// Matches an answer that is entirely one fenced code block.
static CODEBLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\A\s*```\w*\n?(.*?)\n*```\s*\z").unwrap());

/// Chat client for OpenAI-compatible completion endpoints.
pub struct OpenAiChat {
    url: String,
    model: String,
    api_key: Option<String>,
    organization: Option<String>,
}

impl OpenAiChat {
    pub fn new(url: impl Into<String>, model: impl Into<String>, api_key: Option<String>) -> Self {
        OpenAiChat {
            url: url.into(),
            model: model.into(),
            api_key,
            organization: None,
        }
    }

    pub fn organization(mut self, organization: Option<String>) -> Self {
        self.organization = organization;
        self
    }

    fn is_claude(&self) -> bool {
        self.url.contains("//api.anthropic.com/")
    }

    fn api_key(&self) -> Result<String, ChatError> {
        if let Some(key) = &self.api_key {
            return Ok(key.clone());
        }
        let env = if self.is_claude() {
            ENV_ANTHROPIC_API_KEY
        } else {
            ENV_OPENAI_API_KEY
        };
        std::env::var(env).map_err(|_| ChatError::MissingApiKey { env })
    }

    fn body(&self, request: &ChatRequest) -> WireRequest {
        let max_tokens = request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS);
        if self.is_claude() {
            // Claude takes the system prompt as a request attribute, not a
            // message.
            let mut system = String::new();
            let mut messages = Vec::new();
            for message in &request.messages {
                match message.role {
                    Role::System => {
                        if !system.is_empty() {
                            system.push_str("\n\n");
                        }
                        system.push_str(&message.content);
                    }
                    Role::User | Role::Assistant => messages.push(message.clone()),
                }
            }
            WireRequest {
                model: self.model.clone(),
                messages,
                temperature: 0.0,
                max_tokens,
                system: (!system.is_empty()).then_some(system),
            }
        } else {
            WireRequest {
                model: self.model.clone(),
                messages: request.messages.clone(),
                temperature: 0.0,
                max_tokens,
                system: None,
            }
        }
    }

    fn extract_answer(&self, body: &str) -> Result<String, ChatError> {
        let response: WireResponse = serde_json::from_str(body)?;
        let (content, finish_reason, stopped) = if let Some(choice) = response
            .choices
            .as_ref()
            .and_then(|choices| choices.first())
        {
            let finish_reason = choice.finish_reason.clone().unwrap_or_default();
            let stopped = finish_reason == "stop";
            (choice.message.content.trim().to_owned(), finish_reason, stopped)
        } else if let Some(content) = response
            .content
            .as_ref()
            .and_then(|content| content.first())
        {
            let finish_reason = response.stop_reason.clone().unwrap_or_default();
            let stopped = finish_reason == "end_turn";
            (content.text.clone(), finish_reason, stopped)
        } else {
            return Err(ChatError::InvalidResponse(body.to_owned()));
        };
        if !stopped {
            let hint = if finish_reason.contains("length") {
                "; try increasing max tokens"
            } else {
                ""
            };
            return Err(ChatError::Truncated {
                finish_reason,
                hint,
            });
        }
        Ok(match CODEBLOCK.captures(&content) {
            Some(caps) => caps[1].to_owned(),
            None => content,
        })
    }
}

impl ChatClient for OpenAiChat {
    fn execute(&self, request: &ChatRequest) -> Result<String, ChatError> {
        let key = self.api_key()?;
        debug!(url = %self.url, model = %self.model, messages = request.messages.len(), "executing chat request");
        let client = reqwest::blocking::Client::new();
        let mut builder = client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .json(&self.body(request));
        if self.is_claude() {
            let version = std::env::var(ENV_ANTHROPIC_VERSION)
                .unwrap_or_else(|_| ANTHROPIC_DEFAULT_VERSION.to_owned());
            builder = builder
                .header("x-api-key", key)
                .header("anthropic-version", version);
        } else {
            builder = builder.header("Authorization", format!("Bearer {key}"));
            if let Some(organization) = &self.organization {
                builder = builder.header("OpenAI-Organization", organization.as_str());
            }
        }
        let response = builder.send()?;
        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            return Err(ChatError::Api {
                status: status.as_u16(),
                message: body,
            });
        }
        self.extract_answer(&body)
    }

    fn serialize(&self, request: &ChatRequest) -> Result<String, ChatError> {
        Ok(serde_json::to_string_pretty(&self.body(request))?)
    }
}

#[derive(Serialize)]
struct WireRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f64,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
}

#[derive(Deserialize)]
struct WireResponse {
    // OpenAI style
    choices: Option<Vec<Choice>>,
    // Claude style
    content: Option<Vec<ClaudeContent>>,
    stop_reason: Option<String>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

#[derive(Deserialize)]
struct ClaudeContent {
    text: String,
}
