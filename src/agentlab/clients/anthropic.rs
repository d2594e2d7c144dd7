//! Anthropic client wrapper speaking the native Messages API.
//!
//! The Messages API differs from Chat Completions in three ways that this module hides:
//! system prompts travel in a top-level `system` field instead of the message list, the reply
//! is a list of typed content blocks, and usage is reported as `input_tokens` /
//! `output_tokens`.
//!
//! Every `system` message in the conversation is kept: they are joined, in order, with a blank
//! line between them.
//!
//! # Example
//!
//! ```rust,no_run
//! use agentlab::client_wrapper::{ClientWrapper, GenerationOptions, Message};
//! use agentlab::clients::anthropic::AnthropicClient;
//! use agentlab::Settings;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = AnthropicClient::new(&Settings::from_env())?;
//!     let reply = client
//!         .chat_completion(
//!             &[Message::system("Answer in French."), Message::user("List three colours.")],
//!             &GenerationOptions::new().with_max_tokens(200),
//!         )
//!         .await?;
//!     println!("{}", reply.content);
//!     Ok(())
//! }
//! ```

use crate::agentlab::client_wrapper::{
    ClientWrapper, CompletionResult, GenerationOptions, LlmError, Message, Role, TokenUsage,
};
use crate::agentlab::clients::common::{
    endpoint, ensure_messages, get_shared_http_client, resolve_api_key, send_json,
};
use crate::agentlab::config::Settings;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

pub const PROVIDER_NAME: &str = "Anthropic";
pub const ANTHROPIC_VERSION: &str = "2023-06-01";
/// The Messages API requires `max_tokens`; this is sent when the caller leaves it unset.
pub const DEFAULT_MAX_TOKENS: u32 = 1024;

#[derive(Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<AnthropicMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_sequences: Option<&'a [String]>,
}

/// The subset of a Messages API response that gets normalized.
#[derive(Debug, Deserialize)]
pub struct MessagesResponse {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub usage: Option<MessagesUsage>,
}

#[derive(Debug, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MessagesUsage {
    #[serde(default)]
    pub input_tokens: usize,
    #[serde(default)]
    pub output_tokens: usize,
}

/// Split a conversation into the concatenated system prompt and the remaining turns.
fn split_system<'a>(messages: &'a [Message]) -> (Option<String>, Vec<AnthropicMessage<'a>>) {
    let system_parts: Vec<&str> = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .filter(|c| !c.is_empty())
        .collect();

    let turns = messages
        .iter()
        .filter(|m| m.role != Role::System)
        .map(|m| AnthropicMessage {
            role: m.role.as_str(),
            content: &m.content,
        })
        .collect();

    let system = if system_parts.is_empty() {
        None
    } else {
        Some(system_parts.join("\n\n"))
    };
    (system, turns)
}

/// Map a Messages API response onto a [`CompletionResult`].
pub fn normalize_messages_response(
    response: MessagesResponse,
    requested_model: &str,
) -> CompletionResult {
    let content = response
        .content
        .into_iter()
        .filter(|block| block.block_type == "text")
        .filter_map(|block| block.text)
        .collect::<Vec<_>>()
        .join("");

    CompletionResult {
        content,
        usage: response
            .usage
            .map(|u| TokenUsage::from_parts(u.input_tokens, u.output_tokens)),
        model: response
            .model
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| requested_model.to_string()),
    }
}

/// Client wrapper for Anthropic's Messages API.
pub struct AnthropicClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    token_usage: Mutex<Option<TokenUsage>>,
}

impl AnthropicClient {
    /// Build a client from [`Settings`] alone.
    pub fn new(settings: &Settings) -> Result<Self, LlmError> {
        Self::with_credentials(None, None, settings)
    }

    /// Build a client, preferring the explicit key and base URL over `settings`.
    pub fn with_credentials(
        api_key: Option<&str>,
        base_url: Option<&str>,
        settings: &Settings,
    ) -> Result<Self, LlmError> {
        let api_key = resolve_api_key(
            api_key,
            settings.anthropic_api_key.as_deref(),
            PROVIDER_NAME,
        )?;
        Ok(AnthropicClient {
            http: get_shared_http_client().clone(),
            api_key,
            base_url: base_url.unwrap_or(&settings.anthropic_api_base).to_string(),
            model: settings.anthropic_model.clone(),
            token_usage: Mutex::new(None),
        })
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl ClientWrapper for AnthropicClient {
    fn provider_name(&self) -> &str {
        PROVIDER_NAME
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn chat_completion(
        &self,
        messages: &[Message],
        options: &GenerationOptions,
    ) -> Result<CompletionResult, LlmError> {
        ensure_messages(messages)?;

        let (system, turns) = split_system(messages);
        if turns.is_empty() {
            return Err(LlmError::InvalidRequest(
                "Anthropic requires at least one user or assistant message".to_string(),
            ));
        }

        let body = MessagesRequest {
            model: &self.model,
            max_tokens: options.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            messages: turns,
            system,
            temperature: options.temperature,
            top_p: options.top_p,
            stop_sequences: if options.stop.is_empty() {
                None
            } else {
                Some(options.stop.as_slice())
            },
        };

        let url = endpoint(&self.base_url, "messages");
        log::debug!(
            "AnthropicClient::chat_completion(...): {} messages to {}",
            messages.len(),
            url
        );

        let request = self
            .http
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body);

        match send_json::<MessagesResponse>(request, PROVIDER_NAME).await {
            Ok(response) => {
                let completion = normalize_messages_response(response, &self.model);
                if let Ok(mut slot) = self.token_usage.lock() {
                    *slot = completion.usage.clone();
                }
                Ok(completion)
            }
            Err(err) => {
                log::error!("AnthropicClient::chat_completion(...): {}", err);
                Err(err)
            }
        }
    }

    fn usage_slot(&self) -> Option<&Mutex<Option<TokenUsage>>> {
        Some(&self.token_usage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_system_messages_are_concatenated() {
        let messages = vec![
            Message::system("You are a poet."),
            Message::user("Write a haiku."),
            Message::system("Use lowercase only."),
            Message::assistant("ok"),
        ];

        let (system, turns) = split_system(&messages);
        assert_eq!(
            system.as_deref(),
            Some("You are a poet.\n\nUse lowercase only.")
        );
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, "user");
        assert_eq!(turns[1].role, "assistant");
    }

    #[test]
    fn test_no_system_message_omits_field() {
        let messages = vec![Message::user("hi")];
        let (system, turns) = split_system(&messages);
        assert!(system.is_none());
        assert_eq!(turns.len(), 1);
    }

    #[test]
    fn test_normalize_joins_text_blocks() {
        let response: MessagesResponse = serde_json::from_value(serde_json::json!({
            "id": "msg_1",
            "type": "message",
            "role": "assistant",
            "model": "claude-3-sonnet-20240229",
            "content": [
                {"type": "text", "text": "Hello"},
                {"type": "tool_use", "id": "t1", "name": "calc", "input": {}},
                {"type": "text", "text": ", world"}
            ],
            "usage": {"input_tokens": 12, "output_tokens": 4}
        }))
        .unwrap();

        let result = normalize_messages_response(response, "fallback");
        assert_eq!(result.content, "Hello, world");
        assert_eq!(result.model, "claude-3-sonnet-20240229");
        assert_eq!(result.usage, Some(TokenUsage::from_parts(12, 4)));
    }

    #[test]
    fn test_empty_content_normalizes_to_empty_text() {
        let response: MessagesResponse =
            serde_json::from_value(serde_json::json!({"content": []})).unwrap();
        let result = normalize_messages_response(response, "claude-x");
        assert_eq!(result.content, "");
        assert_eq!(result.model, "claude-x");
        assert!(result.usage.is_none());
    }

    #[test]
    fn test_missing_key_fails_construction() {
        assert!(matches!(
            AnthropicClient::new(&Settings::default()),
            Err(LlmError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_system_only_conversation_is_rejected() {
        let client =
            AnthropicClient::with_credentials(Some("sk-ant"), None, &Settings::default()).unwrap();
        let err = client
            .chat_completion(&[Message::system("alone")], &GenerationOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::InvalidRequest(_)));
    }
}
