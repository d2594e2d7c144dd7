//! The `OpenAIClient` struct implements `ClientWrapper` for OpenAI's Chat Completions API and
//! for any endpoint that speaks the same wire format.
//!
//! # Key Features
//!
//! - **chat_completion(...)**: maps `choices[0].message.content`, the `usage` block and the
//!   served `model` into a [`CompletionResult`].
//! - **Automatic Usage Capture**: stores the latest `TokenUsage` internally; read it back with
//!   `get_last_usage()`.
//! - **Credential fallback**: an explicit key wins, otherwise `OPENAI_API_KEY` from
//!   [`Settings`].
//!
//! # Example
//!
//! ```rust,no_run
//! use agentlab::clients::openai::{Model, OpenAIClient};
//! use agentlab::client_wrapper::{ClientWrapper, GenerationOptions, Message};
//! use agentlab::Settings;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = OpenAIClient::new(&Settings::from_env())?.with_model_enum(Model::GPT4oMini);
//!
//!     let result = client
//!         .chat_completion(&[Message::user("Hello!")], &GenerationOptions::default())
//!         .await?;
//!     println!("Assistant: {}", result.content);
//!
//!     if let Some(usage) = client.get_last_usage() {
//!         println!(
//!             "Tokens: input {}, output {}, total {}",
//!             usage.input_tokens, usage.output_tokens, usage.total_tokens
//!         );
//!     }
//!     Ok(())
//! }
//! ```

use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::agentlab::client_wrapper::{
    ClientWrapper, CompletionResult, GenerationOptions, LlmError, Message, TokenUsage,
};
use crate::agentlab::clients::common::{
    endpoint, ensure_messages, get_shared_http_client, resolve_api_key, send_json,
};
use crate::agentlab::config::Settings;

pub const PROVIDER_NAME: &str = "OpenAI";

/// Commonly used model identifiers for OpenAI's Chat Completions API.
#[allow(non_camel_case_types)]
pub enum Model {
    /// `gpt-4` – the default model for this crate.
    GPT4,
    /// `gpt-4o` – Omni model with text + image inputs.
    GPT4o,
    /// `gpt-4o-mini` – cost effective GPT-4o derivative.
    GPT4oMini,
    /// `gpt-4.1` – general availability GPT-4.1.
    GPT41,
    /// `gpt-4.1-mini` – reduced cost GPT-4.1 tier.
    GPT41Mini,
    /// `gpt-4.1-nano` – ultra low cost GPT-4.1 derivative.
    GPT41Nano,
    /// `o3-mini` – compact O-series reasoning model.
    O3Mini,
}

/// Convert a [`Model`] variant into the string identifier expected by the REST API.
pub fn model_to_string(model: Model) -> String {
    match model {
        Model::GPT4 => "gpt-4".to_string(),
        Model::GPT4o => "gpt-4o".to_string(),
        Model::GPT4oMini => "gpt-4o-mini".to_string(),
        Model::GPT41 => "gpt-4.1".to_string(),
        Model::GPT41Mini => "gpt-4.1-mini".to_string(),
        Model::GPT41Nano => "gpt-4.1-nano".to_string(),
        Model::O3Mini => "o3-mini".to_string(),
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<&'a [String]>,
}

/// The subset of a Chat Completions response that gets normalized.
#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
    #[serde(default)]
    pub usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChatUsage {
    #[serde(default)]
    pub prompt_tokens: usize,
    #[serde(default)]
    pub completion_tokens: usize,
    #[serde(default)]
    pub total_tokens: Option<usize>,
}

/// Map an OpenAI-compatible response onto a [`CompletionResult`].
///
/// `requested_model` stands in when the vendor omits the `model` field.
pub fn normalize_chat_response(
    response: ChatResponse,
    requested_model: &str,
    provider: &str,
) -> Result<CompletionResult, LlmError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::provider(provider, "response contained no choices"))?;

    let usage = response.usage.map(|u| TokenUsage {
        input_tokens: u.prompt_tokens,
        output_tokens: u.completion_tokens,
        total_tokens: u
            .total_tokens
            .unwrap_or(u.prompt_tokens + u.completion_tokens),
    });

    Ok(CompletionResult {
        content: choice.message.content.unwrap_or_default(),
        usage,
        model: response
            .model
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| requested_model.to_string()),
    })
}

/// Client wrapper for OpenAI's Chat Completions API.
///
/// The wrapper keeps the selected model, the endpoint and an internal [`TokenUsage`] slot.
/// Other OpenAI-compatible vendors (OpenRouter) reuse it through
/// [`OpenAIClient::compatible`].
pub struct OpenAIClient {
    /// Shared pooled HTTP client.
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    /// Model name that will be injected into each request.
    model: String,
    /// Name used in logs and `ProviderError`s.
    provider: String,
    /// Extra headers sent with every request (vendor attribution etc.).
    extra_headers: Vec<(String, String)>,
    /// Storage for the token usage returned by the most recent request.
    token_usage: Mutex<Option<TokenUsage>>,
}

impl OpenAIClient {
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
            settings.openai_api_key.as_deref(),
            PROVIDER_NAME,
        )?;
        Ok(Self::compatible(
            PROVIDER_NAME,
            &api_key,
            base_url.unwrap_or(&settings.openai_api_base),
            &settings.openai_model,
        ))
    }

    /// Construct a client for any OpenAI-compatible endpoint with an already resolved key.
    pub fn compatible(provider: &str, api_key: &str, base_url: &str, model: &str) -> Self {
        OpenAIClient {
            http: get_shared_http_client().clone(),
            api_key: api_key.to_string(),
            base_url: base_url.to_string(),
            model: model.to_string(),
            provider: provider.to_string(),
            extra_headers: Vec::new(),
            token_usage: Mutex::new(None),
        }
    }

    /// Override the model name.
    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    /// Convenience helper wrapping [`OpenAIClient::with_model`] for strongly typed models.
    pub fn with_model_enum(self, model: Model) -> Self {
        let model = model_to_string(model);
        self.with_model(&model)
    }

    /// Send an additional header with every request.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.extra_headers
            .push((name.to_string(), value.to_string()));
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl ClientWrapper for OpenAIClient {
    fn provider_name(&self) -> &str {
        &self.provider
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

        let body = ChatRequest {
            model: &self.model,
            messages: messages
                .iter()
                .map(|m| ChatMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            top_p: options.top_p,
            stop: if options.stop.is_empty() {
                None
            } else {
                Some(options.stop.as_slice())
            },
        };

        let url = endpoint(&self.base_url, "chat/completions");
        log::debug!(
            "OpenAIClient::chat_completion(...): {} messages to {} ({})",
            messages.len(),
            url,
            self.provider
        );

        let mut request = self.http.post(&url).bearer_auth(&self.api_key).json(&body);
        for (name, value) in &self.extra_headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let result = send_json::<ChatResponse>(request, &self.provider)
            .await
            .and_then(|response| normalize_chat_response(response, &self.model, &self.provider));

        match result {
            Ok(completion) => {
                if let Ok(mut slot) = self.token_usage.lock() {
                    *slot = completion.usage.clone();
                }
                Ok(completion)
            }
            Err(err) => {
                log::error!("OpenAIClient::chat_completion(...): {}", err);
                Err(err)
            }
        }
    }

    fn usage_slot(&self) -> Option<&Mutex<Option<TokenUsage>>> {
        Some(&self.token_usage)
    }
}
