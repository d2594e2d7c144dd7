//! OpenRouter client wrapper built on the OpenAI-compatible transport.
//!
//! OpenRouter speaks the Chat Completions wire format, so the wrapper delegates every request
//! to an inner [`OpenAIClient`] pointed at `OPENROUTER_API_BASE`.  Swapping from OpenAI to
//! OpenRouter therefore only requires a different constructor.
//!
//! # Example
//!
//! ```rust,no_run
//! use agentlab::client_wrapper::{ClientWrapper, GenerationOptions};
//! use agentlab::clients::openrouter::OpenRouterClient;
//! use agentlab::Settings;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = OpenRouterClient::new(&Settings::from_env())?
//!         .with_app_attribution("https://example.com", "agentlab demo");
//!     let reply = client
//!         .text_completion("Explain AI in one sentence.", &GenerationOptions::new().with_max_tokens(50))
//!         .await?;
//!     println!("{}", reply);
//!     Ok(())
//! }
//! ```

use crate::agentlab::client_wrapper::{
    ClientWrapper, CompletionResult, GenerationOptions, LlmError, Message, TokenUsage,
};
use crate::agentlab::clients::common::resolve_api_key;
use crate::agentlab::clients::openai::OpenAIClient;
use crate::agentlab::config::Settings;
use async_trait::async_trait;
use std::sync::Mutex;

pub const PROVIDER_NAME: &str = "OpenRouter";

/// Client wrapper for OpenRouter routed through the OpenAI compatible surface.
pub struct OpenRouterClient {
    /// Delegated client that handles the HTTP interactions.
    delegate_client: OpenAIClient,
}

impl OpenRouterClient {
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
            settings.openrouter_api_key.as_deref(),
            PROVIDER_NAME,
        )?;
        Ok(OpenRouterClient {
            delegate_client: OpenAIClient::compatible(
                PROVIDER_NAME,
                &api_key,
                base_url.unwrap_or(&settings.openrouter_api_base),
                &settings.openrouter_model,
            ),
        })
    }

    /// Override the routed model (e.g. `anthropic/claude-3.5-sonnet`).
    pub fn with_model(mut self, model: &str) -> Self {
        self.delegate_client = self.delegate_client.with_model(model);
        self
    }

    /// Identify the calling application to OpenRouter's rankings via the optional
    /// `HTTP-Referer` and `X-Title` headers.
    pub fn with_app_attribution(mut self, referer: &str, title: &str) -> Self {
        self.delegate_client = self
            .delegate_client
            .with_header("HTTP-Referer", referer)
            .with_header("X-Title", title);
        self
    }

    pub fn base_url(&self) -> &str {
        self.delegate_client.base_url()
    }
}

#[async_trait]
impl ClientWrapper for OpenRouterClient {
    fn provider_name(&self) -> &str {
        PROVIDER_NAME
    }

    fn model_name(&self) -> &str {
        self.delegate_client.model_name()
    }

    async fn chat_completion(
        &self,
        messages: &[Message],
        options: &GenerationOptions,
    ) -> Result<CompletionResult, LlmError> {
        self.delegate_client.chat_completion(messages, options).await
    }

    fn usage_slot(&self) -> Option<&Mutex<Option<TokenUsage>>> {
        self.delegate_client.usage_slot()
    }
}
