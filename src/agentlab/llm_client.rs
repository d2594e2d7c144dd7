//! The provider-neutral entry point.
//!
//! [`LlmClient`] holds exactly one active [`ClientWrapper`] chosen by a [`Provider`] selector
//! and forwards completions to it.  The adapter can be replaced at runtime with
//! [`LlmClient::switch_provider`]; calls that are already in flight finish on the adapter
//! they started with.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use agentlab::{GenerationOptions, LlmClient, Settings};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = LlmClient::new("openai", Arc::new(Settings::from_env()))?;
//!     let options = GenerationOptions::new().with_max_tokens(100);
//!
//!     println!("{}", client.text_completion("What is AI?", &options).await?);
//!
//!     client.switch_provider("Anthropic").await?;
//!     println!("{}", client.text_completion("What is AI?", &options).await?);
//!     Ok(())
//! }
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::agentlab::client_wrapper::{
    ClientWrapper, CompletionResult, GenerationOptions, LlmError, Message, TokenUsage,
};
use crate::agentlab::clients::anthropic::AnthropicClient;
use crate::agentlab::clients::openai::OpenAIClient;
use crate::agentlab::clients::openrouter::OpenRouterClient;
use crate::agentlab::config::Settings;

/// The closed set of vendors the façade can select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    OpenAI,
    OpenRouter,
    Anthropic,
}

impl Provider {
    pub const ALL: [Provider; 3] = [Provider::OpenAI, Provider::OpenRouter, Provider::Anthropic];

    /// The lowercase selector accepted by [`FromStr`].
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenAI => "openai",
            Provider::OpenRouter => "openrouter",
            Provider::Anthropic => "anthropic",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let selector = s.to_ascii_lowercase();
        Provider::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == selector)
            .ok_or_else(|| LlmError::UnsupportedProvider(s.to_string()))
    }
}

/// Construct the adapter for `provider` using only `settings` for credentials.
pub fn build_adapter(
    provider: Provider,
    settings: &Settings,
) -> Result<Arc<dyn ClientWrapper>, LlmError> {
    let adapter: Arc<dyn ClientWrapper> = match provider {
        Provider::OpenAI => Arc::new(OpenAIClient::new(settings)?),
        Provider::OpenRouter => Arc::new(OpenRouterClient::new(settings)?),
        Provider::Anthropic => Arc::new(AnthropicClient::new(settings)?),
    };
    Ok(adapter)
}

struct ActiveAdapter {
    provider: Option<Provider>,
    adapter: Arc<dyn ClientWrapper>,
}

/// Unified client over every supported provider.
///
/// The façade keeps no conversation state: each call carries its full message list.
pub struct LlmClient {
    settings: Arc<Settings>,
    active: RwLock<ActiveAdapter>,
}

impl LlmClient {
    /// Select `provider` (case-insensitive) and build its adapter from `settings`.
    ///
    /// Fails with [`LlmError::UnsupportedProvider`] for an unknown selector and with
    /// [`LlmError::Configuration`] when the provider's API key is missing.
    pub fn new(provider: &str, settings: Arc<Settings>) -> Result<Self, LlmError> {
        let provider = provider.parse::<Provider>()?;
        let adapter = build_adapter(provider, &settings)?;
        log::info!(
            "LlmClient: initialized with provider {} (model {})",
            provider,
            adapter.model_name()
        );
        Ok(LlmClient {
            settings,
            active: RwLock::new(ActiveAdapter {
                provider: Some(provider),
                adapter,
            }),
        })
    }

    /// Wrap an adapter that was constructed elsewhere.
    ///
    /// `provider()` reports `None` until the first successful [`LlmClient::switch_provider`].
    pub fn from_adapter(adapter: Arc<dyn ClientWrapper>, settings: Arc<Settings>) -> Self {
        LlmClient {
            settings,
            active: RwLock::new(ActiveAdapter {
                provider: None,
                adapter,
            }),
        }
    }

    async fn current(&self) -> Arc<dyn ClientWrapper> {
        self.active.read().await.adapter.clone()
    }

    pub async fn provider(&self) -> Option<Provider> {
        self.active.read().await.provider
    }

    pub async fn model_name(&self) -> String {
        self.current().await.model_name().to_string()
    }

    pub async fn chat_completion(
        &self,
        messages: &[Message],
        options: &GenerationOptions,
    ) -> Result<CompletionResult, LlmError> {
        let adapter = self.current().await;
        adapter.chat_completion(messages, options).await
    }

    pub async fn text_completion(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String, LlmError> {
        let adapter = self.current().await;
        adapter.text_completion(prompt, options).await
    }

    /// Usage of the last call served by the currently active adapter.
    pub async fn get_last_usage(&self) -> Option<TokenUsage> {
        self.current().await.get_last_usage()
    }

    /// Replace the active adapter.
    ///
    /// The new adapter is fully built before the swap, so on any error the previous adapter
    /// stays active.
    pub async fn switch_provider(&self, provider: &str) -> Result<(), LlmError> {
        let provider = provider.parse::<Provider>()?;
        let adapter = build_adapter(provider, &self.settings)?;

        let mut active = self.active.write().await;
        log::info!(
            "LlmClient: switching provider {:?} -> {}",
            active.provider.map(|p| p.as_str()),
            provider
        );
        *active = ActiveAdapter {
            provider: Some(provider),
            adapter,
        };
        Ok(())
    }
}
