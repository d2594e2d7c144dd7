//! The normalized chat model shared by every provider client.
//!
//! A [`ClientWrapper`] is a wrapper around one hosted chat-completion service.  It accepts an
//! ordered list of role-tagged [`Message`]s plus optional [`GenerationOptions`] and returns a
//! [`CompletionResult`], whatever shape the vendor's own response takes.  Wrappers keep no
//! conversation history: every call carries the full message sequence.
//!
//! # Example
//!
//! ```rust,no_run
//! use agentlab::client_wrapper::{ClientWrapper, GenerationOptions, Message};
//! use agentlab::clients::openai::OpenAIClient;
//! use agentlab::Settings;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = Settings::from_env();
//!     let client = OpenAIClient::new(&settings)?;
//!
//!     let result = client
//!         .chat_completion(
//!             &[Message::system("You are terse."), Message::user("Hello!")],
//!             &GenerationOptions::new().with_max_tokens(100),
//!         )
//!         .await?;
//!
//!     println!("{} ({})", result.content, result.model);
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;

/// Represents the possible roles for a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    // set by the developer to steer the model's responses
    System,
    // a message sent by a human user (or app user)
    User,
    // lets the model know the content was generated as a response to a user message
    Assistant,
}

impl Role {
    /// Wire name of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "system" => Ok(Role::System),
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(LlmError::InvalidRequest(format!("unknown role '{}'", other))),
        }
    }
}

/// Represents a generic message to be sent to an LLM.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// The role associated with the message.
    pub role: Role,
    /// The actual content of the message.
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Message {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// How many tokens were spent on prompt vs. completion.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub total_tokens: usize,
}

impl TokenUsage {
    /// Usage where the vendor reports only input and output counts.
    pub fn from_parts(input_tokens: usize, output_tokens: usize) -> Self {
        TokenUsage {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
        }
    }
}

/// The normalized outcome of a single chat completion.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompletionResult {
    /// Assistant text; empty when the vendor returned no text.
    pub content: String,
    /// Token accounting, when the vendor reported it.
    pub usage: Option<TokenUsage>,
    /// The model that actually served the request.
    pub model: String,
}

/// Optional sampling parameters forwarded to the vendor.
///
/// Only fields that are set are sent; everything else is left to the vendor's defaults.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GenerationOptions {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub stop: Vec<String>,
}

impl GenerationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    pub fn with_stop(mut self, stop: impl Into<String>) -> Self {
        self.stop.push(stop.into());
        self
    }
}

/// Errors raised by provider clients and the [`LlmClient`](crate::LlmClient) façade.
#[derive(Debug, Clone, PartialEq)]
pub enum LlmError {
    /// A required credential could not be resolved.
    Configuration(String),
    /// The provider selector is not one of the supported providers.
    UnsupportedProvider(String),
    /// The caller supplied a request that cannot be sent (e.g. no messages).
    InvalidRequest(String),
    /// The vendor or the network failed while serving a completion.
    Provider { provider: String, message: String },
}

impl LlmError {
    pub(crate) fn provider(provider: &str, message: impl Into<String>) -> Self {
        LlmError::Provider {
            provider: provider.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            LlmError::UnsupportedProvider(name) => {
                write!(f, "Unsupported LLM provider: {}", name)
            }
            LlmError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            LlmError::Provider { provider, message } => {
                write!(f, "{} API error: {}", provider, message)
            }
        }
    }
}

impl Error for LlmError {}

/// Trait defining the interface to interact with the various LLM services.
#[async_trait]
pub trait ClientWrapper: Send + Sync {
    /// Human readable vendor name used in logs and error messages.
    fn provider_name(&self) -> &str;

    /// Model identifier injected into each request.
    fn model_name(&self) -> &str;

    /// Send the conversation to the vendor and normalize its reply.
    async fn chat_completion(
        &self,
        messages: &[Message],
        options: &GenerationOptions,
    ) -> Result<CompletionResult, LlmError>;

    /// Wrap `prompt` as a single user message and return only the reply text.
    async fn text_completion(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String, LlmError> {
        let messages = [Message::user(prompt)];
        let result = self.chat_completion(&messages, options).await?;
        Ok(result.content)
    }

    /// Usage reported by the *last* chat_completion() call.
    /// Default impl returns None so wrappers without a usage slot keep working.
    fn get_last_usage(&self) -> Option<TokenUsage> {
        self.usage_slot()
            .and_then(|slot| slot.lock().ok().and_then(|u| u.clone()))
    }

    fn usage_slot(&self) -> Option<&Mutex<Option<TokenUsage>>> {
        None
    }
}
