//! # agentlab
//!
//! agentlab is the integration layer behind LLM agent experiments: one client for several
//! hosted chat-completion APIs and a small in-process tool server that agents can call.
//!
//! The crate provides:
//!
//! * **Provider Flexibility**: the [`ClientWrapper`] trait implemented for OpenAI, OpenRouter
//!   and Anthropic, each normalizing its vendor's response into a [`CompletionResult`]
//! * **A single entry point**: [`LlmClient`] selects a provider by name and can switch
//!   providers at runtime
//! * **Tools**: a [`tool_protocol::ToolRegistry`] of named, schema-described callables, the
//!   [`McpServer`] dispatcher that invokes them and the [`McpClient`] convenience caller
//! * **Built-in tools**: calculator, file_read, file_write, current_time and list_files in
//!   [`tools`]
//!
//! ## Completions
//!
//! ```rust,no_run
//! use agentlab::{GenerationOptions, LlmClient, Message};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     agentlab::init_logger();
//!
//!     let client = LlmClient::new("openrouter", agentlab::settings())?;
//!     let result = client
//!         .chat_completion(
//!             &[
//!                 Message::system("You are terse."),
//!                 Message::user("Summarise agentlab in one sentence."),
//!             ],
//!             &GenerationOptions::new().with_temperature(0.2),
//!         )
//!         .await?;
//!
//!     println!("{} [{}]", result.content, result.model);
//!     if let Some(usage) = result.usage {
//!         println!("tokens: {}", usage.total_tokens);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Tools
//!
//! ```rust
//! use agentlab::tool_protocol::ToolRegistry;
//! use agentlab::tools::register_builtin_tools;
//! use agentlab::{McpClient, McpServer};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let registry = Arc::new(ToolRegistry::new());
//! register_builtin_tools(&registry, std::env::temp_dir()).await;
//!
//! let client = McpClient::new(McpServer::new(registry));
//! let outcome = client
//!     .call_tool("calculator", Some(json!({"expression": "2 + 3 * 4"})))
//!     .await;
//! println!("{}", McpClient::format_result(&outcome));
//!
//! let missing = client.call_tool("nonexistent_tool", None).await;
//! assert_eq!(missing.error(), Some("Tool 'nonexistent_tool' not found"));
//! # }
//! ```

use std::sync::{Arc, Once};

static INIT_LOGGER: Once = Once::new();

/// Initialise the global [`env_logger`] subscriber exactly once.
///
/// ```rust
/// agentlab::init_logger();
/// log::info!("Logger is ready");
/// ```
pub fn init_logger() {
    INIT_LOGGER.call_once(|| {
        env_logger::init();
    });
}

lazy_static::lazy_static! {
    static ref SETTINGS: Arc<Settings> = Arc::new(Settings::from_env());
}

/// Process-wide [`Settings`], read from the environment on first access.
pub fn settings() -> Arc<Settings> {
    SETTINGS.clone()
}

pub mod agentlab;

// Re-exporting key items for easier external access.
pub use agentlab::client_wrapper;
pub use agentlab::client_wrapper::{
    ClientWrapper, CompletionResult, GenerationOptions, LlmError, Message, Role, TokenUsage,
};
pub use agentlab::clients;
pub use agentlab::config;
pub use agentlab::config::Settings;
pub use agentlab::llm_client;
pub use agentlab::llm_client::{LlmClient, Provider};
pub use agentlab::mcp_client;
pub use agentlab::mcp_client::{McpClient, ToolCallAgent};
pub use agentlab::mcp_server;
pub use agentlab::mcp_server::McpServer;
pub use agentlab::tool_protocol;
pub use agentlab::tool_protocol::{ToolInvocationResult, ToolRegistry};
pub use agentlab::tools;
