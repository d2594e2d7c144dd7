//! Process configuration for agentlab.
//!
//! [`Settings`] gathers provider credentials, endpoint URLs and model identifiers from the
//! process environment.  It is read-only once built; construct one explicitly with
//! [`Settings::from_env`] (or [`Settings::from_lookup`] in tests) and hand it to the
//! [`LlmClient`](crate::LlmClient) and the provider clients by reference.
//!
//! A lazily built process-wide instance is available through [`crate::settings()`] for
//! callers that do not want to thread the value around themselves.
//!
//! # Example
//!
//! ```rust
//! use agentlab::Settings;
//!
//! let settings = Settings::from_lookup(|key| match key {
//!     "OPENAI_API_KEY" => Some("sk-test".to_string()),
//!     _ => None,
//! });
//!
//! assert_eq!(settings.openai_api_key.as_deref(), Some("sk-test"));
//! assert_eq!(settings.openai_model, "gpt-4");
//! assert_eq!(settings.openrouter_api_base, "https://openrouter.ai/api/v1");
//! ```

use std::fmt;

pub const DEFAULT_OPENAI_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4";
pub const DEFAULT_OPENROUTER_API_BASE: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_OPENROUTER_MODEL: &str = "google/gemini-2.5-flash";
pub const DEFAULT_ANTHROPIC_API_BASE: &str = "https://api.anthropic.com/v1";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-sonnet-20240229";
pub const DEFAULT_MCP_SERVER_HOST: &str = "localhost";
pub const DEFAULT_MCP_SERVER_PORT: u16 = 3000;
pub const DEFAULT_LOG_LEVEL: &str = "INFO";

/// Credentials and endpoint settings for every supported provider.
///
/// API keys are `None` when the variable is unset or empty.  Everything else falls back to
/// the documented defaults.
#[derive(Clone)]
pub struct Settings {
    pub openai_api_key: Option<String>,
    pub openai_api_base: String,
    pub openai_model: String,

    pub openrouter_api_key: Option<String>,
    pub openrouter_api_base: String,
    pub openrouter_model: String,

    pub anthropic_api_key: Option<String>,
    pub anthropic_api_base: String,
    pub anthropic_model: String,

    /// Host advertised by the tool server.
    pub mcp_server_host: String,
    /// Port advertised by the tool server.
    pub mcp_server_port: u16,

    /// Fallback log filter used by the CLI when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Settings {
    /// Read every setting from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup.
    ///
    /// This is what [`Settings::from_env`] uses under the hood; tests pass a closure over a
    /// fixed map so they never touch the real environment.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let secret = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let or_default = |key: &str, default: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let mcp_server_port = lookup("MCP_SERVER_PORT")
            .and_then(|v| v.trim().parse::<u16>().ok())
            .unwrap_or(DEFAULT_MCP_SERVER_PORT);

        Settings {
            openai_api_key: secret("OPENAI_API_KEY"),
            openai_api_base: or_default("OPENAI_API_BASE", DEFAULT_OPENAI_API_BASE),
            openai_model: or_default("OPENAI_MODEL", DEFAULT_OPENAI_MODEL),

            openrouter_api_key: secret("OPENROUTER_API_KEY"),
            openrouter_api_base: or_default("OPENROUTER_API_BASE", DEFAULT_OPENROUTER_API_BASE),
            openrouter_model: or_default("OPENROUTER_MODEL", DEFAULT_OPENROUTER_MODEL),

            anthropic_api_key: secret("ANTHROPIC_API_KEY"),
            anthropic_api_base: or_default("ANTHROPIC_API_BASE", DEFAULT_ANTHROPIC_API_BASE),
            anthropic_model: or_default("ANTHROPIC_MODEL", DEFAULT_ANTHROPIC_MODEL),

            mcp_server_host: or_default("MCP_SERVER_HOST", DEFAULT_MCP_SERVER_HOST),
            mcp_server_port,

            log_level: or_default("LOG_LEVEL", DEFAULT_LOG_LEVEL),
        }
    }
}

impl Default for Settings {
    /// Settings with no credentials and every default applied.
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

fn redact(key: &Option<String>) -> &'static str {
    match key {
        Some(_) => "<redacted>",
        None => "<unset>",
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("openai_api_key", &redact(&self.openai_api_key))
            .field("openai_api_base", &self.openai_api_base)
            .field("openai_model", &self.openai_model)
            .field("openrouter_api_key", &redact(&self.openrouter_api_key))
            .field("openrouter_api_base", &self.openrouter_api_base)
            .field("openrouter_model", &self.openrouter_model)
            .field("anthropic_api_key", &redact(&self.anthropic_api_key))
            .field("anthropic_api_base", &self.anthropic_api_base)
            .field("anthropic_model", &self.anthropic_model)
            .field("mcp_server_host", &self.mcp_server_host)
            .field("mcp_server_port", &self.mcp_server_port)
            .field("log_level", &self.log_level)
            .finish()
    }
}
