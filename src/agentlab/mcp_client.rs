//! Tool Client
//!
//! [`McpClient`] is the caller-side convenience over [`McpServer`]: it lists the available
//! tools, calls them from async code or from plain synchronous code, and renders outcomes for
//! humans.  [`ToolCallAgent`] builds on it to execute `TOOL_CALL:` requests embedded in model
//! output.
//!
//! ```rust
//! use agentlab::mcp_client::McpClient;
//! use agentlab::mcp_server::McpServer;
//! use agentlab::tool_protocol::ToolRegistry;
//! use agentlab::tools::register_builtin_tools;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let registry = Arc::new(ToolRegistry::new());
//! let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
//! runtime.block_on(register_builtin_tools(&registry, std::env::temp_dir()));
//! drop(runtime);
//!
//! let client = McpClient::new(McpServer::new(registry));
//! let outcome = client.call_tool_blocking("calculator", Some(json!({"expression": "6 * 7"})));
//! assert!(McpClient::format_result(&outcome).starts_with("✅ Success"));
//! ```

use crate::agentlab::mcp_server::McpServer;
use crate::agentlab::tool_protocol::{ToolInvocationResult, ToolRequest, ToolSchema};
use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeMap;

/// Marker that introduces a tool call inside model output.
pub const TOOL_CALL_MARKER: &str = "TOOL_CALL:";

#[derive(Clone)]
pub struct McpClient {
    server: McpServer,
}

impl McpClient {
    pub fn new(server: McpServer) -> Self {
        Self { server }
    }

    pub fn server(&self) -> &McpServer {
        &self.server
    }

    pub async fn get_available_tools(&self) -> BTreeMap<String, ToolSchema> {
        self.server.get_tools_schema().await
    }

    /// Call a tool; `None` parameters are sent as an empty object.
    pub async fn call_tool(
        &self,
        tool_name: &str,
        parameters: Option<JsonValue>,
    ) -> ToolInvocationResult {
        let parameters = parameters.unwrap_or_else(|| JsonValue::Object(Map::new()));
        self.server.call_tool(tool_name, parameters).await
    }

    /// Call a tool from synchronous code on a private current-thread runtime.
    ///
    /// Inside an existing tokio runtime this returns a `Failure` instead of blocking the
    /// runtime's thread.
    pub fn call_tool_blocking(
        &self,
        tool_name: &str,
        parameters: Option<JsonValue>,
    ) -> ToolInvocationResult {
        if tokio::runtime::Handle::try_current().is_ok() {
            return ToolInvocationResult::failure(
                "call_tool_blocking cannot be used from within an async runtime; use call_tool",
            );
        }

        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(err) => {
                return ToolInvocationResult::failure(format!(
                    "failed to start tool runtime: {}",
                    err
                ))
            }
        };
        runtime.block_on(self.call_tool(tool_name, parameters))
    }

    /// `✅ Success` plus pretty JSON, or `❌ Failed: <error>`.
    pub fn format_result(result: &ToolInvocationResult) -> String {
        match result {
            ToolInvocationResult::Success { result, .. } => {
                let pretty =
                    serde_json::to_string_pretty(result).unwrap_or_else(|_| result.to_string());
                format!("✅ Success\n{}", pretty)
            }
            ToolInvocationResult::Failure { error } => format!("❌ Failed: {}", error),
        }
    }
}

/// Agent-side bridge that executes tool calls written by a model.
///
/// A model asks for a tool by emitting
///
/// ```text
/// TOOL_CALL: {"tool_name": "calculator", "parameters": {"expression": "2 + 2"}}
/// ```
///
/// and [`ToolCallAgent::process_message`] swaps that request for the formatted outcome.
#[derive(Clone)]
pub struct ToolCallAgent {
    client: McpClient,
}

impl ToolCallAgent {
    pub fn new(client: McpClient) -> Self {
        Self { client }
    }

    /// One `- name: description` line per tool.
    pub async fn get_tools_description(&self) -> String {
        self.client
            .get_available_tools()
            .await
            .values()
            .map(|tool| format!("- {}: {}", tool.name, tool.description))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Instructions for a system prompt: the tool list and the call syntax.
    pub async fn system_prompt_section(&self) -> String {
        format!(
            "Available tools:\n{}\n\nTo use a tool, reply with:\n{} {{\"tool_name\": \"<name>\", \"parameters\": {{...}}}}",
            self.get_tools_description().await,
            TOOL_CALL_MARKER
        )
    }

    /// Invoke a tool and render the outcome for the conversation.
    pub async fn call_tool(&self, tool_name: &str, parameters: Option<JsonValue>) -> String {
        let outcome = self.client.call_tool(tool_name, parameters).await;
        McpClient::format_result(&outcome)
    }

    /// Execute the first `TOOL_CALL:` in `message`, if any.
    ///
    /// The marker and its JSON object are replaced by the formatted outcome; surrounding text
    /// is kept.  A request that cannot be parsed leaves the message intact and appends a
    /// parse-failure note.
    pub async fn process_message(&self, message: &str) -> String {
        let Some(marker) = message.find(TOOL_CALL_MARKER) else {
            return message.to_string();
        };
        let after_marker = &message[marker + TOOL_CALL_MARKER.len()..];
        let json_start = after_marker.len() - after_marker.trim_start().len();

        let mut stream =
            serde_json::Deserializer::from_str(&after_marker[json_start..]).into_iter::<ToolRequest>();
        let request = match stream.next() {
            Some(Ok(request)) => request,
            Some(Err(err)) => {
                log::warn!("ToolCallAgent: unparsable tool call: {}", err);
                return format!("{}\n❌ Failed to parse tool call: {}", message, err);
            }
            None => {
                return format!("{}\n❌ Failed to parse tool call: empty request", message);
            }
        };
        let rest = &after_marker[json_start + stream.byte_offset()..];

        log::info!("ToolCallAgent: executing {}", request.tool_name);
        let parameters = if request.parameters.is_null() {
            None
        } else {
            Some(request.parameters)
        };
        let rendered = self.call_tool(&request.tool_name, parameters).await;

        let before = &message[..marker];
        if before.is_empty() {
            format!("{}{}", rendered, rest)
        } else {
            format!("{}\n{}{}", before, rendered, rest)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agentlab::tool_protocol::{ToolError, ToolMetadata, ToolRegistry};
    use serde_json::json;
    use std::sync::Arc;

    async fn client() -> McpClient {
        let registry = Arc::new(ToolRegistry::new());
        registry
            .register_tool(
                ToolMetadata::new("double", "Double a number"),
                Arc::new(|params| {
                    let n = params["n"]
                        .as_i64()
                        .ok_or_else(|| ToolError::InvalidParameters("n is required".into()))?;
                    Ok(json!({"doubled": n * 2}))
                }),
            )
            .await;
        registry
            .register_tool(
                ToolMetadata::new("params_echo", "Echo the parameter object"),
                Arc::new(|params| Ok(params)),
            )
            .await;
        McpClient::new(McpServer::new(registry))
    }

    #[tokio::test]
    async fn test_absent_parameters_become_empty_object() {
        let client = client().await;
        let outcome = client.call_tool("params_echo", None).await;
        assert_eq!(outcome.result(), Some(&json!({})));
    }

    #[test]
    fn test_format_result() {
        let ok = ToolInvocationResult::success(json!({"a": 1}));
        assert_eq!(McpClient::format_result(&ok), "✅ Success\n{\n  \"a\": 1\n}");

        let failed = ToolInvocationResult::failure("Tool 'x' not found");
        assert_eq!(
            McpClient::format_result(&failed),
            "❌ Failed: Tool 'x' not found"
        );
    }

    #[tokio::test]
    async fn test_blocking_call_inside_runtime_is_failure() {
        let client = client().await;
        let outcome = client.call_tool_blocking("double", Some(json!({"n": 2})));
        assert!(outcome.error().unwrap().contains("async runtime"));
    }

    #[test]
    fn test_blocking_call_outside_runtime() {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let client = runtime.block_on(client());
        drop(runtime);

        let outcome = client.call_tool_blocking("double", Some(json!({"n": 21})));
        assert_eq!(outcome.result(), Some(&json!({"doubled": 42})));
    }

    #[tokio::test]
    async fn test_tools_description() {
        let agent = ToolCallAgent::new(client().await);
        assert_eq!(
            agent.get_tools_description().await,
            "- double: Double a number\n- params_echo: Echo the parameter object"
        );
        assert!(agent
            .system_prompt_section()
            .await
            .contains("TOOL_CALL: {\"tool_name\""));
    }

    #[tokio::test]
    async fn test_process_message_replaces_tool_call() {
        let agent = ToolCallAgent::new(client().await);
        let message = "Let me compute.\nTOOL_CALL: {\"tool_name\": \"double\", \"parameters\": {\"n\": 4}}\nDone.";
        let processed = agent.process_message(message).await;
        assert!(processed.starts_with("Let me compute.\n\n✅ Success"));
        assert!(processed.contains("\"doubled\": 8"));
        assert!(processed.ends_with("\nDone."));
        assert!(!processed.contains(TOOL_CALL_MARKER));
    }

    #[tokio::test]
    async fn test_process_message_with_leading_tool_call() {
        let agent = ToolCallAgent::new(client().await);
        let processed = agent
            .process_message("TOOL_CALL: {\"tool_name\": \"double\", \"parameters\": {\"n\": 5}} ok")
            .await;
        assert!(processed.starts_with("✅ Success\n"), "{:?}", processed);
        assert!(processed.contains("\"doubled\": 10"));
        assert!(processed.ends_with(" ok"));
    }

    #[tokio::test]
    async fn test_process_message_passthrough_and_parse_failure() {
        let agent = ToolCallAgent::new(client().await);
        assert_eq!(agent.process_message("plain text").await, "plain text");

        let broken = "TOOL_CALL: {not json";
        let processed = agent.process_message(broken).await;
        assert!(processed.starts_with(broken));
        assert!(processed.contains("Failed to parse tool call"));

        let failed = agent
            .process_message("TOOL_CALL: {\"tool_name\": \"missing\"}")
            .await;
        assert_eq!(failed, "❌ Failed: Tool 'missing' not found");
    }
}
