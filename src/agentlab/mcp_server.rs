//! Tool Dispatcher
//!
//! [`McpServer`] looks tools up in a shared [`ToolRegistry`] and invokes them, turning every
//! outcome into a [`ToolInvocationResult`].  Nothing a tool does can unwind through
//! [`McpServer::call_tool`]: unknown names, parameter errors, tool errors and panics all come
//! back as `Failure`.
//!
//! # Architecture
//!
//! ```text
//! ToolRequest / (name, params)
//!         ↓
//! McpServer::call_tool ── lookup ──> ToolRegistry
//!         ↓
//! Blocking body (called inline) | Suspending body (awaited)
//!         ↓
//! ToolInvocationResult { Success{result, timestamp} | Failure{error} }
//! ```
//!
//! # Example
//!
//! ```rust
//! use agentlab::mcp_server::McpServer;
//! use agentlab::tool_protocol::ToolRegistry;
//! use agentlab::tools::register_builtin_tools;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let registry = Arc::new(ToolRegistry::new());
//! register_builtin_tools(&registry, std::env::temp_dir()).await;
//!
//! let server = McpServer::new(registry);
//! let outcome = server
//!     .call_tool("calculator", json!({"expression": "2 + 3 * 4"}))
//!     .await;
//! assert_eq!(outcome.result().unwrap()["result"], 14);
//! # }
//! ```

use crate::agentlab::tool_protocol::{
    ToolEnvelope, ToolError, ToolImplementation, ToolInvocationResult, ToolRegistry, ToolRequest,
    ToolSchema,
};
use futures_util::FutureExt;
use serde_json::Value as JsonValue;
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

pub const SERVER_VERSION: &str = "1.0.0";

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("tool panicked: {}", msg)
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("tool panicked: {}", msg)
    } else {
        "tool panicked".to_string()
    }
}

/// Dispatches tool calls against a registry it does not own.
///
/// Cloning is cheap; clones share the registry.
#[derive(Clone)]
pub struct McpServer {
    registry: Arc<ToolRegistry>,
    validate_parameters: bool,
}

impl McpServer {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            validate_parameters: false,
        }
    }

    /// Check parameters against each tool's declared contract before invoking it.
    ///
    /// Off by default: declared schemas are advisory.
    pub fn with_parameter_validation(mut self, enabled: bool) -> Self {
        self.validate_parameters = enabled;
        self
    }

    pub fn version(&self) -> &'static str {
        SERVER_VERSION
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// The capability manifest of the underlying registry.
    pub async fn get_tools_schema(&self) -> BTreeMap<String, ToolSchema> {
        self.registry.get_schema().await
    }

    /// Startup banner: the advertised address followed by one line per registered tool.
    pub async fn banner(&self, host: &str, port: u16) -> String {
        let mut lines = vec![
            format!("🚀 Tool server v{} on {}:{}", SERVER_VERSION, host, port),
            "📋 Available tools:".to_string(),
        ];
        for tool in self.registry.list_tools().await {
            lines.push(format!("  - {}: {}", tool.name, tool.description));
        }
        lines.join("\n")
    }

    /// Invoke `tool_name` with `parameters`.
    pub async fn call_tool(&self, tool_name: &str, parameters: JsonValue) -> ToolInvocationResult {
        match self.dispatch(tool_name, parameters).await {
            Ok(result) => ToolInvocationResult::success(result),
            Err(err) => {
                log::error!("Error calling tool {}: {}", tool_name, err);
                ToolInvocationResult::failure(err.to_string())
            }
        }
    }

    async fn dispatch(&self, tool_name: &str, parameters: JsonValue) -> Result<JsonValue, ToolError> {
        let tool = self
            .registry
            .lookup(tool_name)
            .await
            .ok_or_else(|| ToolError::NotFound(tool_name.to_string()))?;

        if self.validate_parameters {
            tool.metadata().validate_parameters(&parameters)?;
        }

        log::debug!("McpServer::call_tool(...): invoking {}", tool_name);
        match tool.implementation() {
            ToolImplementation::Blocking(function) => {
                let function = function.clone();
                std::panic::catch_unwind(AssertUnwindSafe(move || function(parameters)))
                    .map_err(|payload| ToolError::ExecutionFailed(panic_message(payload)))?
            }
            ToolImplementation::Suspending(function) => {
                let future = AssertUnwindSafe(function(parameters)).catch_unwind();
                future
                    .await
                    .map_err(|payload| ToolError::ExecutionFailed(panic_message(payload)))?
            }
        }
    }

    /// Serve a wire-format request.
    pub async fn handle_request(&self, request: ToolRequest) -> ToolEnvelope {
        self.call_tool(&request.tool_name, request.parameters)
            .await
            .into()
    }

    /// Serve a raw JSON request and answer with a JSON envelope.
    ///
    /// Malformed requests are answered with a failure envelope.
    pub async fn handle_json(&self, raw: &str) -> String {
        let envelope = match serde_json::from_str::<ToolRequest>(raw) {
            Ok(request) => self.handle_request(request).await,
            Err(err) => ToolInvocationResult::failure(format!("Invalid request: {}", err)).into(),
        };
        serde_json::to_string(&envelope).unwrap_or_else(|err| {
            format!(
                "{{\"success\":false,\"error\":\"failed to encode response: {}\"}}",
                err
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agentlab::tool_protocol::{ToolMetadata, ToolParameter, ToolParameterType};
    use serde_json::json;

    fn explode(_: JsonValue) -> Result<JsonValue, ToolError> {
        panic!("boom")
    }

    async fn explode_later() -> Result<JsonValue, ToolError> {
        tokio::task::yield_now().await;
        panic!("async boom")
    }

    async fn server_with_test_tools() -> McpServer {
        let registry = Arc::new(ToolRegistry::new());
        registry
            .register_tool(
                ToolMetadata::new("add", "Add two integers")
                    .with_parameter(ToolParameter::new("a", ToolParameterType::Integer).required())
                    .with_parameter(ToolParameter::new("b", ToolParameterType::Integer).required()),
                Arc::new(|params| {
                    let a = params["a"]
                        .as_i64()
                        .ok_or_else(|| ToolError::InvalidParameters("a must be an integer".into()))?;
                    let b = params["b"]
                        .as_i64()
                        .ok_or_else(|| ToolError::InvalidParameters("b must be an integer".into()))?;
                    Ok(json!(a + b))
                }),
            )
            .await;
        registry
            .register_async_tool(
                ToolMetadata::new("sleepy_echo", "Echo after yielding"),
                Arc::new(|params| {
                    async move {
                        tokio::task::yield_now().await;
                        Ok::<_, ToolError>(params)
                    }
                    .boxed()
                }),
            )
            .await;
        registry
            .register_tool(
                ToolMetadata::new("explode", "Always panics"),
                Arc::new(explode),
            )
            .await;
        registry
            .register_async_tool(
                ToolMetadata::new("explode_async", "Panics while suspended"),
                Arc::new(|_| explode_later().boxed()),
            )
            .await;
        McpServer::new(registry)
    }

    #[tokio::test]
    async fn test_unknown_tool_is_failure() {
        let server = server_with_test_tools().await;
        let outcome = server.call_tool("nonexistent_tool", json!({})).await;
        assert_eq!(
            outcome,
            ToolInvocationResult::failure("Tool 'nonexistent_tool' not found")
        );
    }

    #[tokio::test]
    async fn test_blocking_and_suspending_share_contract() {
        let server = server_with_test_tools().await;

        let sum = server.call_tool("add", json!({"a": 2, "b": 5})).await;
        assert_eq!(sum.result(), Some(&json!(7)));

        let echo = server.call_tool("sleepy_echo", json!({"x": [1, 2]})).await;
        assert!(echo.is_success());
        assert_eq!(echo.result(), Some(&json!({"x": [1, 2]})));
        match echo {
            ToolInvocationResult::Success { timestamp, .. } => assert!(!timestamp.is_empty()),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_tool_errors_and_panics_become_failures() {
        let server = server_with_test_tools().await;

        let bad = server.call_tool("add", json!({"a": "two"})).await;
        assert_eq!(
            bad.error(),
            Some("Invalid parameters: a must be an integer")
        );

        let panicked = server.call_tool("explode", json!({})).await;
        assert_eq!(panicked.error(), Some("tool panicked: boom"));

        let panicked = server.call_tool("explode_async", json!({})).await;
        assert_eq!(panicked.error(), Some("tool panicked: async boom"));

        // The server keeps working after a panic.
        assert!(server.call_tool("add", json!({"a": 1, "b": 1})).await.is_success());
    }

    #[tokio::test]
    async fn test_parameter_validation_is_opt_in() {
        let server = server_with_test_tools().await;
        let strict = server.clone().with_parameter_validation(true);

        let lenient = server.call_tool("add", json!({"a": 1})).await;
        assert_eq!(lenient.error(), Some("Invalid parameters: b must be an integer"));

        let rejected = strict.call_tool("add", json!({"a": 1})).await;
        assert_eq!(
            rejected.error(),
            Some("Invalid parameters: missing required parameter 'b'")
        );
    }

    #[tokio::test]
    async fn test_banner_lists_address_and_tools() {
        let server = server_with_test_tools().await;
        let banner = server.banner("localhost", 3000).await;
        let lines: Vec<&str> = banner.lines().collect();
        assert_eq!(lines[0], "🚀 Tool server v1.0.0 on localhost:3000");
        assert_eq!(lines.len(), 2 + 4);
        assert_eq!(lines[2], "  - add: Add two integers");
        assert_eq!(lines[5], "  - sleepy_echo: Echo after yielding");
    }

    #[tokio::test]
    async fn test_handle_json() {
        let server = server_with_test_tools().await;
        assert_eq!(server.version(), "1.0.0");

        let reply = server
            .handle_json(r#"{"tool_name": "add", "parameters": {"a": 40, "b": 2}}"#)
            .await;
        let reply: JsonValue = serde_json::from_str(&reply).unwrap();
        assert_eq!(reply["success"], true);
        assert_eq!(reply["result"], 42);

        let reply = server.handle_json("not json").await;
        let reply: JsonValue = serde_json::from_str(&reply).unwrap();
        assert_eq!(reply["success"], false);
        assert!(reply["error"].as_str().unwrap().starts_with("Invalid request"));
    }
}
