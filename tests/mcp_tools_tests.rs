//! Dispatcher-level tests for the built-in tools.
//!
//! Every call goes through `McpServer::call_tool` (or the `McpClient` on top of it) against a
//! registry rooted in a fresh temporary directory.

use agentlab::tool_protocol::{ToolInvocationResult, ToolMetadata, ToolRegistry, ToolRequest};
use agentlab::tools::register_builtin_tools;
use agentlab::{McpClient, McpServer, ToolCallAgent};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;

async fn setup() -> (TempDir, McpServer) {
    let dir = TempDir::new().unwrap();
    let registry = Arc::new(ToolRegistry::new());
    register_builtin_tools(&registry, dir.path().to_path_buf()).await;
    (dir, McpServer::new(registry))
}

fn result_of(outcome: &ToolInvocationResult) -> &Value {
    outcome
        .result()
        .unwrap_or_else(|| panic!("expected success, got {:?}", outcome))
}

#[tokio::test]
async fn test_nonexistent_tool_reports_name() {
    let (_dir, server) = setup().await;
    let outcome = server.call_tool("nonexistent_tool", json!({})).await;
    assert!(!outcome.is_success());
    assert!(outcome.error().unwrap().contains("nonexistent_tool"));
}

#[tokio::test]
async fn test_calculator_integer_result() {
    let (_dir, server) = setup().await;
    let outcome = server
        .call_tool("calculator", json!({"expression": "2 + 3 * 4"}))
        .await;
    assert_eq!(
        result_of(&outcome),
        &json!({"expression": "2 + 3 * 4", "result": 14, "type": "int"})
    );
}

#[tokio::test]
async fn test_calculator_power_is_exact_and_right_associative() {
    let (_dir, server) = setup().await;
    let outcome = server
        .call_tool("calculator", json!({"expression": "2 ** 3 ** 2"}))
        .await;
    assert_eq!(result_of(&outcome)["result"], 512);

    let outcome = server
        .call_tool("calculator", json!({"expression": "3 ** 39"}))
        .await;
    let result = result_of(&outcome);
    assert_eq!(result["result"], json!(4052555153018976267i64));
    assert_eq!(result["type"], "int");
}

#[tokio::test]
async fn test_calculator_float_result() {
    let (_dir, server) = setup().await;
    let outcome = server
        .call_tool("calculator", json!({"expression": "(1 + 2) / 4"}))
        .await;
    let result = result_of(&outcome);
    assert_eq!(result["result"], 0.75);
    assert_eq!(result["type"], "float");
}

#[tokio::test]
async fn test_calculator_rejects_code() {
    let (_dir, server) = setup().await;
    for expression in ["import os", "__import__('os').system('ls')", "open('x')"] {
        let outcome = server
            .call_tool("calculator", json!({ "expression": expression }))
            .await;
        assert!(!outcome.is_success(), "{} should be rejected", expression);
        assert!(outcome.error().unwrap().contains("disallowed characters"));
    }
}

#[tokio::test]
async fn test_calculator_missing_expression_is_failure() {
    let (_dir, server) = setup().await;
    let outcome = server.call_tool("calculator", json!({"expr": "1"})).await;
    assert!(outcome
        .error()
        .unwrap()
        .starts_with("Invalid parameters: missing field `expression`"));
}

#[tokio::test]
async fn test_file_read_is_confined() {
    let (dir, server) = setup().await;
    std::fs::write(dir.path().join("passwd"), "root:x:0:0").unwrap();

    for path in ["../etc/passwd", "/etc/passwd", "sub/../../passwd"] {
        let outcome = server.call_tool("file_read", json!({ "file_path": path })).await;
        assert!(!outcome.is_success(), "{} should be rejected", path);
    }
    let outcome = server
        .call_tool("file_read", json!({"file_path": "passwd"}))
        .await;
    assert_eq!(result_of(&outcome)["content"], "root:x:0:0");
}

#[tokio::test]
async fn test_list_files_without_matches_is_success() {
    let (dir, server) = setup().await;
    std::fs::write(dir.path().join("readme.md"), "# hi").unwrap();

    let outcome = server
        .call_tool(
            "list_files",
            json!({"directory": ".", "pattern": "*.nonexistent"}),
        )
        .await;
    let result = result_of(&outcome);
    assert_eq!(result["files"], json!([]));
    assert_eq!(result["count"], 0);
    assert_eq!(result["pattern"], "*.nonexistent");
}

#[tokio::test]
async fn test_write_then_read_round_trip() {
    let (dir, server) = setup().await;
    let content = "line one\nline two\n\nline four\n";

    let written = server
        .call_tool(
            "file_write",
            json!({"file_path": "reports/summary.txt", "content": content}),
        )
        .await;
    assert_eq!(result_of(&written)["lines_written"], 4);
    assert!(dir.path().join("reports/summary.txt").is_file());

    let read = server
        .call_tool("file_read", json!({"file_path": "reports/summary.txt"}))
        .await;
    let read = result_of(&read);
    assert_eq!(read["content"], content);
    assert_eq!(read["lines"], content.lines().count());

    let listed = server
        .call_tool("list_files", json!({"directory": "reports"}))
        .await;
    let listed = result_of(&listed);
    assert_eq!(listed["count"], 1);
    assert_eq!(listed["files"][0]["name"], "summary.txt");
    assert_eq!(listed["files"][0]["size"], content.len());
    assert!(listed["files"][0]["modified"].is_string());
}

#[tokio::test]
async fn test_current_time_formats() {
    let (_dir, server) = setup().await;

    let outcome = server.call_tool("current_time", json!({})).await;
    let result = result_of(&outcome);
    assert_eq!(result["format"], "iso");
    assert!(result["timezone"].is_string());

    let outcome = server
        .call_tool("current_time", json!({"format": "%Y"}))
        .await;
    let year = result_of(&outcome)["current_time"].as_str().unwrap().to_string();
    assert_eq!(year.len(), 4);
    assert!(year.parse::<u32>().is_ok());
}

#[tokio::test]
async fn test_registration_overrides_builtin() {
    let (_dir, server) = setup().await;
    server
        .registry()
        .register_tool(
            ToolMetadata::new("calculator", "Always answers 42"),
            Arc::new(|_| Ok(json!(42))),
        )
        .await;

    assert_eq!(server.registry().tool_count().await, 5);
    let schema = server.get_tools_schema().await;
    assert_eq!(schema["calculator"].description, "Always answers 42");

    let outcome = server
        .call_tool("calculator", json!({"expression": "1 + 1"}))
        .await;
    assert_eq!(result_of(&outcome), &json!(42));
}

#[tokio::test]
async fn test_manifest_never_exposes_implementations() {
    let (_dir, server) = setup().await;
    let manifest = serde_json::to_value(server.get_tools_schema().await).unwrap();
    for (name, entry) in manifest.as_object().unwrap() {
        let keys: Vec<&String> = entry.as_object().unwrap().keys().collect();
        assert_eq!(keys.len(), 3, "{}", name);
        assert_eq!(entry["name"], name.as_str());
        assert_eq!(entry["parameters"]["type"], "object");
    }
}

#[tokio::test]
async fn test_wire_envelope() {
    let (_dir, server) = setup().await;
    let request: ToolRequest = serde_json::from_value(json!({
        "tool_name": "calculator",
        "parameters": {"expression": "10 - 4"}
    }))
    .unwrap();
    let envelope = serde_json::to_value(server.handle_request(request).await).unwrap();
    assert_eq!(envelope["success"], true);
    assert_eq!(envelope["result"]["result"], 6);
    assert!(envelope["timestamp"].is_string());
    assert!(envelope.get("error").is_none());

    let reply: Value = serde_json::from_str(
        &server
            .handle_json(r#"{"tool_name": "file_read", "parameters": {"file_path": "../x"}}"#)
            .await,
    )
    .unwrap();
    assert_eq!(reply["success"], false);
    assert!(reply.get("result").is_none());
}

#[tokio::test]
async fn test_client_and_agent_bridge() {
    let (_dir, server) = setup().await;
    let client = McpClient::new(server);

    let tools = client.get_available_tools().await;
    assert_eq!(tools.len(), 5);

    let outcome = client.call_tool("list_files", None).await;
    assert_eq!(result_of(&outcome)["directory"], ".");

    let agent = ToolCallAgent::new(client);
    let description = agent.get_tools_description().await;
    assert!(description.contains("- calculator: "));
    assert_eq!(description.lines().count(), 5);

    let reply = agent
        .process_message(
            "Checking.\nTOOL_CALL: {\"tool_name\": \"calculator\", \"parameters\": {\"expression\": \"6 * 7\"}}",
        )
        .await;
    assert!(reply.starts_with("Checking.\n\n✅ Success"));
    assert!(reply.contains("\"result\": 42"));
}
