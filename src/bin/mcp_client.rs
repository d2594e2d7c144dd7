//! Command-line invoker for the built-in tools.
//!
//! ```text
//! mcp_client calculator '2 + 3 * 4'
//! mcp_client current_time readable
//! mcp_client list_files src '*.rs'
//! mcp_client file_write notes.txt 'hello'
//! ```

use agentlab::tool_protocol::ToolRegistry;
use agentlab::tools::register_builtin_tools;
use agentlab::{McpClient, McpServer, Settings};
use clap::Parser;
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "mcp_client", version, about = "Call an agentlab tool from the shell")]
struct Cli {
    /// Tool to call; lists the available tools when omitted
    tool: Option<String>,

    /// Positional tool arguments
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

/// Map positional arguments onto a tool's named parameters.
fn tool_parameters(tool: &str, args: &[String]) -> Result<JsonValue, String> {
    let arg = |i: usize| args.get(i).cloned();
    let params = match tool {
        "calculator" => match arg(0) {
            Some(expression) => json!({ "expression": expression }),
            None => json!({}),
        },
        "current_time" => json!({ "format": arg(0).unwrap_or_else(|| "iso".to_string()) }),
        "file_read" => match arg(0) {
            Some(file_path) => json!({ "file_path": file_path }),
            None => json!({}),
        },
        "file_write" => match (arg(0), arg(1)) {
            (Some(file_path), Some(content)) => {
                json!({ "file_path": file_path, "content": content })
            }
            _ => return Err("file_write requires a file path and the content".to_string()),
        },
        "list_files" => json!({
            "directory": arg(0).unwrap_or_else(|| ".".to_string()),
            "pattern": arg(1).unwrap_or_else(|| "*".to_string()),
        }),
        _ => json!({}),
    };
    Ok(params)
}

async fn print_usage(client: &McpClient, settings: &Settings) {
    println!("🛠️  MCP Tool Client");
    println!("{}", "=".repeat(50));
    println!("Usage: mcp_client <tool_name> [parameters...]\n");
    println!(
        "{}",
        client
            .server()
            .banner(&settings.mcp_server_host, settings.mcp_server_port)
            .await
    );
    println!("\nExamples:");
    println!("  mcp_client calculator '2 + 3 * 4'");
    println!("  mcp_client current_time");
    println!("  mcp_client list_files");
    println!("  mcp_client file_read README.md");
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let settings = Settings::from_env();
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(settings.log_level.to_lowercase()),
    )
    .init();

    let cli = Cli::parse();

    let root = match std::env::current_dir() {
        Ok(root) => root,
        Err(err) => {
            println!("❌ Cannot determine the working directory: {}", err);
            return;
        }
    };
    let registry = Arc::new(ToolRegistry::new());
    register_builtin_tools(&registry, root).await;
    let client = McpClient::new(McpServer::new(registry));

    let Some(tool) = cli.tool else {
        print_usage(&client, &settings).await;
        return;
    };

    match tool_parameters(&tool, &cli.args) {
        Ok(parameters) => {
            let outcome = client.call_tool(&tool, Some(parameters)).await;
            println!("{}", McpClient::format_result(&outcome));
        }
        Err(message) => println!("❌ {}", message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_positional_mapping() {
        assert_eq!(
            tool_parameters("calculator", &args(&["1 + 1"])).unwrap(),
            json!({"expression": "1 + 1"})
        );
        assert_eq!(
            tool_parameters("current_time", &[]).unwrap(),
            json!({"format": "iso"})
        );
        assert_eq!(
            tool_parameters("list_files", &args(&["src"])).unwrap(),
            json!({"directory": "src", "pattern": "*"})
        );
        assert_eq!(
            tool_parameters("file_write", &args(&["a.txt", "hi"])).unwrap(),
            json!({"file_path": "a.txt", "content": "hi"})
        );
        assert_eq!(tool_parameters("unknown", &args(&["x"])).unwrap(), json!({}));
    }

    #[test]
    fn test_file_write_needs_two_arguments() {
        assert!(tool_parameters("file_write", &args(&["a.txt"])).is_err());
    }
}
