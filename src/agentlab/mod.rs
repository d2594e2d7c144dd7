// src/agentlab/mod.rs

pub mod client_wrapper;
pub mod clients;
pub mod config;
pub mod llm_client;
pub mod mcp_client;
pub mod mcp_server;
pub mod tool_protocol;
pub mod tools;

pub use llm_client::LlmClient;
