//! Tool data model and registry.
//!
//! A [`Tool`] couples [`ToolMetadata`] (name, description, parameter contract) with a
//! [`ToolImplementation`].  Implementations are either blocking closures or closures that
//! return a boxed future; the variant is fixed when the tool is registered, so the
//! dispatcher never has to inspect the callable at call time.
//!
//! # Architecture
//!
//! ```text
//! register_builtin_tools / user code → ToolRegistry → McpServer (dispatch) → McpClient
//! ```
//!
//! # Example
//!
//! ```rust
//! use agentlab::tool_protocol::{ToolMetadata, ToolParameter, ToolParameterType, ToolRegistry};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let registry = ToolRegistry::new();
//! registry
//!     .register_tool(
//!         ToolMetadata::new("echo", "Return the input text").with_parameter(
//!             ToolParameter::new("text", ToolParameterType::String)
//!                 .with_description("Text to echo")
//!                 .required(),
//!         ),
//!         Arc::new(|params| Ok(json!({ "text": params["text"] }))),
//!     )
//!     .await;
//!
//! let schema = registry.get_schema().await;
//! assert_eq!(schema["echo"].parameters["required"], json!(["text"]));
//! # }
//! ```

use chrono::Local;
use futures_util::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as JsonValue};
use std::collections::{BTreeMap, HashMap};
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Timestamp layout used in success envelopes.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Defines the type of a tool parameter
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ToolParameterType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
}

impl ToolParameterType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolParameterType::String => "string",
            ToolParameterType::Number => "number",
            ToolParameterType::Integer => "integer",
            ToolParameterType::Boolean => "boolean",
            ToolParameterType::Array => "array",
            ToolParameterType::Object => "object",
        }
    }

    /// Whether `value` has this JSON type.  Integers are also accepted as numbers.
    pub fn accepts(&self, value: &JsonValue) -> bool {
        match self {
            ToolParameterType::String => value.is_string(),
            ToolParameterType::Number => value.is_number(),
            ToolParameterType::Integer => value.is_i64() || value.is_u64(),
            ToolParameterType::Boolean => value.is_boolean(),
            ToolParameterType::Array => value.is_array(),
            ToolParameterType::Object => value.is_object(),
        }
    }
}

/// Defines a parameter for a tool
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolParameter {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ToolParameterType,
    pub description: Option<String>,
    pub required: bool,
    pub default: Option<JsonValue>,
}

impl ToolParameter {
    pub fn new(name: impl Into<String>, param_type: ToolParameterType) -> Self {
        Self {
            name: name.into(),
            param_type,
            description: None,
            required: false,
            default: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Default the tool body applies when the caller omits the parameter.
    pub fn with_default(mut self, default: JsonValue) -> Self {
        self.default = Some(default);
        self
    }
}

/// Name, description and parameter contract of a tool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolMetadata {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ToolParameter>,
    /// A hand written JSON schema that replaces the one derived from `parameters`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_schema: Option<JsonValue>,
}

impl ToolMetadata {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
            raw_schema: None,
        }
    }

    pub fn with_parameter(mut self, param: ToolParameter) -> Self {
        self.parameters.push(param);
        self
    }

    pub fn with_raw_schema(mut self, schema: JsonValue) -> Self {
        self.raw_schema = Some(schema);
        self
    }

    /// Render the parameter contract as a JSON-Schema object.
    ///
    /// ```rust
    /// use agentlab::tool_protocol::{ToolMetadata, ToolParameter, ToolParameterType};
    /// use serde_json::json;
    ///
    /// let meta = ToolMetadata::new("current_time", "Get the current time").with_parameter(
    ///     ToolParameter::new("format", ToolParameterType::String).with_default(json!("iso")),
    /// );
    /// assert_eq!(
    ///     meta.to_json_schema(),
    ///     json!({
    ///         "type": "object",
    ///         "properties": {"format": {"type": "string", "default": "iso"}},
    ///         "required": []
    ///     })
    /// );
    /// ```
    pub fn to_json_schema(&self) -> JsonValue {
        if let Some(schema) = &self.raw_schema {
            return schema.clone();
        }

        let mut properties = Map::new();
        for param in &self.parameters {
            let mut property = Map::new();
            property.insert("type".into(), json!(param.param_type.as_str()));
            if let Some(description) = &param.description {
                property.insert("description".into(), json!(description));
            }
            if let Some(default) = &param.default {
                property.insert("default".into(), default.clone());
            }
            properties.insert(param.name.clone(), JsonValue::Object(property));
        }

        let required: Vec<&str> = self
            .parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Check required parameters and primitive types against the declared contract.
    ///
    /// Only parameters declared in `parameters` are checked; unknown keys pass through.
    pub fn validate_parameters(&self, parameters: &JsonValue) -> Result<(), ToolError> {
        let empty = Map::new();
        let object = match parameters {
            JsonValue::Object(map) => map,
            JsonValue::Null => &empty,
            other => {
                return Err(ToolError::InvalidParameters(format!(
                    "parameters must be an object, got {}",
                    other
                )))
            }
        };

        for param in &self.parameters {
            match object.get(&param.name) {
                None | Some(JsonValue::Null) if param.required => {
                    return Err(ToolError::InvalidParameters(format!(
                        "missing required parameter '{}'",
                        param.name
                    )));
                }
                Some(value) if !value.is_null() && !param.param_type.accepts(value) => {
                    return Err(ToolError::InvalidParameters(format!(
                        "parameter '{}' must be of type {}",
                        param.name,
                        param.param_type.as_str()
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// Error types for tool operations
#[derive(Debug, Clone, PartialEq)]
pub enum ToolError {
    /// Requested tool is not registered.
    NotFound(String),
    /// The provided JSON parameters failed validation or deserialization.
    InvalidParameters(String),
    /// The tool body reported a failure.
    ExecutionFailed(String),
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolError::NotFound(name) => write!(f, "Tool '{}' not found", name),
            ToolError::InvalidParameters(msg) => write!(f, "Invalid parameters: {}", msg),
            ToolError::ExecutionFailed(msg) => write!(f, "{}", msg),
        }
    }
}

impl Error for ToolError {}

/// Deserialize a tool's parameter object into a typed struct.
///
/// A `null` parameter value is treated as an empty object so tools with all-default
/// parameters can be called without arguments.
pub fn parse_params<T: DeserializeOwned>(parameters: JsonValue) -> Result<T, ToolError> {
    let parameters = if parameters.is_null() {
        JsonValue::Object(Map::new())
    } else {
        parameters
    };
    serde_json::from_value(parameters).map_err(|e| ToolError::InvalidParameters(e.to_string()))
}

/// Blocking tool body.
pub type ToolFunction = Arc<dyn Fn(JsonValue) -> Result<JsonValue, ToolError> + Send + Sync>;

/// Suspending tool body.
pub type AsyncToolFunction =
    Arc<dyn Fn(JsonValue) -> BoxFuture<'static, Result<JsonValue, ToolError>> + Send + Sync>;

/// How a tool body is called, decided once at registration.
#[derive(Clone)]
pub enum ToolImplementation {
    Blocking(ToolFunction),
    Suspending(AsyncToolFunction),
}

impl ToolImplementation {
    pub fn is_suspending(&self) -> bool {
        matches!(self, ToolImplementation::Suspending(_))
    }
}

impl fmt::Debug for ToolImplementation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolImplementation::Blocking(_) => f.write_str("Blocking(..)"),
            ToolImplementation::Suspending(_) => f.write_str("Suspending(..)"),
        }
    }
}

/// A registered tool.
#[derive(Debug, Clone)]
pub struct Tool {
    metadata: ToolMetadata,
    implementation: ToolImplementation,
}

impl Tool {
    pub fn new(metadata: ToolMetadata, implementation: ToolImplementation) -> Self {
        Self {
            metadata,
            implementation,
        }
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    pub fn implementation(&self) -> &ToolImplementation {
        &self.implementation
    }
}

/// Manifest entry handed to an LLM.  Carries no callable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: JsonValue,
}

impl From<&ToolMetadata> for ToolSchema {
    fn from(metadata: &ToolMetadata) -> Self {
        ToolSchema {
            name: metadata.name.clone(),
            description: metadata.description.clone(),
            parameters: metadata.to_json_schema(),
        }
    }
}

/// Wire form of a tool call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolRequest {
    pub tool_name: String,
    #[serde(default)]
    pub parameters: JsonValue,
}

impl ToolRequest {
    pub fn new(tool_name: impl Into<String>, parameters: JsonValue) -> Self {
        Self {
            tool_name: tool_name.into(),
            parameters,
        }
    }
}

/// Wire form of a tool outcome: `{success, result, error, timestamp}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolEnvelope {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// Outcome of a dispatched tool call.  Failures are data, never errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "ToolEnvelope", from = "ToolEnvelope")]
pub enum ToolInvocationResult {
    Success { result: JsonValue, timestamp: String },
    Failure { error: String },
}

impl ToolInvocationResult {
    /// Wrap `result` with the current local time.
    pub fn success(result: JsonValue) -> Self {
        ToolInvocationResult::Success {
            result,
            timestamp: Local::now().format(TIMESTAMP_FORMAT).to_string(),
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        ToolInvocationResult::Failure {
            error: error.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ToolInvocationResult::Success { .. })
    }

    pub fn result(&self) -> Option<&JsonValue> {
        match self {
            ToolInvocationResult::Success { result, .. } => Some(result),
            ToolInvocationResult::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ToolInvocationResult::Success { .. } => None,
            ToolInvocationResult::Failure { error } => Some(error),
        }
    }
}

impl From<ToolInvocationResult> for ToolEnvelope {
    fn from(outcome: ToolInvocationResult) -> Self {
        match outcome {
            ToolInvocationResult::Success { result, timestamp } => ToolEnvelope {
                success: true,
                result: Some(result),
                error: None,
                timestamp: Some(timestamp),
            },
            ToolInvocationResult::Failure { error } => ToolEnvelope {
                success: false,
                result: None,
                error: Some(error),
                timestamp: None,
            },
        }
    }
}

impl From<ToolEnvelope> for ToolInvocationResult {
    fn from(envelope: ToolEnvelope) -> Self {
        if envelope.success {
            ToolInvocationResult::Success {
                result: envelope.result.unwrap_or(JsonValue::Null),
                timestamp: envelope.timestamp.unwrap_or_default(),
            }
        } else {
            ToolInvocationResult::Failure {
                error: envelope
                    .error
                    .unwrap_or_else(|| "unknown error".to_string()),
            }
        }
    }
}

/// Name-keyed store of tools.
///
/// Registration replaces any previous tool with the same name.  Lookups and registrations
/// are serialized through a readers-writer lock so a reader never observes a half-built
/// entry.
#[derive(Default)]
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<Tool>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a tool.
    pub async fn register(&self, metadata: ToolMetadata, implementation: ToolImplementation) {
        let name = metadata.name.clone();
        log::debug!(
            "ToolRegistry::register(...): {} ({})",
            name,
            if implementation.is_suspending() {
                "suspending"
            } else {
                "blocking"
            }
        );
        let tool = Arc::new(Tool::new(metadata, implementation));
        if self.tools.write().await.insert(name.clone(), tool).is_some() {
            log::debug!("ToolRegistry::register(...): replaced existing tool {}", name);
        }
    }

    /// Register a blocking tool body.
    pub async fn register_tool(&self, metadata: ToolMetadata, function: ToolFunction) {
        self.register(metadata, ToolImplementation::Blocking(function))
            .await
    }

    /// Register a suspending tool body.
    pub async fn register_async_tool(&self, metadata: ToolMetadata, function: AsyncToolFunction) {
        self.register(metadata, ToolImplementation::Suspending(function))
            .await
    }

    pub async fn unregister_tool(&self, name: &str) -> bool {
        self.tools.write().await.remove(name).is_some()
    }

    pub async fn lookup(&self, name: &str) -> Option<Arc<Tool>> {
        self.tools.read().await.get(name).cloned()
    }

    pub async fn has_tool(&self, name: &str) -> bool {
        self.tools.read().await.contains_key(name)
    }

    pub async fn tool_count(&self) -> usize {
        self.tools.read().await.len()
    }

    /// Registered names in sorted order.
    pub async fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Metadata of every tool, sorted by name.
    pub async fn list_tools(&self) -> Vec<ToolMetadata> {
        let mut tools: Vec<ToolMetadata> = self
            .tools
            .read()
            .await
            .values()
            .map(|t| t.metadata().clone())
            .collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        tools
    }

    /// Capability manifest: name → `{name, description, parameters}`.
    pub async fn get_schema(&self) -> BTreeMap<String, ToolSchema> {
        self.tools
            .read()
            .await
            .iter()
            .map(|(name, tool)| (name.clone(), ToolSchema::from(tool.metadata())))
            .collect()
    }
}
