//! Plumbing shared by the provider clients: the pooled HTTP client, credential resolution
//! and the JSON request/response round trip with vendor error extraction.

use crate::agentlab::client_wrapper::{LlmError, Message};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::time::Duration;

lazy_static::lazy_static! {
    /// One connection pool for every vendor, built on first use.
    static ref SHARED_HTTP_CLIENT: Client = Client::builder()
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Some(Duration::from_secs(90)))
        .tcp_keepalive(Some(Duration::from_secs(60)))
        .connect_timeout(Duration::from_secs(30))
        .build()
        .unwrap_or_else(|err| {
            log::warn!(
                "agentlab::clients::common: falling back to a default HTTP client: {}",
                err
            );
            Client::new()
        });
}

/// Borrow the shared HTTP client.  Cloning a `reqwest::Client` only clones a handle to the
/// same pool.
pub fn get_shared_http_client() -> &'static Client {
    &SHARED_HTTP_CLIENT
}

/// Pick the explicit key if one was given, otherwise the configured one.
///
/// Blank keys count as missing.
pub fn resolve_api_key(
    explicit: Option<&str>,
    configured: Option<&str>,
    provider: &str,
) -> Result<String, LlmError> {
    explicit
        .filter(|k| !k.trim().is_empty())
        .or_else(|| configured.filter(|k| !k.trim().is_empty()))
        .map(str::to_string)
        .ok_or_else(|| LlmError::Configuration(format!("{} API key is required", provider)))
}

/// Join a base URL and an endpoint path without doubling the slash.
pub fn endpoint(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

pub fn ensure_messages(messages: &[Message]) -> Result<(), LlmError> {
    if messages.is_empty() {
        return Err(LlmError::InvalidRequest(
            "at least one message is required".to_string(),
        ));
    }
    Ok(())
}

/// Pull a human readable message out of a vendor error body.
///
/// OpenAI, OpenRouter and Anthropic all use `{"error": {"message": ...}}`; anything else is
/// returned verbatim (trimmed).
pub fn vendor_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
                .or_else(|| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
        })
        .unwrap_or_else(|| body.trim().to_string())
}

/// Send a prepared request and decode the JSON body.
///
/// Transport failures, non-success statuses and undecodable bodies all become
/// [`LlmError::Provider`] tagged with `provider`.
pub async fn send_json<T: DeserializeOwned>(
    request: RequestBuilder,
    provider: &str,
) -> Result<T, LlmError> {
    let response = request
        .send()
        .await
        .map_err(|err| LlmError::provider(provider, err.to_string()))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|err| LlmError::provider(provider, err.to_string()))?;

    if !status.is_success() {
        return Err(LlmError::provider(
            provider,
            format!("HTTP {}: {}", status.as_u16(), vendor_error_message(&body)),
        ));
    }

    serde_json::from_str(&body)
        .map_err(|err| LlmError::provider(provider, format!("invalid response body: {}", err)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_key_wins_over_configured() {
        let key = resolve_api_key(Some("explicit"), Some("configured"), "OpenAI").unwrap();
        assert_eq!(key, "explicit");
    }

    #[test]
    fn test_configured_key_is_fallback() {
        let key = resolve_api_key(None, Some("configured"), "OpenAI").unwrap();
        assert_eq!(key, "configured");
        let key = resolve_api_key(Some(""), Some("configured"), "OpenAI").unwrap();
        assert_eq!(key, "configured");
    }

    #[test]
    fn test_missing_key_is_configuration_error() {
        let err = resolve_api_key(None, None, "Anthropic").unwrap_err();
        assert_eq!(
            err,
            LlmError::Configuration("Anthropic API key is required".into())
        );
    }

    #[test]
    fn test_endpoint_joins_cleanly() {
        assert_eq!(
            endpoint("https://api.openai.com/v1/", "/chat/completions"),
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(
            endpoint("http://127.0.0.1:8080", "messages"),
            "http://127.0.0.1:8080/messages"
        );
    }

    #[test]
    fn test_vendor_error_message_extraction() {
        let body = r#"{"error": {"type": "invalid_request_error", "message": "bad model"}}"#;
        assert_eq!(vendor_error_message(body), "bad model");
        assert_eq!(vendor_error_message(r#"{"error": "quota"}"#), "quota");
        assert_eq!(vendor_error_message("  upstream down \n"), "upstream down");
    }

    #[test]
    fn test_empty_conversation_is_rejected() {
        assert!(ensure_messages(&[]).is_err());
        assert!(ensure_messages(&[Message::user("hi")]).is_ok());
    }
}
