use agentlab::clients::common::get_shared_http_client;
use agentlab::client_wrapper::ClientWrapper;
use agentlab::clients::anthropic::AnthropicClient;
use agentlab::clients::openai::OpenAIClient;
use agentlab::clients::openrouter::OpenRouterClient;
use agentlab::Settings;

#[test]
fn test_shared_http_client_is_singleton() {
    let ptr1 = get_shared_http_client() as *const _;
    let ptr2 = get_shared_http_client() as *const _;

    assert_eq!(ptr1, ptr2, "every caller should see the same pooled client");
}

#[test]
fn test_clients_for_every_vendor_build_from_one_pool() {
    let settings = Settings::from_lookup(|key| match key {
        "OPENAI_API_KEY" | "OPENROUTER_API_KEY" | "ANTHROPIC_API_KEY" => {
            Some("dummy_key".to_string())
        }
        _ => None,
    });

    let openai = OpenAIClient::new(&settings).unwrap();
    let openrouter = OpenRouterClient::new(&settings).unwrap();
    let anthropic = AnthropicClient::new(&settings).unwrap();

    assert_eq!(openai.model_name(), "gpt-4");
    assert_eq!(openrouter.model_name(), "google/gemini-2.5-flash");
    assert_eq!(anthropic.model_name(), "claude-3-sonnet-20240229");
    assert_eq!(openrouter.provider_name(), "OpenRouter");
}
