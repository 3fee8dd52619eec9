use debate_arena_core::config::{PromptsConfig, ProviderConfig};
use debate_arena_core::*;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn mock_completion(text: &str) -> serde_json::Value {
    serde_json::json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "created": 1700000000,
        "model": "openai/gpt-4o-mini",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": text},
            "finish_reason": "stop",
            "logprobs": null
        }],
        "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
    })
}

fn generator(server: &MockServer) -> OpenAiGenerator {
    let provider = ProviderConfig {
        api_base: server.uri(),
        referer: Some("http://localhost".to_string()),
        ..ProviderConfig::default()
    };
    OpenAiGenerator::new("test-key", provider, PromptsConfig::default()).unwrap()
}

fn request() -> GenerationRequest {
    GenerationRequest {
        topic: "Nuclear energy is essential for fighting climate change".to_string(),
        speaker: Speaker::Model1,
        participant: AIParticipant::for_slot(
            Speaker::Model1,
            "Claude",
            "anthropic/claude-3.5-sonnet",
        ),
        opponent: AIParticipant::for_slot(Speaker::Model2, "GPT", "openai/gpt-4o-mini"),
        history: Vec::new(),
        round: 1,
        max_rounds: 3,
    }
}

#[tokio::test]
async fn sends_model_and_attribution_headers() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(header("x-title", "AI Debate Arena"))
        .and(header("http-referer", "http://localhost"))
        .and(body_partial_json(serde_json::json!({
            "model": "anthropic/claude-3.5-sonnet"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(mock_completion(
            "<think>plan the answer</think>Nuclear power is **reliable** and clean.",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let text = generator(&server).generate(&request()).await.unwrap();
    assert_eq!(text, "Nuclear power is reliable and clean.");
}

#[tokio::test]
async fn empty_reply_is_a_generation_failure() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(mock_completion("   ")))
        .mount(&server)
        .await;

    let err = generator(&server).generate(&request()).await.unwrap_err();
    assert!(matches!(err, DebateError::GenerationFailure(_)));
}

#[tokio::test]
async fn upstream_error_is_reported_without_retrying() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "error": {
                "message": "Invalid API key",
                "type": "invalid_request_error",
                "param": null,
                "code": "invalid_api_key"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = generator(&server).generate(&request()).await.unwrap_err();
    assert!(matches!(err, DebateError::OpenAIError(_)));
}
