//! Argument generation.
//!
//! The scheduler only sees `ArgumentGenerator`. `OpenAiGenerator` is the
//! stock implementation for OpenAI-compatible chat endpoints (OpenRouter by
//! default).

use std::time::Duration;

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestAssistantMessage, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessage, ChatCompletionRequestUserMessage,
    CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};

use crate::config::{PromptsConfig, ProviderConfig};
use crate::debate_format::RoundPhase;
use crate::error::DebateError;
use crate::participant::{AIParticipant, Speaker};
use crate::state::DebateMessage;

/// Everything a generator needs to produce one turn.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub topic: String,
    pub speaker: Speaker,
    pub participant: AIParticipant,
    pub opponent: AIParticipant,
    /// Full transcript so far.
    pub history: Vec<DebateMessage>,
    pub round: u32,
    pub max_rounds: u32,
}

impl GenerationRequest {
    pub fn phase(&self) -> RoundPhase {
        RoundPhase::for_round(self.round, self.max_rounds)
    }
}

/// Produces the text of one argument.
///
/// Implementations must not retry on their own: a failure is reported to
/// the scheduler, which halts the debate until the user retries.
#[async_trait]
pub trait ArgumentGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, DebateError>;
}

/// Generator backed by an OpenAI-compatible chat completions API.
pub struct OpenAiGenerator {
    client: Client<OpenAIConfig>,
    provider: ProviderConfig,
    prompts: PromptsConfig,
}

impl OpenAiGenerator {
    pub fn new(
        api_key: &str,
        provider: ProviderConfig,
        prompts: PromptsConfig,
    ) -> Result<Self, DebateError> {
        let mut headers = HeaderMap::new();
        headers.insert("X-Title", header_value(&provider.app_title)?);
        if let Some(referer) = &provider.referer {
            headers.insert("HTTP-Referer", header_value(referer)?);
        }

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(provider.timeout_secs))
            .connect_timeout(Duration::from_secs(provider.connect_timeout_secs))
            .build()
            .map_err(|e| {
                DebateError::ConfigError(format!("Failed to create HTTP client: {}", e))
            })?;

        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(&provider.api_base);

        Ok(Self {
            client: Client::with_config(config).with_http_client(http_client),
            provider,
            prompts,
        })
    }
}

#[async_trait]
impl ArgumentGenerator for OpenAiGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, DebateError> {
        let chat_request = CreateChatCompletionRequestArgs::default()
            .model(&request.participant.model)
            .max_completion_tokens(self.provider.max_tokens)
            .temperature(self.provider.temperature)
            .messages(build_messages(request, &self.prompts))
            .build()?;

        tracing::debug!(
            model = %request.participant.model,
            round = request.round,
            "requesting argument"
        );

        let response = self.client.chat().create(chat_request).await?;
        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default();

        let argument = sanitize_response(&content);
        if argument.is_empty() {
            return Err(DebateError::GenerationFailure(
                "No response received from AI model".to_string(),
            ));
        }
        Ok(argument)
    }
}

fn header_value(value: &str) -> Result<HeaderValue, DebateError> {
    HeaderValue::from_str(value)
        .map_err(|e| DebateError::ConfigError(format!("Invalid header value '{}': {}", value, e)))
}

/// Chat history for one turn: system prompt, prior turns from the speaker's
/// point of view, then the instruction for this round.
pub fn build_messages(
    request: &GenerationRequest,
    prompts: &PromptsConfig,
) -> Vec<ChatCompletionRequestMessage> {
    let participant = &request.participant;
    let system_prompt = participant.custom_system_prompt.clone().unwrap_or_else(|| {
        prompts.system_prompt(
            participant.stance,
            &participant.display_name_with_stance(),
            &request.topic,
            &request.opponent.name,
        )
    });

    let mut messages = vec![ChatCompletionRequestMessage::System(
        ChatCompletionRequestSystemMessage {
            content: system_prompt.into(),
            name: None,
        },
    )];

    for turn in &request.history {
        if turn.speaker == request.speaker {
            messages.push(ChatCompletionRequestMessage::Assistant(
                ChatCompletionRequestAssistantMessage {
                    content: Some(turn.content.clone().into()),
                    name: None,
                    tool_calls: None,
                    refusal: None,
                    audio: None,
                    function_call: None,
                },
            ));
        } else {
            let opponent_msg =
                format!("[Opponent {} said]: {}", request.opponent.name, turn.content);
            messages.push(ChatCompletionRequestMessage::User(
                ChatCompletionRequestUserMessage {
                    content: opponent_msg.into(),
                    name: None,
                },
            ));
        }
    }

    let phase = request.phase();
    let has_opponent_arguments = request.history.iter().any(|m| m.speaker != request.speaker);
    let turn_prompt = prompts.turn_prompt(
        request.round,
        request.max_rounds,
        phase.display_name(),
        phase.instructions(has_opponent_arguments),
    );
    messages.push(ChatCompletionRequestMessage::User(
        ChatCompletionRequestUserMessage {
            content: turn_prompt.into(),
            name: None,
        },
    ));

    messages
}

/// Sanitize AI response by stripping reasoning tokens and XML-like tags.
///
/// Removes patterns like <thinking>...</thinking>, <reflection>...</reflection>, etc.
pub fn sanitize_response(response: &str) -> String {
    let tags_to_strip = [
        "thinking",
        "think",
        "reflection",
        "reflect",
        "internal",
        "reasoning",
        "thought",
        "scratchpad",
        "plan",
        "analysis",
    ];

    let mut result = response.to_string();

    for tag in &tags_to_strip {
        let pattern = format!(r"(?is)<{tag}[^>]*>.*?</{tag}>", tag = tag);
        if let Ok(re) = regex::Regex::new(&pattern) {
            result = re.replace_all(&result, "").to_string();
        }
    }

    // Orphaned opening/closing tags
    if let Ok(orphan_re) = regex::Regex::new(r"</?[\w]+[^>]*>") {
        result = orphan_re.replace_all(&result, "").to_string();
    }

    result = result.replace("*", "");

    if let Ok(ws_re) = regex::Regex::new(r"[ \t]+") {
        result = ws_re.replace_all(&result, " ").to_string();
    }

    result.trim().to_string()
}
