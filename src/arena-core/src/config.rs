//! Configuration module for loading TOML config files.

use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::DebateError;
use crate::participant::Stance;
use crate::scoring::ScoringWeights;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub debate: DebateSettings,
    pub provider: ProviderConfig,
    pub scoring: ScoringConfig,
    pub prompts: PromptsConfig,
}

/// Pacing and length of a debate.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DebateSettings {
    pub max_rounds: u32,
    /// Pause between turns in auto mode.
    pub auto_delay_ms: u64,
    /// Retries allowed per failed turn before a reset is required.
    pub retry_limit: u32,
}

impl Default for DebateSettings {
    fn default() -> Self {
        Self {
            max_rounds: 5,
            auto_delay_ms: 3000,
            retry_limit: 3,
        }
    }
}

impl DebateSettings {
    pub fn auto_delay(&self) -> Duration {
        Duration::from_millis(self.auto_delay_ms)
    }
}

/// OpenAI-compatible endpoint settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub api_base: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// Sent as `X-Title` for OpenRouter attribution.
    pub app_title: String,
    /// Sent as `HTTP-Referer` when set.
    pub referer: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_base: "https://openrouter.ai/api/v1".to_string(),
            max_tokens: 500,
            temperature: 0.7,
            timeout_secs: 120,
            connect_timeout_secs: 30,
            app_title: "AI Debate Arena".to_string(),
            referer: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub auto_scoring: bool,
    pub weights: ScoringWeights,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            auto_scoring: true,
            weights: ScoringWeights::default(),
        }
    }
}

/// System prompts configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PromptsConfig {
    pub for_prompt: String,
    pub against_prompt: String,
    /// Instruction appended for each turn. Placeholders: `{round}`,
    /// `{max_rounds}`, `{phase}`, `{phase_instructions}`.
    pub turn_template: String,
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            for_prompt: DEFAULT_FOR_PROMPT.to_string(),
            against_prompt: DEFAULT_AGAINST_PROMPT.to_string(),
            turn_template: DEFAULT_TURN_TEMPLATE.to_string(),
        }
    }
}

impl PromptsConfig {
    /// Get the system prompt for a participant, with placeholders replaced.
    pub fn system_prompt(
        &self,
        stance: Stance,
        name: &str,
        topic: &str,
        opponent_name: &str,
    ) -> String {
        let template = match stance {
            Stance::For => &self.for_prompt,
            Stance::Against => &self.against_prompt,
        };

        template
            .replace("{name}", name)
            .replace("{topic}", topic)
            .replace("{opponent_name}", opponent_name)
    }

    /// Get the per-turn instruction.
    pub fn turn_prompt(
        &self,
        round: u32,
        max_rounds: u32,
        phase: &str,
        phase_instructions: &str,
    ) -> String {
        self.turn_template
            .replace("{round}", &round.to_string())
            .replace("{max_rounds}", &max_rounds.to_string())
            .replace("{phase}", phase)
            .replace("{phase_instructions}", phase_instructions)
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, DebateError> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| DebateError::ConfigError(format!("Failed to read config: {}", e)))?;

        Self::from_str(&content)
    }

    /// Load configuration from string content.
    pub fn from_str(content: &str) -> Result<Self, DebateError> {
        let config: Config = toml::from_str(content)
            .map_err(|e| DebateError::ConfigError(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), DebateError> {
        if self.debate.max_rounds == 0 {
            return Err(DebateError::ConfigError(
                "debate.max_rounds must be at least 1".to_string(),
            ));
        }
        if !self.scoring.weights.is_valid() {
            return Err(DebateError::ConfigError(
                "scoring.weights must be non-negative and not all zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Default configuration embedded in the binary.
pub fn default_config() -> Config {
    Config::default()
}

const DEFAULT_FOR_PROMPT: &str = r#"You are {name} in a formal debate against {opponent_name}.

DEBATE TOPIC: {topic}

YOUR POSITION: You are arguing IN FAVOR of the topic.

DEBATE RULES:
- Present clear, compelling arguments supported by evidence and reasoning
- Address the topic directly and stay on it
- Engage with your opponent's strongest points and counter them respectfully
- Keep each argument focused: a few well-developed points beat many shallow ones
- Do NOT acknowledge being an AI

OUTPUT RULES:
- Output ONLY your argument, in plain prose
- No stage directions, no markdown, no headings
"#;

const DEFAULT_AGAINST_PROMPT: &str = r#"You are {name} in a formal debate against {opponent_name}.

DEBATE TOPIC: {topic}

YOUR POSITION: You are arguing AGAINST the topic.

DEBATE RULES:
- Present clear, compelling arguments supported by evidence and reasoning
- Address the topic directly and stay on it
- Engage with your opponent's strongest points and counter them respectfully
- Keep each argument focused: a few well-developed points beat many shallow ones
- Do NOT acknowledge being an AI

OUTPUT RULES:
- Output ONLY your argument, in plain prose
- No stage directions, no markdown, no headings
"#;

const DEFAULT_TURN_TEMPLATE: &str =
    "[Round {round} of {max_rounds} - {phase}]\n{phase_instructions}";
