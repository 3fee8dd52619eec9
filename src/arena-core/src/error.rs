//! Error types for the debate system.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DebateError {
    #[error("Argument generation failed: {0}")]
    GenerationFailure(String),

    #[error("Maximum retry attempts reached ({attempts}). Reset the debate to continue.")]
    RetryExhausted { attempts: u32 },

    #[error("Scoring failed for message {message_id}: {reason}")]
    ScoringFailure { message_id: String, reason: String },

    #[error("The debate is already complete")]
    DebateComplete,

    #[error("A turn is already being generated")]
    TurnInFlight,

    #[error("The debate is paused")]
    Paused,

    #[error("A generation error is pending: {0}")]
    ErrorPending(String),

    #[error("There is no failed turn to retry")]
    NoPendingError,

    #[error("Invalid debate setup: {0}")]
    InvalidSetup(String),

    #[error("OpenAI API error: {0}")]
    OpenAIError(#[from] async_openai::error::OpenAIError),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}
