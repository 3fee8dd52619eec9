//! Debate Arena Core Library
//!
//! Turn scheduling, argument scoring and analytics for two AI models
//! debating a topic.

pub mod analytics;
pub mod config;
pub mod debate_format;
pub mod error;
pub mod export;
pub mod generator;
pub mod orchestrator;
pub mod participant;
pub mod scheduler;
pub mod scoring;
pub mod state;

pub use analytics::{CriteriaAverages, DebateAnalytics, RoundWinner, StrongestArgument};
pub use config::{Config, default_config};
pub use debate_format::RoundPhase;
pub use error::DebateError;
pub use export::DebateTranscript;
pub use generator::{ArgumentGenerator, GenerationRequest, OpenAiGenerator};
pub use orchestrator::{DebateConfig, DebateOrchestrator};
pub use participant::{AIParticipant, Speaker, SpeakerPair, Stance, Verdict};
pub use scheduler::{DebateEvent, SchedulerStatus, TurnOutcome, TurnScheduler};
pub use scoring::{ArgumentScore, ArgumentScorer, CriteriaScores, HeuristicScorer, ScoringEngine};
pub use state::{DebateMessage, DebateState, determine_next_speaker};
