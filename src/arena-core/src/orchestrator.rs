//! Debate orchestration logic.
//!
//! Ties the turn scheduler to the scoring engine: every recorded argument
//! is scored (when auto-scoring is on) inside the same critical section
//! that appended it, and the score pair on the debate state follows the
//! running averages.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;

use crate::analytics::DebateAnalytics;
use crate::config::Config;
use crate::error::DebateError;
use crate::export::DebateTranscript;
use crate::generator::ArgumentGenerator;
use crate::participant::{AIParticipant, Speaker, SpeakerPair};
use crate::scheduler::{
    DebateCallback, DebateEvent, SchedulerSettings, SchedulerStatus, TurnObserver, TurnOutcome,
    TurnScheduler,
};
use crate::scoring::{ArgumentScore, ScoringContext, ScoringEngine, ScoringWeights};
use crate::state::{DebateMessage, DebateState};

/// Configuration for running a debate.
#[derive(Debug, Clone)]
pub struct DebateConfig {
    /// The topic being debated.
    pub topic: String,
    pub max_rounds: u32,
    /// Pause between turns in auto mode.
    pub auto_delay: Duration,
    pub retry_limit: u32,
    pub auto_scoring: bool,
    pub weights: ScoringWeights,
}

impl DebateConfig {
    pub fn new(topic: impl Into<String>, max_rounds: u32) -> Self {
        Self::from_config(topic, &Config::default()).with_max_rounds(max_rounds)
    }

    /// Session settings from the loaded configuration.
    pub fn from_config(topic: impl Into<String>, config: &Config) -> Self {
        Self {
            topic: topic.into(),
            max_rounds: config.debate.max_rounds,
            auto_delay: config.debate.auto_delay(),
            retry_limit: config.debate.retry_limit,
            auto_scoring: config.scoring.auto_scoring,
            weights: config.scoring.weights,
        }
    }

    pub fn with_max_rounds(mut self, max_rounds: u32) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    pub fn with_auto_delay(mut self, auto_delay: Duration) -> Self {
        self.auto_delay = auto_delay;
        self
    }

    pub fn with_auto_scoring(mut self, enabled: bool) -> Self {
        self.auto_scoring = enabled;
        self
    }

    fn validate(&self, participants: &SpeakerPair<AIParticipant>) -> Result<(), DebateError> {
        if self.topic.trim().is_empty() {
            return Err(DebateError::InvalidSetup("topic must not be empty".to_string()));
        }
        if self.max_rounds == 0 {
            return Err(DebateError::InvalidSetup(
                "a debate needs at least one round".to_string(),
            ));
        }
        if participants.model1.model == participants.model2.model {
            return Err(DebateError::InvalidSetup(format!(
                "both participants use the same model '{}'",
                participants.model1.model
            )));
        }
        Ok(())
    }
}

/// Scores new arguments as the scheduler records them.
struct ScoringHook {
    engine: Mutex<ScoringEngine>,
    enabled: AtomicBool,
}

impl ScoringHook {
    fn engine(&self) -> MutexGuard<'_, ScoringEngine> {
        self.engine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Score `message` if it has no score yet. Failures leave it unscored.
    fn score(
        &self,
        engine: &mut ScoringEngine,
        state: &DebateState,
        message: &DebateMessage,
    ) -> Option<ArgumentScore> {
        if engine.is_scored(&message.id) {
            return None;
        }
        let context = ScoringContext {
            topic: &state.topic,
            opponent_args: state.opponent_messages(message.speaker),
        };
        match engine.score_argument(message, &context) {
            Ok(score) => Some(score.clone()),
            Err(e) => {
                tracing::warn!(
                    message_id = %message.id,
                    error = %e,
                    "argument left unscored"
                );
                None
            }
        }
    }

    /// Mirror the averages onto the score pair, on a 0-100 scale.
    fn sync_scores(engine: &ScoringEngine, state: &mut DebateState) {
        let analytics = engine.debate_analytics(&state.messages);
        for speaker in Speaker::BOTH {
            let average = analytics.average_scores.get(speaker).total;
            *state.scores.get_mut(speaker) = (average * 10.0).round() as u32;
        }
    }
}

impl TurnObserver for ScoringHook {
    fn on_message_appended(
        &self,
        state: &mut DebateState,
        message: &DebateMessage,
    ) -> Option<DebateEvent> {
        if !self.enabled.load(Ordering::SeqCst) {
            return None;
        }
        let mut engine = self.engine();
        let score = self.score(&mut engine, state, message)?;
        Self::sync_scores(&engine, state);
        Some(DebateEvent::ArgumentScored {
            speaker: message.speaker,
            score,
        })
    }

    fn on_reset(&self) {
        self.engine().clear();
    }
}

/// Orchestrates the debate between two AI participants.
pub struct DebateOrchestrator {
    config: DebateConfig,
    scheduler: TurnScheduler,
    scoring: Arc<ScoringHook>,
}

impl DebateOrchestrator {
    /// Create a new orchestrator with the given configuration.
    pub fn new(
        config: DebateConfig,
        participants: SpeakerPair<AIParticipant>,
        generator: Arc<dyn ArgumentGenerator>,
    ) -> Result<Self, DebateError> {
        Self::with_engine(config, participants, generator, None)
    }

    /// Same as `new`, with a caller-supplied scoring engine.
    pub fn with_engine(
        config: DebateConfig,
        participants: SpeakerPair<AIParticipant>,
        generator: Arc<dyn ArgumentGenerator>,
        engine: Option<ScoringEngine>,
    ) -> Result<Self, DebateError> {
        config.validate(&participants)?;

        let scoring = Arc::new(ScoringHook {
            engine: Mutex::new(engine.unwrap_or_else(|| ScoringEngine::new(config.weights))),
            enabled: AtomicBool::new(config.auto_scoring),
        });
        let scheduler = TurnScheduler::new(
            config.topic.clone(),
            config.max_rounds,
            participants,
            generator,
            SchedulerSettings {
                auto_delay: config.auto_delay,
                retry_limit: config.retry_limit,
            },
            Some(scoring.clone() as Arc<dyn TurnObserver>),
        );

        Ok(Self {
            config,
            scheduler,
            scoring,
        })
    }

    /// Set a callback for debate events.
    pub fn with_callback(self, callback: DebateCallback) -> Self {
        self.scheduler.set_callback(callback);
        self
    }

    pub fn config(&self) -> &DebateConfig {
        &self.config
    }

    /// Handle to the underlying scheduler.
    pub fn scheduler(&self) -> &TurnScheduler {
        &self.scheduler
    }

    pub fn participants(&self) -> &SpeakerPair<AIParticipant> {
        self.scheduler.participants()
    }

    /// Generate the next turn manually.
    pub async fn next_turn(&self) -> Result<TurnOutcome, DebateError> {
        self.scheduler.advance_turn().await
    }

    pub async fn start_auto(&self) -> Result<Option<TurnOutcome>, DebateError> {
        self.scheduler.start_auto().await
    }

    pub fn pause(&self) {
        self.scheduler.pause();
    }

    pub fn resume(&self) -> Result<(), DebateError> {
        self.scheduler.resume()
    }

    pub async fn retry(&self) -> Result<TurnOutcome, DebateError> {
        self.scheduler.retry().await
    }

    pub fn reset(&self) {
        self.scheduler.reset();
    }

    pub fn status(&self) -> SchedulerStatus {
        self.scheduler.status()
    }

    pub fn subscribe(&self) -> watch::Receiver<SchedulerStatus> {
        self.scheduler.subscribe()
    }

    pub fn state(&self) -> DebateState {
        self.scheduler.snapshot()
    }

    pub fn auto_scoring(&self) -> bool {
        self.scoring.enabled.load(Ordering::SeqCst)
    }

    /// Toggle auto-scoring. Turning it on scores every argument that is
    /// still unscored.
    pub fn set_auto_scoring(&self, enabled: bool) {
        self.scoring.enabled.store(enabled, Ordering::SeqCst);
        if !enabled {
            return;
        }
        self.scheduler.with_state(|state| {
            let mut engine = self.scoring.engine();
            let pending: Vec<DebateMessage> = state
                .messages
                .iter()
                .filter(|m| !engine.is_scored(&m.id))
                .cloned()
                .collect();
            for message in &pending {
                self.scoring.score(&mut engine, state, message);
            }
            ScoringHook::sync_scores(&engine, state);
        });
    }

    /// Manual scoring for when auto-scoring is off.
    pub fn adjust_score(&self, speaker: Speaker, delta: i32) {
        self.scheduler.adjust_score(speaker, delta);
    }

    pub fn score_for_message(&self, id: &str) -> Option<ArgumentScore> {
        self.scoring.engine().score_for_message(id).cloned()
    }

    pub fn analytics(&self) -> DebateAnalytics {
        let state = self.scheduler.snapshot();
        self.scoring.engine().debate_analytics(&state.messages)
    }

    /// Everything needed to export the debate as it stands.
    pub fn transcript(&self) -> DebateTranscript {
        let state = self.scheduler.snapshot();
        let engine = self.scoring.engine();
        DebateTranscript::new(
            &state,
            self.participants().clone(),
            |id| engine.score_for_message(id).cloned(),
            engine.debate_analytics(&state.messages),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::GenerationRequest;
    use async_trait::async_trait;

    struct EchoGenerator;

    #[async_trait]
    impl ArgumentGenerator for EchoGenerator {
        async fn generate(&self, request: &GenerationRequest) -> Result<String, DebateError> {
            Ok(format!(
                "{} on {} because the data shows 12 percent gains in round {}.",
                request.participant.name, request.topic, request.round
            ))
        }
    }

    fn participants() -> SpeakerPair<AIParticipant> {
        SpeakerPair::new(
            AIParticipant::for_slot(Speaker::Model1, "Claude", "anthropic/claude-3.5-sonnet"),
            AIParticipant::for_slot(Speaker::Model2, "GPT", "openai/gpt-4o-mini"),
        )
    }

    #[test]
    fn test_setup_validation() {
        let generator: Arc<dyn ArgumentGenerator> = Arc::new(EchoGenerator);

        let blank =
            DebateOrchestrator::new(DebateConfig::new("  ", 3), participants(), generator.clone());
        assert!(matches!(blank, Err(DebateError::InvalidSetup(_))));

        let zero =
            DebateOrchestrator::new(DebateConfig::new("X", 0), participants(), generator.clone());
        assert!(matches!(zero, Err(DebateError::InvalidSetup(_))));

        let mut same = participants();
        same.model2.model = same.model1.model.clone();
        let same = DebateOrchestrator::new(DebateConfig::new("X", 3), same, generator);
        assert!(matches!(same, Err(DebateError::InvalidSetup(_))));
    }

    #[tokio::test]
    async fn test_turns_are_scored_and_pair_synced() {
        let config = DebateConfig::new("Nuclear energy", 1);
        let orchestrator =
            DebateOrchestrator::new(config, participants(), Arc::new(EchoGenerator)).unwrap();

        orchestrator.next_turn().await.unwrap();
        orchestrator.next_turn().await.unwrap();

        let state = orchestrator.state();
        for message in &state.messages {
            assert!(orchestrator.score_for_message(&message.id).is_some());
        }
        let analytics = orchestrator.analytics();
        assert_eq!(analytics.scored_messages, 2);
        assert_eq!(
            state.scores.model1,
            (analytics.average_scores.model1.total * 10.0).round() as u32
        );
        assert!(state.scores.model1 > 0);
    }

    #[tokio::test]
    async fn test_enabling_scoring_catches_up() {
        let config = DebateConfig::new("Nuclear energy", 2).with_auto_scoring(false);
        let orchestrator =
            DebateOrchestrator::new(config, participants(), Arc::new(EchoGenerator)).unwrap();

        orchestrator.next_turn().await.unwrap();
        orchestrator.next_turn().await.unwrap();
        assert_eq!(orchestrator.analytics().scored_messages, 0);

        orchestrator.adjust_score(Speaker::Model2, 3);
        assert_eq!(orchestrator.state().scores.model2, 3);

        orchestrator.set_auto_scoring(true);
        assert_eq!(orchestrator.analytics().scored_messages, 2);
        assert_ne!(orchestrator.state().scores.model2, 3);
    }

    #[tokio::test]
    async fn test_reset_clears_scores() {
        let config = DebateConfig::new("Nuclear energy", 2);
        let orchestrator =
            DebateOrchestrator::new(config, participants(), Arc::new(EchoGenerator)).unwrap();
        orchestrator.next_turn().await.unwrap();
        let id = orchestrator.state().messages[0].id.clone();
        assert!(orchestrator.score_for_message(&id).is_some());

        orchestrator.reset();

        assert!(orchestrator.score_for_message(&id).is_none());
        assert_eq!(orchestrator.analytics(), DebateAnalytics::default());
        assert_eq!(orchestrator.state().scores, SpeakerPair::default());
    }
}
