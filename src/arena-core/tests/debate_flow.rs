use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use debate_arena_core::scoring::ScoringContext;
use debate_arena_core::*;

/// Replies with the round number so scores can be keyed off the text.
struct RoundEcho {
    calls: AtomicUsize,
}

#[async_trait]
impl ArgumentGenerator for RoundEcho {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, DebateError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("round {} by {}", request.round, request.participant.name))
    }
}

/// Fixed totals for round 1; refuses to score anything later.
struct FixedScorer;

impl ArgumentScorer for FixedScorer {
    fn score(
        &self,
        message: &DebateMessage,
        _context: &ScoringContext<'_>,
    ) -> Result<ArgumentScore, DebateError> {
        if message.round != 1 {
            return Err(DebateError::ScoringFailure {
                message_id: message.id.clone(),
                reason: "judge unavailable".to_string(),
            });
        }
        let total = match message.speaker {
            Speaker::Model1 => 7.0,
            Speaker::Model2 => 4.0,
        };
        Ok(ArgumentScore {
            message_id: message.id.clone(),
            criteria: CriteriaScores {
                logic: total,
                evidence: total,
                persuasiveness: total,
                relevance: total,
                clarity: total,
            },
            total_score: total,
            feedback: String::new(),
        })
    }
}

fn participants() -> SpeakerPair<AIParticipant> {
    SpeakerPair::new(
        AIParticipant::for_slot(Speaker::Model1, "Claude", "anthropic/claude-3.5-sonnet"),
        AIParticipant::for_slot(Speaker::Model2, "GPT", "openai/gpt-4o-mini"),
    )
}

#[tokio::test]
async fn two_round_debate_with_partial_scoring() {
    let generator = Arc::new(RoundEcho {
        calls: AtomicUsize::new(0),
    });
    let events = Arc::new(Mutex::new(Vec::new()));
    let orchestrator = DebateOrchestrator::with_engine(
        DebateConfig::new("X", 2),
        participants(),
        generator.clone(),
        Some(ScoringEngine::with_scorer(Box::new(FixedScorer))),
    )
    .unwrap()
    .with_callback(Box::new({
        let events = events.clone();
        move |event| events.lock().unwrap().push(event)
    }));

    let mut progress = Vec::new();
    for _ in 0..4 {
        orchestrator.next_turn().await.unwrap();
        let state = orchestrator.state();
        progress.push((state.messages.len(), state.current_round));
    }

    // Scoring failures in round 2 never block the debate.
    assert_eq!(progress, vec![(1, 0), (2, 1), (3, 1), (4, 2)]);
    assert_eq!(orchestrator.status(), SchedulerStatus::Complete);
    assert_eq!(generator.calls.load(Ordering::SeqCst), 4);

    let state = orchestrator.state();
    let rounds: Vec<u32> = state.messages.iter().map(|m| m.round).collect();
    assert_eq!(rounds, vec![1, 1, 2, 2]);

    let analytics = orchestrator.analytics();
    assert_eq!(analytics.scored_messages, 2);
    assert_eq!(analytics.round_winners.len(), 2);
    assert_eq!(analytics.round_winners[0].winner, Verdict::Model1);
    assert_eq!(analytics.round_winners[1].winner, Verdict::Tie);
    assert_eq!(analytics.winner_margin, 3.0);
    assert_eq!(
        analytics.strongest_arguments.model1.as_ref().map(|s| s.round),
        Some(1)
    );
    assert!(orchestrator.score_for_message(&state.messages[3].id).is_none());

    assert_eq!(state.scores, SpeakerPair::new(70, 40));
    assert_eq!(state.leader(), Verdict::Model1);

    let events = events.lock().unwrap();
    let scored = events
        .iter()
        .filter(|e| matches!(e, DebateEvent::ArgumentScored { .. }))
        .count();
    assert_eq!(scored, 2);
    assert!(matches!(events.last(), Some(DebateEvent::DebateEnd)));
}

#[tokio::test(start_paused = true)]
async fn auto_debate_exports_full_transcript() {
    let generator = Arc::new(RoundEcho {
        calls: AtomicUsize::new(0),
    });
    let config = DebateConfig::new("Universal Basic Income should be implemented globally", 3)
        .with_auto_delay(Duration::from_millis(250));
    let orchestrator = DebateOrchestrator::new(config, participants(), generator.clone()).unwrap();
    let mut status = orchestrator.subscribe();

    orchestrator.start_auto().await.unwrap();
    status
        .wait_for(|s| *s == SchedulerStatus::Complete)
        .await
        .unwrap();

    let transcript = orchestrator.transcript();
    assert!(transcript.complete);
    assert_eq!(transcript.rounds_played, 3);
    assert_eq!(transcript.turns.len(), 6);
    assert!(transcript.turns.iter().all(|t| t.score.is_some()));
    assert_eq!(transcript.analytics.round_winners.len(), 3);

    let markdown = transcript.to_markdown();
    assert!(markdown.contains("## Round 3"));
}
