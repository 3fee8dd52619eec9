//! Debate transcript and session state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::participant::{Speaker, SpeakerPair, Verdict};

/// A single argument turn. Never mutated once recorded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DebateMessage {
    pub id: String,
    pub speaker: Speaker,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// 1-based round this turn belongs to.
    pub round: u32,
}

impl DebateMessage {
    pub fn new(speaker: Speaker, content: impl Into<String>, round: u32) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            speaker,
            content: content.into(),
            timestamp: Utc::now(),
            round,
        }
    }
}

/// Whose turn it is, from the number of turns already taken.
pub fn determine_next_speaker(messages: &[DebateMessage]) -> Speaker {
    if messages.len() % 2 == 0 {
        Speaker::Model1
    } else {
        Speaker::Model2
    }
}

/// Mutable state of one debate session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DebateState {
    pub topic: String,
    pub messages: Vec<DebateMessage>,
    pub current_round: u32,
    pub max_rounds: u32,
    pub is_active: bool,
    pub scores: SpeakerPair<u32>,
}

impl DebateState {
    pub fn new(topic: impl Into<String>, max_rounds: u32) -> Self {
        Self {
            topic: topic.into(),
            messages: Vec::new(),
            current_round: 0,
            max_rounds,
            is_active: true,
            scores: SpeakerPair::default(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.current_round >= self.max_rounds
    }

    pub fn next_speaker(&self) -> Speaker {
        determine_next_speaker(&self.messages)
    }

    /// Round the given speaker's next turn belongs to. Model1 opens a new
    /// round; Model2 answers within the round Model1 opened.
    pub fn target_round(&self, speaker: Speaker) -> u32 {
        match speaker {
            Speaker::Model1 => self.current_round + 1,
            Speaker::Model2 => self.current_round,
        }
    }

    /// Append a turn. The round counter moves once the second speaker of
    /// the round has spoken.
    pub fn record(&mut self, message: DebateMessage) {
        let closes_round = message.speaker == Speaker::Model2;
        self.messages.push(message);
        if closes_round {
            self.current_round += 1;
        }
    }

    /// Opposing arguments so far, from the point of view of `speaker`.
    pub fn opponent_messages(&self, speaker: Speaker) -> Vec<&DebateMessage> {
        self.messages
            .iter()
            .filter(|m| m.speaker != speaker)
            .collect()
    }

    /// Progress through the debate as a percentage.
    pub fn progress(&self) -> f64 {
        if self.max_rounds == 0 {
            return 100.0;
        }
        (self.current_round as f64 / self.max_rounds as f64 * 100.0).min(100.0)
    }

    /// Current leader by score pair.
    pub fn leader(&self) -> Verdict {
        Verdict::compare(self.scores.model1 as f64, self.scores.model2 as f64)
    }

    /// Add `delta` to a participant's score, never going below zero.
    pub fn adjust_score(&mut self, speaker: Speaker, delta: i32) {
        let score = self.scores.get_mut(speaker);
        *score = score.saturating_add_signed(delta);
    }
}
