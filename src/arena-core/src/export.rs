//! Transcript export.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analytics::DebateAnalytics;
use crate::error::DebateError;
use crate::participant::{AIParticipant, SpeakerPair, Verdict};
use crate::scoring::ArgumentScore;
use crate::state::{DebateMessage, DebateState};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExportedTurn {
    #[serde(flatten)]
    pub message: DebateMessage,
    pub score: Option<ArgumentScore>,
}

/// A debate as it stands, with scores and analytics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DebateTranscript {
    pub topic: String,
    pub participants: SpeakerPair<AIParticipant>,
    pub rounds_played: u32,
    pub max_rounds: u32,
    pub complete: bool,
    pub turns: Vec<ExportedTurn>,
    pub scores: SpeakerPair<u32>,
    pub leader: Verdict,
    pub analytics: DebateAnalytics,
    pub exported_at: DateTime<Utc>,
}

impl DebateTranscript {
    pub fn new(
        state: &DebateState,
        participants: SpeakerPair<AIParticipant>,
        score_lookup: impl Fn(&str) -> Option<ArgumentScore>,
        analytics: DebateAnalytics,
    ) -> Self {
        Self {
            topic: state.topic.clone(),
            participants,
            rounds_played: state.current_round,
            max_rounds: state.max_rounds,
            complete: state.is_complete(),
            turns: state
                .messages
                .iter()
                .map(|message| ExportedTurn {
                    score: score_lookup(&message.id),
                    message: message.clone(),
                })
                .collect(),
            scores: state.scores,
            leader: state.leader(),
            analytics,
            exported_at: Utc::now(),
        }
    }

    pub fn to_json(&self) -> Result<String, DebateError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| DebateError::ConfigError(format!("Failed to serialize transcript: {}", e)))
    }

    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        let p = &self.participants;

        let _ = writeln!(out, "# {}\n", self.topic);
        let _ = writeln!(
            out,
            "- **For:** {} (`{}`)\n- **Against:** {} (`{}`)",
            p.model1.name, p.model1.model, p.model2.name, p.model2.model
        );
        let _ = writeln!(
            out,
            "- **Rounds:** {} of {}{}\n",
            self.rounds_played,
            self.max_rounds,
            if self.complete { " (complete)" } else { "" }
        );

        let mut current_round = 0;
        for turn in &self.turns {
            if turn.message.round != current_round {
                current_round = turn.message.round;
                let _ = writeln!(out, "## Round {}\n", current_round);
            }
            let speaker = p.get(turn.message.speaker);
            let _ = writeln!(out, "### {}\n", speaker.display_name_with_stance());
            let _ = writeln!(out, "{}\n", turn.message.content);
            if let Some(score) = &turn.score {
                let c = &score.criteria;
                let _ = writeln!(
                    out,
                    "_Score {:.1}/10 (logic {:.1}, evidence {:.1}, persuasiveness {:.1}, relevance {:.1}, clarity {:.1}). {}_\n",
                    score.total_score,
                    c.logic,
                    c.evidence,
                    c.persuasiveness,
                    c.relevance,
                    c.clarity,
                    score.feedback
                );
            }
        }

        let _ = writeln!(out, "## Result\n");
        let _ = writeln!(
            out,
            "{}: {} | {}: {}",
            p.model1.name, self.scores.model1, p.model2.name, self.scores.model2
        );
        let verdict = match self.leader.winner() {
            Some(speaker) => format!("Winner: {}", p.get(speaker).name),
            None => "Result: tie".to_string(),
        };
        let _ = writeln!(out, "\n**{}**", verdict);

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::participant::Speaker;

    fn sample() -> DebateTranscript {
        let mut state = DebateState::new("Space over oceans", 1);
        state.record(DebateMessage::new(Speaker::Model1, "Space first.", 1));
        state.record(DebateMessage::new(Speaker::Model2, "Oceans first.", 1));
        state.scores = SpeakerPair::new(62, 48);
        let first_id = state.messages[0].id.clone();

        DebateTranscript::new(
            &state,
            SpeakerPair::new(
                AIParticipant::for_slot(Speaker::Model1, "Claude", "anthropic/claude-3.5-sonnet"),
                AIParticipant::for_slot(Speaker::Model2, "GPT", "openai/gpt-4o-mini"),
            ),
            |id| {
                (id == first_id).then(|| ArgumentScore {
                    message_id: id.to_string(),
                    criteria: Default::default(),
                    total_score: 6.2,
                    feedback: "Strongest on logic; could improve evidence.".to_string(),
                })
            },
            DebateAnalytics::default(),
        )
    }

    #[test]
    fn test_json_contains_turns_and_scores() {
        let transcript = sample();
        let json: serde_json::Value = serde_json::from_str(&transcript.to_json().unwrap()).unwrap();

        assert_eq!(json["topic"], "Space over oceans");
        assert_eq!(json["turns"].as_array().unwrap().len(), 2);
        assert_eq!(json["turns"][0]["speaker"], "model1");
        assert_eq!(json["turns"][0]["score"]["total_score"], 6.2);
        assert!(json["turns"][1]["score"].is_null());
        assert_eq!(json["leader"], "model1");
        assert_eq!(json["complete"], true);
    }

    #[test]
    fn test_markdown_layout() {
        let md = sample().to_markdown();
        assert!(md.starts_with("# Space over oceans"));
        assert!(md.contains("## Round 1"));
        assert!(md.contains("### GPT (AGAINST)"));
        assert!(md.contains("_Score 6.2/10"));
        assert!(md.contains("**Winner: Claude**"));
    }
}
