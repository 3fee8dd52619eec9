//! Aggregate statistics over scored arguments.
//!
//! Always recomputed from the transcript and the score cache; nothing here
//! is stored between calls.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::participant::{Speaker, SpeakerPair, Verdict};
use crate::scoring::{ArgumentScore, round1};
use crate::state::DebateMessage;

/// Per-criterion averages for one participant, one decimal.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct CriteriaAverages {
    pub logic: f64,
    pub evidence: f64,
    pub persuasiveness: f64,
    pub relevance: f64,
    pub clarity: f64,
    pub total: f64,
}

impl CriteriaAverages {
    fn of(scores: &[&ArgumentScore]) -> Self {
        if scores.is_empty() {
            return Self::default();
        }
        let n = scores.len() as f64;
        let mean =
            |f: fn(&ArgumentScore) -> f64| round1(scores.iter().map(|&s| f(s)).sum::<f64>() / n);
        Self {
            logic: mean(|s| s.criteria.logic),
            evidence: mean(|s| s.criteria.evidence),
            persuasiveness: mean(|s| s.criteria.persuasiveness),
            relevance: mean(|s| s.criteria.relevance),
            clarity: mean(|s| s.criteria.clarity),
            total: mean(|s| s.total_score),
        }
    }

    /// Criteria (without the total) in display order, with their names.
    pub fn named(&self) -> [(&'static str, f64); 5] {
        [
            ("logic", self.logic),
            ("evidence", self.evidence),
            ("persuasiveness", self.persuasiveness),
            ("relevance", self.relevance),
            ("clarity", self.clarity),
        ]
    }
}

/// Outcome of one round. A side without a scored argument that round is
/// `None` and the round counts as a tie.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoundWinner {
    pub round: u32,
    pub winner: Verdict,
    pub scores: SpeakerPair<Option<f64>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StrongestArgument {
    pub message_id: String,
    pub round: u32,
    pub total_score: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DebateAnalytics {
    pub average_scores: SpeakerPair<CriteriaAverages>,
    pub round_winners: Vec<RoundWinner>,
    /// Distance between the two participants' average totals.
    pub winner_margin: f64,
    pub strongest_arguments: SpeakerPair<Option<StrongestArgument>>,
    pub scored_messages: usize,
}

impl DebateAnalytics {
    /// Overall leader by average total.
    pub fn leader(&self) -> Verdict {
        Verdict::compare(
            self.average_scores.model1.total,
            self.average_scores.model2.total,
        )
    }

    pub fn rounds_won(&self, speaker: Speaker) -> usize {
        self.round_winners
            .iter()
            .filter(|r| r.winner.winner() == Some(speaker))
            .count()
    }
}

/// Build analytics for `messages` from whatever subset has been scored.
pub fn compute(
    messages: &[DebateMessage],
    scores: &HashMap<String, ArgumentScore>,
) -> DebateAnalytics {
    let scored: Vec<(&DebateMessage, &ArgumentScore)> = messages
        .iter()
        .filter_map(|m| scores.get(&m.id).map(|s| (m, s)))
        .collect();

    let averages = |speaker: Speaker| {
        let own: Vec<&ArgumentScore> = scored
            .iter()
            .filter(|(m, _)| m.speaker == speaker)
            .map(|(_, s)| *s)
            .collect();
        CriteriaAverages::of(&own)
    };
    let average_scores = SpeakerPair::new(averages(Speaker::Model1), averages(Speaker::Model2));

    let mut rounds: BTreeMap<u32, SpeakerPair<Option<f64>>> = BTreeMap::new();
    for message in messages {
        let slot = rounds.entry(message.round).or_default();
        if let Some(score) = scores.get(&message.id) {
            let best = slot.get_mut(message.speaker);
            *best = Some(best.map_or(score.total_score, |b| b.max(score.total_score)));
        }
    }
    let round_winners = rounds
        .into_iter()
        .map(|(round, pair)| {
            let winner = match (pair.model1, pair.model2) {
                (Some(a), Some(b)) => Verdict::compare(a, b),
                _ => Verdict::Tie,
            };
            RoundWinner {
                round,
                winner,
                scores: pair,
            }
        })
        .collect();

    let strongest = |speaker: Speaker| {
        let mut best: Option<(&DebateMessage, &ArgumentScore)> = None;
        for &(message, score) in scored.iter().filter(|(m, _)| m.speaker == speaker) {
            let better = match best {
                None => true,
                Some((bm, bs)) => {
                    score.total_score > bs.total_score
                        || (score.total_score == bs.total_score && message.round < bm.round)
                }
            };
            if better {
                best = Some((message, score));
            }
        }
        best.map(|(message, score)| StrongestArgument {
            message_id: message.id.clone(),
            round: message.round,
            total_score: score.total_score,
        })
    };

    // Unrounded, so the margin is rounded once.
    let mean_total = |speaker: Speaker| {
        let totals: Vec<f64> = scored
            .iter()
            .filter(|(m, _)| m.speaker == speaker)
            .map(|(_, s)| s.total_score)
            .collect();
        if totals.is_empty() {
            0.0
        } else {
            totals.iter().sum::<f64>() / totals.len() as f64
        }
    };

    DebateAnalytics {
        winner_margin: round1(
            (mean_total(Speaker::Model1) - mean_total(Speaker::Model2)).abs(),
        ),
        average_scores,
        round_winners,
        strongest_arguments: SpeakerPair::new(
            strongest(Speaker::Model1),
            strongest(Speaker::Model2),
        ),
        scored_messages: scored.len(),
    }
}
