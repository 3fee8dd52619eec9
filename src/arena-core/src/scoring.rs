//! Argument scoring.
//!
//! Each argument is rated on five criteria in [0, 10]. `HeuristicScorer`
//! derives the ratings from keyword and structure cues only, so the same
//! text in the same context always gets the same score. `ScoringEngine`
//! caches one score per message id.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::analytics::{self, DebateAnalytics};
use crate::error::DebateError;
use crate::state::DebateMessage;

/// Sub-scores for one argument.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct CriteriaScores {
    pub logic: f64,
    pub evidence: f64,
    pub persuasiveness: f64,
    pub relevance: f64,
    pub clarity: f64,
}

impl CriteriaScores {
    /// Criteria in display order, with their names.
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

/// Score record for one message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArgumentScore {
    pub message_id: String,
    pub criteria: CriteriaScores,
    /// Weighted composite of the criteria, in [0, 10].
    pub total_score: f64,
    pub feedback: String,
}

/// Relative weight of each criterion in the total.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScoringWeights {
    pub logic: f64,
    pub evidence: f64,
    pub persuasiveness: f64,
    pub relevance: f64,
    pub clarity: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            logic: 0.25,
            evidence: 0.20,
            persuasiveness: 0.20,
            relevance: 0.20,
            clarity: 0.15,
        }
    }
}

impl ScoringWeights {
    fn sum(&self) -> f64 {
        self.logic + self.evidence + self.persuasiveness + self.relevance + self.clarity
    }

    pub fn is_valid(&self) -> bool {
        let all = [
            self.logic,
            self.evidence,
            self.persuasiveness,
            self.relevance,
            self.clarity,
        ];
        all.iter().all(|w| w.is_finite() && *w >= 0.0) && self.sum() > 0.0
    }

    /// Weighted mean of the criteria, rounded to one decimal.
    pub fn total(&self, criteria: &CriteriaScores) -> f64 {
        let sum = self.sum();
        if sum <= 0.0 {
            return 0.0;
        }
        let weighted = criteria.logic * self.logic
            + criteria.evidence * self.evidence
            + criteria.persuasiveness * self.persuasiveness
            + criteria.relevance * self.relevance
            + criteria.clarity * self.clarity;
        round1((weighted / sum).clamp(0.0, 10.0))
    }
}

/// What a scorer may look at besides the argument itself.
#[derive(Debug, Clone)]
pub struct ScoringContext<'a> {
    pub topic: &'a str,
    /// Arguments from the other side made so far.
    pub opponent_args: Vec<&'a DebateMessage>,
}

/// Produces a score for one argument.
pub trait ArgumentScorer: Send + Sync {
    fn score(
        &self,
        message: &DebateMessage,
        context: &ScoringContext<'_>,
    ) -> Result<ArgumentScore, DebateError>;
}

const LOGIC_MARKERS: &[&str] = &[
    "because",
    "therefore",
    "thus",
    "hence",
    "since",
    "consequently",
    "if",
    "then",
    "implies",
    "follows",
    "as a result",
    "for this reason",
    "first",
    "second",
    "finally",
];

const EVIDENCE_MARKERS: &[&str] = &[
    "study",
    "studies",
    "research",
    "data",
    "evidence",
    "statistics",
    "survey",
    "report",
    "percent",
    "according to",
    "for example",
    "for instance",
    "shows",
    "found",
];

const RHETORIC_MARKERS: &[&str] = &[
    "must",
    "should",
    "clearly",
    "imagine",
    "consider",
    "undeniably",
    "crucial",
    "essential",
    "we",
    "our",
    "you",
    "future",
];

const REBUTTAL_MARKERS: &[&str] = &[
    "opponent",
    "however",
    "but",
    "contrary",
    "claim",
    "claims",
    "argues",
    "ignores",
    "overlooks",
];

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "are", "but", "not", "you", "all", "any", "can", "has", "have", "its",
    "our", "was", "will", "with", "than", "that", "this", "from", "they", "them", "then", "there",
    "their", "what", "when", "which", "while", "would", "should", "could", "more", "most", "into",
    "over", "about", "been", "being", "does", "such", "also", "very", "just", "only", "is", "be",
];

static SENTENCE_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]+").expect("valid sentence regex"));
static NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:[.,]\d+)?%?").expect("valid number regex"));

/// Shape of an argument's text, computed once per scoring.
struct TextProfile {
    lower: String,
    words: Vec<String>,
    sentences: usize,
    numbers: usize,
    questions: usize,
}

impl TextProfile {
    fn analyze(text: &str) -> Self {
        let lower = text.to_lowercase();
        let words = tokenize(&lower);
        let sentences = SENTENCE_END
            .split(text)
            .filter(|s| !s.trim().is_empty())
            .count()
            .max(1);
        Self {
            numbers: NUMBER.find_iter(text).count(),
            questions: text.matches('?').count(),
            lower,
            words,
            sentences,
        }
    }

    /// Occurrences of marker words (whole words) and phrases (substrings).
    fn count_markers(&self, markers: &[&str]) -> usize {
        markers
            .iter()
            .map(|marker| {
                if marker.contains(' ') {
                    self.lower.matches(marker).count()
                } else {
                    self.words.iter().filter(|w| w.as_str() == *marker).count()
                }
            })
            .sum()
    }

    fn average_sentence_length(&self) -> f64 {
        self.words.len() as f64 / self.sentences as f64
    }
}

fn tokenize(lower: &str) -> Vec<String> {
    lower
        .split(|c: char| !c.is_alphanumeric() && c != '\'')
        .map(|w| w.trim_matches('\''))
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

/// Content words of a text: lowercase, longer than three letters, no stopwords.
fn keywords(text: &str) -> Vec<String> {
    let mut words: Vec<String> = tokenize(&text.to_lowercase())
        .into_iter()
        .filter(|w| w.len() > 3 && !STOPWORDS.contains(&w.as_str()))
        .collect();
    words.sort();
    words.dedup();
    words
}

pub(crate) fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn bounded(value: f64) -> f64 {
    round1(value.clamp(0.0, 10.0))
}

/// Deterministic keyword and structure heuristic.
#[derive(Debug, Clone, Default)]
pub struct HeuristicScorer {
    weights: ScoringWeights,
}

impl HeuristicScorer {
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    fn relevance(&self, profile: &TextProfile, context: &ScoringContext<'_>) -> f64 {
        let topic_words = keywords(context.topic);
        let coverage = if topic_words.is_empty() {
            0.5
        } else {
            let hits = topic_words
                .iter()
                .filter(|w| profile.words.iter().any(|pw| pw == *w))
                .count();
            hits as f64 / topic_words.len() as f64
        };

        let engages_opponent = !context.opponent_args.is_empty() && {
            let opponent_words: Vec<String> = context
                .opponent_args
                .iter()
                .flat_map(|m| keywords(&m.content))
                .collect();
            let shared = keywords(&profile.lower)
                .iter()
                .filter(|w| opponent_words.contains(*w))
                .count();
            shared >= 3 || profile.count_markers(REBUTTAL_MARKERS) > 0
        };

        2.0 + 6.0 * coverage + if engages_opponent { 1.5 } else { 0.0 }
    }

    fn clarity(&self, profile: &TextProfile) -> f64 {
        let drift = (profile.average_sentence_length() - 18.0).abs() / 3.0;
        let mut score = 8.5 - drift.min(5.0);
        let words = profile.words.len();
        if words < 40 {
            score -= 2.0;
        } else if words > 400 {
            score -= 1.0;
        }
        score
    }

    fn feedback(criteria: &CriteriaScores, word_count: usize) -> String {
        let named = criteria.named();
        let mut best = named[0];
        let mut worst = named[0];
        for entry in named.iter().skip(1) {
            if entry.1 > best.1 {
                best = *entry;
            }
            if entry.1 < worst.1 {
                worst = *entry;
            }
        }

        let mut feedback = format!("Strongest on {}; could improve {}.", best.0, worst.0);
        if word_count < 40 {
            feedback.push_str(" The argument is brief.");
        }
        feedback
    }
}

impl ArgumentScorer for HeuristicScorer {
    fn score(
        &self,
        message: &DebateMessage,
        context: &ScoringContext<'_>,
    ) -> Result<ArgumentScore, DebateError> {
        let text = message.content.trim();
        if text.is_empty() {
            return Err(DebateError::ScoringFailure {
                message_id: message.id.clone(),
                reason: "argument has no content".to_string(),
            });
        }

        let profile = TextProfile::analyze(text);

        let logic = 3.0
            + 0.8 * profile.count_markers(LOGIC_MARKERS).min(6) as f64
            + if profile.sentences >= 3 { 1.0 } else { 0.0 };
        let evidence = 2.5
            + 1.0 * profile.count_markers(EVIDENCE_MARKERS).min(4) as f64
            + 0.75 * profile.numbers.min(4) as f64;
        let persuasiveness = 3.0
            + 0.7 * profile.count_markers(RHETORIC_MARKERS).min(6) as f64
            + 0.5 * profile.questions.min(2) as f64;

        let criteria = CriteriaScores {
            logic: bounded(logic),
            evidence: bounded(evidence),
            persuasiveness: bounded(persuasiveness),
            relevance: bounded(self.relevance(&profile, context)),
            clarity: bounded(self.clarity(&profile)),
        };

        Ok(ArgumentScore {
            message_id: message.id.clone(),
            total_score: self.weights.total(&criteria),
            feedback: Self::feedback(&criteria, profile.words.len()),
            criteria,
        })
    }
}

/// Scores arguments at most once each and aggregates the results.
pub struct ScoringEngine {
    scorer: Box<dyn ArgumentScorer>,
    scores: HashMap<String, ArgumentScore>,
}

impl Default for ScoringEngine {
    fn default() -> Self {
        Self::new(ScoringWeights::default())
    }
}

impl ScoringEngine {
    /// Engine backed by `HeuristicScorer`.
    pub fn new(weights: ScoringWeights) -> Self {
        Self::with_scorer(Box::new(HeuristicScorer::new(weights)))
    }

    pub fn with_scorer(scorer: Box<dyn ArgumentScorer>) -> Self {
        Self {
            scorer,
            scores: HashMap::new(),
        }
    }

    /// Score `message`, or return the score it already has.
    pub fn score_argument(
        &mut self,
        message: &DebateMessage,
        context: &ScoringContext<'_>,
    ) -> Result<&ArgumentScore, DebateError> {
        match self.scores.entry(message.id.clone()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let score = self.scorer.score(message, context)?;
                Ok(entry.insert(score))
            }
        }
    }

    pub fn score_for_message(&self, id: &str) -> Option<&ArgumentScore> {
        self.scores.get(id)
    }

    pub fn is_scored(&self, id: &str) -> bool {
        self.scores.contains_key(id)
    }

    pub fn scored_count(&self) -> usize {
        self.scores.len()
    }

    pub fn debate_analytics(&self, messages: &[DebateMessage]) -> DebateAnalytics {
        analytics::compute(messages, &self.scores)
    }

    pub fn clear(&mut self) {
        self.scores.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::participant::Speaker;

    fn context<'a>(topic: &'a str, opponents: &'a [DebateMessage]) -> ScoringContext<'a> {
        ScoringContext {
            topic,
            opponent_args: opponents.iter().collect(),
        }
    }

    const RICH: &str = "Remote work raises productivity because workers lose no time commuting. \
        According to a 2023 Stanford study, output rose 13 percent among remote staff. \
        Therefore companies should embrace it. My opponent claims offices build culture, \
        however the data shows engagement holds steady. We must consider the evidence.";

    #[test]
    fn test_heuristic_is_deterministic_and_bounded() {
        let scorer = HeuristicScorer::default();
        let message = DebateMessage::new(Speaker::Model1, RICH, 1);
        let ctx = context("Remote work is better than office work for productivity", &[]);

        let first = scorer.score(&message, &ctx).unwrap();
        let second = scorer.score(&message, &ctx).unwrap();
        assert_eq!(first, second);

        for (_, value) in first.criteria.named() {
            assert!((0.0..=10.0).contains(&value));
        }
        assert!((0.0..=10.0).contains(&first.total_score));
        assert!(first.feedback.starts_with("Strongest on"));
    }

    #[test]
    fn test_evidence_and_relevance_reward_substance() {
        let scorer = HeuristicScorer::default();
        let topic = "Remote work is better than office work for productivity";
        let rich = DebateMessage::new(Speaker::Model1, RICH, 1);
        let thin = DebateMessage::new(Speaker::Model1, "I just think it is nice.", 1);

        let rich_score = scorer.score(&rich, &context(topic, &[])).unwrap();
        let thin_score = scorer.score(&thin, &context(topic, &[])).unwrap();

        assert!(rich_score.criteria.evidence > thin_score.criteria.evidence);
        assert!(rich_score.criteria.relevance > thin_score.criteria.relevance);
        assert!(rich_score.total_score > thin_score.total_score);
        assert!(thin_score.feedback.contains("brief"));
    }

    #[test]
    fn test_engaging_opponent_raises_relevance() {
        let scorer = HeuristicScorer::default();
        let opponent = vec![DebateMessage::new(
            Speaker::Model1,
            "Nuclear energy provides reliable baseload power.",
            1,
        )];
        let text = "Nuclear plants take decades to build and the waste problem remains unsolved.";
        let reply = DebateMessage::new(Speaker::Model2, text, 1);
        let rebuttal = DebateMessage::new(
            Speaker::Model2,
            format!("My opponent ignores cost. {text}"),
            1,
        );

        let plain = scorer.score(&reply, &context("Nuclear energy", &[])).unwrap();
        let engaged = scorer
            .score(&rebuttal, &context("Nuclear energy", &opponent))
            .unwrap();
        assert!(engaged.criteria.relevance > plain.criteria.relevance);
    }

    #[test]
    fn test_empty_argument_fails_scoring() {
        let scorer = HeuristicScorer::default();
        let message = DebateMessage::new(Speaker::Model2, "   ", 1);
        let err = scorer.score(&message, &context("X", &[])).unwrap_err();
        assert!(matches!(err, DebateError::ScoringFailure { .. }));
    }

    #[test]
    fn test_score_argument_is_idempotent() {
        let mut engine = ScoringEngine::default();
        let message = DebateMessage::new(Speaker::Model1, RICH, 1);

        let first = engine
            .score_argument(&message, &context("Remote work", &[]))
            .unwrap()
            .clone();
        // A different context must not produce a second record.
        let opponents = vec![DebateMessage::new(Speaker::Model2, "Offices matter.", 1)];
        let second = engine
            .score_argument(&message, &context("Something else", &opponents))
            .unwrap()
            .clone();

        assert_eq!(first, second);
        assert_eq!(engine.scored_count(), 1);
        assert_eq!(engine.score_for_message(&message.id), Some(&first));
    }

    #[test]
    fn test_missing_score_is_none() {
        let engine = ScoringEngine::default();
        assert!(engine.score_for_message("nope").is_none());
        assert!(!engine.is_scored("nope"));
    }

    #[test]
    fn test_weights_total() {
        let criteria = CriteriaScores {
            logic: 8.0,
            evidence: 6.0,
            persuasiveness: 7.0,
            relevance: 9.0,
            clarity: 6.0,
        };
        assert_eq!(ScoringWeights::default().total(&criteria), 7.3);

        let zero = ScoringWeights {
            logic: 0.0,
            evidence: 0.0,
            persuasiveness: 0.0,
            relevance: 0.0,
            clarity: 0.0,
        };
        assert!(!zero.is_valid());
        assert_eq!(zero.total(&criteria), 0.0);
    }
}
