//! AI Participant definitions.
//!
//! A debate always has exactly two seats. `Speaker` names the seat,
//! `Stance` the side it argues, and `AIParticipant` the model sitting in it.

use serde::{Deserialize, Serialize};

/// One of the two participant slots.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    /// Opens every round and argues for the topic.
    Model1,
    /// Closes every round and argues against the topic.
    Model2,
}

impl Speaker {
    pub const BOTH: [Speaker; 2] = [Speaker::Model1, Speaker::Model2];

    pub fn opponent(self) -> Speaker {
        match self {
            Speaker::Model1 => Speaker::Model2,
            Speaker::Model2 => Speaker::Model1,
        }
    }

    /// The stance this slot argues for the whole debate.
    pub fn stance(self) -> Stance {
        match self {
            Speaker::Model1 => Stance::For,
            Speaker::Model2 => Stance::Against,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Speaker::Model1 => "Model 1",
            Speaker::Model2 => "Model 2",
        }
    }
}

/// Side of the topic a participant argues.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Stance {
    /// Arguing in favor of the topic.
    For,
    /// Arguing against the topic.
    Against,
}

impl Stance {
    pub fn display_name(&self) -> &str {
        match self {
            Stance::For => "FOR",
            Stance::Against => "AGAINST",
        }
    }
}

/// A value held per participant slot.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct SpeakerPair<T> {
    pub model1: T,
    pub model2: T,
}

impl<T> SpeakerPair<T> {
    pub fn new(model1: T, model2: T) -> Self {
        Self { model1, model2 }
    }

    pub fn get(&self, speaker: Speaker) -> &T {
        match speaker {
            Speaker::Model1 => &self.model1,
            Speaker::Model2 => &self.model2,
        }
    }

    pub fn get_mut(&mut self, speaker: Speaker) -> &mut T {
        match speaker {
            Speaker::Model1 => &mut self.model1,
            Speaker::Model2 => &mut self.model2,
        }
    }
}

/// Outcome of a comparison between the two participants.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Model1,
    Model2,
    Tie,
}

impl Verdict {
    /// Higher value wins; equal values tie.
    pub fn compare(model1: f64, model2: f64) -> Self {
        if model1 > model2 {
            Verdict::Model1
        } else if model2 > model1 {
            Verdict::Model2
        } else {
            Verdict::Tie
        }
    }

    pub fn winner(self) -> Option<Speaker> {
        match self {
            Verdict::Model1 => Some(Speaker::Model1),
            Verdict::Model2 => Some(Speaker::Model2),
            Verdict::Tie => None,
        }
    }
}

/// An AI participant in the debate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AIParticipant {
    /// Display name for this participant.
    pub name: String,
    /// The model identifier sent upstream (e.g., "openai/gpt-4o-mini").
    pub model: String,
    /// The side this participant is arguing.
    pub stance: Stance,
    /// Optional custom system prompt override.
    pub custom_system_prompt: Option<String>,
}

impl AIParticipant {
    /// Create a new participant with the given name, model, and stance.
    pub fn new(name: impl Into<String>, model: impl Into<String>, stance: Stance) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            stance,
            custom_system_prompt: None,
        }
    }

    /// Create the participant for a slot, taking the slot's stance.
    pub fn for_slot(speaker: Speaker, name: impl Into<String>, model: impl Into<String>) -> Self {
        Self::new(name, model, speaker.stance())
    }

    /// Set a custom system prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.custom_system_prompt = Some(prompt.into());
        self
    }

    /// Get the full display name with stance.
    pub fn display_name_with_stance(&self) -> String {
        format!("{} ({})", self.name, self.stance.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slots_take_fixed_stances() {
        assert_eq!(Speaker::Model1.stance(), Stance::For);
        assert_eq!(Speaker::Model2.stance(), Stance::Against);
        assert_eq!(Speaker::Model1.opponent(), Speaker::Model2);
    }

    #[test]
    fn test_verdict_compare() {
        assert_eq!(Verdict::compare(7.0, 4.0), Verdict::Model1);
        assert_eq!(Verdict::compare(2.0, 4.5), Verdict::Model2);
        assert_eq!(Verdict::compare(5.0, 5.0), Verdict::Tie);
        assert_eq!(Verdict::Tie.winner(), None);
    }

    #[test]
    fn test_display_name_with_stance() {
        let p = AIParticipant::for_slot(Speaker::Model2, "GPT", "openai/gpt-4o-mini");
        assert_eq!(p.display_name_with_stance(), "GPT (AGAINST)");
    }
}
