//! Round phases of a debate.
//!
//! Every round is one turn per participant. The first round opens the
//! debate, the last one closes it, and everything in between is rebuttal.
//! The phase only shapes the instruction sent to the model; the scheduler
//! treats all rounds the same.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RoundPhase {
    Opening,
    Rebuttal,
    Closing,
}

impl RoundPhase {
    /// Phase of a 1-based `round` in a debate of `max_rounds`.
    ///
    /// A single-round debate is all opening; the closing phase needs at
    /// least two rounds.
    pub fn for_round(round: u32, max_rounds: u32) -> Self {
        if round <= 1 {
            RoundPhase::Opening
        } else if round >= max_rounds {
            RoundPhase::Closing
        } else {
            RoundPhase::Rebuttal
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            RoundPhase::Opening => "Opening Statement",
            RoundPhase::Rebuttal => "Rebuttal",
            RoundPhase::Closing => "Closing Statement",
        }
    }

    /// Instructions for a speaker in this phase.
    pub fn instructions(&self, has_opponent_arguments: bool) -> &'static str {
        match (self, has_opponent_arguments) {
            (RoundPhase::Opening, false) => {
                "Present your opening position on the topic with your strongest arguments."
            }
            (RoundPhase::Opening, true) => {
                "Present your opening position and respond briefly to your opponent's opening."
            }
            (RoundPhase::Rebuttal, _) => {
                "Respond to your opponent's latest points and reinforce your own position with new evidence."
            }
            (RoundPhase::Closing, _) => {
                "Deliver your closing statement: summarize why your position is stronger."
            }
        }
    }
}
