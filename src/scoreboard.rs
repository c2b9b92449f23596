//! Best-of-N match scoring
//!
//! Rounds accumulate here; the scheduler asks for a winner after every round.

use serde::{Deserialize, Serialize};

use crate::sim::state::{RoundEndReason, RoundOutcome, Side};

/// One finished round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundRecord {
    pub round: u32,
    pub outcome: RoundOutcome,
    pub reason: RoundEndReason,
    /// Simulated frames the fight lasted
    pub frames: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchScore {
    pub best_of: u32,
    /// Round wins indexed by [`Side::index`]
    pub wins: [u32; 2],
    pub draws: u32,
    pub rounds: Vec<RoundRecord>,
}

impl MatchScore {
    pub fn new(best_of: u32) -> Self {
        Self {
            best_of: best_of.max(1),
            wins: [0; 2],
            draws: 0,
            rounds: Vec::new(),
        }
    }

    /// Round wins that take the match
    pub fn wins_needed(&self) -> u32 {
        self.best_of / 2 + 1
    }

    /// Record a finished round. Returns the match winner if this round
    /// decided it.
    pub fn record(
        &mut self,
        round: u32,
        outcome: RoundOutcome,
        reason: RoundEndReason,
        frames: u32,
    ) -> Option<Side> {
        match outcome {
            RoundOutcome::Winner(side) => self.wins[side.index()] += 1,
            RoundOutcome::Draw => self.draws += 1,
        }
        self.rounds.push(RoundRecord {
            round,
            outcome,
            reason,
            frames,
        });
        self.winner()
    }

    /// First side to reach the required wins
    pub fn winner(&self) -> Option<Side> {
        Side::BOTH
            .into_iter()
            .find(|side| self.wins[side.index()] >= self.wins_needed())
    }

    pub fn is_decided(&self) -> bool {
        self.winner().is_some()
    }
}
