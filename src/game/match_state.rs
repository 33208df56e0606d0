//! Match state gate: whether simulation time advances at all

use serde::{Deserialize, Serialize};

/// The two states of a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPhase {
    /// Time advances and combat input is accepted
    Playing,
    /// Time is frozen and combat input is rejected
    Stopped,
}

impl MatchPhase {
    /// Time scale this phase rests at when no slow motion overrides it
    pub fn resting_time_scale(self) -> f32 {
        match self {
            MatchPhase::Playing => 1.0,
            MatchPhase::Stopped => 0.0,
        }
    }
}

/// Owned match state service
#[derive(Debug, Clone)]
pub struct MatchState {
    phase: MatchPhase,
}

impl MatchState {
    pub fn new() -> Self {
        Self {
            phase: MatchPhase::Stopped,
        }
    }

    /// Transition to `phase`. Returns true when the phase actually changed.
    ///
    /// The effective time scale is derived from the phase and the dilation
    /// pool on every read, so an active slow motion window keeps overriding
    /// the resting value of `Playing` without any bookkeeping here.
    pub fn set_state(&mut self, phase: MatchPhase) -> bool {
        let changed = self.phase != phase;
        self.phase = phase;
        changed
    }

    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    pub fn is_playing(&self) -> bool {
        self.phase == MatchPhase::Playing
    }

    pub fn resting_time_scale(&self) -> f32 {
        self.phase.resting_time_scale()
    }
}

impl Default for MatchState {
    fn default() -> Self {
        Self::new()
    }
}
