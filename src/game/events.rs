//! Arena events and the observer interface presentation layers subscribe with

use glam::Vec2;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use super::match_state::MatchPhase;
use super::projectile::ResolutionKind;
use super::replication::Change;

/// Everything that happened during an arena tick, in order
#[derive(Debug, Clone, PartialEq)]
pub enum ArenaEvent {
    MatchStateChanged {
        phase: MatchPhase,
    },
    ShotFired {
        shooter_id: Uuid,
        projectile_id: Uuid,
        position: Vec2,
        direction: Vec2,
    },
    /// The point-blank probe saw the opponent in front of the muzzle
    PointBlank {
        shooter_id: Uuid,
        target_id: Uuid,
    },
    HealthChanged {
        combatant_id: Uuid,
        change: Change<i32>,
    },
    ProjectileResolved {
        projectile_id: Uuid,
        kind: ResolutionKind,
        position: Vec2,
    },
    SlowMotion {
        duration: f32,
    },
    CombatantDied {
        combatant_id: Uuid,
    },
    CombatantDespawned {
        combatant_id: Uuid,
    },
    ProjectileDespawned {
        projectile_id: Uuid,
    },
    RoundOver {
        loser_id: Uuid,
        winner_id: Option<Uuid>,
    },
    RoundRestarted,
}

/// Round result from one observer's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Win,
    Loss,
}

impl Outcome {
    /// The owner of the dead combatant lost; everyone else won
    pub fn for_observer(observer_id: Uuid, loser_id: Uuid) -> Self {
        if observer_id == loser_id {
            Outcome::Loss
        } else {
            Outcome::Win
        }
    }
}

/// Subscription interface for combat notifications.
///
/// Every method has an empty default so observers implement only what they
/// render.
#[allow(unused_variables)]
pub trait CombatObserver {
    fn on_match_state(&mut self, phase: MatchPhase) {}
    fn on_shot_fired(&mut self, shooter_id: Uuid, direction: Vec2) {}
    fn on_health_changed(&mut self, combatant_id: Uuid, old: i32, new: i32) {}
    fn on_resolved(&mut self, projectile_id: Uuid, kind: ResolutionKind) {}
    fn on_slow_motion(&mut self, duration: f32) {}
    fn on_death(&mut self, combatant_id: Uuid) {}
    fn on_round_over(&mut self, loser_id: Uuid, winner_id: Option<Uuid>) {}
    fn on_round_restarted(&mut self) {}
}

/// Feed a batch of events to an observer
pub fn dispatch(events: &[ArenaEvent], observer: &mut dyn CombatObserver) {
    for event in events {
        match event {
            ArenaEvent::MatchStateChanged { phase } => observer.on_match_state(*phase),
            ArenaEvent::ShotFired {
                shooter_id,
                direction,
                ..
            } => observer.on_shot_fired(*shooter_id, *direction),
            ArenaEvent::HealthChanged {
                combatant_id,
                change,
            } => observer.on_health_changed(*combatant_id, change.old, change.new),
            ArenaEvent::ProjectileResolved {
                projectile_id,
                kind,
                ..
            } => observer.on_resolved(*projectile_id, *kind),
            ArenaEvent::SlowMotion { duration } => observer.on_slow_motion(*duration),
            ArenaEvent::CombatantDied { combatant_id } => observer.on_death(*combatant_id),
            ArenaEvent::RoundOver {
                loser_id,
                winner_id,
            } => observer.on_round_over(*loser_id, *winner_id),
            ArenaEvent::RoundRestarted => observer.on_round_restarted(),
            ArenaEvent::PointBlank { .. }
            | ArenaEvent::CombatantDespawned { .. }
            | ArenaEvent::ProjectileDespawned { .. } => {}
        }
    }
}

/// Observer that narrates combat to the log
#[derive(Debug, Default)]
pub struct LogObserver;

impl CombatObserver for LogObserver {
    fn on_match_state(&mut self, phase: MatchPhase) {
        info!(?phase, "Match state changed");
    }

    fn on_shot_fired(&mut self, shooter_id: Uuid, direction: Vec2) {
        debug!(%shooter_id, ?direction, "Shot fired");
    }

    fn on_health_changed(&mut self, combatant_id: Uuid, old: i32, new: i32) {
        info!(%combatant_id, old, new, "Health changed");
    }

    fn on_resolved(&mut self, projectile_id: Uuid, kind: ResolutionKind) {
        debug!(%projectile_id, ?kind, "Projectile resolved");
    }

    fn on_slow_motion(&mut self, duration: f32) {
        debug!(duration, "Slow motion");
    }

    fn on_death(&mut self, combatant_id: Uuid) {
        info!(%combatant_id, "Combatant died");
    }

    fn on_round_over(&mut self, loser_id: Uuid, winner_id: Option<Uuid>) {
        info!(%loser_id, ?winner_id, "Round over");
    }

    fn on_round_restarted(&mut self) {
        info!("Round restarted");
    }
}
