//! Observer-side mirror of an authoritative session.
//!
//! A replica never simulates combat. It applies state and effect messages
//! from the authority in arrival order, keeps read-only copies of health and
//! projectile state, and runs its own presentation-only slow motion clock.

use std::collections::HashMap;

use glam::Vec2;
use uuid::Uuid;

use crate::util::timer::TimerQueue;
use crate::ws::protocol::{CombatantSnapshot, ProjectileSnapshot, ServerMsg};

use super::combatant::Side;
use super::dilation::{DecayElapsed, TimeDilation};
use super::events::{CombatObserver, Outcome};
use super::match_state::{MatchPhase, MatchState};
use super::physics::{PhysicsSystem, RigidBody};
use super::projectile::ResolutionKind;
use super::replication::Mirror;
use super::tuning::{CombatantStats, Tuning, WeaponStats};
use super::weapon::apply_recoil;

/// Mirrored combatant
#[derive(Debug, Clone)]
pub struct ReplicaCombatant {
    pub id: Uuid,
    pub side: Side,
    /// Display pose; recoil is re-applied here from shoot effects
    pub body: RigidBody,
    health: Mirror<i32>,
    pub max_health: i32,
    pub alive: bool,
}

impl ReplicaCombatant {
    fn from_snapshot(s: &CombatantSnapshot, stats: &CombatantStats) -> Self {
        let mut body = RigidBody::new(s.position, stats);
        body.rotation = s.rotation;
        body.velocity = s.velocity;
        Self {
            id: s.id,
            side: s.side,
            body,
            health: Mirror::new(s.health),
            max_health: s.max_health,
            alive: s.alive,
        }
    }

    pub fn health(&self) -> i32 {
        self.health.get()
    }
}

/// Mirrored projectile, extrapolated between snapshots for display
#[derive(Debug, Clone)]
pub struct ReplicaProjectile {
    pub id: Uuid,
    pub shooter_id: Option<Uuid>,
    pub position: Vec2,
    pub direction: Vec2,
    pub speed: f32,
    /// False once the authority resolved it
    pub visible: bool,
}

/// Everything one observer knows about the duel
#[derive(Debug)]
pub struct ReplicaWorld {
    player_id: Option<Uuid>,
    match_state: MatchState,
    dilation: TimeDilation,
    timers: TimerQueue<DecayElapsed>,
    combatants: HashMap<Uuid, ReplicaCombatant>,
    projectiles: HashMap<Uuid, ReplicaProjectile>,
    outcome: Option<Outcome>,
    last_tick: u64,
    stats: CombatantStats,
    weapon: WeaponStats,
}

impl ReplicaWorld {
    pub fn new(tuning: &Tuning) -> Self {
        Self {
            player_id: None,
            match_state: MatchState::new(),
            dilation: TimeDilation::new(tuning.dilation),
            timers: TimerQueue::new(),
            combatants: HashMap::new(),
            projectiles: HashMap::new(),
            outcome: None,
            last_tick: 0,
            stats: tuning.combatant,
            weapon: tuning.weapon,
        }
    }

    pub fn player_id(&self) -> Option<Uuid> {
        self.player_id
    }

    pub fn is_playing(&self) -> bool {
        self.match_state.is_playing()
    }

    /// Presentation time scale
    pub fn time_scale(&self) -> f32 {
        self.dilation.time_scale(&self.match_state)
    }

    pub fn combatant(&self, id: Uuid) -> Option<&ReplicaCombatant> {
        self.combatants.get(&id)
    }

    pub fn projectile(&self, id: Uuid) -> Option<&ReplicaProjectile> {
        self.projectiles.get(&id)
    }

    pub fn projectile_count(&self) -> usize {
        self.projectiles.len()
    }

    /// Round result from this observer's point of view
    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    /// Advance presentation by `real_dt` wall-clock seconds
    pub fn tick(&mut self, real_dt: f32) {
        for _ in self.timers.advance(real_dt) {
            self.dilation.on_decay_elapsed(&mut self.timers);
        }

        let dt = real_dt * self.time_scale();
        for p in self.projectiles.values_mut().filter(|p| p.visible) {
            p.position += p.direction * p.speed * dt;
        }
        // Gravity and walls belong to the authority; snapshots correct drift.
        for c in self.combatants.values_mut().filter(|c| c.alive) {
            PhysicsSystem::integrate(&mut c.body, 0.0, dt);
        }
    }

    /// Apply one message from the authority
    pub fn apply(&mut self, msg: &ServerMsg, observer: &mut dyn CombatObserver) {
        match msg {
            ServerMsg::Welcome { player_id, .. } => self.player_id = Some(*player_id),
            ServerMsg::MatchState { playing } => {
                let phase = if *playing {
                    MatchPhase::Playing
                } else {
                    MatchPhase::Stopped
                };
                if self.match_state.set_state(phase) {
                    if !playing {
                        // Forced stop: drop the local slow motion outright.
                        self.dilation.cancel(&mut self.timers);
                    }
                    observer.on_match_state(phase);
                }
            }
            ServerMsg::ProjectileSpawned {
                projectile_id,
                shooter_id,
                position,
                direction,
                speed,
            } => {
                self.projectiles.insert(
                    *projectile_id,
                    ReplicaProjectile {
                        id: *projectile_id,
                        shooter_id: Some(*shooter_id),
                        position: *position,
                        direction: *direction,
                        speed: *speed,
                        visible: true,
                    },
                );
            }
            ServerMsg::PlayShootEffects {
                shooter_id,
                direction,
            } => {
                if let Some(c) = self.combatants.get_mut(shooter_id) {
                    apply_recoil(&self.weapon, &mut c.body, *direction);
                }
                observer.on_shot_fired(*shooter_id, *direction);
            }
            ServerMsg::HealthChanged {
                combatant_id, new, ..
            } => {
                if let Some(c) = self.combatants.get_mut(combatant_id) {
                    if let Some(change) = c.health.apply(*new) {
                        observer.on_health_changed(*combatant_id, change.old, change.new);
                    }
                }
            }
            ServerMsg::PlayHitEffect {
                projectile_id,
                kind,
                ..
            } => observer.on_resolved(*projectile_id, kind.unwrap_or(ResolutionKind::Hit)),
            ServerMsg::PlayWallHitEffect { projectile_id, .. } => {
                observer.on_resolved(*projectile_id, ResolutionKind::Wall)
            }
            ServerMsg::DestroyProjectile { projectile_id } => {
                if let Some(p) = self.projectiles.get_mut(projectile_id) {
                    p.visible = false;
                }
            }
            ServerMsg::ProjectileDespawned { projectile_id } => {
                self.projectiles.remove(projectile_id);
            }
            ServerMsg::TriggerSlowMotion { duration_secs } => {
                if self
                    .dilation
                    .trigger(*duration_secs, &self.match_state, &mut self.timers)
                {
                    observer.on_slow_motion(*duration_secs);
                }
            }
            ServerMsg::PlayDeathEffects { combatant_id } => {
                if let Some(c) = self.combatants.get_mut(combatant_id) {
                    c.alive = false;
                }
                observer.on_death(*combatant_id);
            }
            ServerMsg::RoundOver {
                loser_id,
                winner_id,
            } => {
                if let Some(me) = self.player_id {
                    self.outcome = Some(Outcome::for_observer(me, *loser_id));
                }
                observer.on_round_over(*loser_id, *winner_id);
            }
            ServerMsg::RoundRestarted { combatants } => {
                self.outcome = None;
                self.projectiles.clear();
                self.dilation.cancel(&mut self.timers);
                self.combatants = combatants
                    .iter()
                    .map(|s| (s.id, ReplicaCombatant::from_snapshot(s, &self.stats)))
                    .collect();
                observer.on_round_restarted();
            }
            ServerMsg::Snapshot {
                tick,
                combatants,
                projectiles,
                ..
            } => {
                if *tick < self.last_tick {
                    return;
                }
                self.last_tick = *tick;
                self.apply_snapshot(combatants, projectiles, observer);
            }
            ServerMsg::PlayerLeft { player_id, .. } => {
                self.combatants.remove(player_id);
            }
            ServerMsg::MatchJoined { .. }
            | ServerMsg::PlayerJoined { .. }
            | ServerMsg::Error { .. }
            | ServerMsg::Pong { .. } => {}
        }
    }

    fn apply_snapshot(
        &mut self,
        combatants: &[CombatantSnapshot],
        projectiles: &[ProjectileSnapshot],
        observer: &mut dyn CombatObserver,
    ) {
        for s in combatants {
            let stats = &self.stats;
            let entry = self
                .combatants
                .entry(s.id)
                .or_insert_with(|| ReplicaCombatant::from_snapshot(s, stats));
            entry.body.position = s.position;
            entry.body.rotation = s.rotation;
            entry.body.velocity = s.velocity;
            entry.alive = s.alive;
            if let Some(change) = entry.health.apply(s.health) {
                observer.on_health_changed(s.id, change.old, change.new);
            }
        }
        self.combatants
            .retain(|id, _| combatants.iter().any(|s| s.id == *id));

        for s in projectiles {
            if let Some(p) = self.projectiles.get_mut(&s.id) {
                p.position = s.position;
                p.visible = s.active;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Tally {
        health: Vec<(i32, i32)>,
        slow: Vec<f32>,
        resolved: Vec<ResolutionKind>,
        round_over: usize,
    }

    impl CombatObserver for Tally {
        fn on_health_changed(&mut self, _id: Uuid, old: i32, new: i32) {
            self.health.push((old, new));
        }

        fn on_slow_motion(&mut self, duration: f32) {
            self.slow.push(duration);
        }

        fn on_resolved(&mut self, _projectile_id: Uuid, kind: ResolutionKind) {
            self.resolved.push(kind);
        }

        fn on_round_over(&mut self, _loser_id: Uuid, _winner_id: Option<Uuid>) {
            self.round_over += 1;
        }
    }

    fn snapshot(id: Uuid, health: i32) -> CombatantSnapshot {
        CombatantSnapshot {
            id,
            side: Side::Right,
            position: Vec2::new(5.0, -2.0),
            rotation: 0.0,
            velocity: Vec2::ZERO,
            health,
            max_health: 100,
            alive: health > 0,
            weapon_cooldown: 0.0,
        }
    }

    fn started(me: Uuid, other: Uuid) -> (ReplicaWorld, Tally) {
        let mut world = ReplicaWorld::new(&Tuning::default().networked());
        let mut tally = Tally::default();
        world.apply(
            &ServerMsg::Welcome {
                player_id: me,
                server_time: 0,
            },
            &mut tally,
        );
        world.apply(
            &ServerMsg::RoundRestarted {
                combatants: vec![snapshot(me, 100), snapshot(other, 100)],
            },
            &mut tally,
        );
        world.apply(&ServerMsg::MatchState { playing: true }, &mut tally);
        (world, tally)
    }

    #[test]
    fn health_follows_authority_messages() {
        let (me, other) = (Uuid::new_v4(), Uuid::new_v4());
        let (mut world, mut tally) = started(me, other);

        world.apply(
            &ServerMsg::HealthChanged {
                combatant_id: other,
                old: 100,
                new: 80,
            },
            &mut tally,
        );
        // The same value again via snapshot is not a second change.
        world.apply(
            &ServerMsg::Snapshot {
                tick: 5,
                playing: true,
                time_scale: 1.0,
                combatants: vec![snapshot(me, 100), snapshot(other, 80)],
                projectiles: vec![],
            },
            &mut tally,
        );

        assert_eq!(world.combatant(other).map(|c| c.health()), Some(80));
        assert_eq!(tally.health, vec![(100, 80)]);
    }

    #[test]
    fn slow_motion_is_local_and_cancelled_on_forced_stop() {
        let (me, other) = (Uuid::new_v4(), Uuid::new_v4());
        let (mut world, mut tally) = started(me, other);

        world.apply(&ServerMsg::TriggerSlowMotion { duration_secs: 0.5 }, &mut tally);
        assert_eq!(world.time_scale(), 0.08);
        assert_eq!(tally.slow, vec![0.5]);

        world.apply(&ServerMsg::MatchState { playing: false }, &mut tally);
        assert_eq!(world.time_scale(), 0.0);
        world.apply(&ServerMsg::MatchState { playing: true }, &mut tally);
        assert_eq!(world.time_scale(), 1.0);
    }

    #[test]
    fn round_restart_ends_slow_motion() {
        let (me, other) = (Uuid::new_v4(), Uuid::new_v4());
        let (mut world, mut tally) = started(me, other);

        world.apply(&ServerMsg::TriggerSlowMotion { duration_secs: 0.5 }, &mut tally);
        assert_eq!(world.time_scale(), 0.08);

        world.apply(
            &ServerMsg::RoundRestarted {
                combatants: vec![snapshot(me, 100), snapshot(other, 100)],
            },
            &mut tally,
        );
        assert_eq!(world.time_scale(), 1.0);

        // The old window's expiry is gone too.
        world.tick(1.0);
        assert_eq!(world.time_scale(), 1.0);
    }

    #[test]
    fn projectiles_extrapolate_until_destroyed() {
        let (me, other) = (Uuid::new_v4(), Uuid::new_v4());
        let (mut world, mut tally) = started(me, other);
        let pid = Uuid::new_v4();

        world.apply(
            &ServerMsg::ProjectileSpawned {
                projectile_id: pid,
                shooter_id: me,
                position: Vec2::ZERO,
                direction: Vec2::X,
                speed: 10.0,
            },
            &mut tally,
        );
        world.tick(0.5);
        let moved = world.projectile(pid).map(|p| p.position);
        assert_eq!(moved, Some(Vec2::new(5.0, 0.0)));

        world.apply(&ServerMsg::DestroyProjectile { projectile_id: pid }, &mut tally);
        world.tick(0.5);
        assert_eq!(world.projectile(pid).map(|p| p.position), moved);

        world.apply(&ServerMsg::ProjectileDespawned { projectile_id: pid }, &mut tally);
        assert_eq!(world.projectile_count(), 0);
    }

    #[test]
    fn hit_effects_report_their_kind() {
        let (me, other) = (Uuid::new_v4(), Uuid::new_v4());
        let (mut world, mut tally) = started(me, other);

        for kind in [Some(ResolutionKind::ProjectileCollision), None] {
            world.apply(
                &ServerMsg::PlayHitEffect {
                    projectile_id: Uuid::new_v4(),
                    position: Vec2::ZERO,
                    kind,
                },
                &mut tally,
            );
        }

        assert_eq!(
            tally.resolved,
            vec![ResolutionKind::ProjectileCollision, ResolutionKind::Hit]
        );
    }

    #[test]
    fn outcome_depends_on_observer() {
        let (me, other) = (Uuid::new_v4(), Uuid::new_v4());
        let (mut world, mut tally) = started(me, other);

        world.apply(
            &ServerMsg::RoundOver {
                loser_id: me,
                winner_id: Some(other),
            },
            &mut tally,
        );
        assert_eq!(world.outcome(), Some(Outcome::Loss));
        assert_eq!(tally.round_over, 1);
    }

    #[test]
    fn shoot_effects_kick_the_shooter_back() {
        let (me, other) = (Uuid::new_v4(), Uuid::new_v4());
        let (mut world, mut tally) = started(me, other);

        world.apply(
            &ServerMsg::PlayShootEffects {
                shooter_id: other,
                direction: Vec2::NEG_X,
            },
            &mut tally,
        );
        let kicked = world.combatant(other).map(|c| c.body.velocity);
        assert!(kicked.is_some_and(|v| v.x > 0.0));
        assert_eq!(world.combatant(me).map(|c| c.body.velocity), Some(Vec2::ZERO));

        world.tick(0.1);
        assert!(world
            .combatant(other)
            .is_some_and(|c| c.body.position.x > 5.0));
    }
}
