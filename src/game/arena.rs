//! Authoritative arena: owns every combatant, projectile and timer and
//! advances them in a fixed order each frame.

use std::collections::HashSet;

use glam::Vec2;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::util::time::MAX_PHYSICS_STEPS_PER_FRAME;
use crate::util::timer::TimerQueue;

use super::ai::AiTrigger;
use super::combatant::{Combatant, Controller, DamageOutcome, Side};
use super::dilation::{DecayElapsed, TimeDilation};
use super::events::ArenaEvent;
use super::match_state::{MatchPhase, MatchState};
use super::physics::{Aabb, BodyId, IgnorePairs, PhysicsSystem, RigidBody, Tag};
use super::projectile::{Contact, ContactOutcome, Projectile, Resolution};
use super::replication::Authority;
use super::tuning::{CombatantStats, Tuning};
use super::weapon::{apply_recoil, FireRejected, Targeting, Weapon, WeaponLoadout};

/// Seats in a duel
pub const MAX_SEATS: usize = 2;

/// Work scheduled on the real-time clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RealTimer {
    DilationDecay,
    RoundResult { loser_id: Uuid },
}

impl From<DecayElapsed> for RealTimer {
    fn from(_: DecayElapsed) -> Self {
        RealTimer::DilationDecay
    }
}

/// Work scheduled on the simulation clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimTimer {
    DespawnProjectile(Uuid),
    DespawnCombatant(Uuid),
}

/// Who drives a seat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pilot {
    Human,
    Ai { seed: u64 },
}

/// A combatant slot that survives round restarts
#[derive(Debug, Clone)]
pub struct Seat {
    pub id: Uuid,
    pub name: String,
    pub side: Side,
    pub tag: Tag,
    pub targeting: Targeting,
    pub pilot: Pilot,
    /// Multiplier on the arena's gravity
    pub gravity_scale: f32,
}

impl Seat {
    /// Single-process seat: each side carries its own tag and targets the
    /// other's.
    pub fn local(name: impl Into<String>, side: Side, pilot: Pilot) -> Self {
        let (tag, opposing) = match side {
            Side::Left => (Tag::Player, Tag::Opponent),
            Side::Right => (Tag::Opponent, Tag::Player),
        };
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            side,
            tag,
            targeting: Targeting::against(opposing),
            pilot,
            gravity_scale: 1.0,
        }
    }

    /// Networked seat: both sides share one combatant tag, so only
    /// identity tells shooter and target apart.
    pub fn networked(id: Uuid, name: impl Into<String>, spawn: Vec2) -> Self {
        Self {
            id,
            name: name.into(),
            side: Side::from_spawn_x(spawn.x),
            tag: Tag::Combatant,
            targeting: Targeting::against(Tag::Combatant),
            pilot: Pilot::Human,
            gravity_scale: 1.0,
        }
    }

    /// Fall toward the ceiling instead of the floor
    pub fn inverted(mut self) -> Self {
        self.gravity_scale = -self.gravity_scale.abs();
        self
    }
}

/// The simulation of one duel
pub struct Arena {
    tuning: Tuning,
    authority: Authority,
    match_state: MatchState,
    dilation: TimeDilation,
    real_timers: TimerQueue<RealTimer>,
    sim_timers: TimerQueue<SimTimer>,
    seats: Vec<Seat>,
    combatants: Vec<Combatant>,
    projectiles: Vec<Projectile>,
    walls: [Aabb; 4],
    interior: Aabb,
    ignore_pairs: IgnorePairs,
    /// Simulation seconds not yet consumed by fixed physics steps
    accumulator: f32,
    /// Time scale the accumulator is currently measured in
    accumulator_scale: f32,
    tick: u64,
    events: Vec<ArenaEvent>,
    /// A death already scheduled this round's result
    round_decided: bool,
}

impl Arena {
    pub fn new(tuning: Tuning) -> Self {
        let layout = tuning.arena;
        let interior = Aabb::new(Vec2::ZERO, Vec2::new(layout.half_width, layout.half_height));
        let t = layout.wall_thickness;
        let (hw, hh) = (layout.half_width, layout.half_height);
        let walls = [
            Aabb::new(Vec2::new(-hw - t / 2.0, 0.0), Vec2::new(t / 2.0, hh + t)),
            Aabb::new(Vec2::new(hw + t / 2.0, 0.0), Vec2::new(t / 2.0, hh + t)),
            Aabb::new(Vec2::new(0.0, -hh - t / 2.0), Vec2::new(hw + t, t / 2.0)),
            Aabb::new(Vec2::new(0.0, hh + t / 2.0), Vec2::new(hw + t, t / 2.0)),
        ];

        Self {
            tuning,
            authority: Authority::new(),
            match_state: MatchState::new(),
            dilation: TimeDilation::new(tuning.dilation),
            real_timers: TimerQueue::new(),
            sim_timers: TimerQueue::new(),
            seats: Vec::new(),
            combatants: Vec::new(),
            projectiles: Vec::new(),
            walls,
            interior,
            ignore_pairs: IgnorePairs::new(),
            accumulator: 0.0,
            accumulator_scale: 0.0,
            tick: 0,
            events: Vec::new(),
            round_decided: false,
        }
    }

    // ---- seats and state ----

    /// Seat a combatant and spawn it. Returns false when both seats are
    /// taken or the id is already seated.
    pub fn add_seat(&mut self, seat: Seat) -> bool {
        if self.seats.len() >= MAX_SEATS || self.seats.iter().any(|s| s.id == seat.id) {
            return false;
        }
        let combatant = self.build_combatant(&seat);
        info!(seat_id = %seat.id, side = ?seat.side, "Combatant seated");
        self.combatants.push(combatant);
        self.seats.push(seat);
        true
    }

    /// Remove a seat and its combatant
    pub fn remove_seat(&mut self, id: Uuid) -> Option<Seat> {
        let pos = self.seats.iter().position(|s| s.id == id)?;
        self.combatants.retain(|c| c.id != id);
        self.ignore_pairs.forget(BodyId::Combatant(id));
        Some(self.seats.remove(pos))
    }

    /// Spawn point for a side
    pub fn spawn_point(&self, side: Side) -> Vec2 {
        match side {
            Side::Left => self.tuning.arena.left_spawn,
            Side::Right => self.tuning.arena.right_spawn,
        }
    }

    fn build_combatant(&self, seat: &Seat) -> Combatant {
        let stats = CombatantStats {
            gravity_scale: self.tuning.combatant.gravity_scale * seat.gravity_scale,
            ..self.tuning.combatant
        };
        let aim = seat.side.aim();
        let weapon = Weapon::new(
            self.tuning.weapon,
            WeaponLoadout::armed(self.tuning.projectile, aim, self.tuning.weapon.fire_point_offset),
            aim,
        );
        let controller = match seat.pilot {
            Pilot::Human => Controller::Human,
            Pilot::Ai { seed } => Controller::Ai(AiTrigger::new(seed, &self.tuning.ai)),
        };

        Combatant::new(
            seat.id,
            seat.name.clone(),
            seat.side,
            seat.tag,
            seat.targeting,
            stats.max_health,
            RigidBody::new(self.spawn_point(seat.side), &stats),
            stats.half_extents,
            weapon,
            controller,
        )
    }

    /// Transition the match state, recording the change
    pub fn set_state(&mut self, phase: MatchPhase) {
        if self.match_state.set_state(phase) {
            info!(?phase, "Match state changed");
            self.events.push(ArenaEvent::MatchStateChanged { phase });
        }
    }

    /// Request slow motion for `duration` real seconds
    pub fn trigger_slow_motion(&mut self, duration: f32) -> bool {
        let counted = self
            .dilation
            .trigger(duration, &self.match_state, &mut self.real_timers);
        if counted {
            self.events.push(ArenaEvent::SlowMotion { duration });
        }
        counted
    }

    // ---- fire control ----

    /// Fire `shooter_id`'s weapon. Returns the spawned projectile's id.
    pub fn fire(&mut self, shooter_id: Uuid) -> Result<Uuid, FireRejected> {
        if !self.match_state.is_playing() {
            return Err(FireRejected::NotPlaying);
        }
        let idx = self
            .combatants
            .iter()
            .position(|c| c.id == shooter_id)
            .ok_or(FireRejected::UnknownCombatant)?;

        let shooter = &mut self.combatants[idx];
        if shooter.is_dead() {
            return Err(FireRejected::Dead);
        }
        let shot = shooter.weapon.fire(&shooter.body)?;
        let weapon_stats = *shooter.weapon.stats();
        let shooter_body = shooter.body_id();

        let projectile = Projectile::spawn(
            Some(shooter_id),
            shot.origin,
            shot.direction,
            shooter.targeting.opposing_tag,
            &shot.projectile,
        );
        let projectile_id = projectile.id();
        self.ignore_pairs.ignore(projectile.body_id(), shooter_body);
        self.projectiles.push(projectile);

        self.events.push(ArenaEvent::ShotFired {
            shooter_id,
            projectile_id,
            position: shot.origin,
            direction: shot.direction,
        });

        if let Some(target_id) = self.point_blank_target(idx, shot.origin, shot.direction) {
            debug!(%shooter_id, %target_id, "Point-blank shot");
            self.events.push(ArenaEvent::PointBlank {
                shooter_id,
                target_id,
            });
            self.trigger_slow_motion(weapon_stats.probe_slow_motion);
        }

        apply_recoil(&weapon_stats, &mut self.combatants[idx].body, shot.direction);
        Ok(projectile_id)
    }

    /// Sweep the probe box along the shot and return the opposing combatant
    /// if it is the first thing the probe touches.
    fn point_blank_target(&self, shooter_idx: usize, origin: Vec2, direction: Vec2) -> Option<Uuid> {
        let shooter = &self.combatants[shooter_idx];
        let stats = shooter.weapon.stats();
        let layers = shooter.targeting.probe_layers;
        let cast = |target: &Aabb| {
            PhysicsSystem::box_cast(
                origin,
                stats.probe_half_extents,
                direction,
                stats.probe_distance,
                target,
            )
        };

        let mut nearest: Option<(f32, Option<Uuid>)> = None;
        let mut consider = |distance: f32, hit: Option<Uuid>| {
            if nearest.map_or(true, |(d, _)| distance < d) {
                nearest = Some((distance, hit));
            }
        };

        for c in &self.combatants {
            if c.id == shooter.id || !c.is_present() || !layers.intersects(c.tag.layer()) {
                continue;
            }
            if let Some(d) = cast(&c.collider()) {
                let opposing = c.tag == shooter.targeting.opposing_tag;
                consider(d, opposing.then_some(c.id));
            }
        }
        if layers.intersects(Tag::Wall.layer()) {
            for wall in &self.walls {
                if let Some(d) = cast(wall) {
                    consider(d, None);
                }
            }
        }

        nearest.and_then(|(_, hit)| hit)
    }

    // ---- frame ----

    /// Advance the arena by `real_dt` wall-clock seconds
    pub fn tick(&mut self, real_dt: f32) {
        self.tick += 1;

        for timer in self.real_timers.advance(real_dt) {
            match timer {
                RealTimer::DilationDecay => {
                    let step = self.dilation.on_decay_elapsed(&mut self.real_timers);
                    debug!(?step, "Slow motion window elapsed");
                }
                RealTimer::RoundResult { loser_id } => self.finish_round(loser_id),
            }
        }

        self.sync_accumulator_scale();
        let sim_dt = real_dt * self.time_scale();
        if sim_dt <= 0.0 {
            return;
        }

        for timer in self.sim_timers.advance(sim_dt) {
            match timer {
                SimTimer::DespawnProjectile(id) => self.despawn_projectile(id),
                SimTimer::DespawnCombatant(id) => self.despawn_combatant(id),
            }
        }

        self.update_controllers(sim_dt);

        for projectile in &mut self.projectiles {
            projectile.advance(sim_dt);
        }

        self.sync_accumulator_scale();
        self.accumulator += sim_dt;
        let mut steps = 0;
        loop {
            let fixed = self.fixed_delta();
            if self.accumulator < fixed || steps >= MAX_PHYSICS_STEPS_PER_FRAME {
                break;
            }
            self.accumulator -= fixed;
            self.physics_step(fixed);
            self.sync_accumulator_scale();
            steps += 1;
        }
        if steps >= MAX_PHYSICS_STEPS_PER_FRAME {
            // Drop the backlog rather than spiral.
            self.accumulator = self.accumulator.min(self.fixed_delta());
        }
    }

    /// Keep leftover accumulated time proportional to the current scale so a
    /// dilation change never turns a partial step into a burst of steps.
    fn sync_accumulator_scale(&mut self) {
        let scale = self.time_scale();
        if scale != self.accumulator_scale {
            if self.accumulator_scale > 0.0 {
                self.accumulator *= scale / self.accumulator_scale;
            }
            self.accumulator_scale = scale;
        }
    }

    fn update_controllers(&mut self, sim_dt: f32) {
        let mut ai_shots = Vec::new();
        for c in &mut self.combatants {
            c.weapon.tick(sim_dt);
            if c.is_dead() {
                continue;
            }
            if let Controller::Ai(trigger) = &mut c.controller {
                if trigger.tick(sim_dt) {
                    ai_shots.push(c.id);
                }
            }
        }

        for id in ai_shots {
            if let Err(reason) = self.fire(id) {
                debug!(combatant_id = %id, %reason, "AI fire rejected");
            }
        }
    }

    fn physics_step(&mut self, dt: f32) {
        let gravity = self.tuning.arena.gravity;
        for c in self.combatants.iter_mut().filter(|c| c.is_present()) {
            PhysicsSystem::integrate(&mut c.body, gravity, dt);
            if PhysicsSystem::confine(&mut c.body, c.half_extents, &self.interior) {
                PhysicsSystem::settle(&mut c.body, dt);
            }
        }

        // Contacts for every projectile are gathered before any resolves, so
        // two projectiles meeting in the same step both see each other.
        let contacts = self.collect_contacts();
        for (idx, list) in contacts {
            for contact in list {
                match self.projectiles[idx].resolve_contact(&contact) {
                    ContactOutcome::Resolved(resolution) => {
                        self.apply_resolution(idx, resolution);
                        break;
                    }
                    ContactOutcome::SelfHitDiscarded => {
                        warn!(
                            projectile_id = %self.projectiles[idx].id(),
                            "Projectile touched its own shooter, discarded"
                        );
                    }
                    ContactOutcome::Ignored => {}
                }
            }
        }
    }

    /// Newly entered contacts per active projectile, highest priority first
    fn collect_contacts(&mut self) -> Vec<(usize, Vec<Contact>)> {
        let bounds = Aabb::new(
            self.interior.center,
            self.interior.half_extents + Vec2::splat(self.tuning.arena.wall_thickness),
        );

        let mut overlaps: Vec<(usize, HashSet<BodyId>, Vec<Contact>)> = Vec::new();
        for (idx, p) in self.projectiles.iter().enumerate() {
            if !p.is_active() {
                continue;
            }
            let collider = p.collider();
            let mut touching = HashSet::new();
            let mut contacts = Vec::new();
            let mut touch = |body: BodyId, tag: Tag| {
                if !self.ignore_pairs.is_ignored(p.body_id(), body) && touching.insert(body) {
                    contacts.push(Contact { body, tag });
                }
            };

            for c in self.combatants.iter().filter(|c| c.is_present()) {
                if collider.overlaps(&c.collider()) {
                    touch(c.body_id(), c.tag);
                }
            }
            for (w, wall) in self.walls.iter().enumerate() {
                if collider.overlaps(wall) {
                    touch(BodyId::Wall(w), Tag::Wall);
                }
            }
            if !collider.overlaps(&bounds) {
                // Tunnelled through on a long frame: treat as a wall impact.
                touch(BodyId::Wall(self.nearest_wall(p.position())), Tag::Wall);
            }
            for other in &self.projectiles {
                if other.id() != p.id() && other.is_active() && collider.overlaps(&other.collider())
                {
                    touch(other.body_id(), Tag::Projectile);
                }
            }
            overlaps.push((idx, touching, contacts));
        }

        overlaps
            .into_iter()
            .map(|(idx, touching, contacts)| {
                let projectile = &mut self.projectiles[idx];
                let entered = projectile.update_touching(touching);
                let mut list: Vec<Contact> = contacts
                    .into_iter()
                    .filter(|c| entered.contains(&c.body))
                    .collect();
                list.sort_by_key(|c| (projectile.contact_priority(c), c.body));
                (idx, list)
            })
            .collect()
    }

    fn nearest_wall(&self, position: Vec2) -> usize {
        self.walls
            .iter()
            .enumerate()
            .map(|(i, w)| (i, (w.center - position).abs() - w.half_extents))
            .map(|(i, gap)| (i, gap.max_element()))
            .fold((0, f32::INFINITY), |best, (i, gap)| {
                if gap < best.1 {
                    (i, gap)
                } else {
                    best
                }
            })
            .0
    }

    fn apply_resolution(&mut self, idx: usize, resolution: Resolution) {
        let projectile = &self.projectiles[idx];
        let projectile_id = projectile.id();
        let position = projectile.position();
        let damage = projectile.damage();
        let body = projectile.body_id();

        match resolution {
            Resolution::Hit { target_id } => {
                self.apply_damage(target_id, damage);
                self.trigger_slow_motion(self.tuning.projectile.hit_slow_motion);
            }
            Resolution::Wall => {}
            Resolution::ProjectileCollision { .. } => {
                self.trigger_slow_motion(self.tuning.projectile.collision_slow_motion);
            }
        }

        debug!(%projectile_id, ?resolution, "Projectile resolved");
        self.events.push(ArenaEvent::ProjectileResolved {
            projectile_id,
            kind: resolution.kind(),
            position,
        });
        self.ignore_pairs.forget(body);
        self.sim_timers.schedule(
            self.tuning.projectile.grace_delay,
            SimTimer::DespawnProjectile(projectile_id),
        );
    }

    /// Apply damage to a combatant as the authority
    pub(crate) fn apply_damage(&mut self, target_id: Uuid, amount: i32) -> DamageOutcome {
        let Some(target) = self.combatants.iter_mut().find(|c| c.id == target_id) else {
            return DamageOutcome::Ignored;
        };

        let outcome = target.take_damage(amount, &self.authority);
        match outcome {
            DamageOutcome::Damaged(change) => {
                self.events.push(ArenaEvent::HealthChanged {
                    combatant_id: target_id,
                    change,
                });
            }
            DamageOutcome::Killed(change) => {
                self.events.push(ArenaEvent::HealthChanged {
                    combatant_id: target_id,
                    change,
                });
                self.on_death(target_id);
            }
            DamageOutcome::Ignored => {}
        }
        outcome
    }

    fn on_death(&mut self, combatant_id: Uuid) {
        info!(%combatant_id, "Combatant died");
        self.events.push(ArenaEvent::CombatantDied { combatant_id });
        self.ignore_pairs.forget(BodyId::Combatant(combatant_id));
        self.sim_timers.schedule(
            self.tuning.combatant.despawn_delay,
            SimTimer::DespawnCombatant(combatant_id),
        );

        if !self.round_decided {
            self.round_decided = true;
            self.real_timers.schedule(
                self.tuning.result_delay,
                RealTimer::RoundResult {
                    loser_id: combatant_id,
                },
            );
        }
    }

    fn despawn_projectile(&mut self, projectile_id: Uuid) {
        let before = self.projectiles.len();
        self.projectiles.retain(|p| p.id() != projectile_id);
        if self.projectiles.len() != before {
            self.ignore_pairs.forget(BodyId::Projectile(projectile_id));
            self.events
                .push(ArenaEvent::ProjectileDespawned { projectile_id });
        }
    }

    fn despawn_combatant(&mut self, combatant_id: Uuid) {
        let before = self.combatants.len();
        self.combatants.retain(|c| c.id != combatant_id);
        if self.combatants.len() != before {
            self.events
                .push(ArenaEvent::CombatantDespawned { combatant_id });
        }
    }

    fn finish_round(&mut self, loser_id: Uuid) {
        let winner_id = self.seats.iter().find(|s| s.id != loser_id).map(|s| s.id);
        info!(%loser_id, ?winner_id, "Round over");
        self.events.push(ArenaEvent::RoundOver {
            loser_id,
            winner_id,
        });
        self.set_state(MatchPhase::Stopped);
    }

    /// Reset every combatant to full health at its spawn and start playing
    pub fn restart_round(&mut self) {
        self.projectiles.clear();
        self.ignore_pairs.clear();
        self.sim_timers = TimerQueue::new();
        self.real_timers
            .retain(|t| !matches!(t, RealTimer::RoundResult { .. }));
        self.dilation.cancel(&mut self.real_timers);
        self.round_decided = false;
        self.accumulator = 0.0;

        self.combatants = self
            .seats
            .iter()
            .map(|seat| self.build_combatant(seat))
            .collect();

        info!(seats = self.seats.len(), "Round restarted");
        self.events.push(ArenaEvent::RoundRestarted);
        self.set_state(MatchPhase::Playing);
    }

    // ---- queries ----

    /// Take the events recorded since the last drain
    pub fn drain_events(&mut self) -> Vec<ArenaEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn phase(&self) -> MatchPhase {
        self.match_state.phase()
    }

    pub fn is_playing(&self) -> bool {
        self.match_state.is_playing()
    }

    /// A combatant died this round; only a restart resumes play
    pub fn is_round_decided(&self) -> bool {
        self.round_decided
    }

    pub fn time_scale(&self) -> f32 {
        self.dilation.time_scale(&self.match_state)
    }

    pub fn fixed_delta(&self) -> f32 {
        self.dilation.fixed_delta(&self.match_state)
    }

    pub fn dilation(&self) -> &TimeDilation {
        &self.dilation
    }

    pub fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn seats(&self) -> &[Seat] {
        &self.seats
    }

    pub fn combatants(&self) -> &[Combatant] {
        &self.combatants
    }

    pub fn combatant(&self, id: Uuid) -> Option<&Combatant> {
        self.combatants.iter().find(|c| c.id == id)
    }

    pub fn projectiles(&self) -> &[Projectile] {
        &self.projectiles
    }

    pub fn walls(&self) -> &[Aabb; 4] {
        &self.walls
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::events::Outcome;
    use crate::game::projectile::ResolutionKind;

    const FRAME: f32 = 1.0 / 60.0;

    /// Gravity off so combatants hold their spawn height
    fn weightless() -> Tuning {
        let mut tuning = Tuning::default();
        tuning.arena.gravity = 0.0;
        tuning
    }

    fn duel(tuning: Tuning) -> (Arena, Uuid, Uuid) {
        let mut arena = Arena::new(tuning);
        let a = Seat::local("a", Side::Left, Pilot::Human);
        let b = Seat::local("b", Side::Right, Pilot::Human);
        let (a_id, b_id) = (a.id, b.id);
        assert!(arena.add_seat(a));
        assert!(arena.add_seat(b));
        arena.set_state(MatchPhase::Playing);
        arena.drain_events();
        (arena, a_id, b_id)
    }

    fn run(arena: &mut Arena, frames: usize) -> Vec<ArenaEvent> {
        let mut events = Vec::new();
        for _ in 0..frames {
            arena.tick(FRAME);
            events.extend(arena.drain_events());
        }
        events
    }

    fn resolved_kinds(events: &[ArenaEvent]) -> Vec<ResolutionKind> {
        events
            .iter()
            .filter_map(|e| match e {
                ArenaEvent::ProjectileResolved { kind, .. } => Some(*kind),
                _ => None,
            })
            .collect()
    }

    fn slow_motions(events: &[ArenaEvent]) -> Vec<f32> {
        events
            .iter()
            .filter_map(|e| match e {
                ArenaEvent::SlowMotion { duration } => Some(*duration),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn third_seat_is_refused() {
        let (mut arena, _, _) = duel(weightless());
        assert!(!arena.add_seat(Seat::local("c", Side::Left, Pilot::Human)));
        assert_eq!(arena.combatants().len(), 2);
    }

    #[test]
    fn fire_is_rejected_while_stopped() {
        let (mut arena, a, _) = duel(weightless());
        arena.set_state(MatchPhase::Stopped);
        assert_eq!(arena.fire(a), Err(FireRejected::NotPlaying));
        assert_eq!(arena.fire(Uuid::new_v4()), Err(FireRejected::NotPlaying));
        assert!(arena.projectiles().is_empty());
    }

    #[test]
    fn dead_or_missing_shooter_is_rejected() {
        let (mut arena, a, b) = duel(weightless());
        assert_eq!(arena.fire(Uuid::new_v4()), Err(FireRejected::UnknownCombatant));

        arena.apply_damage(b, 100);
        arena.drain_events();
        assert_eq!(arena.fire(b), Err(FireRejected::Dead));
        assert!(arena.projectiles().is_empty());

        // Despawned before the round result lands: the round still plays.
        let events = run(&mut arena, 70);
        assert!(events
            .iter()
            .any(|e| matches!(e, ArenaEvent::CombatantDespawned { combatant_id } if *combatant_id == b)));
        assert!(arena.is_playing());
        assert_eq!(arena.fire(b), Err(FireRejected::UnknownCombatant));
        assert!(arena.projectiles().is_empty());
        assert!(arena.fire(a).is_ok());
    }

    #[test]
    fn networked_shots_keep_world_direction_while_body_spins() {
        let mut arena = Arena::new(weightless().networked());
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let (left, right) = (arena.spawn_point(Side::Left), arena.spawn_point(Side::Right));
        arena.add_seat(Seat::networked(a, "host", left));
        arena.add_seat(Seat::networked(b, "guest", right));
        arena.set_state(MatchPhase::Playing);
        arena.drain_events();

        let shot_directions = |events: &[ArenaEvent]| -> Vec<Vec2> {
            events
                .iter()
                .filter_map(|e| match e {
                    ArenaEvent::ShotFired { direction, .. } => Some(*direction),
                    _ => None,
                })
                .collect()
        };

        arena.fire(a).expect("first shot fires");
        let mut events = arena.drain_events();
        events.extend(run(&mut arena, 30));

        let body = &mut arena.combatants[0].body;
        body.rotation = std::f32::consts::FRAC_PI_2;
        let (position, velocity) = (body.position, body.velocity);

        arena.fire(a).expect("second shot fires");
        events.extend(arena.drain_events());

        assert_eq!(shot_directions(&events), vec![Vec2::X, Vec2::X]);
        let second = arena.projectiles().last().expect("second projectile");
        assert!((second.position() - (position + Vec2::new(0.0, 0.6))).length() < 1e-4);
        // Lift is world up regardless of the spin.
        let kick = arena.combatants[0].body.velocity - velocity;
        assert!((kick - Vec2::new(-2.0, 1.5)).length() < 1e-4);
    }

    #[test]
    fn wall_and_target_in_one_step_resolve_once_as_hit() {
        let mut tuning = weightless();
        // Target flush against the right wall; one 20 ms step carries the
        // shot into both.
        tuning.arena.right_spawn = Vec2::new(8.5, -2.0);
        tuning.projectile.speed = 670.0;
        let (mut arena, a, b) = duel(tuning);

        arena.fire(a).expect("shot fires");
        let mut events = arena.drain_events();
        arena.tick(0.02);
        events.extend(arena.drain_events());

        assert_eq!(resolved_kinds(&events), vec![ResolutionKind::Hit]);

        events.extend(run(&mut arena, 30));
        assert_eq!(resolved_kinds(&events), vec![ResolutionKind::Hit]);
        let health: Vec<(Uuid, i32)> = events
            .iter()
            .filter_map(|e| match e {
                ArenaEvent::HealthChanged {
                    combatant_id,
                    change,
                } => Some((*combatant_id, change.new)),
                _ => None,
            })
            .collect();
        assert_eq!(health, vec![(b, 80)]);
        assert_eq!(arena.combatant(b).map(|c| c.health()), Some(80));
    }

    #[test]
    fn basic_duel_hit() {
        let (mut arena, a, b) = duel(weightless());

        arena.fire(a).expect("first shot fires");
        assert_eq!(arena.fire(a), Err(FireRejected::CoolingDown));

        let mut events = arena.drain_events();
        events.extend(run(&mut arena, 90));

        assert_eq!(arena.combatant(b).map(|c| c.health()), Some(80));
        assert_eq!(arena.combatant(a).map(|c| c.health()), Some(100));
        assert_eq!(resolved_kinds(&events), vec![ResolutionKind::Hit]);
        assert_eq!(slow_motions(&events), vec![0.3]);
    }

    #[test]
    fn lethal_shot_ends_round_after_delay() {
        let (mut arena, a, b) = duel(weightless());
        arena.apply_damage(b, 80);
        arena.drain_events();

        arena.fire(a).expect("shot fires");
        let mut events = Vec::new();
        let mut frames = 0;
        while !events
            .iter()
            .any(|e| matches!(e, ArenaEvent::CombatantDied { .. }))
        {
            events.extend(run(&mut arena, 1));
            frames += 1;
            assert!(frames < 120, "shot never landed");
        }

        let dead = arena.combatant(b).expect("still in arena until despawn");
        assert!(dead.is_dead());
        assert!(!dead.is_present());
        assert!(!events
            .iter()
            .any(|e| matches!(e, ArenaEvent::RoundOver { .. })));
        assert!(arena.is_playing());

        let later = run(&mut arena, 100);
        let round_over = later.iter().find_map(|e| match e {
            ArenaEvent::RoundOver {
                loser_id,
                winner_id,
            } => Some((*loser_id, *winner_id)),
            _ => None,
        });
        assert_eq!(round_over, Some((b, Some(a))));
        assert_eq!(Outcome::for_observer(a, b), Outcome::Win);
        assert_eq!(Outcome::for_observer(b, b), Outcome::Loss);
        assert_eq!(arena.phase(), MatchPhase::Stopped);
        assert_eq!(arena.fire(a), Err(FireRejected::NotPlaying));
    }

    #[test]
    fn wall_shot_resolves_then_despawns() {
        let mut arena = Arena::new(weightless());
        let a = Seat::local("a", Side::Left, Pilot::Human);
        let a_id = a.id;
        arena.add_seat(a);
        arena.set_state(MatchPhase::Playing);

        arena.fire(a_id).expect("shot fires");
        let events = run(&mut arena, 100);

        assert_eq!(resolved_kinds(&events), vec![ResolutionKind::Wall]);
        assert!(slow_motions(&events).is_empty());
        assert!(!events
            .iter()
            .any(|e| matches!(e, ArenaEvent::HealthChanged { .. })));
        assert!(events
            .iter()
            .any(|e| matches!(e, ArenaEvent::ProjectileDespawned { .. })));
        assert!(arena.projectiles().is_empty());
        assert_eq!(arena.time_scale(), 1.0);
    }

    #[test]
    fn projectiles_colliding_midair_both_resolve() {
        let (mut arena, a, b) = duel(weightless());

        arena.fire(a).expect("a fires");
        arena.fire(b).expect("b fires");
        let events = run(&mut arena, 60);

        assert_eq!(
            resolved_kinds(&events),
            vec![
                ResolutionKind::ProjectileCollision,
                ResolutionKind::ProjectileCollision
            ]
        );
        let slows = slow_motions(&events);
        assert_eq!(slows.len(), 2);
        assert!(slows
            .iter()
            .all(|d| *d > arena.tuning().projectile.hit_slow_motion));
        assert!(arena.combatants().iter().all(|c| c.health() == 100));
    }

    #[test]
    fn shooter_is_never_damaged_by_own_projectile() {
        let mut arena = Arena::new(weightless().networked());
        let spawn = arena.spawn_point(Side::Left);
        let seat = Seat::networked(Uuid::new_v4(), "host", spawn);
        let id = seat.id;
        arena.add_seat(seat);
        arena.set_state(MatchPhase::Playing);

        arena.fire(id).expect("shot fires");
        // Spawned overlapping the shooter's collider, same tag as the target.
        let projectile = &arena.projectiles()[0];
        assert!(projectile.collider().overlaps(&arena.combatants()[0].collider()));

        // Even with the ignore pair gone, identity filtering holds.
        arena.ignore_pairs.clear();
        let events = run(&mut arena, 5);

        assert_eq!(arena.combatant(id).map(|c| c.health()), Some(100));
        assert!(resolved_kinds(&events).is_empty());
    }

    #[test]
    fn point_blank_shot_requests_slow_motion() {
        let mut tuning = weightless();
        tuning.arena.right_spawn = Vec2::new(-1.0, -2.0);
        let (mut arena, a, b) = duel(tuning);

        arena.fire(a).expect("shot fires");
        let events = arena.drain_events();

        assert!(events.iter().any(|e| matches!(
            e,
            ArenaEvent::PointBlank { target_id, .. } if *target_id == b
        )));
        assert_eq!(slow_motions(&events), vec![0.5]);
    }

    #[test]
    fn ai_fires_on_its_own() {
        let mut arena = Arena::new(weightless());
        arena.add_seat(Seat::local("bot", Side::Right, Pilot::Ai { seed: 3 }));
        arena.set_state(MatchPhase::Playing);

        let events = run(&mut arena, 150);
        assert!(events
            .iter()
            .any(|e| matches!(e, ArenaEvent::ShotFired { .. })));
    }

    #[test]
    fn restart_restores_health_and_plays() {
        let (mut arena, a, b) = duel(weightless());
        arena.apply_damage(b, 100);
        arena.fire(a).expect("shot fires");
        arena.set_state(MatchPhase::Stopped);

        arena.restart_round();

        assert!(arena.is_playing());
        assert!(arena.projectiles().is_empty());
        assert!(arena.combatants().iter().all(|c| c.health() == 100));
        assert_eq!(arena.dilation().active_requests(), 0);
        // The cancelled result must not stop the new round.
        run(&mut arena, 120);
        assert!(arena.is_playing());
    }

    #[test]
    fn stopped_arena_is_frozen() {
        let (mut arena, a, _) = duel(weightless());
        arena.fire(a).expect("shot fires");
        arena.set_state(MatchPhase::Stopped);
        let before = arena.projectiles()[0].position();

        run(&mut arena, 30);

        assert_eq!(arena.projectiles()[0].position(), before);
        assert_eq!(arena.time_scale(), 0.0);
    }
}
