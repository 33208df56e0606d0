//! Body physics, collision shapes and contact filtering

use std::collections::HashSet;

use bitflags::bitflags;
use glam::Vec2;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::tuning::CombatantStats;

/// Collision tag carried by every collider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tag {
    /// Left-hand combatant in single-process mode
    Player,
    /// Right-hand combatant in single-process mode
    Opponent,
    /// Any combatant in networked mode (one shared body template)
    Combatant,
    Wall,
    Projectile,
}

impl Tag {
    /// Layer a collider with this tag lives on
    pub fn layer(self) -> Layers {
        match self {
            Tag::Player => Layers::PLAYER,
            Tag::Opponent => Layers::OPPONENT,
            Tag::Combatant => Layers::COMBATANT,
            Tag::Wall => Layers::WALL,
            Tag::Projectile => Layers::PROJECTILE,
        }
    }
}

bitflags! {
    /// Collision layer mask used by casts
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Layers: u8 {
        const PLAYER = 1 << 0;
        const OPPONENT = 1 << 1;
        const COMBATANT = 1 << 2;
        const WALL = 1 << 3;
        const PROJECTILE = 1 << 4;
    }
}

/// Identity of a physical volume in the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BodyId {
    Combatant(Uuid),
    Projectile(Uuid),
    Wall(usize),
}

/// Axis-aligned box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub center: Vec2,
    pub half_extents: Vec2,
}

impl Aabb {
    pub fn new(center: Vec2, half_extents: Vec2) -> Self {
        Self {
            center,
            half_extents,
        }
    }

    pub fn min(&self) -> Vec2 {
        self.center - self.half_extents
    }

    pub fn max(&self) -> Vec2 {
        self.center + self.half_extents
    }

    /// Check overlap with another box (touching counts)
    pub fn overlaps(&self, other: &Aabb) -> bool {
        let d = (self.center - other.center).abs();
        let reach = self.half_extents + other.half_extents;
        d.x <= reach.x && d.y <= reach.y
    }
}

/// Rigid body state for a combatant
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidBody {
    pub position: Vec2,
    /// Rotation in radians, counter-clockwise
    pub rotation: f32,
    pub velocity: Vec2,
    pub angular_velocity: f32,
    pub mass: f32,
    pub inertia: f32,
    pub gravity_scale: f32,
    pub angular_damping: f32,
}

impl RigidBody {
    pub fn new(position: Vec2, stats: &CombatantStats) -> Self {
        Self {
            position,
            rotation: 0.0,
            velocity: Vec2::ZERO,
            angular_velocity: 0.0,
            mass: stats.mass,
            inertia: stats.inertia(),
            gravity_scale: stats.gravity_scale,
            angular_damping: stats.angular_damping,
        }
    }

    /// Body-local right axis in world space
    pub fn right(&self) -> Vec2 {
        Vec2::from_angle(self.rotation)
    }

    /// Body-local up axis in world space
    pub fn up(&self) -> Vec2 {
        self.right().perp()
    }

    /// Rotate a body-local vector into world space
    pub fn to_world(&self, local: Vec2) -> Vec2 {
        self.right().rotate(local)
    }

    pub fn apply_impulse(&mut self, impulse: Vec2) {
        if self.mass > 0.0 {
            self.velocity += impulse / self.mass;
        }
    }

    pub fn apply_torque_impulse(&mut self, torque: f32) {
        if self.inertia > 0.0 {
            self.angular_velocity += torque / self.inertia;
        }
    }
}

/// Physics system for integrating bodies and answering spatial queries
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Floor contact keeps this fraction of horizontal speed per step
    const GROUND_FRICTION: f32 = 0.9;
    /// Fraction of tilt removed per second while grounded
    const RIGHTING_RATE: f32 = 8.0;

    /// Integrate one fixed step under gravity
    pub fn integrate(body: &mut RigidBody, gravity: f32, dt: f32) {
        body.velocity.y -= gravity * body.gravity_scale * dt;
        body.position += body.velocity * dt;

        body.angular_velocity *= (1.0 - body.angular_damping * dt).max(0.0);
        body.rotation = (body.rotation + body.angular_velocity * dt)
            .rem_euclid(std::f32::consts::TAU);
    }

    /// Keep a body's box inside the arena interior. Returns true when the
    /// body is resting on the surface gravity pulls it toward.
    pub fn confine(body: &mut RigidBody, half_extents: Vec2, interior: &Aabb) -> bool {
        let min = interior.min() + half_extents;
        let max = interior.max() - half_extents;

        if body.position.x < min.x {
            body.position.x = min.x;
            body.velocity.x = body.velocity.x.max(0.0);
        } else if body.position.x > max.x {
            body.position.x = max.x;
            body.velocity.x = body.velocity.x.min(0.0);
        }

        let falls_down = body.gravity_scale >= 0.0;
        if body.position.y < min.y {
            body.position.y = min.y;
            body.velocity.y = body.velocity.y.max(0.0);
            falls_down
        } else if body.position.y > max.y {
            body.position.y = max.y;
            body.velocity.y = body.velocity.y.min(0.0);
            !falls_down
        } else {
            false
        }
    }

    /// Bleed off sliding and spin of a grounded body and ease it back upright
    pub fn settle(body: &mut RigidBody, dt: f32) {
        body.velocity.x *= Self::GROUND_FRICTION;
        body.angular_velocity *= Self::GROUND_FRICTION;

        // Signed angle to upright in (-PI, PI].
        let mut offset = body.rotation;
        if offset > std::f32::consts::PI {
            offset -= std::f32::consts::TAU;
        }
        let eased = offset * (1.0 - (Self::RIGHTING_RATE * dt).min(1.0));
        body.rotation = eased.rem_euclid(std::f32::consts::TAU);
    }

    /// Sweep a box from `origin` along `direction` and return the distance
    /// at which it first touches `target`, if within `max_distance`.
    pub fn box_cast(
        origin: Vec2,
        half_extents: Vec2,
        direction: Vec2,
        max_distance: f32,
        target: &Aabb,
    ) -> Option<f32> {
        let dir = direction.normalize_or_zero();
        if dir == Vec2::ZERO {
            return None;
        }

        // Minkowski sum reduces the sweep to a ray against a grown box.
        let grown = Aabb::new(target.center, target.half_extents + half_extents);
        let (min, max) = (grown.min(), grown.max());

        let mut t_enter = 0.0f32;
        let mut t_exit = max_distance;
        for axis in 0..2 {
            let (o, d, lo, hi) = (origin[axis], dir[axis], min[axis], max[axis]);
            if d.abs() < f32::EPSILON {
                if o < lo || o > hi {
                    return None;
                }
                continue;
            }
            let (mut t0, mut t1) = ((lo - o) / d, (hi - o) / d);
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }
            t_enter = t_enter.max(t0);
            t_exit = t_exit.min(t1);
            if t_enter > t_exit {
                return None;
            }
        }
        Some(t_enter)
    }
}

/// Explicit pairs of bodies that must never produce contacts
#[derive(Debug, Default, Clone)]
pub struct IgnorePairs {
    pairs: HashSet<(BodyId, BodyId)>,
}

impl IgnorePairs {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(a: BodyId, b: BodyId) -> (BodyId, BodyId) {
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }

    pub fn ignore(&mut self, a: BodyId, b: BodyId) {
        self.pairs.insert(Self::key(a, b));
    }

    pub fn is_ignored(&self, a: BodyId, b: BodyId) -> bool {
        self.pairs.contains(&Self::key(a, b))
    }

    /// Forget every pair involving `body`
    pub fn forget(&mut self, body: BodyId) {
        self.pairs.retain(|(a, b)| *a != body && *b != body);
    }

    pub fn clear(&mut self) {
        self.pairs.clear();
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boxes_overlap_when_touching() {
        let a = Aabb::new(Vec2::ZERO, Vec2::splat(1.0));
        let b = Aabb::new(Vec2::new(2.0, 0.0), Vec2::splat(1.0));
        let c = Aabb::new(Vec2::new(2.1, 0.0), Vec2::splat(1.0));
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn box_cast_reports_first_touch_distance() {
        let target = Aabb::new(Vec2::new(5.0, 0.0), Vec2::new(0.5, 0.3));
        let hit = PhysicsSystem::box_cast(Vec2::ZERO, Vec2::new(0.1, 0.2), Vec2::X, 8.0, &target);
        let distance = hit.expect("target is in range");
        assert!((distance - 4.4).abs() < 1e-4);
    }

    #[test]
    fn box_cast_misses_out_of_range_or_behind() {
        let target = Aabb::new(Vec2::new(5.0, 0.0), Vec2::new(0.5, 0.3));
        let half = Vec2::new(0.1, 0.2);
        assert!(PhysicsSystem::box_cast(Vec2::ZERO, half, Vec2::X, 4.0, &target).is_none());
        assert!(PhysicsSystem::box_cast(Vec2::ZERO, half, -Vec2::X, 8.0, &target).is_none());
        assert!(PhysicsSystem::box_cast(Vec2::new(0.0, 3.0), half, Vec2::X, 8.0, &target).is_none());
    }

    #[test]
    fn confine_rests_body_on_floor() {
        let stats = CombatantStats::default();
        let interior = Aabb::new(Vec2::ZERO, Vec2::new(9.0, 5.0));
        let mut body = RigidBody::new(Vec2::new(0.0, -4.65), &stats);
        body.velocity = Vec2::new(1.0, -5.0);

        PhysicsSystem::integrate(&mut body, 9.81, 0.02);
        let grounded = PhysicsSystem::confine(&mut body, stats.half_extents, &interior);
        assert!(grounded);
        PhysicsSystem::settle(&mut body, 0.02);

        assert!((body.position.y - (-4.7)).abs() < 1e-5);
        assert_eq!(body.velocity.y, 0.0);
        assert!(body.velocity.x < 1.0);
    }

    #[test]
    fn settle_tilts_back_toward_upright() {
        let stats = CombatantStats::default();
        let mut body = RigidBody::new(Vec2::ZERO, &stats);
        body.rotation = std::f32::consts::TAU - 0.5;

        PhysicsSystem::settle(&mut body, 0.02);

        let tilt = body.rotation - std::f32::consts::TAU;
        assert!(tilt > -0.5 && tilt < 0.0);
    }

    #[test]
    fn impulses_scale_by_mass_and_inertia() {
        let stats = CombatantStats {
            mass: 2.0,
            ..CombatantStats::default()
        };
        let mut body = RigidBody::new(Vec2::ZERO, &stats);
        body.apply_impulse(Vec2::new(4.0, 0.0));
        body.apply_torque_impulse(stats.inertia());
        assert_eq!(body.velocity, Vec2::new(2.0, 0.0));
        assert!((body.angular_velocity - 1.0).abs() < 1e-6);
    }

    #[test]
    fn ignore_pairs_are_unordered() {
        let a = BodyId::Combatant(Uuid::new_v4());
        let b = BodyId::Projectile(Uuid::new_v4());
        let mut pairs = IgnorePairs::new();
        pairs.ignore(b, a);
        assert!(pairs.is_ignored(a, b));
        pairs.forget(b);
        assert!(pairs.is_empty());
    }
}
