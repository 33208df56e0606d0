//! Gameplay tuning values

use glam::Vec2;

/// Combatant body and health stats
#[derive(Debug, Clone, Copy)]
pub struct CombatantStats {
    /// Health at round start
    pub max_health: i32,
    /// Collider half extents
    pub half_extents: Vec2,
    /// Body mass for impulse response
    pub mass: f32,
    /// Multiplier on arena gravity (negative flips the body upside down)
    pub gravity_scale: f32,
    /// Fraction of angular velocity lost per second
    pub angular_damping: f32,
    /// Simulation seconds between death and removal from the arena
    pub despawn_delay: f32,
}

impl Default for CombatantStats {
    fn default() -> Self {
        Self {
            max_health: 100,
            half_extents: Vec2::new(0.5, 0.3),
            mass: 1.0,
            gravity_scale: 1.0,
            angular_damping: 0.05,
            despawn_delay: 1.0,
        }
    }
}

impl CombatantStats {
    /// Moment of inertia of the collider box
    pub fn inertia(&self) -> f32 {
        let size = self.half_extents * 2.0;
        self.mass * (size.x * size.x + size.y * size.y) / 12.0
    }
}

/// Frame a weapon's aim and recoil lift are expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AimFrame {
    /// Aim turns with the body and lift follows the body's up axis
    #[default]
    Body,
    /// Aim stays fixed in world space and lift follows world up
    World,
}

/// Impulses applied to the firer on every shot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecoilProfile {
    /// Push opposite to the fire direction
    pub back: f32,
    /// Push away from the resting surface
    pub lift: f32,
    /// Angular impulse, multiplied by the sign of the fire direction
    pub torque: f32,
}

impl RecoilProfile {
    /// Single-process feel: a light kick that mostly hops the gun
    pub fn local() -> Self {
        Self {
            back: 2.0 * 0.15,
            lift: 2.0 * 0.75,
            torque: 0.25,
        }
    }

    /// Networked feel: heavier kick, spin opposes the fire direction
    pub fn networked() -> Self {
        Self {
            back: 2.0,
            lift: 1.5,
            torque: -1.5,
        }
    }
}

/// Weapon firing stats
#[derive(Debug, Clone, Copy)]
pub struct WeaponStats {
    /// Cooldown between shots (simulation seconds)
    pub cooldown: f32,
    /// Distance from body center to the fire point along the aim
    pub fire_point_offset: f32,
    /// Half extents of the point-blank probe box
    pub probe_half_extents: Vec2,
    /// Reach of the point-blank probe
    pub probe_distance: f32,
    /// Slow motion requested when the probe finds the opponent
    pub probe_slow_motion: f32,
    pub recoil: RecoilProfile,
    pub aim_frame: AimFrame,
}

impl Default for WeaponStats {
    fn default() -> Self {
        Self {
            cooldown: 0.25,
            fire_point_offset: 0.6,
            probe_half_extents: Vec2::new(0.1, 0.2),
            probe_distance: 8.0,
            probe_slow_motion: 0.5,
            recoil: RecoilProfile::local(),
            aim_frame: AimFrame::Body,
        }
    }
}

/// Projectile template
#[derive(Debug, Clone, Copy)]
pub struct ProjectileStats {
    /// Units per simulation second
    pub speed: f32,
    pub damage: i32,
    /// Collider half extents
    pub half_extents: Vec2,
    /// Simulation seconds an inert projectile lingers before removal
    pub grace_delay: f32,
    /// Slow motion requested on a combatant hit
    pub hit_slow_motion: f32,
    /// Slow motion requested when two projectiles collide
    pub collision_slow_motion: f32,
}

impl Default for ProjectileStats {
    fn default() -> Self {
        Self {
            speed: 10.0,
            damage: 20,
            half_extents: Vec2::new(0.15, 0.075),
            grace_delay: 0.15,
            hit_slow_motion: 0.3,
            collision_slow_motion: 0.5,
        }
    }
}

/// Time dilation parameters
#[derive(Debug, Clone, Copy)]
pub struct DilationConfig {
    /// Time scale while slow motion is active
    pub slow_time_scale: f32,
    /// Fixed physics step at normal speed
    pub base_fixed_delta: f32,
}

impl Default for DilationConfig {
    fn default() -> Self {
        Self {
            slow_time_scale: 0.08,
            base_fixed_delta: crate::util::time::BASE_FIXED_DELTA,
        }
    }
}

/// Arena geometry
#[derive(Debug, Clone, Copy)]
pub struct ArenaLayout {
    /// Half width of the playable interior
    pub half_width: f32,
    /// Half height of the playable interior
    pub half_height: f32,
    pub wall_thickness: f32,
    /// Downward acceleration applied to bodies with gravity scale 1
    pub gravity: f32,
    pub left_spawn: Vec2,
    pub right_spawn: Vec2,
}

impl Default for ArenaLayout {
    fn default() -> Self {
        Self {
            half_width: 9.0,
            half_height: 5.0,
            wall_thickness: 1.0,
            gravity: 9.81,
            left_spawn: Vec2::new(-5.0, -2.0),
            right_spawn: Vec2::new(5.0, -2.0),
        }
    }
}

/// AI opponent pacing
#[derive(Debug, Clone, Copy)]
pub struct AiStats {
    pub min_fire_interval: f32,
    pub max_fire_interval: f32,
}

impl Default for AiStats {
    fn default() -> Self {
        Self {
            min_fire_interval: 0.5,
            max_fire_interval: 2.0,
        }
    }
}

/// Every tunable value of a match
#[derive(Debug, Clone, Copy)]
pub struct Tuning {
    pub combatant: CombatantStats,
    pub weapon: WeaponStats,
    pub projectile: ProjectileStats,
    pub dilation: DilationConfig,
    pub arena: ArenaLayout,
    pub ai: AiStats,
    /// Real seconds between a death and the round outcome
    pub result_delay: f32,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            combatant: CombatantStats::default(),
            weapon: WeaponStats::default(),
            projectile: ProjectileStats::default(),
            dilation: DilationConfig::default(),
            arena: ArenaLayout::default(),
            ai: AiStats::default(),
            result_delay: RESULT_DELAY_SECS,
        }
    }
}

impl Tuning {
    /// Same values with the networked recoil profile and a world-fixed aim
    pub fn networked(mut self) -> Self {
        self.weapon.recoil = RecoilProfile::networked();
        self.weapon.aim_frame = AimFrame::World;
        self
    }
}

/// Default round outcome delay in real seconds
pub const RESULT_DELAY_SECS: f32 = 1.5;
