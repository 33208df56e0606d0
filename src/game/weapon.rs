//! Weapon fire control: cooldown, projectile emission and recoil

use glam::Vec2;
use thiserror::Error;
use tracing::error;

use super::physics::{Layers, RigidBody, Tag};
use super::tuning::{AimFrame, ProjectileStats, WeaponStats};

/// Configuration a weapon cannot fire without
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WeaponError {
    #[error("no projectile template bound")]
    MissingProjectile,
    #[error("no fire point bound")]
    MissingFirePoint,
}

/// Reasons a fire command produced no shot.
///
/// These are steady-state occurrences under normal input and are never
/// surfaced to players.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FireRejected {
    #[error("match is not playing")]
    NotPlaying,
    #[error("unknown combatant")]
    UnknownCombatant,
    #[error("combatant is dead")]
    Dead,
    #[error("weapon is cooling down")]
    CoolingDown,
    #[error("weapon is jammed: {0}")]
    Jammed(WeaponError),
}

/// What a weapon aims at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Targeting {
    /// Layers the point-blank probe can see
    pub probe_layers: Layers,
    /// Tag of the combatants this weapon's projectiles damage
    pub opposing_tag: Tag,
}

impl Targeting {
    /// Aim at `opposing_tag`; walls block the probe's line of sight
    pub fn against(opposing_tag: Tag) -> Self {
        Self {
            probe_layers: opposing_tag.layer() | Layers::WALL,
            opposing_tag,
        }
    }
}

/// Bound references a weapon needs to fire
#[derive(Debug, Clone, Copy)]
pub struct WeaponLoadout {
    pub projectile: Option<ProjectileStats>,
    /// Emission point in body-local space
    pub fire_point: Option<Vec2>,
}

impl WeaponLoadout {
    /// Fully bound loadout with the fire point `offset` units along `aim`
    pub fn armed(projectile: ProjectileStats, aim: Vec2, offset: f32) -> Self {
        Self {
            projectile: Some(projectile),
            fire_point: Some(aim * offset),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Armed {
    projectile: ProjectileStats,
    fire_point: Vec2,
}

/// A shot the arena must spawn
#[derive(Debug, Clone, Copy)]
pub struct Shot {
    /// World-space emission point
    pub origin: Vec2,
    /// World-space unit fire direction
    pub direction: Vec2,
    pub projectile: ProjectileStats,
}

/// Weapon bound to one combatant
#[derive(Debug, Clone)]
pub struct Weapon {
    stats: WeaponStats,
    armed: Result<Armed, WeaponError>,
    /// Unit fire direction, body-local or world-space per `stats.aim_frame`
    aim: Vec2,
    cooldown_remaining: f32,
}

impl Weapon {
    /// Bind a weapon. A loadout with missing references produces a weapon
    /// that rejects every fire command.
    pub fn new(stats: WeaponStats, loadout: WeaponLoadout, aim: Vec2) -> Self {
        let armed = match (loadout.projectile, loadout.fire_point) {
            (None, _) => Err(WeaponError::MissingProjectile),
            (_, None) => Err(WeaponError::MissingFirePoint),
            (Some(projectile), Some(fire_point)) => Ok(Armed {
                projectile,
                fire_point,
            }),
        };
        if let Err(e) = &armed {
            error!(error = %e, "Weapon misconfigured, fire disabled");
        }

        Self {
            stats,
            armed,
            aim: aim.normalize_or_zero(),
            cooldown_remaining: 0.0,
        }
    }

    pub fn stats(&self) -> &WeaponStats {
        &self.stats
    }

    pub fn aim(&self) -> Vec2 {
        self.aim
    }

    pub fn cooldown_remaining(&self) -> f32 {
        self.cooldown_remaining
    }

    pub fn is_ready(&self) -> bool {
        self.cooldown_remaining <= 0.0
    }

    pub fn is_jammed(&self) -> bool {
        self.armed.is_err()
    }

    /// Count the cooldown down by `dt` simulation seconds
    pub fn tick(&mut self, dt: f32) {
        self.cooldown_remaining = (self.cooldown_remaining - dt).max(0.0);
    }

    /// World-space fire direction for a body pose
    pub fn fire_direction(&self, body: &RigidBody) -> Vec2 {
        match self.stats.aim_frame {
            AimFrame::Body => body.to_world(self.aim).normalize_or_zero(),
            AimFrame::World => self.aim,
        }
    }

    /// Emit a shot from `body` and restart the cooldown
    pub fn fire(&mut self, body: &RigidBody) -> Result<Shot, FireRejected> {
        let armed = self.armed.map_err(FireRejected::Jammed)?;
        if !self.is_ready() {
            return Err(FireRejected::CoolingDown);
        }

        self.cooldown_remaining = self.stats.cooldown;
        Ok(Shot {
            origin: body.position + body.to_world(armed.fire_point),
            direction: self.fire_direction(body),
            projectile: armed.projectile,
        })
    }
}

/// Kick the firer: back along the shot, up off the surface it rests on,
/// and a spin whose sense follows the horizontal fire direction.
pub fn apply_recoil(stats: &WeaponStats, body: &mut RigidBody, direction: Vec2) {
    let profile = &stats.recoil;
    let up = match stats.aim_frame {
        AimFrame::Body => body.up(),
        AimFrame::World => Vec2::Y,
    };
    let surface_normal = up * body.gravity_scale.signum();
    body.apply_impulse(-direction * profile.back + surface_normal * profile.lift);
    body.apply_torque_impulse(profile.torque * direction.x.signum());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::tuning::{CombatantStats, RecoilProfile, Tuning};

    fn armed_weapon() -> Weapon {
        let stats = WeaponStats::default();
        let loadout = WeaponLoadout::armed(ProjectileStats::default(), Vec2::X, 0.6);
        Weapon::new(stats, loadout, Vec2::X)
    }

    #[test]
    fn fire_emits_from_fire_point_and_starts_cooldown() {
        let mut weapon = armed_weapon();
        let body = RigidBody::new(Vec2::new(-5.0, -2.0), &CombatantStats::default());

        let shot = weapon.fire(&body).expect("ready weapon fires");

        assert!((shot.origin - Vec2::new(-4.4, -2.0)).length() < 1e-5);
        assert_eq!(shot.direction, Vec2::X);
        assert_eq!(shot.projectile.damage, 20);
        assert_eq!(weapon.cooldown_remaining(), 0.25);
    }

    #[test]
    fn cooldown_blocks_second_shot_until_elapsed() {
        let mut weapon = armed_weapon();
        let body = RigidBody::new(Vec2::ZERO, &CombatantStats::default());

        assert!(weapon.fire(&body).is_ok());
        assert_eq!(weapon.fire(&body).unwrap_err(), FireRejected::CoolingDown);

        weapon.tick(0.2);
        assert!(weapon.fire(&body).is_err());
        weapon.tick(0.05);
        assert!(weapon.fire(&body).is_ok());
    }

    #[test]
    fn missing_references_jam_the_weapon() {
        let loadout = WeaponLoadout {
            projectile: Some(ProjectileStats::default()),
            fire_point: None,
        };
        let mut weapon = Weapon::new(WeaponStats::default(), loadout, Vec2::X);
        let body = RigidBody::new(Vec2::ZERO, &CombatantStats::default());

        assert!(weapon.is_jammed());
        assert_eq!(
            weapon.fire(&body).unwrap_err(),
            FireRejected::Jammed(WeaponError::MissingFirePoint)
        );
        // Jammed weapons never enter cooldown either.
        assert!(weapon.is_ready());
    }

    #[test]
    fn fire_direction_follows_body_rotation() {
        let weapon = armed_weapon();
        let mut body = RigidBody::new(Vec2::ZERO, &CombatantStats::default());
        body.rotation = std::f32::consts::FRAC_PI_2;

        let dir = weapon.fire_direction(&body);
        assert!((dir - Vec2::Y).length() < 1e-5);
    }

    #[test]
    fn world_frame_aim_ignores_body_rotation() {
        let stats = Tuning::default().networked().weapon;
        let loadout = WeaponLoadout::armed(ProjectileStats::default(), Vec2::X, 0.6);
        let mut weapon = Weapon::new(stats, loadout, Vec2::X);
        let mut body = RigidBody::new(Vec2::ZERO, &CombatantStats::default());

        let first = weapon.fire(&body).expect("ready weapon fires");
        body.rotation = std::f32::consts::FRAC_PI_2;
        weapon.tick(stats.cooldown);
        let second = weapon.fire(&body).expect("cooled weapon fires");

        assert_eq!(first.direction, Vec2::X);
        assert_eq!(second.direction, Vec2::X);
        // The emission point still rides on the body.
        assert!((second.origin - Vec2::new(0.0, 0.6)).length() < 1e-5);
    }

    #[test]
    fn recoil_pushes_back_and_up() {
        let mut body = RigidBody::new(Vec2::ZERO, &CombatantStats::default());
        apply_recoil(&Tuning::default().networked().weapon, &mut body, Vec2::X);

        assert!((body.velocity - Vec2::new(-2.0, 1.5)).length() < 1e-5);
        assert!(body.angular_velocity < 0.0);
    }

    #[test]
    fn inverted_body_is_lifted_off_the_ceiling() {
        let stats = CombatantStats {
            gravity_scale: -1.0,
            ..CombatantStats::default()
        };
        let mut body = RigidBody::new(Vec2::ZERO, &stats);
        apply_recoil(&WeaponStats::default(), &mut body, -Vec2::X);
        assert!(body.velocity.y < 0.0);
        assert!(body.velocity.x > 0.0);
    }

    #[test]
    fn world_frame_lift_ignores_body_rotation() {
        let weapon = WeaponStats {
            recoil: RecoilProfile::networked(),
            aim_frame: AimFrame::World,
            ..WeaponStats::default()
        };
        let mut body = RigidBody::new(Vec2::ZERO, &CombatantStats::default());
        body.rotation = std::f32::consts::FRAC_PI_2;
        apply_recoil(&weapon, &mut body, Vec2::X);

        assert!((body.velocity - Vec2::new(-2.0, 1.5)).length() < 1e-5);
    }
}
