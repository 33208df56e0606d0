//! Projectile ballistics and contact resolution

use std::collections::HashSet;

use glam::Vec2;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::physics::{Aabb, BodyId, Tag};
use super::tuning::ProjectileStats;

/// Terminal outcome of a projectile's first qualifying contact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Struck an opposing combatant
    Hit { target_id: Uuid },
    /// Struck an arena boundary
    Wall,
    /// Struck another projectile
    ProjectileCollision { other_id: Uuid },
}

impl Resolution {
    pub fn kind(&self) -> ResolutionKind {
        match self {
            Resolution::Hit { .. } => ResolutionKind::Hit,
            Resolution::Wall => ResolutionKind::Wall,
            Resolution::ProjectileCollision { .. } => ResolutionKind::ProjectileCollision,
        }
    }
}

/// Wire-friendly resolution category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionKind {
    Hit,
    Wall,
    ProjectileCollision,
}

/// Lifecycle phase. Removal from the arena is the implicit third phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectilePhase {
    Active,
    /// Inert: no movement, no contacts, waiting for removal
    Resolved(Resolution),
}

/// A physical contact reported to a projectile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Contact {
    pub body: BodyId,
    pub tag: Tag,
}

/// What a single contact did to a projectile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactOutcome {
    /// Not a qualifying contact, or the projectile is already resolved
    Ignored,
    /// Struck its own shooter; dropped without resolving
    SelfHitDiscarded,
    Resolved(Resolution),
}

/// Active projectile in the arena
#[derive(Debug, Clone)]
pub struct Projectile {
    id: Uuid,
    shooter_id: Option<Uuid>,
    position: Vec2,
    direction: Vec2,
    speed: f32,
    damage: i32,
    half_extents: Vec2,
    target_tag: Tag,
    phase: ProjectilePhase,
    /// Bodies overlapped during the previous physics step
    touching: HashSet<BodyId>,
}

impl Projectile {
    /// Create a new projectile travelling along `direction`
    pub fn spawn(
        shooter_id: Option<Uuid>,
        origin: Vec2,
        direction: Vec2,
        target_tag: Tag,
        stats: &ProjectileStats,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            shooter_id,
            position: origin,
            direction: direction.normalize_or_zero(),
            speed: stats.speed,
            damage: stats.damage,
            half_extents: stats.half_extents,
            target_tag,
            phase: ProjectilePhase::Active,
            touching: HashSet::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn shooter_id(&self) -> Option<Uuid> {
        self.shooter_id
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn direction(&self) -> Vec2 {
        self.direction
    }

    pub fn damage(&self) -> i32 {
        self.damage
    }

    pub fn target_tag(&self) -> Tag {
        self.target_tag
    }

    pub fn phase(&self) -> ProjectilePhase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        self.phase == ProjectilePhase::Active
    }

    pub fn body_id(&self) -> BodyId {
        BodyId::Projectile(self.id)
    }

    pub fn collider(&self) -> Aabb {
        Aabb::new(self.position, self.half_extents)
    }

    /// Move along the fixed direction; inert projectiles stay put
    pub fn advance(&mut self, dt: f32) {
        if self.is_active() {
            self.position += self.direction * self.speed * dt;
        }
    }

    /// Record the bodies overlapped this step and return those that were
    /// not overlapped in the previous one.
    pub fn update_touching(&mut self, current: HashSet<BodyId>) -> Vec<BodyId> {
        let mut entered: Vec<BodyId> = current.difference(&self.touching).copied().collect();
        entered.sort();
        self.touching = current;
        entered
    }

    /// Delivery order for simultaneous contacts: opposing combatant first,
    /// then walls, then other projectiles.
    pub fn contact_priority(&self, contact: &Contact) -> u8 {
        if contact.tag == self.target_tag {
            0
        } else {
            match contact.tag {
                Tag::Wall => 1,
                Tag::Projectile => 2,
                _ => 3,
            }
        }
    }

    /// Decide what `contact` does to this projectile and latch the result.
    ///
    /// Once resolved, every later contact is ignored.
    pub fn resolve_contact(&mut self, contact: &Contact) -> ContactOutcome {
        if !self.is_active() {
            return ContactOutcome::Ignored;
        }

        let resolution = if contact.tag == self.target_tag {
            let BodyId::Combatant(target_id) = contact.body else {
                return ContactOutcome::Ignored;
            };
            if self.shooter_id == Some(target_id) {
                return ContactOutcome::SelfHitDiscarded;
            }
            Resolution::Hit { target_id }
        } else if contact.tag == Tag::Wall {
            Resolution::Wall
        } else if contact.tag == Tag::Projectile {
            let BodyId::Projectile(other_id) = contact.body else {
                return ContactOutcome::Ignored;
            };
            Resolution::ProjectileCollision { other_id }
        } else {
            return ContactOutcome::Ignored;
        };

        self.phase = ProjectilePhase::Resolved(resolution);
        self.touching.clear();
        ContactOutcome::Resolved(resolution)
    }
}
