//! Combatant health and death

use glam::Vec2;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ai::AiTrigger;
use super::physics::{Aabb, BodyId, RigidBody, Tag};
use super::replication::{Authority, Change, Replicated};
use super::weapon::{Targeting, Weapon};

/// Which end of the arena a combatant holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    /// Seat side from a spawn position: left of center faces right
    pub fn from_spawn_x(x: f32) -> Self {
        if x < 0.0 {
            Side::Left
        } else {
            Side::Right
        }
    }

    /// Body-local aim toward the other side
    pub fn aim(self) -> Vec2 {
        match self {
            Side::Left => Vec2::X,
            Side::Right => Vec2::NEG_X,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

/// Who pulls the trigger
#[derive(Debug, Clone)]
pub enum Controller {
    /// Fire commands arrive from input or the network
    Human,
    Ai(AiTrigger),
}

/// Result of applying damage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DamageOutcome {
    /// Already dead or nothing changed
    Ignored,
    Damaged(Change<i32>),
    /// Health reached zero with this hit
    Killed(Change<i32>),
}

/// One of the two fighters
#[derive(Debug, Clone)]
pub struct Combatant {
    pub id: Uuid,
    pub name: String,
    pub side: Side,
    /// Collision tag this combatant's collider carries
    pub tag: Tag,
    pub targeting: Targeting,
    max_health: i32,
    health: Replicated<i32>,
    dead: bool,
    /// Collider and visuals enabled
    present: bool,
    pub body: RigidBody,
    pub half_extents: Vec2,
    pub weapon: Weapon,
    pub controller: Controller,
}

impl Combatant {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: Uuid,
        name: String,
        side: Side,
        tag: Tag,
        targeting: Targeting,
        max_health: i32,
        body: RigidBody,
        half_extents: Vec2,
        weapon: Weapon,
        controller: Controller,
    ) -> Self {
        let max_health = max_health.max(1);
        Self {
            id,
            name,
            side,
            tag,
            targeting,
            max_health,
            health: Replicated::new(max_health),
            dead: false,
            present: true,
            body,
            half_extents,
            weapon,
            controller,
        }
    }

    pub fn health(&self) -> i32 {
        self.health.get()
    }

    pub fn max_health(&self) -> i32 {
        self.max_health
    }

    pub fn is_dead(&self) -> bool {
        self.dead
    }

    pub fn is_present(&self) -> bool {
        self.present
    }

    pub fn body_id(&self) -> BodyId {
        BodyId::Combatant(self.id)
    }

    pub fn collider(&self) -> Aabb {
        Aabb::new(self.body.position, self.half_extents)
    }

    /// Subtract `amount` from health, clamped to `[0, max_health]`.
    ///
    /// Negative amounts are treated as zero; there is no healing. A dead
    /// combatant ignores all further damage.
    pub fn take_damage(&mut self, amount: i32, authority: &Authority) -> DamageOutcome {
        if self.dead {
            return DamageOutcome::Ignored;
        }

        let next = (self.health.get() - amount.max(0)).clamp(0, self.max_health);
        let Some(change) = self.health.set(authority, next) else {
            return DamageOutcome::Ignored;
        };

        if change.new == 0 {
            self.dead = true;
            self.present = false;
            DamageOutcome::Killed(change)
        } else {
            DamageOutcome::Damaged(change)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::tuning::{CombatantStats, ProjectileStats, WeaponStats};
    use crate::game::weapon::WeaponLoadout;
    use proptest::prelude::*;

    fn combatant(max_health: i32) -> Combatant {
        let stats = CombatantStats::default();
        let aim = Side::Left.aim();
        Combatant::new(
            Uuid::new_v4(),
            "left".into(),
            Side::Left,
            Tag::Player,
            Targeting::against(Tag::Opponent),
            max_health,
            RigidBody::new(Vec2::new(-5.0, -2.0), &stats),
            stats.half_extents,
            Weapon::new(
                WeaponStats::default(),
                WeaponLoadout::armed(ProjectileStats::default(), aim, 0.6),
                aim,
            ),
            Controller::Human,
        )
    }

    #[test]
    fn damage_reduces_health() {
        let authority = Authority::new();
        let mut c = combatant(100);
        assert_eq!(
            c.take_damage(20, &authority),
            DamageOutcome::Damaged(Change { old: 100, new: 80 })
        );
        assert_eq!(c.health(), 80);
        assert!(!c.is_dead());
    }

    #[test]
    fn lethal_damage_kills_and_hides() {
        let authority = Authority::new();
        let mut c = combatant(20);
        assert_eq!(
            c.take_damage(50, &authority),
            DamageOutcome::Killed(Change { old: 20, new: 0 })
        );
        assert!(c.is_dead());
        assert!(!c.is_present());
        assert_eq!(c.take_damage(10, &authority), DamageOutcome::Ignored);
        assert_eq!(c.health(), 0);
    }

    #[test]
    fn negative_damage_never_heals() {
        let authority = Authority::new();
        let mut c = combatant(100);
        c.take_damage(30, &authority);
        assert_eq!(c.take_damage(-50, &authority), DamageOutcome::Ignored);
        assert_eq!(c.health(), 70);
    }

    #[test]
    fn side_follows_spawn_position() {
        assert_eq!(Side::from_spawn_x(-5.0), Side::Left);
        assert_eq!(Side::from_spawn_x(5.0), Side::Right);
        assert_eq!(Side::Left.aim(), Vec2::X);
        assert_eq!(Side::Right.opposite(), Side::Left);
    }

    proptest! {
        #[test]
        fn health_is_non_increasing_and_floored(hits in prop::collection::vec(-50i32..150, 0..30)) {
            let authority = Authority::new();
            let mut c = combatant(100);
            let mut previous = c.health();
            for amount in hits {
                let was_dead = c.is_dead();
                let outcome = c.take_damage(amount, &authority);
                prop_assert!(c.health() <= previous);
                prop_assert!(c.health() >= 0);
                if was_dead {
                    prop_assert_eq!(outcome, DamageOutcome::Ignored);
                }
                prop_assert_eq!(c.is_dead(), c.health() == 0);
                previous = c.health();
            }
        }
    }
}
