//! Snapshot building for network transmission

use crate::ws::protocol::{CombatantSnapshot, ProjectileSnapshot, ServerMsg};

use super::arena::Arena;
use super::combatant::Combatant;
use super::projectile::Projectile;

/// Builds periodic full-state snapshots
pub struct SnapshotBuilder {
    /// Tick counter since last snapshot
    ticks_since_snapshot: u32,
    /// Snapshot interval in ticks
    snapshot_interval: u32,
}

impl SnapshotBuilder {
    pub fn new(snapshot_interval: u32) -> Self {
        Self {
            ticks_since_snapshot: 0,
            snapshot_interval: snapshot_interval.max(1),
        }
    }

    /// Check if it's time to send a snapshot
    pub fn should_send(&mut self) -> bool {
        self.ticks_since_snapshot += 1;
        if self.ticks_since_snapshot >= self.snapshot_interval {
            self.ticks_since_snapshot = 0;
            true
        } else {
            false
        }
    }

    /// Force snapshot on next check (used for important events)
    pub fn force_next(&mut self) {
        self.ticks_since_snapshot = self.snapshot_interval;
    }

    /// Build a snapshot message
    pub fn build(&self, arena: &Arena) -> ServerMsg {
        ServerMsg::Snapshot {
            tick: arena.tick_count(),
            playing: arena.is_playing(),
            time_scale: arena.time_scale(),
            combatants: combatant_snapshots(arena),
            projectiles: arena.projectiles().iter().map(projectile_snapshot).collect(),
        }
    }
}

/// Wire state of every combatant still in the arena
pub fn combatant_snapshots(arena: &Arena) -> Vec<CombatantSnapshot> {
    arena.combatants().iter().map(combatant_snapshot).collect()
}

fn combatant_snapshot(c: &Combatant) -> CombatantSnapshot {
    CombatantSnapshot {
        id: c.id,
        side: c.side,
        position: c.body.position,
        rotation: c.body.rotation,
        velocity: c.body.velocity,
        health: c.health(),
        max_health: c.max_health(),
        alive: !c.is_dead(),
        weapon_cooldown: c.weapon.cooldown_remaining(),
    }
}

fn projectile_snapshot(p: &Projectile) -> ProjectileSnapshot {
    ProjectileSnapshot {
        id: p.id(),
        shooter_id: p.shooter_id(),
        position: p.position(),
        direction: p.direction(),
        active: p.is_active(),
    }
}
