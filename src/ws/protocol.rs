//! WebSocket protocol message definitions
//! These are the wire types between the authority and its observers

use glam::Vec2;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::combatant::Side;
use crate::game::projectile::ResolutionKind;

/// Messages sent from client to server.
///
/// Clients only ever request; the server decides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Take a seat in the duel
    Join {
        #[serde(default)]
        name: Option<String>,
    },

    /// Ask the authority to fire this player's weapon
    RequestFire {
        /// Direction the client believes it is aiming. The authority fires
        /// along the weapon's own direction regardless.
        #[serde(default)]
        direction: Option<Vec2>,
    },

    /// Pause or resume the match
    SetPaused { paused: bool },

    /// Start a fresh round with full health
    RestartRound,

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },

    /// Give up the seat
    Leave,
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Welcome message after connection
    Welcome { player_id: Uuid, server_time: u64 },

    /// Confirmation of a seat
    MatchJoined {
        player_id: Uuid,
        side: Side,
        /// Everyone seated at join time
        roster: Vec<PlayerInfo>,
    },

    PlayerJoined { player: PlayerInfo },

    PlayerLeft { player_id: Uuid, reason: String },

    /// Match state transition
    MatchState { playing: bool },

    /// Replicated projectile spawn record
    ProjectileSpawned {
        projectile_id: Uuid,
        shooter_id: Uuid,
        position: Vec2,
        direction: Vec2,
        speed: f32,
    },

    /// Replicated combatant health
    HealthChanged {
        combatant_id: Uuid,
        old: i32,
        new: i32,
    },

    /// Muzzle flash, sound and recoil for a shot
    PlayShootEffects { shooter_id: Uuid, direction: Vec2 },

    /// Impact feedback for a combatant hit or a projectile collision.
    /// Absent `kind` means a combatant hit.
    PlayHitEffect {
        projectile_id: Uuid,
        position: Vec2,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        kind: Option<ResolutionKind>,
    },

    PlayWallHitEffect { projectile_id: Uuid, position: Vec2 },

    /// Hide a resolved projectile; it lingers inert until despawned
    DestroyProjectile { projectile_id: Uuid },

    /// Projectile removed from the simulation
    ProjectileDespawned { projectile_id: Uuid },

    TriggerSlowMotion { duration_secs: f32 },

    PlayDeathEffects { combatant_id: Uuid },

    /// Round decided. Each observer derives win or loss from its own id.
    RoundOver {
        loser_id: Uuid,
        winner_id: Option<Uuid>,
    },

    /// Fresh round with every combatant back at full health
    RoundRestarted { combatants: Vec<CombatantSnapshot> },

    /// Periodic full state
    Snapshot {
        /// Server tick number
        tick: u64,
        playing: bool,
        time_scale: f32,
        combatants: Vec<CombatantSnapshot>,
        projectiles: Vec<ProjectileSnapshot>,
    },

    /// Error message
    Error {
        /// Player the error is meant for; everyone when absent
        #[serde(default, skip_serializing_if = "Option::is_none")]
        player_id: Option<Uuid>,
        code: String,
        message: String,
    },

    /// Pong response
    Pong {
        player_id: Uuid,
        /// Echo back client timestamp
        t: u64,
    },
}

impl ServerMsg {
    /// The single player a message is addressed to, if it is not a broadcast
    pub fn recipient(&self) -> Option<Uuid> {
        match self {
            ServerMsg::Welcome { player_id, .. }
            | ServerMsg::MatchJoined { player_id, .. }
            | ServerMsg::Pong { player_id, .. } => Some(*player_id),
            ServerMsg::Error { player_id, .. } => *player_id,
            _ => None,
        }
    }

    /// Whether `player_id` should receive this message
    pub fn is_for(&self, player_id: Uuid) -> bool {
        self.recipient().map_or(true, |to| to == player_id)
    }
}

/// Seated player info
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub player_id: Uuid,
    pub name: String,
    pub side: Side,
}

/// Combatant state in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatantSnapshot {
    pub id: Uuid,
    pub side: Side,
    pub position: Vec2,
    /// Rotation in radians
    pub rotation: f32,
    pub velocity: Vec2,
    pub health: i32,
    pub max_health: i32,
    pub alive: bool,
    /// Weapon cooldown remaining (0 = can fire)
    pub weapon_cooldown: f32,
}

/// Projectile state in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectileSnapshot {
    pub id: Uuid,
    pub shooter_id: Option<Uuid>,
    pub position: Vec2,
    pub direction: Vec2,
    /// False once resolved and waiting for removal
    pub active: bool,
}
