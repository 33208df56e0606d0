//! Game simulation modules

pub mod ai;
pub mod arena;
pub mod combatant;
pub mod dilation;
pub mod events;
pub mod match_state;
pub mod physics;
pub mod projectile;
pub mod replica;
pub mod replication;
pub mod session;
pub mod snapshot;
pub mod tuning;
pub mod weapon;

pub use arena::{Arena, Pilot, Seat};
pub use session::{GameSession, PlayerInput, SessionHandle};
