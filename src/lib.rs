//! Crossfire - two-combatant projectile duel with shared time dilation
//!
//! The arena simulation runs the same way in every mode:
//! - locally, with both seats in one process
//! - as the authoritative host behind a WebSocket endpoint
//! - as a headless client mirroring a host's replicated state

pub mod app;
pub mod config;
pub mod discovery;
pub mod game;
pub mod http;
pub mod util;
pub mod ws;
