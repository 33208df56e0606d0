//! WebSocket transport

pub mod client;
pub mod handler;
pub mod protocol;
