//! Application wiring for each run mode

pub mod local;
pub mod state;

pub use state::AppState;
