//! Time utilities for the simulation loop

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Get current Unix timestamp in milliseconds
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Server start time for uptime tracking
static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Tick rate configuration
pub const SIMULATION_TPS: u32 = 60; // presentation frames per second
pub const SNAPSHOT_TPS: u32 = 20; // snapshots per second

/// Undilated fixed physics step (seconds)
pub const BASE_FIXED_DELTA: f32 = 0.02;

/// Upper bound on physics steps folded into one frame
pub const MAX_PHYSICS_STEPS_PER_FRAME: u32 = 8;

/// Real (wall-clock) duration of one presentation frame in seconds
pub fn frame_delta() -> f32 {
    1.0 / SIMULATION_TPS as f32
}

/// Frame period for `tokio::time::interval`
pub fn frame_period() -> Duration {
    Duration::from_micros(1_000_000 / SIMULATION_TPS as u64)
}

/// Measures real elapsed time between frames of a tick loop
#[derive(Debug, Clone)]
pub struct FrameClock {
    last: Instant,
}

impl FrameClock {
    pub fn new() -> Self {
        Self {
            last: Instant::now(),
        }
    }

    /// Seconds since the previous call, clamped so a stalled task does not
    /// fold a huge step into the simulation.
    pub fn lap(&mut self) -> f32 {
        let now = Instant::now();
        let dt = now.duration_since(self.last).as_secs_f32();
        self.last = now;
        dt.min(0.25)
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}
