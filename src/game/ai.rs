//! AI trigger finger: fires at random intervals

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::tuning::AiStats;

/// Countdown to the next AI fire attempt
#[derive(Debug, Clone)]
pub struct AiTrigger {
    rng: ChaCha8Rng,
    min_interval: f32,
    max_interval: f32,
    countdown: f32,
}

impl AiTrigger {
    pub fn new(seed: u64, stats: &AiStats) -> Self {
        let mut trigger = Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            min_interval: stats.min_fire_interval,
            max_interval: stats.max_fire_interval.max(stats.min_fire_interval),
            countdown: 0.0,
        };
        trigger.reschedule();
        trigger
    }

    fn reschedule(&mut self) {
        self.countdown = if self.max_interval > self.min_interval {
            self.rng.gen_range(self.min_interval..self.max_interval)
        } else {
            self.min_interval
        };
    }

    /// Seconds until the next attempt
    pub fn countdown(&self) -> f32 {
        self.countdown
    }

    /// Advance by `dt` simulation seconds. Returns true when an attempt is
    /// due; the next one is drawn immediately whether or not the attempt
    /// succeeds.
    pub fn tick(&mut self, dt: f32) -> bool {
        self.countdown -= dt;
        if self.countdown > 0.0 {
            return false;
        }
        self.reschedule();
        true
    }
}
