//! Time dilation scheduler.
//!
//! Overlapping slow motion requests are counted in a pool. One decay window
//! runs at a time on the real-time clock; when it ends it releases a single
//! request and, if any remain, re-arms itself with the same duration. The
//! window length is therefore fixed by the request that armed it, and later
//! requests extend the slow period by chaining windows rather than by
//! lengthening the live one.

use crate::util::timer::{TimerHandle, TimerQueue};

use super::match_state::MatchState;
use super::tuning::DilationConfig;

/// Payload marker for a finished decay window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecayElapsed;

/// Outcome of handling a finished decay window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecayStep {
    /// Requests remain; another window of the same length started
    Rearmed,
    /// Pool drained; time scale is back at the resting value
    Restored,
    /// No window was live (already cancelled)
    Idle,
}

#[derive(Debug, Clone, Copy)]
struct DecayWindow {
    handle: TimerHandle,
    duration: f32,
}

/// Process-wide slow motion service, owned by the arena or replica
#[derive(Debug, Clone)]
pub struct TimeDilation {
    config: DilationConfig,
    active_requests: u32,
    decay: Option<DecayWindow>,
}

impl TimeDilation {
    pub fn new(config: DilationConfig) -> Self {
        Self {
            config,
            active_requests: 0,
            decay: None,
        }
    }

    /// Request `duration` real seconds of slow motion.
    ///
    /// Ignored unless the match is playing. Returns whether the request was
    /// counted.
    pub fn trigger<T: From<DecayElapsed>>(
        &mut self,
        duration: f32,
        state: &MatchState,
        timers: &mut TimerQueue<T>,
    ) -> bool {
        if !state.is_playing() {
            return false;
        }

        self.active_requests += 1;
        if self.decay.is_none() {
            self.arm(duration, timers);
        }
        true
    }

    /// Handle the timer scheduled by the live window
    pub fn on_decay_elapsed<T: From<DecayElapsed>>(
        &mut self,
        timers: &mut TimerQueue<T>,
    ) -> DecayStep {
        let Some(window) = self.decay.take() else {
            return DecayStep::Idle;
        };

        self.active_requests = self.active_requests.saturating_sub(1);
        if self.active_requests == 0 {
            DecayStep::Restored
        } else {
            self.arm(window.duration, timers);
            DecayStep::Rearmed
        }
    }

    /// Drop the live window and every pending request
    pub fn cancel<T>(&mut self, timers: &mut TimerQueue<T>) {
        if let Some(window) = self.decay.take() {
            timers.cancel(window.handle);
        }
        self.active_requests = 0;
    }

    fn arm<T: From<DecayElapsed>>(&mut self, duration: f32, timers: &mut TimerQueue<T>) {
        let handle = timers.schedule(duration, DecayElapsed.into());
        self.decay = Some(DecayWindow { handle, duration });
    }

    pub fn active_requests(&self) -> u32 {
        self.active_requests
    }

    /// Whether a decay window is live
    pub fn is_decaying(&self) -> bool {
        self.decay.is_some()
    }

    /// Effective time scale for the given match state
    pub fn time_scale(&self, state: &MatchState) -> f32 {
        if state.is_playing() && self.active_requests > 0 {
            self.config.slow_time_scale
        } else {
            state.resting_time_scale()
        }
    }

    /// Fixed physics step in simulation seconds. Scaled with the dilation
    /// so the number of physics steps per real second stays constant.
    pub fn fixed_delta(&self, state: &MatchState) -> f32 {
        if state.is_playing() && self.active_requests > 0 {
            self.config.base_fixed_delta * self.config.slow_time_scale
        } else {
            self.config.base_fixed_delta
        }
    }

    pub fn config(&self) -> &DilationConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::match_state::MatchPhase;
    use proptest::prelude::*;

    fn playing() -> MatchState {
        let mut state = MatchState::new();
        state.set_state(MatchPhase::Playing);
        state
    }

    /// Drive the queue the way the arena does
    fn advance(
        dilation: &mut TimeDilation,
        timers: &mut TimerQueue<DecayElapsed>,
        dt: f32,
    ) -> Vec<DecayStep> {
        timers
            .advance(dt)
            .into_iter()
            .map(|_| dilation.on_decay_elapsed(timers))
            .collect()
    }

    #[test]
    fn single_request_dilates_then_restores() {
        let state = playing();
        let mut timers = TimerQueue::new();
        let mut dilation = TimeDilation::new(DilationConfig::default());

        assert!(dilation.trigger(0.3, &state, &mut timers));
        assert_eq!(dilation.time_scale(&state), 0.08);
        assert!((dilation.fixed_delta(&state) - 0.0016).abs() < 1e-6);

        assert!(advance(&mut dilation, &mut timers, 0.29).is_empty());
        assert_eq!(
            advance(&mut dilation, &mut timers, 0.02),
            vec![DecayStep::Restored]
        );
        assert_eq!(dilation.time_scale(&state), 1.0);
        assert_eq!(dilation.fixed_delta(&state), 0.02);
        assert!(!dilation.is_decaying());
    }

    #[test]
    fn overlapping_requests_chain_windows_of_the_first_duration() {
        let state = playing();
        let mut timers = TimerQueue::new();
        let mut dilation = TimeDilation::new(DilationConfig::default());

        dilation.trigger(0.3, &state, &mut timers);
        advance(&mut dilation, &mut timers, 0.1);
        // A longer request while a window is live does not lengthen it.
        dilation.trigger(0.5, &state, &mut timers);
        assert_eq!(dilation.active_requests(), 2);

        assert_eq!(
            advance(&mut dilation, &mut timers, 0.25),
            vec![DecayStep::Rearmed]
        );
        assert_eq!(dilation.time_scale(&state), 0.08);

        // The chained link reuses 0.3, not 0.5.
        assert!(advance(&mut dilation, &mut timers, 0.29).is_empty());
        assert_eq!(
            advance(&mut dilation, &mut timers, 0.02),
            vec![DecayStep::Restored]
        );
        assert_eq!(dilation.active_requests(), 0);
    }

    #[test]
    fn stopped_match_ignores_requests() {
        let state = MatchState::new();
        let mut timers: TimerQueue<DecayElapsed> = TimerQueue::new();
        let mut dilation = TimeDilation::new(DilationConfig::default());

        assert!(!dilation.trigger(0.3, &state, &mut timers));
        assert_eq!(dilation.active_requests(), 0);
        assert!(timers.is_empty());
        assert_eq!(dilation.time_scale(&state), 0.0);
    }

    #[test]
    fn stopping_mid_decay_restores_to_zero() {
        let mut state = playing();
        let mut timers = TimerQueue::new();
        let mut dilation = TimeDilation::new(DilationConfig::default());

        dilation.trigger(0.3, &state, &mut timers);
        state.set_state(MatchPhase::Stopped);
        assert_eq!(dilation.time_scale(&state), 0.0);

        assert_eq!(
            advance(&mut dilation, &mut timers, 0.31),
            vec![DecayStep::Restored]
        );
        assert_eq!(dilation.time_scale(&state), 0.0);
    }

    #[test]
    fn cancel_clears_the_pool() {
        let state = playing();
        let mut timers: TimerQueue<DecayElapsed> = TimerQueue::new();
        let mut dilation = TimeDilation::new(DilationConfig::default());

        dilation.trigger(0.3, &state, &mut timers);
        dilation.trigger(0.3, &state, &mut timers);
        dilation.cancel(&mut timers);

        assert!(timers.is_empty());
        assert_eq!(dilation.active_requests(), 0);
        assert_eq!(dilation.time_scale(&state), 1.0);
        assert_eq!(dilation.on_decay_elapsed(&mut timers), DecayStep::Idle);
    }

    proptest! {
        #[test]
        fn same_instant_requests_restore_no_earlier_than_duration(
            n in 1u32..20,
            duration in 0.05f32..1.0,
            step in 0.005f32..0.05,
        ) {
            let state = playing();
            let mut timers = TimerQueue::new();
            let mut dilation = TimeDilation::new(DilationConfig::default());

            for _ in 0..n {
                dilation.trigger(duration, &state, &mut timers);
            }
            prop_assert_eq!(dilation.active_requests(), n);
            prop_assert_eq!(timers.len(), 1);

            let mut elapsed = 0.0f64;
            loop {
                let steps = advance(&mut dilation, &mut timers, step);
                elapsed += f64::from(step);
                if steps.contains(&DecayStep::Restored) {
                    break;
                }
                prop_assert_eq!(dilation.time_scale(&state), 0.08);
                prop_assert!(elapsed < f64::from(duration) * f64::from(n) + 1.0);
            }
            prop_assert!(elapsed + 1e-4 >= f64::from(duration));
            prop_assert_eq!(dilation.time_scale(&state), 1.0);
        }

        #[test]
        fn stopped_requests_never_count(n in 1u32..20, duration in 0.0f32..2.0) {
            let state = MatchState::new();
            let mut timers: TimerQueue<DecayElapsed> = TimerQueue::new();
            let mut dilation = TimeDilation::new(DilationConfig::default());
            for _ in 0..n {
                dilation.trigger(duration, &state, &mut timers);
            }
            prop_assert_eq!(dilation.active_requests(), 0);
            prop_assert_eq!(dilation.time_scale(&state), 0.0);
        }
    }
}
