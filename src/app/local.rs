//! Single-process duel driven from the console

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{Config, LocalMatchup};
use crate::game::arena::{Arena, Pilot, Seat};
use crate::game::combatant::Side;
use crate::game::events::{dispatch, ArenaEvent, CombatObserver, LogObserver};
use crate::game::match_state::MatchPhase;
use crate::game::tuning::Tuning;
use crate::util::time::{frame_period, FrameClock};

/// Console input in local mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalCommand {
    Fire(Side),
    Pause,
    Resume,
    Restart,
    Quit,
}

impl LocalCommand {
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim() {
            "f" | "1" => Some(Self::Fire(Side::Left)),
            "2" => Some(Self::Fire(Side::Right)),
            "p" | "pause" => Some(Self::Pause),
            "u" | "resume" => Some(Self::Resume),
            "r" | "restart" => Some(Self::Restart),
            "q" | "quit" => Some(Self::Quit),
            _ => None,
        }
    }
}

/// A local duel: both seats live in this process
pub struct LocalMatch {
    arena: Arena,
    left: Uuid,
    right: Uuid,
    /// Start the next round by itself once a result is in
    auto_restart: bool,
}

impl LocalMatch {
    pub fn new(tuning: Tuning, matchup: LocalMatchup, seed: u64) -> Self {
        let mut arena = Arena::new(tuning);

        let (left, right, auto_restart) = match matchup {
            LocalMatchup::VsAi => (
                Seat::local("Player", Side::Left, Pilot::Human),
                Seat::local("AI", Side::Right, Pilot::Ai { seed }),
                false,
            ),
            LocalMatchup::TwoPlayer => (
                Seat::local("Player 1", Side::Left, Pilot::Human),
                Seat::local("Player 2", Side::Right, Pilot::Human).inverted(),
                false,
            ),
            LocalMatchup::AiDuel => (
                Seat::local("AI left", Side::Left, Pilot::Ai { seed }),
                Seat::local(
                    "AI right",
                    Side::Right,
                    Pilot::Ai {
                        seed: seed.wrapping_add(1),
                    },
                ),
                true,
            ),
        };
        let (left_id, right_id) = (left.id, right.id);
        arena.add_seat(left);
        arena.add_seat(right);
        arena.set_state(MatchPhase::Playing);

        info!(?matchup, seed, "Local match ready");

        Self {
            arena,
            left: left_id,
            right: right_id,
            auto_restart,
        }
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    pub fn seat(&self, side: Side) -> Uuid {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }

    /// Apply a console command. Returns false on quit.
    pub fn command(&mut self, cmd: LocalCommand) -> bool {
        match cmd {
            LocalCommand::Fire(side) => {
                if let Err(reason) = self.arena.fire(self.seat(side)) {
                    debug!(?side, %reason, "Fire rejected");
                }
            }
            LocalCommand::Pause => self.arena.set_state(MatchPhase::Stopped),
            LocalCommand::Resume => {
                if !self.arena.is_round_decided() {
                    self.arena.set_state(MatchPhase::Playing);
                }
            }
            LocalCommand::Restart => self.arena.restart_round(),
            LocalCommand::Quit => return false,
        }
        true
    }

    /// Advance one frame and hand the resulting events to `observer`
    pub fn step(&mut self, real_dt: f32, observer: &mut dyn CombatObserver) -> Vec<ArenaEvent> {
        self.arena.tick(real_dt);
        let mut events = self.arena.drain_events();

        let round_over = events
            .iter()
            .any(|e| matches!(e, ArenaEvent::RoundOver { .. }));
        if round_over && self.auto_restart {
            self.arena.restart_round();
            events.extend(self.arena.drain_events());
        }

        dispatch(&events, observer);
        events
    }

    /// Flush events produced outside `step`
    pub fn flush(&mut self, observer: &mut dyn CombatObserver) {
        let events = self.arena.drain_events();
        dispatch(&events, observer);
    }
}

/// Run a local match until the console quits or Ctrl+C
pub async fn run_local(config: &Config) -> anyhow::Result<()> {
    let seed = config.ai_seed.unwrap_or_else(rand::random);
    let mut local = LocalMatch::new(config.tuning, config.matchup, seed);
    let mut observer = LogObserver;

    info!("Commands: f/1 fire left, 2 fire right, p pause, u resume, r restart, q quit");

    let mut console = BufReader::new(tokio::io::stdin()).lines();
    let mut console_open = true;
    let mut frame = interval(frame_period());
    frame.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut clock = FrameClock::new();

    local.flush(&mut observer);

    loop {
        tokio::select! {
            _ = frame.tick() => {
                local.step(clock.lap(), &mut observer);
            }
            line = console.next_line(), if console_open => {
                let Some(line) = line? else {
                    console_open = false;
                    continue;
                };
                match LocalCommand::parse(&line) {
                    Some(cmd) => {
                        if !local.command(cmd) {
                            break;
                        }
                        local.flush(&mut observer);
                    }
                    None => warn!(input = %line.trim(), "Unknown command"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    info!(ticks = local.arena().tick_count(), "Local match ended");
    Ok(())
}
