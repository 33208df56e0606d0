//! Networked duel session and its authoritative tick loop

use std::sync::Arc;

use glam::Vec2;
use parking_lot::RwLock;
use tokio::sync::{broadcast, mpsc};
use tokio::time::interval;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::util::time::{frame_period, unix_millis, FrameClock, SIMULATION_TPS, SNAPSHOT_TPS};
use crate::ws::protocol::{ClientMsg, PlayerInfo, ServerMsg};

use super::arena::{Arena, Seat, MAX_SEATS};
use super::combatant::Side;
use super::events::ArenaEvent;
use super::match_state::MatchPhase;
use super::projectile::ResolutionKind;
use super::snapshot::{combatant_snapshots, SnapshotBuilder};
use super::tuning::Tuning;

/// A client message tagged with its sender
#[derive(Debug, Clone)]
pub struct PlayerInput {
    pub player_id: Uuid,
    pub msg: ClientMsg,
    pub received_at: u64,
}

impl PlayerInput {
    pub fn new(player_id: Uuid, msg: ClientMsg) -> Self {
        Self {
            player_id,
            msg,
            received_at: unix_millis(),
        }
    }
}

/// Coarse session state readable outside the tick loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStatus {
    pub players: usize,
    pub projectiles: usize,
    pub phase: MatchPhase,
    pub tick: u64,
}

/// Handle to a running session
#[derive(Clone)]
pub struct SessionHandle {
    pub id: Uuid,
    pub input_tx: mpsc::Sender<PlayerInput>,
    pub output_tx: broadcast::Sender<ServerMsg>,
    status: Arc<RwLock<SessionStatus>>,
}

impl SessionHandle {
    pub fn status(&self) -> SessionStatus {
        *self.status.read()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerMsg> {
        self.output_tx.subscribe()
    }
}

/// The authoritative duel
pub struct GameSession {
    id: Uuid,
    arena: Arena,
    input_rx: mpsc::Receiver<PlayerInput>,
    output_tx: broadcast::Sender<ServerMsg>,
    snapshot_builder: SnapshotBuilder,
    status: Arc<RwLock<SessionStatus>>,
}

impl GameSession {
    /// Create a new session
    pub fn new(tuning: Tuning) -> (Self, SessionHandle) {
        let id = Uuid::new_v4();
        let (input_tx, input_rx) = mpsc::channel(256);
        let (output_tx, _) = broadcast::channel(256);
        let arena = Arena::new(tuning);
        let status = Arc::new(RwLock::new(SessionStatus {
            players: 0,
            projectiles: 0,
            phase: arena.phase(),
            tick: 0,
        }));

        let handle = SessionHandle {
            id,
            input_tx,
            output_tx: output_tx.clone(),
            status: status.clone(),
        };

        let session = Self {
            id,
            arena,
            input_rx,
            output_tx,
            snapshot_builder: SnapshotBuilder::new(SIMULATION_TPS / SNAPSHOT_TPS),
            status,
        };

        (session, handle)
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    /// Run the authoritative tick loop until every input sender is gone
    pub async fn run(mut self) {
        info!(session_id = %self.id, "Session started");

        let mut tick_interval = interval(frame_period());
        tick_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut clock = FrameClock::new();

        loop {
            tick_interval.tick().await;
            if !self.step(clock.lap()) {
                break;
            }
        }

        info!(session_id = %self.id, "Session ended");
    }

    /// One frame: drain inputs, advance the arena, broadcast the results.
    /// Returns false once the input channel has closed.
    pub fn step(&mut self, real_dt: f32) -> bool {
        let open = self.process_inputs();

        self.arena.tick(real_dt);
        let events = self.arena.drain_events();
        if events.iter().any(is_state_change) {
            self.snapshot_builder.force_next();
        }
        self.broadcast_events(events);

        if self.snapshot_builder.should_send() {
            self.send(self.snapshot_builder.build(&self.arena));
        }

        *self.status.write() = SessionStatus {
            players: self.arena.seats().len(),
            projectiles: self.arena.projectiles().len(),
            phase: self.arena.phase(),
            tick: self.arena.tick_count(),
        };
        open
    }

    /// Process all pending inputs from players
    fn process_inputs(&mut self) -> bool {
        loop {
            match self.input_rx.try_recv() {
                Ok(input) => self.handle_input(input),
                Err(mpsc::error::TryRecvError::Empty) => return true,
                Err(mpsc::error::TryRecvError::Disconnected) => return false,
            }
        }
    }

    fn handle_input(&mut self, input: PlayerInput) {
        let player_id = input.player_id;
        match input.msg {
            ClientMsg::Join { name } => self.handle_join(player_id, name),
            ClientMsg::RequestFire { direction } => self.handle_fire(player_id, direction),
            ClientMsg::SetPaused { paused } => self.handle_pause(player_id, paused),
            ClientMsg::RestartRound => self.handle_restart(player_id),
            ClientMsg::Ping { t } => self.send(ServerMsg::Pong { player_id, t }),
            ClientMsg::Leave => self.handle_leave(player_id),
        }

        // Flush what this input caused before the next one is handled.
        let events = self.arena.drain_events();
        self.broadcast_events(events);
    }

    /// Handle seat request
    fn handle_join(&mut self, player_id: Uuid, name: Option<String>) {
        if self.is_seated(player_id) {
            warn!(%player_id, "Player already seated");
            return;
        }
        if self.arena.seats().len() >= MAX_SEATS {
            self.send(ServerMsg::Error {
                player_id: Some(player_id),
                code: "match_full".to_string(),
                message: "Match is full".to_string(),
            });
            return;
        }

        // Host takes the left spawn; whoever comes next takes the free one.
        let layout = self.arena.tuning().arena;
        let left_taken = self.arena.seats().iter().any(|s| s.side == Side::Left);
        let spawn = if left_taken {
            layout.right_spawn
        } else {
            layout.left_spawn
        };
        let name = name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| format!("Player_{}", &player_id.to_string()[..8]));
        let seat = Seat::networked(player_id, name, spawn);
        let side = seat.side;
        let info = PlayerInfo {
            player_id,
            name: seat.name.clone(),
            side,
        };

        if !self.arena.add_seat(seat) {
            warn!(%player_id, "Seat refused");
            return;
        }

        self.send(ServerMsg::PlayerJoined { player: info });
        self.send(ServerMsg::MatchJoined {
            player_id,
            side,
            roster: self.roster(),
        });

        info!(
            session_id = %self.id,
            %player_id,
            ?side,
            player_count = self.arena.seats().len(),
            "Player seated"
        );

        if self.arena.seats().len() == MAX_SEATS {
            self.arena.restart_round();
        }
    }

    /// Fire requests are validated by the arena; rejections are expected
    /// under normal input and stay silent.
    fn handle_fire(&mut self, player_id: Uuid, direction: Option<Vec2>) {
        match self.arena.fire(player_id) {
            Ok(projectile_id) => {
                debug!(%player_id, %projectile_id, ?direction, "Fire request accepted");
            }
            Err(reason) => {
                debug!(%player_id, %reason, "Fire request rejected");
            }
        }
    }

    fn handle_pause(&mut self, player_id: Uuid, paused: bool) {
        if !self.is_seated(player_id) {
            return;
        }
        if paused {
            self.arena.set_state(MatchPhase::Stopped);
        } else if self.arena.seats().len() == MAX_SEATS && !self.arena.is_round_decided() {
            self.arena.set_state(MatchPhase::Playing);
        }
    }

    fn handle_restart(&mut self, player_id: Uuid) {
        if self.is_seated(player_id) && self.arena.seats().len() == MAX_SEATS {
            self.arena.restart_round();
        }
    }

    /// Handle player leave
    fn handle_leave(&mut self, player_id: Uuid) {
        if self.arena.remove_seat(player_id).is_none() {
            return;
        }
        self.arena.set_state(MatchPhase::Stopped);
        self.send(ServerMsg::PlayerLeft {
            player_id,
            reason: "disconnected".to_string(),
        });
        info!(session_id = %self.id, %player_id, "Player left session");
    }

    fn is_seated(&self, player_id: Uuid) -> bool {
        self.arena.seats().iter().any(|s| s.id == player_id)
    }

    fn roster(&self) -> Vec<PlayerInfo> {
        self.arena
            .seats()
            .iter()
            .map(|s| PlayerInfo {
                player_id: s.id,
                name: s.name.clone(),
                side: s.side,
            })
            .collect()
    }

    /// Translate arena events into broadcast effect and state messages
    fn broadcast_events(&self, events: Vec<ArenaEvent>) {
        for event in events {
            match event {
                ArenaEvent::MatchStateChanged { phase } => self.send(ServerMsg::MatchState {
                    playing: phase == MatchPhase::Playing,
                }),
                ArenaEvent::ShotFired {
                    shooter_id,
                    projectile_id,
                    position,
                    direction,
                } => {
                    self.send(ServerMsg::ProjectileSpawned {
                        projectile_id,
                        shooter_id,
                        position,
                        direction,
                        speed: self.arena.tuning().projectile.speed,
                    });
                    self.send(ServerMsg::PlayShootEffects {
                        shooter_id,
                        direction,
                    });
                }
                ArenaEvent::HealthChanged {
                    combatant_id,
                    change,
                } => self.send(ServerMsg::HealthChanged {
                    combatant_id,
                    old: change.old,
                    new: change.new,
                }),
                ArenaEvent::ProjectileResolved {
                    projectile_id,
                    kind,
                    position,
                } => {
                    let effect = match kind {
                        ResolutionKind::Wall => ServerMsg::PlayWallHitEffect {
                            projectile_id,
                            position,
                        },
                        ResolutionKind::Hit | ResolutionKind::ProjectileCollision => {
                            ServerMsg::PlayHitEffect {
                                projectile_id,
                                position,
                                kind: Some(kind),
                            }
                        }
                    };
                    self.send(effect);
                    self.send(ServerMsg::DestroyProjectile { projectile_id });
                }
                ArenaEvent::SlowMotion { duration } => self.send(ServerMsg::TriggerSlowMotion {
                    duration_secs: duration,
                }),
                ArenaEvent::CombatantDied { combatant_id } => {
                    self.send(ServerMsg::PlayDeathEffects { combatant_id })
                }
                ArenaEvent::ProjectileDespawned { projectile_id } => {
                    self.send(ServerMsg::ProjectileDespawned { projectile_id })
                }
                ArenaEvent::RoundOver {
                    loser_id,
                    winner_id,
                } => self.send(ServerMsg::RoundOver {
                    loser_id,
                    winner_id,
                }),
                ArenaEvent::RoundRestarted => self.send(ServerMsg::RoundRestarted {
                    combatants: combatant_snapshots(&self.arena),
                }),
                ArenaEvent::PointBlank { .. } | ArenaEvent::CombatantDespawned { .. } => {}
            }
        }
    }

    fn send(&self, msg: ServerMsg) {
        // No subscribers is fine: nobody is watching yet.
        let _ = self.output_tx.send(msg);
    }
}

fn is_state_change(event: &ArenaEvent) -> bool {
    matches!(
        event,
        ArenaEvent::MatchStateChanged { .. }
            | ArenaEvent::RoundOver { .. }
            | ArenaEvent::RoundRestarted
    )
}
