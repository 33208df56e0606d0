//! Headless observer that joins a host over WebSocket

use std::net::SocketAddr;

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::interval;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::game::events::LogObserver;
use crate::game::replica::ReplicaWorld;
use crate::game::tuning::Tuning;
use crate::util::time::{frame_period, unix_millis, FrameClock};
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// Client errors
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("WebSocket error: {0}")]
    Socket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Protocol error: {0}")]
    Protocol(#[from] serde_json::Error),

    #[error("Console error: {0}")]
    Io(#[from] std::io::Error),
}

/// Map a console line to a request for the authority
pub fn parse_command(line: &str) -> Option<ClientMsg> {
    match line.trim() {
        "f" | "fire" => Some(ClientMsg::RequestFire { direction: None }),
        "p" | "pause" => Some(ClientMsg::SetPaused { paused: true }),
        "u" | "resume" => Some(ClientMsg::SetPaused { paused: false }),
        "r" | "restart" => Some(ClientMsg::RestartRound),
        "ping" => Some(ClientMsg::Ping { t: unix_millis() }),
        "q" | "quit" => Some(ClientMsg::Leave),
        _ => None,
    }
}

/// Connect to `host`, take a seat and mirror the duel until the console
/// quits or the host goes away.
pub async fn run_client(
    host: SocketAddr,
    name: Option<String>,
    tuning: &Tuning,
) -> Result<(), ClientError> {
    let url = format!("ws://{}/ws", host);
    info!(%url, "Connecting to host");

    let (socket, _) = connect_async(url.as_str()).await?;
    let (mut sink, mut stream) = socket.split();

    send(&mut sink, &ClientMsg::Join { name }).await?;

    let mut replica = ReplicaWorld::new(tuning);
    let mut observer = LogObserver;
    let mut console = BufReader::new(tokio::io::stdin()).lines();
    let mut frame = interval(frame_period());
    frame.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut clock = FrameClock::new();
    let mut console_open = true;

    loop {
        tokio::select! {
            incoming = stream.next() => {
                let Some(incoming) = incoming else {
                    info!("Host closed the connection");
                    break;
                };
                match incoming? {
                    Message::Text(text) => {
                        if let Some(msg) = decode_server_msg(&text) {
                            handle_server_msg(&mut replica, &msg, &mut observer);
                        }
                    }
                    Message::Close(_) => {
                        info!("Host closed the connection");
                        break;
                    }
                    _ => {}
                }
            }
            line = console.next_line(), if console_open => {
                let Some(line) = line? else {
                    // stdin closed; keep observing
                    console_open = false;
                    continue;
                };
                match parse_command(&line) {
                    Some(ClientMsg::Leave) => {
                        send(&mut sink, &ClientMsg::Leave).await?;
                        let _ = sink.send(Message::Close(None)).await;
                        break;
                    }
                    Some(cmd) => send(&mut sink, &cmd).await?,
                    None => warn!(input = %line.trim(), "Unknown command (f, p, u, r, ping, q)"),
                }
            }
            _ = frame.tick() => {
                replica.tick(clock.lap());
            }
        }
    }

    Ok(())
}

/// Parse a host message. Unreadable ones are logged and skipped.
fn decode_server_msg(text: &str) -> Option<ServerMsg> {
    match serde_json::from_str(text) {
        Ok(msg) => Some(msg),
        Err(e) => {
            warn!(error = %e, "Failed to parse server message");
            None
        }
    }
}

fn handle_server_msg(replica: &mut ReplicaWorld, msg: &ServerMsg, observer: &mut LogObserver) {
    match msg {
        ServerMsg::Pong { t, .. } => {
            info!(rtt_ms = unix_millis().saturating_sub(*t), "Pong");
        }
        ServerMsg::Error { code, message, .. } => {
            warn!(%code, %message, "Host rejected request");
        }
        ServerMsg::MatchJoined { side, roster, .. } => {
            info!(?side, players = roster.len(), "Joined match");
        }
        _ => {}
    }

    replica.apply(msg, observer);

    if let ServerMsg::RoundOver { .. } = msg {
        if let Some(outcome) = replica.outcome() {
            info!(?outcome, "Round result");
        }
    } else {
        debug!(time_scale = replica.time_scale(), "Applied host message");
    }
}

async fn send<S>(sink: &mut S, msg: &ClientMsg) -> Result<(), ClientError>
where
    S: futures::Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
{
    let json = serde_json::to_string(msg)?;
    sink.send(Message::Text(json)).await?;
    Ok(())
}
