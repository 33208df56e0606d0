//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::state::{AppState, Connection};
use crate::game::session::PlayerInput;
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// WebSocket upgrade handler. Every connection gets a fresh player id.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let player_id = Uuid::new_v4();
    info!(%player_id, "WebSocket upgrade");
    ws.on_upgrade(move |socket| handle_socket(socket, player_id, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, player_id: Uuid, state: AppState) {
    info!(%player_id, "New WebSocket connection");

    let (mut ws_sink, ws_stream) = socket.split();

    // Subscribe before greeting so nothing broadcast in between is missed.
    let output_rx = state.session.subscribe();

    let welcome = ServerMsg::Welcome {
        player_id,
        server_time: unix_millis(),
    };
    if let Err(e) = send_msg(&mut ws_sink, &welcome).await {
        error!(%player_id, error = %e, "Failed to send welcome");
        return;
    }

    state.connections.insert(
        player_id,
        Connection {
            player_id,
            connected_at: unix_millis(),
        },
    );

    run_connection(
        player_id,
        ws_sink,
        ws_stream,
        state.session.input_tx.clone(),
        output_rx,
    )
    .await;

    state.connections.remove(&player_id);
    info!(%player_id, "WebSocket connection closed");
}

/// Run the WebSocket connection with read/write split
async fn run_connection(
    player_id: Uuid,
    mut ws_sink: futures::stream::SplitSink<WebSocket, Message>,
    mut ws_stream: futures::stream::SplitStream<WebSocket>,
    input_tx: mpsc::Sender<PlayerInput>,
    mut output_rx: broadcast::Receiver<ServerMsg>,
) {
    let rate_limiter = ConnectionRateLimiter::new();

    // Spawn writer task: session broadcasts -> WebSocket
    let writer_handle = tokio::spawn(async move {
        loop {
            match output_rx.recv().await {
                Ok(msg) => {
                    if !msg.is_for(player_id) {
                        continue;
                    }
                    if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                        debug!(%player_id, error = %e, "WebSocket send failed");
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(%player_id, lagged_count = n, "Client lagged, skipping {} messages", n);
                    // Continue - the next snapshot resynchronises state
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!(%player_id, "Session channel closed");
                    break;
                }
            }
        }
    });

    // Reader loop: WebSocket -> session
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_input() {
                    warn!(%player_id, "Rate limited input message");
                    continue;
                }

                match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(client_msg) => {
                        if input_tx
                            .send(PlayerInput::new(player_id, client_msg))
                            .await
                            .is_err()
                        {
                            debug!(%player_id, "Input channel closed");
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(%player_id, error = %e, "Failed to parse client message");
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(%player_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(%player_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(%player_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    // Give up the seat
    let _ = input_tx
        .send(PlayerInput::new(player_id, ClientMsg::Leave))
        .await;

    writer_handle.abort();
}

/// Send a message over WebSocket
async fn send_msg(
    sink: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMsg,
) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
