//! WebSocket upgrade handler

use std::fmt::Display;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::Response,
};
use futures::{SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::app::AppState;
use crate::game::{GameVariant, SessionId};
use crate::http::routes::AppError;
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::util::time::tick_period;
use crate::ws::protocol::{ClientMsg, ServerMsg};
use crate::ws::session::{SessionContext, SessionController};

/// Outbound queue depth per connection
const OUTBOUND_BUFFER: usize = 64;

/// Why a connection's reader stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadEnd {
    ClientClosed,
    StreamEnded,
    Malformed,
    OutboundClosed,
    TransportError,
}

/// WebSocket upgrade handler for `/ws/:variant/:session_id`
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path((variant, session_id)): Path<(GameVariant, SessionId)>,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let registry = state.sessions(variant);
    if registry.is_connected(&session_id) {
        warn!(session_id = %session_id, variant = %variant, "Rejecting second connection");
        return Err(AppError::Conflict(
            "Session already has a live connection".to_string(),
        ));
    }

    let owner = registry.info(&session_id).and_then(|info| info.owner);
    info!(session_id = %session_id, variant = %variant, owner = ?owner, "WebSocket upgrade");
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, variant, session_id, state)))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(
    mut socket: WebSocket,
    variant: GameVariant,
    session_id: SessionId,
    state: AppState,
) {
    let registry = state.sessions(variant).clone();

    let (connection_id, engine) = match registry.attach(&session_id) {
        Ok(attached) => attached,
        Err(e) => {
            warn!(session_id = %session_id, error = %e, "Connection refused");
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
    };

    info!(session_id = %session_id, variant = %variant, connection_id, "WebSocket connected");

    let (mut ws_sink, ws_stream) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<ServerMsg>(OUTBOUND_BUFFER);

    // Writer task: the only owner of the socket sink
    let writer_handle = tokio::spawn(async move {
        while let Some(msg) = outbound_rx.recv().await {
            if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                debug!(session_id = %session_id, error = %e, "WebSocket send failed");
                break;
            }
        }
    });

    let controller = SessionController::new(SessionContext {
        session_id,
        connection_id,
        engine,
        registry,
        gestures: state.gestures.clone(),
        outbound: outbound_tx,
        tick_period: tick_period(state.config.tick_rate),
    });
    let rate_limiter = ConnectionRateLimiter::new(state.config.inbound_rate_limit);

    let end = drive_session(ws_stream, controller, &rate_limiter, session_id).await;
    writer_handle.abort();

    info!(
        session_id = %session_id,
        variant = %variant,
        reason = ?end,
        "WebSocket connection closed"
    );
}

/// Run the reader until the connection ends, then tear the session down:
/// cancel the tick loop and delete the session.
async fn drive_session<S, E>(
    mut stream: S,
    mut controller: SessionController,
    rate_limiter: &ConnectionRateLimiter,
    session_id: SessionId,
) -> ReadEnd
where
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let end = read_loop(&mut stream, &mut controller, rate_limiter, session_id).await;
    controller.close().await;
    end
}

/// Reader loop: WebSocket -> controller
async fn read_loop<S, E>(
    stream: &mut S,
    controller: &mut SessionController,
    rate_limiter: &ConnectionRateLimiter,
    session_id: SessionId,
) -> ReadEnd
where
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_inbound() {
                    warn!(session_id = %session_id, "Rate limited inbound message");
                    continue;
                }

                let msg = match ClientMsg::decode(&text) {
                    Ok(msg) => msg,
                    Err(e) => {
                        warn!(session_id = %session_id, error = %e, "Closing connection");
                        return ReadEnd::Malformed;
                    }
                };

                if let Err(e) = controller.handle(msg).await {
                    debug!(session_id = %session_id, error = %e, "Session ended");
                    return ReadEnd::OutboundClosed;
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(session_id = %session_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(session_id = %session_id, "Client initiated close");
                return ReadEnd::ClientClosed;
            }
            Err(e) => {
                error!(session_id = %session_id, error = %e, "WebSocket error");
                return ReadEnd::TransportError;
            }
        }
    }

    ReadEnd::StreamEnded
}

/// Send a message over WebSocket
async fn send_msg(
    sink: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMsg,
) -> Result<(), String> {
    let json = msg.encode().map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
