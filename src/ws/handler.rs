//! WebSocket upgrade handler for the merchant order feed

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::http::middleware::verify_jwt;
use crate::http::routes::{require_store_role, AppError};
use crate::util::rate_limit::{create_limiter, WS_MESSAGE_RATE_LIMIT};
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, ServerMsg};

use super::feed::OrderEvent;

/// Query parameters for WebSocket connection
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// JWT token for authentication
    pub token: String,
    /// Store whose orders to follow
    pub store_id: Uuid,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Response {
    // Verify JWT token and store access before upgrading
    let claims = match verify_jwt(&query.token, &state.config.supabase_jwt_secret) {
        Ok(claims) => claims,
        Err(e) => {
            error!(error = %e, "WebSocket auth failed");
            return AppError::Unauthorized.into_response();
        }
    };

    if let Err(e) = require_store_role(&state, claims.sub, query.store_id).await {
        warn!(user_id = %claims.sub, store_id = %query.store_id, "WebSocket store access denied");
        return e.into_response();
    }

    info!(user_id = %claims.sub, store_id = %query.store_id, "WebSocket upgrade for store feed");
    let user_id = claims.sub;
    let store_id = query.store_id;
    ws.on_upgrade(move |socket| handle_socket(socket, user_id, store_id, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, user_id: Uuid, store_id: Uuid, state: AppState) {
    let (mut ws_sink, mut ws_stream) = socket.split();

    let welcome = ServerMsg::Welcome {
        user_id,
        store_id,
        server_time: unix_millis(),
    };

    if let Err(e) = send_msg(&mut ws_sink, &welcome).await {
        error!(user_id = %user_id, error = %e, "Failed to send welcome");
        return;
    }

    let events = state.feed.subscribe();
    let (reply_tx, reply_rx) = mpsc::channel::<ServerMsg>(16);

    // Writer task: feed events and replies -> WebSocket
    let writer_handle = tokio::spawn(write_loop(ws_sink, user_id, store_id, events, reply_rx));

    let rate_limiter = create_limiter(WS_MESSAGE_RATE_LIMIT);

    // Reader loop: WebSocket -> replies
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if rate_limiter.check().is_err() {
                    warn!(user_id = %user_id, "Rate limited feed message");
                    continue;
                }

                match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(ClientMsg::Ping { t }) => {
                        let pong = ServerMsg::Pong {
                            t,
                            server_time: unix_millis(),
                        };
                        if reply_tx.send(pong).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(user_id = %user_id, error = %e, "Failed to parse client message");
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(user_id = %user_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(user_id = %user_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(user_id = %user_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    writer_handle.abort();
    info!(user_id = %user_id, store_id = %store_id, "WebSocket connection closed");
}

async fn write_loop(
    mut ws_sink: futures::stream::SplitSink<WebSocket, Message>,
    user_id: Uuid,
    store_id: Uuid,
    mut events: broadcast::Receiver<OrderEvent>,
    mut replies: mpsc::Receiver<ServerMsg>,
) {
    loop {
        let msg = tokio::select! {
            event = events.recv() => match event {
                Ok(event) if event.store_id == store_id => ServerMsg::OrderUpdated { event },
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(user_id = %user_id, missed, "Feed subscriber lagged");
                    ServerMsg::Resync { missed }
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!(user_id = %user_id, "Order feed closed");
                    break;
                }
            },
            reply = replies.recv() => match reply {
                Some(reply) => reply,
                None => break,
            },
        };

        if let Err(e) = send_msg(&mut ws_sink, &msg).await {
            debug!(user_id = %user_id, error = %e, "WebSocket send failed");
            break;
        }
    }
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
