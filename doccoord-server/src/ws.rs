//! The `/ws` upgrade endpoint (spec.md §6). One task relays fan-out events
//! from the document's broadcast channel to the socket; another reads
//! inbound frames and feeds them back through the session registry. Both
//! halves of a connection share one [`SessionId`] so disconnect cleanup can
//! find every session this socket registered.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};

use doccoord_kv::fanout::FanoutEvent;
use doccoord_kv::ids::{DocumentId, SessionId};

use crate::state::AppState;

pub async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InitFrame {
    #[serde(rename = "x-file-id")]
    file_id: String,
    #[serde(default)]
    user_name: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InitResponse {
    connection_id: SessionId,
    users: Vec<String>,
}

#[derive(Serialize)]
struct OutboundFrame<'a> {
    action: &'static str,
    payload: &'a serde_json::Value,
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    let Some(Ok(Message::Text(text))) = socket.recv().await else {
        return;
    };
    let Ok(init) = serde_json::from_str::<InitFrame>(&text) else {
        let _ = socket.send(Message::Text("invalid init frame".to_string())).await;
        return;
    };
    let Ok(document) = DocumentId::parse(&init.file_id) else {
        let _ = socket.send(Message::Text("unknown fileId".to_string())).await;
        return;
    };

    let session_id = SessionId::new();
    let user_name = init.user_name.unwrap_or_else(|| "anonymous".to_string());
    state.engine.sessions.add_session(document, session_id, user_name.clone());

    let users = state.engine.sessions.list_user_names(document);
    let init_response = InitResponse { connection_id: session_id, users: users.clone() };
    let Ok(init_json) = serde_json::to_string(&init_response) else {
        state.engine.sessions.remove_session(document, session_id);
        return;
    };
    if socket.send(Message::Text(init_json)).await.is_err() {
        state.engine.sessions.remove_session(document, session_id);
        return;
    }

    state.engine.fanout.publish(document, FanoutEvent::UserJoined(users));

    let mut events = state.engine.fanout.subscribe(document);
    loop {
        tokio::select! {
            event = events.recv() => {
                let Ok(event) = event else { break };
                if let Some(frame) = encode_event(&event) {
                    if socket.send(Message::Text(frame)).await.is_err() {
                        break;
                    }
                }
            }
            frame = socket.recv() => {
                match frame {
                    Some(Ok(Message::Text(_) | Message::Binary(_))) => {
                        // Inbound operations ride the HTTP `UpdateAction` path (spec.md
                        // §6); this socket only needs inbound heartbeat/ping traffic to
                        // keep the session's `lastHeartbeat` fresh.
                        state.engine.sessions.touch(document, &user_name, doccoord_kv::session::Touch::heartbeat());
                    }
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                }
            }
        }
    }

    let was_last = state.engine.sessions.remove_session(document, session_id);
    if was_last {
        state.engine.fanout.publish(document, FanoutEvent::UserLeft(session_id));
    } else {
        let remaining = state.engine.sessions.list_user_names(document);
        state.engine.fanout.publish(document, FanoutEvent::UserJoined(remaining));
    }
}

fn encode_event(event: &FanoutEvent) -> Option<String> {
    let payload = match event {
        FanoutEvent::OpCommitted(op) => serde_json::to_value(op).ok()?,
        FanoutEvent::UserJoined(users) => serde_json::to_value(users).ok()?,
        FanoutEvent::UserLeft(session_id) => serde_json::to_value(session_id.to_string()).ok()?,
    };
    let frame = OutboundFrame { action: event.action_name(), payload: &payload };
    serde_json::to_string(&frame).ok()
}
