//! WebSocket push channel for board-change signals.
//!
//! Browsers cannot set the Authorization header on a WebSocket upgrade,
//! so the JWT travels in the `Sec-WebSocket-Protocol` header as
//! `jwt.<token>` alongside the `taskdeck` subprotocol. Each connected
//! session receives the literal text event `BOARD_UPDATED` whenever board
//! state changes and is expected to re-fetch; the message carries no
//! state.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;

use super::auth;
use super::routes::AppState;

/// Wire name of the content-free change signal.
const BOARD_UPDATED: &str = "BOARD_UPDATED";

fn extract_jwt_from_protocols(headers: &HeaderMap) -> Option<String> {
    let raw = headers
        .get("sec-websocket-protocol")
        .and_then(|v| v.to_str().ok())?;
    // Client sends: ["taskdeck", "jwt.<token>"]
    for part in raw.split(',').map(|s| s.trim()) {
        if let Some(rest) = part.strip_prefix("jwt.") {
            if !rest.is_empty() {
                return Some(rest.to_string());
            }
        }
    }
    None
}

/// GET /api/board/ws - upgrade to the board-events push channel.
pub async fn board_ws(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    if state.config.auth_required() {
        let token = match extract_jwt_from_protocols(&headers) {
            Some(t) => t,
            None => return (StatusCode::UNAUTHORIZED, "Missing websocket JWT").into_response(),
        };
        if auth::verify_token_for_config(&token, &state.config).is_none() {
            return (StatusCode::UNAUTHORIZED, "Invalid or expired token").into_response();
        }
    }

    // Select a stable subprotocol if the client offered it.
    ws.protocols(["taskdeck"])
        .on_upgrade(move |socket| handle_session(socket, state))
}

async fn handle_session(socket: WebSocket, state: Arc<AppState>) {
    let mut events = state.events.subscribe();
    tracing::debug!(
        "Board session connected ({} active)",
        state.events.session_count()
    );

    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Ok(_) => {
                        if sender.send(Message::Text(BOARD_UPDATED.to_string())).await.is_err() {
                            break;
                        }
                    }
                    // Coalesced signals still mean "re-fetch"; resume.
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!("Board session lagged, skipped {} signals", skipped);
                        if sender.send(Message::Text(BOARD_UPDATED.to_string())).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {} // Clients have nothing to say on this channel.
                    Some(Err(_)) => break,
                }
            }
        }
    }

    tracing::debug!("Board session disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_extract_jwt_from_protocols() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "sec-websocket-protocol",
            HeaderValue::from_static("taskdeck, jwt.abc.def.ghi"),
        );
        assert_eq!(
            extract_jwt_from_protocols(&headers).as_deref(),
            Some("abc.def.ghi")
        );
    }

    #[test]
    fn test_extract_jwt_missing() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "sec-websocket-protocol",
            HeaderValue::from_static("taskdeck"),
        );
        assert!(extract_jwt_from_protocols(&headers).is_none());
        assert!(extract_jwt_from_protocols(&HeaderMap::new()).is_none());
    }
}
