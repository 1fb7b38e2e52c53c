use axum::extract::ws::{Message as WsMessage, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use serde::Serialize;

use messenger_api::{Message, MessageSubscriber, MessageSubscription};

use super::ApiState;

/// Event name every live message is pushed under.
pub const RECEIVE_EVENT: &str = "receiveMessage";

/// Frame pushed to live subscribers.
#[derive(Debug, Serialize)]
pub struct LiveEnvelope<'a> {
    pub event: &'static str,
    pub message: &'a Message,
}

impl<'a> LiveEnvelope<'a> {
    pub fn receive(message: &'a Message) -> Self {
        Self {
            event: RECEIVE_EVENT,
            message,
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  WebSocket: /ws
// ═══════════════════════════════════════════════════════════════

pub(crate) async fn handle_ws(
    State(state): State<ApiState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| ws_connection(socket, state))
}

async fn ws_connection(mut socket: WebSocket, state: ApiState) {
    let mut sub = state.subscriber.subscribe(state.ws_buffer, state.ws_overflow);
    let sub_id = sub.id();
    tracing::debug!(subscription = %sub_id, "ws client connected");

    loop {
        tokio::select! {
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(WsMessage::Close(_))) | Some(Err(_)) | None => break,
                    // Push-only feed: client frames are ignored.
                    Some(Ok(_)) => {}
                }
            }

            live = sub.recv() => {
                let Some(message) = live else { break };
                match serde_json::to_string(&LiveEnvelope::receive(&message)) {
                    Ok(json) => {
                        if socket.send(WsMessage::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => tracing::warn!(id = %message.id, error = %e, "failed to encode live message"),
                }
            }
        }
    }

    state.subscriber.unsubscribe(sub_id);
    tracing::debug!(subscription = %sub_id, "ws client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use messenger_api::MessageId;

    #[test]
    fn envelope_carries_event_name_and_message() {
        let message = Message {
            id: MessageId::generate(),
            content: "hi".into(),
            created_at: 1,
            sequence_number: 2,
        };
        let json = serde_json::to_value(LiveEnvelope::receive(&message)).unwrap();
        assert_eq!(json["event"], "receiveMessage");
        assert_eq!(json["message"]["content"], "hi");
        assert_eq!(json["message"]["sequenceNumber"], 2);
    }
}
