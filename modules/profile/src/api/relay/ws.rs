//! WebSocket side of the change relay.
//!
//! Messages (client → server):
//! - `{"event": "profileUpdate", "data": <snapshot>}`
//! - `{"event": "skillEndorsed", "data": <snapshot>}`
//!
//! Messages (server → every other client):
//! - `{"event": "profileUpdated", "data": <snapshot>}`
//!
//! `data` is forwarded untouched. Subscribers decide what to do with it.

use std::sync::Arc;

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    response::IntoResponse,
    Extension,
};
use futures::{SinkExt, StreamExt};
use modkit::{RelayHub, RelayMember};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

/// Name every relayed frame carries on the way out.
pub const OUTBOUND_EVENT: &str = "profileUpdated";

#[derive(Debug, Deserialize)]
pub struct InboundFrame {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct OutboundFrame {
    pub event: String,
    pub data: Value,
}

/// Inbound event names that fan out.
fn is_relayed(event: &str) -> bool {
    matches!(event, "profileUpdate" | "skillEndorsed")
}

/// Turns one client text frame into the serialized outbound frame, or
/// `None` when the frame is dropped.
pub fn translate(text: &str) -> Option<String> {
    let frame: InboundFrame = match serde_json::from_str(text) {
        Ok(f) => f,
        Err(e) => {
            warn!(error = %e, "dropping malformed relay frame");
            return None;
        }
    };
    if !is_relayed(&frame.event) {
        warn!(event = %frame.event, "dropping relay frame with unknown event");
        return None;
    }
    let out = OutboundFrame {
        event: OUTBOUND_EVENT.to_owned(),
        data: frame.data,
    };
    match serde_json::to_string(&out) {
        Ok(s) => Some(s),
        Err(e) => {
            warn!(error = %e, "failed to encode relay frame");
            None
        }
    }
}

pub async fn relay_ws(
    ws: WebSocketUpgrade,
    Extension(hub): Extension<RelayHub<Arc<str>>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, hub.join()))
}

async fn handle_connection(socket: WebSocket, mut member: RelayMember<Arc<str>>) {
    let id = member.id();
    info!(member = id, "relay client connected");
    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            relayed = member.recv() => {
                let Some(payload) = relayed else { break };
                if sender.send(Message::Text(payload.as_ref().into())).await.is_err() {
                    break;
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(out) = translate(text.as_str()) {
                            let reached = member.publish(Arc::from(out));
                            debug!(member = id, reached, "relayed frame");
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(member = id, error = %e, "relay socket error");
                        break;
                    }
                }
            }
        }
    }

    info!(member = id, "relay client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn both_inbound_names_fan_out_as_profile_updated() {
        for name in ["profileUpdate", "skillEndorsed"] {
            let text = json!({"event": name, "data": {"_id": "demo", "version": 3}}).to_string();
            let out: OutboundFrame = serde_json::from_str(&translate(&text).unwrap()).unwrap();
            assert_eq!(out.event, "profileUpdated");
            assert_eq!(out.data, json!({"_id": "demo", "version": 3}));
        }
    }

    #[test]
    fn unknown_and_malformed_frames_are_dropped() {
        assert!(translate(r#"{"event":"chat","data":1}"#).is_none());
        assert!(translate("not json").is_none());
        assert!(translate(r#"{"data":1}"#).is_none());
    }

    #[test]
    fn payload_is_opaque() {
        let out = translate(r#"{"event":"profileUpdate","data":[1,"two",null]}"#).unwrap();
        assert_eq!(out, r#"{"event":"profileUpdated","data":[1,"two",null]}"#);
    }
}
