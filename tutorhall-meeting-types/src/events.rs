/*
 * Copyright 2025 Security Union LLC
 *
 * Licensed under either of
 *
 * * Apache License, Version 2.0
 *   (http://www.apache.org/licenses/LICENSE-2.0)
 * * MIT license
 *   (http://opensource.org/licenses/MIT)
 *
 * at your option.
 */

//! The client/server event surface.
//!
//! Every frame on the wire is a JSON object with a kebab-case `type` tag and
//! camelCase fields, e.g.:
//!
//! ```json
//! { "type": "join-meeting", "meetingId": "algebra-tue-4pm" }
//! ```
//!
//! Negotiation payloads (`offer`/`answer`/`ice-candidate`) are opaque
//! [`serde_json::Value`]s: the server relays them verbatim and never looks
//! inside.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EventError;

/// A participant as seen by other meeting members.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantInfo {
    /// Ephemeral connection id; the relay target for `offer`/`answer`/`ice-candidate`.
    pub connection_id: String,
    /// Stable principal id.
    pub principal_id: String,
    pub display_name: String,
    pub video_enabled: bool,
    pub audio_enabled: bool,
    pub screen_sharing: bool,
    pub is_host: bool,
}

/// A chat log entry. The `id` is server-assigned and strictly increasing
/// within a meeting; `timestamp` is Unix milliseconds.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatEntry {
    pub id: u64,
    /// Principal id of the author.
    pub sender: String,
    pub sender_name: String,
    pub message: String,
    pub timestamp: i64,
}

/// Why a meeting ended.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum EndReason {
    /// The host invoked `end-meeting`.
    EndedByHost,
    /// The host left and the configured policy ends the meeting.
    HostLeft,
    /// The reaper closed the meeting for exceeding its duration or idle limit.
    Expired,
}

/// Events a client may send to the server.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientEvent {
    #[serde(rename_all = "camelCase")]
    JoinMeeting { meeting_id: String },
    #[serde(rename_all = "camelCase")]
    LeaveMeeting { meeting_id: String },
    /// WebRTC offer addressed to another connection in the same meeting.
    Offer { to: String, payload: Value },
    Answer { to: String, payload: Value },
    IceCandidate { to: String, payload: Value },
    #[serde(rename_all = "camelCase")]
    ChatMessage { meeting_id: String, message: String },
    #[serde(rename_all = "camelCase")]
    WhiteboardUpdate { meeting_id: String, op: Value },
    #[serde(rename_all = "camelCase")]
    WhiteboardUndo { meeting_id: String },
    #[serde(rename_all = "camelCase")]
    VideoToggle { meeting_id: String, enabled: bool },
    #[serde(rename_all = "camelCase")]
    AudioToggle { meeting_id: String, enabled: bool },
    #[serde(rename_all = "camelCase")]
    ScreenShareStarted { meeting_id: String },
    #[serde(rename_all = "camelCase")]
    ScreenShareStopped { meeting_id: String },
    #[serde(rename_all = "camelCase")]
    EndMeeting { meeting_id: String },
}

/// Events the server may send to a client.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// Sent once, immediately after the connection is registered. Clients
    /// use their connection id for self-packet filtering and so peers can
    /// address them.
    #[serde(rename_all = "camelCase")]
    ConnectionAssigned { connection_id: String },
    /// Reply to `join-meeting`: the snapshot a late joiner needs to render
    /// the room. `participants` excludes the joiner; `chat` is the log tail.
    #[serde(rename_all = "camelCase")]
    MeetingJoined {
        meeting_id: String,
        is_host: bool,
        participants: Vec<ParticipantInfo>,
        whiteboard: Vec<Value>,
        chat: Vec<ChatEntry>,
    },
    #[serde(rename_all = "camelCase")]
    ParticipantJoined {
        meeting_id: String,
        participant: ParticipantInfo,
        participant_count: usize,
    },
    #[serde(rename_all = "camelCase")]
    ParticipantLeft {
        meeting_id: String,
        connection_id: String,
        participant_count: usize,
    },
    #[serde(rename_all = "camelCase")]
    HostChanged {
        meeting_id: String,
        host_connection_id: String,
    },
    /// Relayed negotiation envelope, tagged with the sender's connection id.
    Offer { from: String, payload: Value },
    Answer { from: String, payload: Value },
    IceCandidate { from: String, payload: Value },
    #[serde(rename_all = "camelCase")]
    ChatMessage {
        meeting_id: String,
        #[serde(flatten)]
        entry: ChatEntry,
    },
    #[serde(rename_all = "camelCase")]
    WhiteboardUpdate {
        meeting_id: String,
        from: String,
        op: Value,
    },
    /// Full-log resync after an undo; all clients converge on `fullLog`.
    #[serde(rename_all = "camelCase")]
    WhiteboardSync {
        meeting_id: String,
        full_log: Vec<Value>,
    },
    #[serde(rename_all = "camelCase")]
    VideoToggle {
        meeting_id: String,
        connection_id: String,
        enabled: bool,
    },
    #[serde(rename_all = "camelCase")]
    AudioToggle {
        meeting_id: String,
        connection_id: String,
        enabled: bool,
    },
    #[serde(rename_all = "camelCase")]
    ScreenShareStarted {
        meeting_id: String,
        connection_id: String,
    },
    #[serde(rename_all = "camelCase")]
    ScreenShareStopped {
        meeting_id: String,
        connection_id: String,
    },
    #[serde(rename_all = "camelCase")]
    MeetingEnded {
        meeting_id: String,
        reason: EndReason,
    },
    Error { code: String, message: String },
}

impl From<EventError> for ServerEvent {
    fn from(err: EventError) -> Self {
        ServerEvent::Error {
            code: err.code,
            message: err.message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn client_event_wire_shape() {
        let event: ClientEvent =
            serde_json::from_value(json!({ "type": "join-meeting", "meetingId": "m1" })).unwrap();
        assert_eq!(
            event,
            ClientEvent::JoinMeeting {
                meeting_id: "m1".to_string()
            }
        );

        let event: ClientEvent = serde_json::from_value(json!({
            "type": "ice-candidate",
            "to": "conn-2",
            "payload": { "candidate": "candidate:0 1 UDP ..." }
        }))
        .unwrap();
        match event {
            ClientEvent::IceCandidate { to, payload } => {
                assert_eq!(to, "conn-2");
                assert_eq!(payload["candidate"], "candidate:0 1 UDP ...");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn server_event_wire_shape() {
        let event = ServerEvent::MeetingEnded {
            meeting_id: "m1".to_string(),
            reason: EndReason::Expired,
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({ "type": "meeting-ended", "meetingId": "m1", "reason": "expired" })
        );
    }

    #[test]
    fn chat_message_entry_is_flattened() {
        let event = ServerEvent::ChatMessage {
            meeting_id: "m1".to_string(),
            entry: ChatEntry {
                id: 7,
                sender: "user-1".to_string(),
                sender_name: "Alice".to_string(),
                message: "hi".to_string(),
                timestamp: 1_700_000_000_000,
            },
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "chat-message");
        assert_eq!(value["id"], 7);
        assert_eq!(value["sender"], "user-1");
        assert_eq!(value["senderName"], "Alice");
        assert_eq!(value["timestamp"], 1_700_000_000_000_i64);
    }

    #[test]
    fn error_event_from_event_error() {
        let event: ServerEvent = EventError::not_host().into();
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "error");
        assert_eq!(value["code"], "NOT_HOST");
    }

    #[test]
    fn relay_payload_survives_round_trip_untouched() {
        let payload = json!({ "sdp": "v=0\r\no=- 46117 2 IN IP4 127.0.0.1", "type": "offer" });
        let event = ServerEvent::Offer {
            from: "conn-1".to_string(),
            payload: payload.clone(),
        };
        let text = serde_json::to_string(&event).unwrap();
        match serde_json::from_str::<ServerEvent>(&text).unwrap() {
            ServerEvent::Offer { from, payload: p } => {
                assert_eq!(from, "conn-1");
                assert_eq!(p, payload);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
