//! Messages handled by the [`MeetingServer`](crate::actors::meeting_server::MeetingServer) actor.
//!
//! Each inbound client event maps to one message type; the session actor is
//! the only producer. Everything is fire-and-forget: replies travel as
//! [`OutboundEvent`]s through the sender's registered recipient, never as
//! actix message results.

use actix::{Message as ActixMessage, Recipient};
use chrono::{DateTime, Utc};
use serde_json::Value;

use super::session::OutboundEvent;
use crate::meeting::{ConnId, MeetingId, Principal};

/// Register an authenticated connection with the server.
#[derive(ActixMessage)]
#[rtype(result = "()")]
pub struct Connect {
    pub id: ConnId,
    pub principal: Principal,
    pub addr: Recipient<OutboundEvent>,
}

/// Transport gone: implicit leave from every joined meeting.
#[derive(ActixMessage)]
#[rtype(result = "()")]
pub struct Disconnect {
    pub id: ConnId,
}

#[derive(ActixMessage)]
#[rtype(result = "()")]
pub struct JoinMeeting {
    pub id: ConnId,
    pub meeting_id: MeetingId,
}

#[derive(ActixMessage)]
#[rtype(result = "()")]
pub struct LeaveMeeting {
    pub id: ConnId,
    pub meeting_id: MeetingId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    Offer,
    Answer,
    IceCandidate,
}

/// Targeted negotiation envelope. The payload is opaque to the server.
#[derive(ActixMessage)]
#[rtype(result = "()")]
pub struct RelaySignal {
    pub from: ConnId,
    pub to: ConnId,
    pub kind: SignalKind,
    pub payload: Value,
}

#[derive(ActixMessage)]
#[rtype(result = "()")]
pub struct PostChatMessage {
    pub from: ConnId,
    pub meeting_id: MeetingId,
    pub message: String,
}

#[derive(ActixMessage)]
#[rtype(result = "()")]
pub struct WhiteboardOp {
    pub from: ConnId,
    pub meeting_id: MeetingId,
    pub op: Value,
}

#[derive(ActixMessage)]
#[rtype(result = "()")]
pub struct WhiteboardUndo {
    pub from: ConnId,
    pub meeting_id: MeetingId,
}

/// A media-state change to apply to the sender's `ParticipantState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaChange {
    Video(bool),
    Audio(bool),
    ScreenShare(bool),
}

#[derive(ActixMessage)]
#[rtype(result = "()")]
pub struct UpdateMediaState {
    pub from: ConnId,
    pub meeting_id: MeetingId,
    pub change: MediaChange,
}

/// Host-only teardown.
#[derive(ActixMessage)]
#[rtype(result = "()")]
pub struct EndMeeting {
    pub from: ConnId,
    pub meeting_id: MeetingId,
}

/// One reaper tick. Sent by the server's own interval timer; tests send it
/// directly with a synthetic `now`.
#[derive(ActixMessage)]
#[rtype(result = "()")]
pub struct Sweep {
    pub now: DateTime<Utc>,
}
