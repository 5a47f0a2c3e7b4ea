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

//! WebSocket session actor.
//!
//! A thin transport adapter, one per authenticated connection: it parses
//! inbound JSON frames into [`ClientEvent`]s and forwards them as typed
//! messages to the [`MeetingServer`], serializes outbound [`ServerEvent`]s
//! back into text frames, and keeps the ping/pong heartbeat so half-open
//! TCP connections turn into explicit disconnects.
//!
//! The session actor is spawned by the lobby endpoint only after the
//! meeting-access token has been verified, so every message it forwards
//! carries a verified identity.

use actix::{
    clock::Instant, fut, Actor, ActorContext, ActorFutureExt, Addr, AsyncContext,
    ContextFutureSpawner, Handler, Running, StreamHandler, WrapFuture,
};
use actix_web_actors::ws::{self, WebsocketContext};
use tracing::{debug, error, info};
use tutorhall_meeting_types::{ClientEvent, EventError, ServerEvent};
use uuid::Uuid;

use crate::actors::meeting_server::MeetingServer;
use crate::constants::{CLIENT_TIMEOUT, HEARTBEAT_INTERVAL};
use crate::meeting::{ConnId, Principal};
use crate::messages::server::{
    Connect, Disconnect, EndMeeting, JoinMeeting, LeaveMeeting, MediaChange, PostChatMessage,
    RelaySignal, SignalKind, UpdateMediaState, WhiteboardOp, WhiteboardUndo,
};
use crate::messages::session::OutboundEvent;

pub struct WsSession {
    pub id: ConnId,
    pub principal: Principal,
    pub server: Addr<MeetingServer>,
    heartbeat: Instant,
}

impl WsSession {
    pub fn new(server: Addr<MeetingServer>, principal: Principal) -> Self {
        let id = Uuid::new_v4().to_string();
        info!(
            "new session {id} for principal {} ({})",
            principal.id, principal.display_name
        );
        WsSession {
            id,
            principal,
            server,
            heartbeat: Instant::now(),
        }
    }

    fn start_heartbeat(&self, ctx: &mut WebsocketContext<Self>) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.heartbeat) > CLIENT_TIMEOUT {
                error!("client heartbeat failed for session {}, disconnecting", act.id);
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }

    fn send_event(&self, ctx: &mut WebsocketContext<Self>, event: &ServerEvent) {
        match serde_json::to_string(event) {
            Ok(text) => ctx.text(text),
            Err(e) => error!("failed to serialize event for session {}: {e}", self.id),
        }
    }

    /// Map a parsed client event onto the server actor's message surface.
    fn dispatch(&self, event: ClientEvent) {
        let id = self.id.clone();
        match event {
            ClientEvent::JoinMeeting { meeting_id } => {
                self.server.do_send(JoinMeeting { id, meeting_id });
            }
            ClientEvent::LeaveMeeting { meeting_id } => {
                self.server.do_send(LeaveMeeting { id, meeting_id });
            }
            ClientEvent::Offer { to, payload } => {
                self.server.do_send(RelaySignal {
                    from: id,
                    to,
                    kind: SignalKind::Offer,
                    payload,
                });
            }
            ClientEvent::Answer { to, payload } => {
                self.server.do_send(RelaySignal {
                    from: id,
                    to,
                    kind: SignalKind::Answer,
                    payload,
                });
            }
            ClientEvent::IceCandidate { to, payload } => {
                self.server.do_send(RelaySignal {
                    from: id,
                    to,
                    kind: SignalKind::IceCandidate,
                    payload,
                });
            }
            ClientEvent::ChatMessage {
                meeting_id,
                message,
            } => {
                self.server.do_send(PostChatMessage {
                    from: id,
                    meeting_id,
                    message,
                });
            }
            ClientEvent::WhiteboardUpdate { meeting_id, op } => {
                self.server.do_send(WhiteboardOp {
                    from: id,
                    meeting_id,
                    op,
                });
            }
            ClientEvent::WhiteboardUndo { meeting_id } => {
                self.server.do_send(WhiteboardUndo {
                    from: id,
                    meeting_id,
                });
            }
            ClientEvent::VideoToggle {
                meeting_id,
                enabled,
            } => {
                self.server.do_send(UpdateMediaState {
                    from: id,
                    meeting_id,
                    change: MediaChange::Video(enabled),
                });
            }
            ClientEvent::AudioToggle {
                meeting_id,
                enabled,
            } => {
                self.server.do_send(UpdateMediaState {
                    from: id,
                    meeting_id,
                    change: MediaChange::Audio(enabled),
                });
            }
            ClientEvent::ScreenShareStarted { meeting_id } => {
                self.server.do_send(UpdateMediaState {
                    from: id,
                    meeting_id,
                    change: MediaChange::ScreenShare(true),
                });
            }
            ClientEvent::ScreenShareStopped { meeting_id } => {
                self.server.do_send(UpdateMediaState {
                    from: id,
                    meeting_id,
                    change: MediaChange::ScreenShare(false),
                });
            }
            ClientEvent::EndMeeting { meeting_id } => {
                self.server.do_send(EndMeeting {
                    from: id,
                    meeting_id,
                });
            }
        }
    }
}

impl Actor for WsSession {
    type Context = WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        self.start_heartbeat(ctx);

        let addr = ctx.address();
        self.server
            .send(Connect {
                id: self.id.clone(),
                principal: self.principal.clone(),
                addr: addr.recipient(),
            })
            .into_actor(self)
            .then(|res, _act, ctx| {
                if let Err(err) = res {
                    error!("failed to register with meeting server: {err:?}");
                    ctx.stop();
                }
                fut::ready(())
            })
            .wait(ctx);
    }

    fn stopping(&mut self, _: &mut Self::Context) -> Running {
        info!("session {} stopping", self.id);
        self.server.do_send(Disconnect {
            id: self.id.clone(),
        });
        Running::Stop
    }
}

/// Outbound events from the meeting server, serialized onto the socket.
impl Handler<OutboundEvent> for WsSession {
    type Result = ();

    fn handle(&mut self, msg: OutboundEvent, ctx: &mut Self::Context) -> Self::Result {
        self.send_event(ctx, &msg.0);
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WsSession {
    fn handle(&mut self, item: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        let msg = match item {
            Ok(msg) => msg,
            Err(err) => {
                error!("WebSocket protocol error on session {}: {err:?}", self.id);
                ctx.stop();
                return;
            }
        };

        match msg {
            ws::Message::Text(text) => {
                self.heartbeat = Instant::now();
                match serde_json::from_str::<ClientEvent>(&text) {
                    Ok(event) => self.dispatch(event),
                    Err(e) => {
                        // bad frames are rejected, the connection survives
                        debug!("malformed frame from session {}: {e}", self.id);
                        self.send_event(
                            ctx,
                            &EventError::malformed_payload(&e.to_string()).into(),
                        );
                    }
                }
            }
            ws::Message::Binary(_) => {
                self.heartbeat = Instant::now();
                self.send_event(
                    ctx,
                    &EventError::malformed_payload("expected a JSON text frame").into(),
                );
            }
            ws::Message::Ping(payload) => {
                self.heartbeat = Instant::now();
                ctx.pong(&payload);
            }
            ws::Message::Pong(_) => {
                self.heartbeat = Instant::now();
            }
            ws::Message::Close(reason) => {
                debug!("close received for session {}", self.id);
                ctx.close(reason);
                ctx.stop();
            }
            _ => (),
        }
    }

    fn finished(&mut self, ctx: &mut Self::Context) {
        ctx.stop()
    }
}
