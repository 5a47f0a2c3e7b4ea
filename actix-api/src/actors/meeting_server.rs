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

//! The meeting server actor.
//!
//! One instance per process owns the whole meeting registry: the map from
//! meeting id to [`Meeting`], the map from connection id to session
//! recipient, and the membership index between them. Because actix delivers
//! the actor's mailbox one message at a time, every client event runs to
//! completion before the next is dequeued and no locking is needed around
//! meeting state. Handlers must therefore never block.
//!
//! The expiry reaper is a `run_interval` tick on this same actor rather than
//! per-meeting timers: each tick sweeps the registry against the configured
//! duration/idle ceilings and collects rooms that stayed empty past the
//! grace window.

use std::collections::{HashMap, HashSet};

use actix::{Actor, AsyncContext, Context, Handler, Recipient};
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, info};
use tutorhall_meeting_types::{EndReason, EventError, ServerEvent};

use crate::config::{Config, HostDeparturePolicy};
use crate::constants::{CHAT_TAIL_LEN, VALID_ID_PATTERN};
use crate::meeting::{ConnId, LogCaps, Meeting, MeetingId, Principal};
use crate::messages::server::{
    Connect, Disconnect, EndMeeting, JoinMeeting, LeaveMeeting, MediaChange, PostChatMessage,
    RelaySignal, SignalKind, Sweep, UpdateMediaState, WhiteboardOp, WhiteboardUndo,
};
use crate::messages::session::OutboundEvent;
use crate::metrics;

lazy_static! {
    static ref VALID_ID: Regex =
        Regex::new(VALID_ID_PATTERN).expect("id pattern must compile");
}

struct SessionHandle {
    principal: Principal,
    addr: Recipient<OutboundEvent>,
}

pub struct MeetingServer {
    config: Config,
    sessions: HashMap<ConnId, SessionHandle>,
    meetings: HashMap<MeetingId, Meeting>,
    /// Which meetings each connection has joined; disconnect walks this.
    memberships: HashMap<ConnId, HashSet<MeetingId>>,
}

impl MeetingServer {
    pub fn new(config: Config) -> Self {
        MeetingServer {
            config,
            sessions: HashMap::new(),
            meetings: HashMap::new(),
            memberships: HashMap::new(),
        }
    }

    fn send_to(&self, conn: &ConnId, event: ServerEvent) {
        if let Some(handle) = self.sessions.get(conn) {
            handle.addr.do_send(OutboundEvent(event));
        }
    }

    fn error_to(&self, conn: &ConnId, err: EventError) {
        debug!("error event to {conn}: {err}");
        self.send_to(conn, err.into());
    }

    fn broadcast_to(&self, members: &[ConnId], event: &ServerEvent, except: Option<&ConnId>) {
        for conn in members {
            if except == Some(conn) {
                continue;
            }
            self.send_to(conn, event.clone());
        }
    }

    /// Membership precondition shared by every meeting-scoped event.
    fn membership_ok(&self, from: &ConnId, meeting_id: &MeetingId) -> Result<(), EventError> {
        match self.meetings.get(meeting_id) {
            None => Err(EventError::meeting_not_found(meeting_id)),
            Some(meeting) if !meeting.is_member(from) => {
                Err(EventError::not_in_meeting(meeting_id))
            }
            Some(_) => Ok(()),
        }
    }

    fn log_caps(&self) -> LogCaps {
        LogCaps {
            chat: self.config.chat_log_cap,
            whiteboard: self.config.whiteboard_log_cap,
        }
    }

    /// Remove `conn` from `meeting_id`, apply the host-departure policy, and
    /// collect the room if it emptied with a zero grace window.
    fn leave_meeting(&mut self, conn: &ConnId, meeting_id: &MeetingId, now: DateTime<Utc>) {
        if let Some(joined) = self.memberships.get_mut(conn) {
            joined.remove(meeting_id);
        }

        let (departure, members) = {
            let Some(meeting) = self.meetings.get_mut(meeting_id) else {
                return;
            };
            let Some(departure) = meeting.remove_participant(conn, now) else {
                return;
            };
            (departure, meeting.member_ids().cloned().collect::<Vec<_>>())
        };

        self.broadcast_to(
            &members,
            &ServerEvent::ParticipantLeft {
                meeting_id: meeting_id.clone(),
                connection_id: conn.clone(),
                participant_count: members.len(),
            },
            None,
        );

        if departure.was_host && !members.is_empty() {
            match self.config.host_departure {
                HostDeparturePolicy::Reassign => {
                    let new_host = self
                        .meetings
                        .get_mut(meeting_id)
                        .and_then(Meeting::reassign_host);
                    if let Some(host_connection_id) = new_host {
                        info!("meeting {meeting_id}: host reassigned to {host_connection_id}");
                        self.broadcast_to(
                            &members,
                            &ServerEvent::HostChanged {
                                meeting_id: meeting_id.clone(),
                                host_connection_id,
                            },
                            None,
                        );
                    }
                }
                HostDeparturePolicy::End => {
                    self.broadcast_to(
                        &members,
                        &ServerEvent::MeetingEnded {
                            meeting_id: meeting_id.clone(),
                            reason: EndReason::HostLeft,
                        },
                        None,
                    );
                    self.destroy_meeting(meeting_id, "host-left");
                    return;
                }
            }
        }

        if members.is_empty() && self.config.empty_room_grace.is_zero() {
            self.destroy_meeting(meeting_id, "empty");
        }
    }

    fn destroy_meeting(&mut self, meeting_id: &MeetingId, reason: &str) {
        if let Some(meeting) = self.meetings.remove(meeting_id) {
            for conn in meeting.member_ids() {
                if let Some(joined) = self.memberships.get_mut(conn) {
                    joined.remove(meeting_id);
                }
            }
            metrics::ACTIVE_MEETINGS.set(self.meetings.len() as i64);
            metrics::MEETINGS_CLOSED_TOTAL
                .with_label_values(&[reason])
                .inc();
            info!("meeting {meeting_id} destroyed ({reason})");
        }
    }

    /// One reaper pass: close meetings past their duration or idle ceiling,
    /// then collect rooms that stayed empty beyond the grace window.
    fn sweep(&mut self, now: DateTime<Utc>) {
        let expired: Vec<MeetingId> = self
            .meetings
            .values()
            .filter(|m| m.is_expired(now, self.config.max_duration, self.config.max_idle))
            .map(|m| m.id.clone())
            .collect();
        for meeting_id in expired {
            let members: Vec<ConnId> = self
                .meetings
                .get(&meeting_id)
                .map(|m| m.member_ids().cloned().collect())
                .unwrap_or_default();
            self.broadcast_to(
                &members,
                &ServerEvent::MeetingEnded {
                    meeting_id: meeting_id.clone(),
                    reason: EndReason::Expired,
                },
                None,
            );
            self.destroy_meeting(&meeting_id, "expired");
        }

        let abandoned: Vec<MeetingId> = self
            .meetings
            .values()
            .filter(|m| m.due_for_collection(now, self.config.empty_room_grace))
            .map(|m| m.id.clone())
            .collect();
        for meeting_id in abandoned {
            self.destroy_meeting(&meeting_id, "empty");
        }
    }
}

impl Actor for MeetingServer {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        info!(
            "meeting server started, reaper interval {:?}",
            self.config.reaper_interval
        );
        ctx.run_interval(self.config.reaper_interval, |act, _ctx| {
            act.sweep(Utc::now());
        });
    }
}

impl Handler<Connect> for MeetingServer {
    type Result = ();

    fn handle(&mut self, msg: Connect, _ctx: &mut Self::Context) -> Self::Result {
        let Connect { id, principal, addr } = msg;
        info!("connection {id} registered for principal {}", principal.id);
        addr.do_send(OutboundEvent(ServerEvent::ConnectionAssigned {
            connection_id: id.clone(),
        }));
        self.sessions.insert(id, SessionHandle { principal, addr });
        metrics::ACTIVE_CONNECTIONS.set(self.sessions.len() as i64);
    }
}

impl Handler<Disconnect> for MeetingServer {
    type Result = ();

    fn handle(&mut self, Disconnect { id }: Disconnect, _ctx: &mut Self::Context) -> Self::Result {
        let now = Utc::now();
        if let Some(joined) = self.memberships.remove(&id) {
            for meeting_id in joined {
                self.leave_meeting(&id, &meeting_id, now);
            }
        }
        self.sessions.remove(&id);
        metrics::ACTIVE_CONNECTIONS.set(self.sessions.len() as i64);
        debug!("connection {id} deregistered");
    }
}

impl Handler<JoinMeeting> for MeetingServer {
    type Result = ();

    fn handle(&mut self, msg: JoinMeeting, _ctx: &mut Self::Context) -> Self::Result {
        metrics::EVENTS_TOTAL.with_label_values(&["join-meeting"]).inc();
        let JoinMeeting { id, meeting_id } = msg;
        let now = Utc::now();

        let Some(handle) = self.sessions.get(&id) else {
            return;
        };
        let principal = handle.principal.clone();

        if !VALID_ID.is_match(&meeting_id) {
            self.error_to(&id, EventError::invalid_meeting_id(&meeting_id));
            return;
        }

        // A meeting past its ceilings refuses joins even before the reaper
        // gets to it.
        if let Some(meeting) = self.meetings.get(&meeting_id) {
            if meeting.is_expired(now, self.config.max_duration, self.config.max_idle) {
                self.error_to(&id, EventError::meeting_expired(&meeting_id));
                return;
            }
        }

        let caps = self.log_caps();
        let (snapshot, announce) = {
            let meeting = self
                .meetings
                .entry(meeting_id.clone())
                .or_insert_with(|| {
                    info!("meeting {meeting_id} created");
                    Meeting::new(meeting_id.clone(), caps, now)
                });

            let announce = if meeting.is_member(&id) {
                // duplicate join: refresh the snapshot, announce nothing
                None
            } else {
                meeting.add_participant(id.clone(), principal, now);
                let Some(participant) = meeting.participant_info(&id) else {
                    return;
                };
                Some((
                    ServerEvent::ParticipantJoined {
                        meeting_id: meeting_id.clone(),
                        participant,
                        participant_count: meeting.participant_count(),
                    },
                    meeting
                        .member_ids()
                        .filter(|c| *c != &id)
                        .cloned()
                        .collect::<Vec<_>>(),
                ))
            };

            let snapshot = ServerEvent::MeetingJoined {
                meeting_id: meeting_id.clone(),
                is_host: meeting.is_host(&id),
                participants: meeting.roster_excluding(&id),
                whiteboard: meeting.whiteboard_log(),
                chat: meeting.chat_tail(CHAT_TAIL_LEN),
            };
            (snapshot, announce)
        };

        self.memberships
            .entry(id.clone())
            .or_default()
            .insert(meeting_id.clone());
        metrics::ACTIVE_MEETINGS.set(self.meetings.len() as i64);

        self.send_to(&id, snapshot);
        if let Some((event, others)) = announce {
            self.broadcast_to(&others, &event, None);
        }
    }
}

impl Handler<LeaveMeeting> for MeetingServer {
    type Result = ();

    fn handle(&mut self, msg: LeaveMeeting, _ctx: &mut Self::Context) -> Self::Result {
        metrics::EVENTS_TOTAL.with_label_values(&["leave-meeting"]).inc();
        self.leave_meeting(&msg.id, &msg.meeting_id, Utc::now());
    }
}

impl Handler<RelaySignal> for MeetingServer {
    type Result = ();

    fn handle(&mut self, msg: RelaySignal, _ctx: &mut Self::Context) -> Self::Result {
        let RelaySignal {
            from,
            to,
            kind,
            payload,
        } = msg;
        metrics::EVENTS_TOTAL
            .with_label_values(&[match kind {
                SignalKind::Offer => "offer",
                SignalKind::Answer => "answer",
                SignalKind::IceCandidate => "ice-candidate",
            }])
            .inc();

        match self.sessions.get(&to) {
            Some(handle) => {
                let event = match kind {
                    SignalKind::Offer => ServerEvent::Offer { from, payload },
                    SignalKind::Answer => ServerEvent::Answer { from, payload },
                    SignalKind::IceCandidate => ServerEvent::IceCandidate { from, payload },
                };
                handle.addr.do_send(OutboundEvent(event));
                metrics::SIGNALS_RELAYED_TOTAL.inc();
            }
            None => {
                // best-effort: the target left, the sender hears nothing
                debug!("dropping signal from {from}: target {to} is gone");
                metrics::SIGNALS_DROPPED_TOTAL.inc();
            }
        }
    }
}

impl Handler<PostChatMessage> for MeetingServer {
    type Result = ();

    fn handle(&mut self, msg: PostChatMessage, _ctx: &mut Self::Context) -> Self::Result {
        metrics::EVENTS_TOTAL.with_label_values(&["chat-message"]).inc();
        let PostChatMessage {
            from,
            meeting_id,
            message,
        } = msg;
        let now = Utc::now();

        if let Err(err) = self.membership_ok(&from, &meeting_id) {
            self.error_to(&from, err);
            return;
        }
        if message.len() > self.config.chat_message_max_len {
            self.error_to(
                &from,
                EventError::payload_too_large(message.len(), self.config.chat_message_max_len),
            );
            return;
        }
        let Some(handle) = self.sessions.get(&from) else {
            return;
        };
        let principal = handle.principal.clone();

        let (event, members) = {
            let Some(meeting) = self.meetings.get_mut(&meeting_id) else {
                return;
            };
            let entry = meeting.append_chat(&principal, message, now);
            (
                ServerEvent::ChatMessage {
                    meeting_id: meeting_id.clone(),
                    entry,
                },
                meeting.member_ids().cloned().collect::<Vec<_>>(),
            )
        };

        // the author gets the broadcast too: it carries the assigned id
        self.broadcast_to(&members, &event, None);
    }
}

impl Handler<WhiteboardOp> for MeetingServer {
    type Result = ();

    fn handle(&mut self, msg: WhiteboardOp, _ctx: &mut Self::Context) -> Self::Result {
        metrics::EVENTS_TOTAL
            .with_label_values(&["whiteboard-update"])
            .inc();
        let WhiteboardOp {
            from,
            meeting_id,
            op,
        } = msg;
        let now = Utc::now();

        if let Err(err) = self.membership_ok(&from, &meeting_id) {
            self.error_to(&from, err);
            return;
        }

        let members = {
            let Some(meeting) = self.meetings.get_mut(&meeting_id) else {
                return;
            };
            meeting.append_whiteboard(op.clone(), now);
            meeting.member_ids().cloned().collect::<Vec<_>>()
        };

        let event = ServerEvent::WhiteboardUpdate {
            meeting_id,
            from: from.clone(),
            op,
        };
        self.broadcast_to(&members, &event, Some(&from));
    }
}

impl Handler<WhiteboardUndo> for MeetingServer {
    type Result = ();

    fn handle(&mut self, msg: WhiteboardUndo, _ctx: &mut Self::Context) -> Self::Result {
        metrics::EVENTS_TOTAL
            .with_label_values(&["whiteboard-undo"])
            .inc();
        let WhiteboardUndo { from, meeting_id } = msg;
        let now = Utc::now();

        if let Err(err) = self.membership_ok(&from, &meeting_id) {
            self.error_to(&from, err);
            return;
        }

        let (full_log, members) = {
            let Some(meeting) = self.meetings.get_mut(&meeting_id) else {
                return;
            };
            (
                meeting.undo_whiteboard(now),
                meeting.member_ids().cloned().collect::<Vec<_>>(),
            )
        };

        // full-log resync to everyone, sender included: converges all
        // clients regardless of delivery races
        let event = ServerEvent::WhiteboardSync {
            meeting_id,
            full_log,
        };
        self.broadcast_to(&members, &event, None);
    }
}

impl Handler<UpdateMediaState> for MeetingServer {
    type Result = ();

    fn handle(&mut self, msg: UpdateMediaState, _ctx: &mut Self::Context) -> Self::Result {
        metrics::EVENTS_TOTAL.with_label_values(&["media-toggle"]).inc();
        let UpdateMediaState {
            from,
            meeting_id,
            change,
        } = msg;
        let now = Utc::now();

        if let Err(err) = self.membership_ok(&from, &meeting_id) {
            self.error_to(&from, err);
            return;
        }

        let members = {
            let Some(meeting) = self.meetings.get_mut(&meeting_id) else {
                return;
            };
            if let Some(state) = meeting.participant_mut(&from) {
                match change {
                    MediaChange::Video(enabled) => state.video_enabled = enabled,
                    MediaChange::Audio(enabled) => state.audio_enabled = enabled,
                    MediaChange::ScreenShare(sharing) => state.screen_sharing = sharing,
                }
            }
            meeting.touch(now);
            meeting.member_ids().cloned().collect::<Vec<_>>()
        };

        let event = match change {
            MediaChange::Video(enabled) => ServerEvent::VideoToggle {
                meeting_id,
                connection_id: from.clone(),
                enabled,
            },
            MediaChange::Audio(enabled) => ServerEvent::AudioToggle {
                meeting_id,
                connection_id: from.clone(),
                enabled,
            },
            MediaChange::ScreenShare(true) => ServerEvent::ScreenShareStarted {
                meeting_id,
                connection_id: from.clone(),
            },
            MediaChange::ScreenShare(false) => ServerEvent::ScreenShareStopped {
                meeting_id,
                connection_id: from.clone(),
            },
        };
        self.broadcast_to(&members, &event, Some(&from));
    }
}

impl Handler<EndMeeting> for MeetingServer {
    type Result = ();

    fn handle(&mut self, msg: EndMeeting, _ctx: &mut Self::Context) -> Self::Result {
        metrics::EVENTS_TOTAL.with_label_values(&["end-meeting"]).inc();
        let EndMeeting { from, meeting_id } = msg;

        if let Err(err) = self.membership_ok(&from, &meeting_id) {
            self.error_to(&from, err);
            return;
        }
        let is_host = self
            .meetings
            .get(&meeting_id)
            .map(|m| m.is_host(&from))
            .unwrap_or(false);
        if !is_host {
            self.error_to(&from, EventError::not_host());
            return;
        }

        let members: Vec<ConnId> = self
            .meetings
            .get(&meeting_id)
            .map(|m| m.member_ids().cloned().collect())
            .unwrap_or_default();
        self.broadcast_to(
            &members,
            &ServerEvent::MeetingEnded {
                meeting_id: meeting_id.clone(),
                reason: EndReason::EndedByHost,
            },
            None,
        );
        self.destroy_meeting(&meeting_id, "ended-by-host");
    }
}

impl Handler<Sweep> for MeetingServer {
    type Result = ();

    fn handle(&mut self, Sweep { now }: Sweep, _ctx: &mut Self::Context) -> Self::Result {
        self.sweep(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix::{Addr, Message as ActixMessage};
    use chrono::Duration;
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use std::time::Duration as StdDuration;

    fn test_config() -> Config {
        Config {
            listen_addr: "127.0.0.1:0".to_string(),
            jwt_secret: "test-secret".to_string(),
            max_duration: Duration::seconds(3_600),
            max_idle: Duration::seconds(600),
            // ticks are driven explicitly via Sweep in tests
            reaper_interval: StdDuration::from_secs(3_600),
            empty_room_grace: Duration::seconds(30),
            chat_log_cap: 3,
            whiteboard_log_cap: 10,
            chat_message_max_len: 100,
            host_departure: HostDeparturePolicy::Reassign,
        }
    }

    fn tutor(id: &str) -> Principal {
        Principal {
            id: id.to_string(),
            display_name: format!("Tutor {id}"),
            host_eligible: true,
        }
    }

    fn student(id: &str) -> Principal {
        Principal {
            id: id.to_string(),
            display_name: format!("Student {id}"),
            host_eligible: false,
        }
    }

    /// Collects every event the server pushes at one connection.
    struct Recorder {
        events: Arc<Mutex<Vec<ServerEvent>>>,
    }

    impl Actor for Recorder {
        type Context = Context<Self>;
    }

    impl Handler<OutboundEvent> for Recorder {
        type Result = ();

        fn handle(&mut self, msg: OutboundEvent, _ctx: &mut Self::Context) -> Self::Result {
            self.events.lock().unwrap().push(msg.0);
        }
    }

    /// Mailbox barrier: awaiting it guarantees every previously queued
    /// OutboundEvent has been recorded.
    #[derive(ActixMessage)]
    #[rtype(result = "()")]
    struct Probe;

    impl Handler<Probe> for Recorder {
        type Result = ();

        fn handle(&mut self, _msg: Probe, _ctx: &mut Self::Context) -> Self::Result {}
    }

    struct TestClient {
        id: ConnId,
        recorder: Addr<Recorder>,
        events: Arc<Mutex<Vec<ServerEvent>>>,
    }

    impl TestClient {
        async fn drain(&self) -> Vec<ServerEvent> {
            self.recorder.send(Probe).await.unwrap();
            std::mem::take(&mut *self.events.lock().unwrap())
        }
    }

    async fn connect(server: &Addr<MeetingServer>, id: &str, principal: Principal) -> TestClient {
        let events = Arc::new(Mutex::new(Vec::new()));
        let recorder = Recorder {
            events: events.clone(),
        }
        .start();
        server
            .send(Connect {
                id: id.to_string(),
                principal,
                addr: recorder.clone().recipient(),
            })
            .await
            .unwrap();
        let client = TestClient {
            id: id.to_string(),
            recorder,
            events,
        };
        let assigned = client.drain().await;
        assert!(matches!(
            assigned.as_slice(),
            [ServerEvent::ConnectionAssigned { connection_id }] if connection_id == id
        ));
        client
    }

    async fn join(server: &Addr<MeetingServer>, client: &TestClient, meeting_id: &str) {
        server
            .send(JoinMeeting {
                id: client.id.clone(),
                meeting_id: meeting_id.to_string(),
            })
            .await
            .unwrap();
    }

    #[actix_rt::test]
    async fn join_snapshot_and_presence_broadcast() {
        let server = MeetingServer::new(test_config()).start();
        let alice = connect(&server, "conn-a", tutor("alice")).await;
        join(&server, &alice, "m1").await;

        let events = alice.drain().await;
        match &events[..] {
            [ServerEvent::MeetingJoined {
                meeting_id,
                is_host,
                participants,
                whiteboard,
                chat,
            }] => {
                assert_eq!(meeting_id, "m1");
                assert!(*is_host);
                assert!(participants.is_empty());
                assert!(whiteboard.is_empty());
                assert!(chat.is_empty());
            }
            other => panic!("unexpected events: {other:?}"),
        }

        let bob = connect(&server, "conn-b", student("bob")).await;
        join(&server, &bob, "m1").await;

        let events = bob.drain().await;
        match &events[..] {
            [ServerEvent::MeetingJoined {
                is_host,
                participants,
                ..
            }] => {
                assert!(!is_host);
                assert_eq!(participants.len(), 1);
                assert_eq!(participants[0].connection_id, "conn-a");
                assert!(participants[0].is_host);
            }
            other => panic!("unexpected events: {other:?}"),
        }

        let events = alice.drain().await;
        match &events[..] {
            [ServerEvent::ParticipantJoined {
                participant,
                participant_count,
                ..
            }] => {
                assert_eq!(participant.connection_id, "conn-b");
                assert_eq!(participant.display_name, "Student bob");
                assert_eq!(*participant_count, 2);
            }
            other => panic!("unexpected events: {other:?}"),
        }
    }

    #[actix_rt::test]
    async fn relay_tags_sender_and_drops_silently() {
        let server = MeetingServer::new(test_config()).start();
        let alice = connect(&server, "conn-a", tutor("alice")).await;
        let bob = connect(&server, "conn-b", student("bob")).await;

        server
            .send(RelaySignal {
                from: alice.id.clone(),
                to: bob.id.clone(),
                kind: SignalKind::Offer,
                payload: json!({ "sdp": "v=0" }),
            })
            .await
            .unwrap();

        let events = bob.drain().await;
        match &events[..] {
            [ServerEvent::Offer { from, payload }] => {
                assert_eq!(from, "conn-a");
                assert_eq!(payload["sdp"], "v=0");
            }
            other => panic!("unexpected events: {other:?}"),
        }

        // target gone: drop, and the sender hears nothing
        server
            .send(RelaySignal {
                from: alice.id.clone(),
                to: "conn-ghost".to_string(),
                kind: SignalKind::IceCandidate,
                payload: json!({}),
            })
            .await
            .unwrap();
        assert!(alice.drain().await.is_empty());
    }

    #[actix_rt::test]
    async fn host_failover_end_meeting_and_fresh_rejoin() {
        let server = MeetingServer::new(test_config()).start();
        let alice = connect(&server, "conn-a", tutor("alice")).await;
        let bob = connect(&server, "conn-b", student("bob")).await;
        join(&server, &alice, "m1").await;
        join(&server, &bob, "m1").await;
        alice.drain().await;
        bob.drain().await;

        // leave a trace on the whiteboard to prove the rejoin is fresh
        server
            .send(WhiteboardOp {
                from: alice.id.clone(),
                meeting_id: "m1".to_string(),
                op: json!({ "stroke": 1 }),
            })
            .await
            .unwrap();
        bob.drain().await;

        server
            .send(RelaySignal {
                from: alice.id.clone(),
                to: bob.id.clone(),
                kind: SignalKind::Offer,
                payload: json!({ "sdp": "offer-from-alice" }),
            })
            .await
            .unwrap();
        let events = bob.drain().await;
        assert!(matches!(
            &events[..],
            [ServerEvent::Offer { from, .. }] if from == "conn-a"
        ));

        // host disconnects: bob is promoted, exactly once
        server
            .send(Disconnect {
                id: alice.id.clone(),
            })
            .await
            .unwrap();
        let events = bob.drain().await;
        match &events[..] {
            [ServerEvent::ParticipantLeft {
                connection_id,
                participant_count,
                ..
            }, ServerEvent::HostChanged {
                host_connection_id, ..
            }] => {
                assert_eq!(connection_id, "conn-a");
                assert_eq!(*participant_count, 1);
                assert_eq!(host_connection_id, "conn-b");
            }
            other => panic!("unexpected events: {other:?}"),
        }

        // the promoted host may end the meeting
        server
            .send(EndMeeting {
                from: bob.id.clone(),
                meeting_id: "m1".to_string(),
            })
            .await
            .unwrap();
        let events = bob.drain().await;
        assert!(matches!(
            &events[..],
            [ServerEvent::MeetingEnded {
                reason: EndReason::EndedByHost,
                ..
            }]
        ));

        // a subsequent join creates a fresh, empty meeting
        join(&server, &bob, "m1").await;
        let events = bob.drain().await;
        match &events[..] {
            [ServerEvent::MeetingJoined {
                is_host,
                participants,
                whiteboard,
                ..
            }] => {
                assert!(!is_host, "students do not inherit host in a fresh room");
                assert!(participants.is_empty());
                assert!(whiteboard.is_empty());
            }
            other => panic!("unexpected events: {other:?}"),
        }
    }

    #[actix_rt::test]
    async fn end_meeting_rejected_for_non_host() {
        let server = MeetingServer::new(test_config()).start();
        let alice = connect(&server, "conn-a", tutor("alice")).await;
        let bob = connect(&server, "conn-b", student("bob")).await;
        join(&server, &alice, "m1").await;
        join(&server, &bob, "m1").await;
        alice.drain().await;
        bob.drain().await;

        server
            .send(EndMeeting {
                from: bob.id.clone(),
                meeting_id: "m1".to_string(),
            })
            .await
            .unwrap();

        let events = bob.drain().await;
        assert!(matches!(
            &events[..],
            [ServerEvent::Error { code, .. }] if code == "NOT_HOST"
        ));
        // the meeting survived
        assert!(alice.drain().await.is_empty());
    }

    #[actix_rt::test]
    async fn end_policy_ends_meeting_when_host_leaves() {
        let mut config = test_config();
        config.host_departure = HostDeparturePolicy::End;
        let server = MeetingServer::new(config).start();
        let alice = connect(&server, "conn-a", tutor("alice")).await;
        let bob = connect(&server, "conn-b", student("bob")).await;
        join(&server, &alice, "m1").await;
        join(&server, &bob, "m1").await;
        alice.drain().await;
        bob.drain().await;

        server
            .send(Disconnect {
                id: alice.id.clone(),
            })
            .await
            .unwrap();

        let events = bob.drain().await;
        match &events[..] {
            [ServerEvent::ParticipantLeft { .. }, ServerEvent::MeetingEnded { reason, .. }] => {
                assert_eq!(*reason, EndReason::HostLeft);
            }
            other => panic!("unexpected events: {other:?}"),
        }
    }

    #[actix_rt::test]
    async fn chat_broadcast_cap_and_size_limit() {
        let server = MeetingServer::new(test_config()).start();
        let alice = connect(&server, "conn-a", tutor("alice")).await;
        let bob = connect(&server, "conn-b", student("bob")).await;
        join(&server, &alice, "m1").await;
        join(&server, &bob, "m1").await;
        alice.drain().await;
        bob.drain().await;

        // cap is 3; four messages all broadcast, but only three are retained
        for i in 0..4 {
            server
                .send(PostChatMessage {
                    from: alice.id.clone(),
                    meeting_id: "m1".to_string(),
                    message: format!("msg {i}"),
                })
                .await
                .unwrap();
        }
        let events = bob.drain().await;
        assert_eq!(events.len(), 4);
        assert!(matches!(
            &events[0],
            ServerEvent::ChatMessage { entry, .. } if entry.id == 1 && entry.sender == "alice"
        ));
        // the author receives the broadcast too
        assert_eq!(alice.drain().await.len(), 4);

        // a late joiner sees only the capped tail
        let carol = connect(&server, "conn-c", student("carol")).await;
        join(&server, &carol, "m1").await;
        let events = carol.drain().await;
        match &events[..] {
            [ServerEvent::MeetingJoined { chat, .. }] => {
                assert_eq!(chat.len(), 3);
                assert_eq!(chat[0].message, "msg 1");
                assert_eq!(chat[2].message, "msg 3");
            }
            other => panic!("unexpected events: {other:?}"),
        }

        // oversized message: explicit error, nothing broadcast
        alice.drain().await;
        bob.drain().await;
        server
            .send(PostChatMessage {
                from: bob.id.clone(),
                meeting_id: "m1".to_string(),
                message: "x".repeat(101),
            })
            .await
            .unwrap();
        let events = bob.drain().await;
        assert!(matches!(
            &events[..],
            [ServerEvent::Error { code, .. }] if code == "PAYLOAD_TOO_LARGE"
        ));
        assert!(alice.drain().await.is_empty());
    }

    #[actix_rt::test]
    async fn whiteboard_update_skips_sender_undo_resyncs_everyone() {
        let server = MeetingServer::new(test_config()).start();
        let alice = connect(&server, "conn-a", tutor("alice")).await;
        let bob = connect(&server, "conn-b", student("bob")).await;
        join(&server, &alice, "m1").await;
        join(&server, &bob, "m1").await;
        alice.drain().await;
        bob.drain().await;

        for i in 0..2 {
            server
                .send(WhiteboardOp {
                    from: alice.id.clone(),
                    meeting_id: "m1".to_string(),
                    op: json!({ "stroke": i }),
                })
                .await
                .unwrap();
        }
        assert_eq!(bob.drain().await.len(), 2);
        assert!(
            alice.drain().await.is_empty(),
            "sender must not receive its own ops"
        );

        server
            .send(WhiteboardUndo {
                from: bob.id.clone(),
                meeting_id: "m1".to_string(),
            })
            .await
            .unwrap();
        for client in [&alice, &bob] {
            let events = client.drain().await;
            match &events[..] {
                [ServerEvent::WhiteboardSync { full_log, .. }] => {
                    assert_eq!(full_log, &vec![json!({ "stroke": 0 })]);
                }
                other => panic!("unexpected events: {other:?}"),
            }
        }
    }

    #[actix_rt::test]
    async fn media_toggle_updates_snapshot_for_late_joiners() {
        let server = MeetingServer::new(test_config()).start();
        let alice = connect(&server, "conn-a", tutor("alice")).await;
        let bob = connect(&server, "conn-b", student("bob")).await;
        join(&server, &alice, "m1").await;
        join(&server, &bob, "m1").await;
        alice.drain().await;
        bob.drain().await;

        server
            .send(UpdateMediaState {
                from: alice.id.clone(),
                meeting_id: "m1".to_string(),
                change: MediaChange::Video(false),
            })
            .await
            .unwrap();
        server
            .send(UpdateMediaState {
                from: alice.id.clone(),
                meeting_id: "m1".to_string(),
                change: MediaChange::ScreenShare(true),
            })
            .await
            .unwrap();

        let events = bob.drain().await;
        match &events[..] {
            [ServerEvent::VideoToggle {
                connection_id,
                enabled,
                ..
            }, ServerEvent::ScreenShareStarted { .. }] => {
                assert_eq!(connection_id, "conn-a");
                assert!(!enabled);
            }
            other => panic!("unexpected events: {other:?}"),
        }
        assert!(alice.drain().await.is_empty());

        let carol = connect(&server, "conn-c", student("carol")).await;
        join(&server, &carol, "m1").await;
        let events = carol.drain().await;
        match &events[..] {
            [ServerEvent::MeetingJoined { participants, .. }] => {
                let a = participants
                    .iter()
                    .find(|p| p.connection_id == "conn-a")
                    .unwrap();
                assert!(!a.video_enabled);
                assert!(a.screen_sharing);
            }
            other => panic!("unexpected events: {other:?}"),
        }
    }

    #[actix_rt::test]
    async fn sweep_expires_idle_meetings_with_notice() {
        let server = MeetingServer::new(test_config()).start();
        let alice = connect(&server, "conn-a", tutor("alice")).await;
        join(&server, &alice, "m1").await;
        alice.drain().await;

        // not yet past the idle ceiling: nothing happens
        server
            .send(Sweep {
                now: Utc::now() + Duration::seconds(10),
            })
            .await
            .unwrap();
        assert!(alice.drain().await.is_empty());

        server
            .send(Sweep {
                now: Utc::now() + Duration::seconds(700),
            })
            .await
            .unwrap();
        let events = alice.drain().await;
        assert!(matches!(
            &events[..],
            [ServerEvent::MeetingEnded {
                reason: EndReason::Expired,
                ..
            }]
        ));

        // the registry forgot the meeting: rejoining creates a fresh one
        join(&server, &alice, "m1").await;
        let events = alice.drain().await;
        assert!(matches!(
            &events[..],
            [ServerEvent::MeetingJoined { is_host: true, .. }]
        ));
    }

    #[actix_rt::test]
    async fn empty_room_survives_grace_then_collected() {
        let server = MeetingServer::new(test_config()).start();
        let alice = connect(&server, "conn-a", tutor("alice")).await;
        join(&server, &alice, "m1").await;
        alice.drain().await;
        server
            .send(WhiteboardOp {
                from: alice.id.clone(),
                meeting_id: "m1".to_string(),
                op: json!({ "stroke": 1 }),
            })
            .await
            .unwrap();
        server
            .send(LeaveMeeting {
                id: alice.id.clone(),
                meeting_id: "m1".to_string(),
            })
            .await
            .unwrap();

        // a quick reconnect within the grace window finds the room intact
        join(&server, &alice, "m1").await;
        let events = alice.drain().await;
        match &events[..] {
            [ServerEvent::MeetingJoined { whiteboard, .. }] => {
                assert_eq!(whiteboard.len(), 1);
            }
            other => panic!("unexpected events: {other:?}"),
        }

        // empty past the grace window: the sweep collects it quietly
        server
            .send(LeaveMeeting {
                id: alice.id.clone(),
                meeting_id: "m1".to_string(),
            })
            .await
            .unwrap();
        server
            .send(Sweep {
                now: Utc::now() + Duration::seconds(31),
            })
            .await
            .unwrap();
        join(&server, &alice, "m1").await;
        let events = alice.drain().await;
        match &events[..] {
            [ServerEvent::MeetingJoined { whiteboard, .. }] => {
                assert!(whiteboard.is_empty());
            }
            other => panic!("unexpected events: {other:?}"),
        }
    }

    #[actix_rt::test]
    async fn meeting_scoped_events_require_membership() {
        let server = MeetingServer::new(test_config()).start();
        let alice = connect(&server, "conn-a", tutor("alice")).await;

        server
            .send(PostChatMessage {
                from: alice.id.clone(),
                meeting_id: "nowhere".to_string(),
                message: "hi".to_string(),
            })
            .await
            .unwrap();
        let events = alice.drain().await;
        assert!(matches!(
            &events[..],
            [ServerEvent::Error { code, .. }] if code == "MEETING_NOT_FOUND"
        ));

        // meeting exists, sender never joined
        let bob = connect(&server, "conn-b", student("bob")).await;
        join(&server, &bob, "m1").await;
        bob.drain().await;
        server
            .send(WhiteboardUndo {
                from: alice.id.clone(),
                meeting_id: "m1".to_string(),
            })
            .await
            .unwrap();
        let events = alice.drain().await;
        assert!(matches!(
            &events[..],
            [ServerEvent::Error { code, .. }] if code == "NOT_IN_MEETING"
        ));

        server
            .send(JoinMeeting {
                id: alice.id.clone(),
                meeting_id: "not a valid id!".to_string(),
            })
            .await
            .unwrap();
        let events = alice.drain().await;
        assert!(matches!(
            &events[..],
            [ServerEvent::Error { code, .. }] if code == "INVALID_MEETING_ID"
        ));
    }
}
