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

//! In-memory meeting state.
//!
//! A [`Meeting`] is the per-room aggregate the server actor mutates:
//! participant set, host pointer, capped whiteboard and chat logs, lifecycle
//! timestamps. All state lives in process memory and dies with the process.
//! Every mutator takes `now` explicitly so lifecycle behavior is testable
//! without a clock.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use tutorhall_meeting_types::{ChatEntry, ParticipantInfo};

pub type ConnId = String;
pub type MeetingId = String;

/// Verified identity attached to a connection by the gateway.
#[derive(Debug, Clone)]
pub struct Principal {
    pub id: String,
    pub display_name: String,
    /// Derived from the platform role: tutors are host-eligible.
    pub host_eligible: bool,
}

/// Per-participant state, authoritative for late-joiner snapshots.
#[derive(Debug, Clone)]
pub struct ParticipantState {
    pub principal: Principal,
    pub video_enabled: bool,
    pub audio_enabled: bool,
    pub screen_sharing: bool,
    pub joined_at: DateTime<Utc>,
    /// Per-meeting admission sequence; host reassignment picks the lowest.
    join_order: u64,
}

/// Retention caps for the per-meeting logs.
#[derive(Debug, Clone, Copy)]
pub struct LogCaps {
    pub chat: usize,
    pub whiteboard: usize,
}

/// Outcome of removing a participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Departure {
    pub was_host: bool,
}

#[derive(Debug)]
pub struct Meeting {
    pub id: MeetingId,
    participants: HashMap<ConnId, ParticipantState>,
    host: Option<ConnId>,
    whiteboard: VecDeque<Value>,
    chat: VecDeque<ChatEntry>,
    next_chat_id: u64,
    next_join_order: u64,
    caps: LogCaps,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    /// Set while the participant map is empty; drives grace-window collection.
    pub empty_since: Option<DateTime<Utc>>,
}

impl Meeting {
    pub fn new(id: MeetingId, caps: LogCaps, now: DateTime<Utc>) -> Self {
        Meeting {
            id,
            participants: HashMap::new(),
            host: None,
            whiteboard: VecDeque::new(),
            chat: VecDeque::new(),
            next_chat_id: 1,
            next_join_order: 0,
            caps,
            created_at: now,
            last_activity: now,
            empty_since: None,
        }
    }

    pub fn host(&self) -> Option<&ConnId> {
        self.host.as_ref()
    }

    pub fn is_host(&self, conn: &ConnId) -> bool {
        self.host.as_ref() == Some(conn)
    }

    pub fn is_member(&self, conn: &ConnId) -> bool {
        self.participants.contains_key(conn)
    }

    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn member_ids(&self) -> impl Iterator<Item = &ConnId> {
        self.participants.keys()
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_activity = now;
    }

    /// Admit a participant. Assigns them host if the meeting has none and
    /// they are host-eligible. Returns whether they became host.
    pub fn add_participant(
        &mut self,
        conn: ConnId,
        principal: Principal,
        now: DateTime<Utc>,
    ) -> bool {
        let host_eligible = principal.host_eligible;
        let join_order = self.next_join_order;
        self.next_join_order += 1;
        self.participants.insert(
            conn.clone(),
            ParticipantState {
                principal,
                video_enabled: true,
                audio_enabled: true,
                screen_sharing: false,
                joined_at: now,
                join_order,
            },
        );
        self.empty_since = None;
        self.last_activity = now;
        if self.host.is_none() && host_eligible {
            self.host = Some(conn);
            true
        } else {
            false
        }
    }

    /// Remove a participant. Clears the host pointer if it referenced them
    /// and stamps `empty_since` when the room empties.
    pub fn remove_participant(&mut self, conn: &ConnId, now: DateTime<Utc>) -> Option<Departure> {
        self.participants.remove(conn)?;
        let was_host = self.host.as_ref() == Some(conn);
        if was_host {
            self.host = None;
        }
        self.last_activity = now;
        if self.participants.is_empty() {
            self.empty_since = Some(now);
        }
        Some(Departure { was_host })
    }

    /// Promote a new host from the remaining participants: the earliest
    /// admitted host-eligible participant, or the earliest admitted of any
    /// role if no tutor remains. Returns the new host's connection id.
    pub fn reassign_host(&mut self) -> Option<ConnId> {
        let pick = |eligible_only: bool| {
            self.participants
                .iter()
                .filter(|(_, p)| !eligible_only || p.principal.host_eligible)
                .min_by_key(|(_, p)| p.join_order)
                .map(|(id, _)| id.clone())
        };
        let next = pick(true).or_else(|| pick(false));
        self.host = next.clone();
        next
    }

    pub fn participant_mut(&mut self, conn: &ConnId) -> Option<&mut ParticipantState> {
        self.participants.get_mut(conn)
    }

    pub fn participant_info(&self, conn: &ConnId) -> Option<ParticipantInfo> {
        let state = self.participants.get(conn)?;
        Some(ParticipantInfo {
            connection_id: conn.clone(),
            principal_id: state.principal.id.clone(),
            display_name: state.principal.display_name.clone(),
            video_enabled: state.video_enabled,
            audio_enabled: state.audio_enabled,
            screen_sharing: state.screen_sharing,
            is_host: self.is_host(conn),
        })
    }

    /// The roster a joiner sees: every participant except themselves,
    /// ordered by admission.
    pub fn roster_excluding(&self, conn: &ConnId) -> Vec<ParticipantInfo> {
        let mut members: Vec<(&ConnId, &ParticipantState)> = self
            .participants
            .iter()
            .filter(|(id, _)| *id != conn)
            .collect();
        members.sort_by_key(|(_, p)| p.join_order);
        members
            .into_iter()
            .filter_map(|(id, _)| self.participant_info(id))
            .collect()
    }

    /// Append a chat entry, stamped with the next server-assigned id.
    pub fn append_chat(
        &mut self,
        sender: &Principal,
        message: String,
        now: DateTime<Utc>,
    ) -> ChatEntry {
        let entry = ChatEntry {
            id: self.next_chat_id,
            sender: sender.id.clone(),
            sender_name: sender.display_name.clone(),
            message,
            timestamp: now.timestamp_millis(),
        };
        self.next_chat_id += 1;
        self.chat.push_back(entry.clone());
        while self.chat.len() > self.caps.chat {
            self.chat.pop_front();
        }
        self.last_activity = now;
        entry
    }

    /// Chat log tail for the join snapshot.
    pub fn chat_tail(&self, len: usize) -> Vec<ChatEntry> {
        let skip = self.chat.len().saturating_sub(len);
        self.chat.iter().skip(skip).cloned().collect()
    }

    pub fn append_whiteboard(&mut self, op: Value, now: DateTime<Utc>) {
        self.whiteboard.push_back(op);
        while self.whiteboard.len() > self.caps.whiteboard {
            self.whiteboard.pop_front();
        }
        self.last_activity = now;
    }

    /// Pop the most recent whiteboard op and return the full resulting log,
    /// which the caller broadcasts as a resync.
    pub fn undo_whiteboard(&mut self, now: DateTime<Utc>) -> Vec<Value> {
        self.whiteboard.pop_back();
        self.last_activity = now;
        self.whiteboard_log()
    }

    pub fn whiteboard_log(&self) -> Vec<Value> {
        self.whiteboard.iter().cloned().collect()
    }

    pub fn chat_len(&self) -> usize {
        self.chat.len()
    }

    /// Whether the meeting has outlived its duration or idle ceiling.
    pub fn is_expired(&self, now: DateTime<Utc>, max_duration: Duration, max_idle: Duration) -> bool {
        now - self.created_at > max_duration || now - self.last_activity > max_idle
    }

    /// Whether an empty meeting has been empty longer than the grace window.
    pub fn due_for_collection(&self, now: DateTime<Utc>, grace: Duration) -> bool {
        match self.empty_since {
            Some(since) => now - since >= grace,
            None => false,
        }
    }
}
