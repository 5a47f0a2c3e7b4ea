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

//! Application configuration loaded from environment variables.

use std::env;
use std::time::Duration as StdDuration;

use chrono::Duration;
use tracing::warn;

/// What happens to a meeting when its host departs.
///
/// Exactly one policy is active per process; it is selected once at startup
/// and never changes at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostDeparturePolicy {
    /// Promote the earliest-joined remaining participant and broadcast
    /// `host-changed`.
    Reassign,
    /// End the meeting for everyone and broadcast
    /// `meeting-ended{reason:"host-left"}`.
    End,
}

/// Configuration for the signaling server.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address to bind the HTTP server (e.g. "0.0.0.0:8080").
    pub listen_addr: String,
    /// Shared secret used to verify meeting-access tokens (HMAC-SHA256).
    pub jwt_secret: String,
    /// Hard ceiling on meeting age before the reaper closes it.
    pub max_duration: Duration,
    /// Ceiling on time since the last meeting-scoped event.
    pub max_idle: Duration,
    /// How often the reaper sweeps the registry.
    pub reaper_interval: StdDuration,
    /// How long an empty meeting survives before collection (tolerates quick
    /// reconnects). Zero destroys the meeting as soon as it empties.
    pub empty_room_grace: Duration,
    /// Maximum retained chat entries per meeting, oldest evicted first.
    pub chat_log_cap: usize,
    /// Maximum retained whiteboard ops per meeting, oldest evicted first.
    pub whiteboard_log_cap: usize,
    /// Maximum accepted chat message length in bytes.
    pub chat_message_max_len: usize,
    pub host_departure: HostDeparturePolicy,
}

fn env_u64(name: &str, default: u64) -> Result<u64, String> {
    match env::var(name) {
        Ok(raw) => raw
            .parse::<u64>()
            .map_err(|_| format!("{name} must be a valid integer")),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Required
    /// - `JWT_SECRET`
    ///
    /// # Optional
    /// - `LISTEN_ADDR` (default: `"0.0.0.0:8080"`)
    /// - `MEETING_MAX_DURATION_SECS` (default: `"10800"` = 3 hours)
    /// - `MEETING_MAX_IDLE_SECS` (default: `"1800"` = 30 minutes)
    /// - `REAPER_INTERVAL_SECS` (default: `"60"`)
    /// - `EMPTY_ROOM_GRACE_SECS` (default: `"30"`)
    /// - `CHAT_LOG_CAP` (default: `"100"`)
    /// - `WHITEBOARD_LOG_CAP` (default: `"1000"`)
    /// - `CHAT_MESSAGE_MAX_LEN` (default: `"2000"`)
    /// - `HOST_DEPARTURE_POLICY` (`"reassign"` or `"end"`, default `"reassign"`)
    pub fn from_env() -> Result<Self, String> {
        let jwt_secret =
            env::var("JWT_SECRET").map_err(|_| "JWT_SECRET environment variable is required")?;
        let listen_addr = env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        let max_duration = Duration::seconds(env_u64("MEETING_MAX_DURATION_SECS", 10_800)? as i64);
        let max_idle = Duration::seconds(env_u64("MEETING_MAX_IDLE_SECS", 1_800)? as i64);
        let reaper_interval = StdDuration::from_secs(env_u64("REAPER_INTERVAL_SECS", 60)?);
        let empty_room_grace = Duration::seconds(env_u64("EMPTY_ROOM_GRACE_SECS", 30)? as i64);

        let chat_log_cap = env_u64("CHAT_LOG_CAP", 100)? as usize;
        let whiteboard_log_cap = env_u64("WHITEBOARD_LOG_CAP", 1_000)? as usize;
        let chat_message_max_len = env_u64("CHAT_MESSAGE_MAX_LEN", 2_000)? as usize;

        let host_departure = match env::var("HOST_DEPARTURE_POLICY").as_deref() {
            Ok("end") => HostDeparturePolicy::End,
            Ok("reassign") | Err(_) => HostDeparturePolicy::Reassign,
            Ok(other) => {
                warn!("unrecognized HOST_DEPARTURE_POLICY '{other}', using 'reassign'");
                HostDeparturePolicy::Reassign
            }
        };

        Ok(Self {
            listen_addr,
            jwt_secret,
            max_duration,
            max_idle,
            reaper_interval,
            empty_room_grace,
            chat_log_cap,
            whiteboard_log_cap,
            chat_message_max_len,
            host_departure,
        })
    }
}
