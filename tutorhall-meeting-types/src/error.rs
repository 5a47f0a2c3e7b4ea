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

//! Wire error codes.
//!
//! Every per-event failure is returned to the originating connection as an
//! `error` event carrying one of these structured errors. Errors never drop
//! the connection; the only connection-fatal failure is authentication at
//! handshake time, which is an HTTP-level rejection and never reaches this
//! type.

use serde::{Deserialize, Serialize};

/// Structured error carried by an `error` event.
///
/// The `code` field is a machine-readable identifier (e.g. `"NOT_HOST"`).
/// The `message` field is a human-readable description suitable for display.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct EventError {
    /// Machine-readable error code (e.g. `"MEETING_NOT_FOUND"`, `"NOT_HOST"`).
    pub code: String,

    /// Human-readable error message.
    pub message: String,
}

impl EventError {
    pub fn invalid_meeting_id(detail: &str) -> Self {
        Self {
            code: "INVALID_MEETING_ID".to_string(),
            message: format!("Invalid meeting ID: {detail}"),
        }
    }

    pub fn meeting_not_found(meeting_id: &str) -> Self {
        Self {
            code: "MEETING_NOT_FOUND".to_string(),
            message: format!("Meeting '{meeting_id}' not found"),
        }
    }

    pub fn meeting_expired(meeting_id: &str) -> Self {
        Self {
            code: "MEETING_EXPIRED".to_string(),
            message: format!("Meeting '{meeting_id}' has expired and can no longer be joined"),
        }
    }

    pub fn not_in_meeting(meeting_id: &str) -> Self {
        Self {
            code: "NOT_IN_MEETING".to_string(),
            message: format!("You have not joined meeting '{meeting_id}'"),
        }
    }

    pub fn not_host() -> Self {
        Self {
            code: "NOT_HOST".to_string(),
            message: "Only the meeting host can perform this action".to_string(),
        }
    }

    pub fn malformed_payload(detail: &str) -> Self {
        Self {
            code: "MALFORMED_PAYLOAD".to_string(),
            message: format!("Malformed payload: {detail}"),
        }
    }

    pub fn payload_too_large(len: usize, max: usize) -> Self {
        Self {
            code: "PAYLOAD_TOO_LARGE".to_string(),
            message: format!("Payload of {len} bytes exceeds the {max} byte limit"),
        }
    }
}

impl std::fmt::Display for EventError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for EventError {}
