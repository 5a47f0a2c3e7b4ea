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

//! Meeting-access token (JWT) claims.
//!
//! The meeting-access token is a signed JWT (HMAC-SHA256) that authorizes a
//! client to connect to the signaling server. The scheduling backend signs
//! the token when a lecture participant is admitted; the signaling server
//! validates the signature and extracts the claims.

use serde::{Deserialize, Serialize};

/// Participant role on the tutoring platform.
///
/// The role is assigned by the scheduling backend and determines host
/// eligibility: tutors may be given control of a meeting, students may not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Tutor,
    Student,
}

impl Role {
    /// Whether a participant with this role may be assigned meeting host.
    pub fn is_host_eligible(self) -> bool {
        matches!(self, Role::Tutor)
    }
}

/// JWT payload for a meeting-access token.
///
/// This is the **only** credential the signaling server accepts for
/// connection. There is no meeting binding in the token: which meetings the
/// connection joins is decided by subsequent `join-meeting` events.
///
/// # Example payload
///
/// ```json
/// {
///   "sub": "user-8841",
///   "display_name": "Alice",
///   "role": "tutor",
///   "exp": 1707004800,
///   "iss": "tutorhall-scheduler"
/// }
/// ```
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MeetingAccessTokenClaims {
    /// Stable principal id (unique identity on the platform).
    pub sub: String,

    /// Participant's display name, shown to other meeting members.
    pub display_name: String,

    /// Platform role; host eligibility derives from it.
    pub role: Role,

    /// Expiration timestamp (Unix seconds). Token is rejected after this.
    pub exp: i64,

    /// Issuer identifier. Always `"tutorhall-scheduler"`.
    pub iss: String,
}

impl MeetingAccessTokenClaims {
    /// The expected issuer value for tokens produced by the scheduling backend.
    pub const ISSUER: &'static str = "tutorhall-scheduler";
}
