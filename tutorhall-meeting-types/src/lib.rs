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

//! Shared wire types for the TutorHall real-time meeting server.
//!
//! This crate defines the contract between the signaling server and its
//! clients (browser clients, integration tests): the meeting-access token
//! claims, the client/server event surface, and the error codes carried by
//! `error` events. It is intentionally framework-agnostic — no actix, no
//! transport types.

pub mod error;
pub mod events;
pub mod token;

pub use error::EventError;
pub use events::{ChatEntry, ClientEvent, EndReason, ParticipantInfo, ServerEvent};
pub use token::{MeetingAccessTokenClaims, Role};
