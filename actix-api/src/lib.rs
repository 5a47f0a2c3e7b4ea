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

//! TutorHall signaling server.
//!
//! Coordinates live multi-party meetings for the tutoring platform: peers
//! authenticate with a signed meeting-access token, join meetings, exchange
//! WebRTC negotiation envelopes, and share a whiteboard and chat, all routed
//! through a single in-process [`actors::meeting_server::MeetingServer`]
//! actor.

pub mod actors;
pub mod config;
pub mod constants;
pub mod lobby;
pub mod meeting;
pub mod messages;
pub mod metrics;
pub mod models;
pub mod token_validator;
