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

//! WebSocket lobby handler: the connection gateway.
//!
//! **`GET /lobby?token=<JWT>`** (or an `Authorization: Bearer` header):
//! identity, display name, and role are extracted from the token claims.
//! Authentication is the only connection-fatal failure in the system; a
//! refused handshake distinguishes a missing credential from an
//! invalid/expired one via the status code and body, then closes. Every
//! accepted connection gets a [`WsSession`] actor carrying the verified
//! [`Principal`], which is the only path to meeting operations.

use actix::prelude::Stream;
use actix::Actor;
use actix::StreamHandler;
use actix_http::error::PayloadError;
use actix_http::ws::{Codec, Message, ProtocolError};
use actix_web::http::header;
use actix_web::web::Bytes;
use actix_web::{get, web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws::{handshake, WebsocketContext};
use tracing::debug;

use crate::actors::ws_session::WsSession;
use crate::constants::MAX_FRAME_BYTES;
use crate::meeting::Principal;
use crate::models::AppState;
use crate::token_validator::{self, TokenError};

/// Query parameters for the lobby endpoint.
#[derive(Debug, serde::Deserialize)]
pub struct LobbyTokenQuery {
    /// JWT meeting-access token. May instead arrive as a Bearer header.
    pub token: Option<String>,
}

fn bearer_token(req: &HttpRequest, query: &LobbyTokenQuery) -> Result<String, TokenError> {
    if let Some(token) = query.token.as_deref().filter(|t| !t.is_empty()) {
        return Ok(token.to_string());
    }
    if let Some(value) = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    {
        if let Some(token) = value.strip_prefix("Bearer ") {
            return Ok(token.to_string());
        }
    }
    Err(TokenError::Missing)
}

/// Start a WebSocket connection with a custom codec.
fn start_with_codec<A, S>(
    actor: A,
    req: &HttpRequest,
    stream: S,
    codec: Codec,
) -> Result<HttpResponse, Error>
where
    A: Actor<Context = WebsocketContext<A>> + StreamHandler<Result<Message, ProtocolError>>,
    S: Stream<Item = Result<Bytes, PayloadError>> + 'static,
{
    let mut res = handshake(req)?;
    Ok(res.streaming(WebsocketContext::with_codec(actor, stream, codec)))
}

/// WebSocket connection endpoint.
///
/// Identity and host eligibility come exclusively from the validated JWT.
#[get("/lobby")]
pub async fn ws_connect(
    query: web::Query<LobbyTokenQuery>,
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let claims = match bearer_token(&req, &query).and_then(|token| {
        token_validator::decode_meeting_token(&state.config.jwt_secret, &token)
    }) {
        Ok(claims) => claims,
        Err(e) => {
            e.log("WS");
            let body = e.client_message().to_string();
            return if e.is_retryable() {
                Ok(HttpResponse::Unauthorized().body(body))
            } else {
                Ok(HttpResponse::Forbidden().body(body))
            };
        }
    };

    let principal = Principal {
        id: claims.sub,
        display_name: claims.display_name,
        host_eligible: claims.role.is_host_eligible(),
    };
    debug!(
        "socket connected for principal {} (host_eligible={})",
        principal.id, principal.host_eligible
    );

    let actor = WsSession::new(state.server.clone(), principal);
    let codec = Codec::new().max_size(MAX_FRAME_BYTES);
    start_with_codec(actor, &req, stream, codec)
}
