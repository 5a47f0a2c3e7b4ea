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

//! JWT meeting-access token validation.
//!
//! Validates tokens issued by the scheduling backend before allowing a
//! client to connect to the signaling server: parse JWT, verify HMAC
//! signature, check expiry and issuer, extract the principal.

use jsonwebtoken::{DecodingKey, Validation};
use std::fmt;
use tutorhall_meeting_types::MeetingAccessTokenClaims;

/// Errors that can occur during meeting-access token validation.
#[derive(Debug)]
pub enum TokenError {
    /// No token was provided in the query string or Authorization header.
    Missing,
    /// Token could not be decoded or signature is invalid.
    Invalid(String),
    /// Token has expired (`exp` claim is in the past).
    Expired,
}

impl TokenError {
    /// Whether the client can fix this by fetching a fresh token and
    /// reconnecting. Drives the 401-vs-403 split at the handshake.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TokenError::Missing | TokenError::Expired)
    }

    /// Short, safe message for the refused client. Signature details stay in
    /// the server log.
    pub fn client_message(&self) -> &'static str {
        match self {
            TokenError::Missing => "meeting access token is required",
            TokenError::Invalid(_) => "invalid meeting access token",
            TokenError::Expired => "meeting access token has expired",
        }
    }

    pub fn log(&self, transport: &str) {
        tracing::warn!("{transport} connection refused: {self}");
    }
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenError::Missing => write!(f, "meeting access token is required"),
            TokenError::Invalid(msg) => write!(f, "invalid token: {msg}"),
            TokenError::Expired => write!(f, "token has expired"),
        }
    }
}

impl std::error::Error for TokenError {}

/// Decode and validate a JWT meeting-access token, extracting claims.
///
/// Checks:
/// 1. Signature is valid (HMAC-SHA256)
/// 2. Token is not expired (`exp`)
/// 3. Issuer matches `MeetingAccessTokenClaims::ISSUER`
pub fn decode_meeting_token(
    secret: &str,
    token: &str,
) -> Result<MeetingAccessTokenClaims, TokenError> {
    let decoding_key = DecodingKey::from_secret(secret.as_bytes());

    let mut validation = Validation::default();
    validation.set_required_spec_claims(&["exp", "sub"]);
    validation.set_issuer(&[MeetingAccessTokenClaims::ISSUER]);
    validation.validate_exp = true;

    let token_data =
        jsonwebtoken::decode::<MeetingAccessTokenClaims>(token, &decoding_key, &validation)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid(e.to_string()),
            })?;

    Ok(token_data.claims)
}
