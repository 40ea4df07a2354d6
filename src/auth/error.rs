// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.
//!
//! The variants distinguish every failure cause for logging. Clients never
//! see the cause: all token problems render the same generic 401 body.

use axum::response::{IntoResponse, Response};

use crate::error::ProxyError;

/// Authentication error type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No authorization header present
    MissingAuthHeader,
    /// Authorization header is not `Bearer <token>`
    InvalidAuthHeader,
    /// Token is not a well-formed compact JWS
    MalformedToken,
    /// Token header asserts an algorithm other than RS256
    UnsupportedAlgorithm(String),
    /// Token header has no `kid`
    MissingKeyId,
    /// No key with this `kid`, even after a refresh
    UnknownSigningKey(String),
    /// Token signature is invalid
    InvalidSignature,
    /// Token has expired
    TokenExpired,
    /// Token is not yet valid
    TokenNotYetValid,
    /// Token issuer is invalid
    InvalidIssuer,
    /// Token audience is invalid
    InvalidAudience,
    /// A required claim is missing or has the wrong type
    InvalidClaims(String),
    /// Signing keys could not be obtained at all
    KeySetUnavailable(String),
}

impl AuthError {
    /// Get the error code for this error (logs only).
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingAuthHeader => "missing_auth_header",
            AuthError::InvalidAuthHeader => "invalid_auth_header",
            AuthError::MalformedToken => "malformed_token",
            AuthError::UnsupportedAlgorithm(_) => "unsupported_algorithm",
            AuthError::MissingKeyId => "missing_key_id",
            AuthError::UnknownSigningKey(_) => "unknown_signing_key",
            AuthError::InvalidSignature => "invalid_signature",
            AuthError::TokenExpired => "token_expired",
            AuthError::TokenNotYetValid => "token_not_yet_valid",
            AuthError::InvalidIssuer => "invalid_issuer",
            AuthError::InvalidAudience => "invalid_audience",
            AuthError::InvalidClaims(_) => "invalid_claims",
            AuthError::KeySetUnavailable(_) => "key_set_unavailable",
        }
    }

    /// The client-facing error for this failure.
    pub fn to_proxy_error(&self) -> ProxyError {
        match self {
            AuthError::KeySetUnavailable(_) => {
                ProxyError::UpstreamUnreachable("signing keys unavailable".to_string())
            }
            _ => ProxyError::unauthorized(),
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingAuthHeader => write!(f, "Authorization header is required"),
            AuthError::InvalidAuthHeader => {
                write!(f, "Invalid authorization header format (expected 'Bearer <token>')")
            }
            AuthError::MalformedToken => write!(f, "Token is malformed"),
            AuthError::UnsupportedAlgorithm(alg) => write!(f, "Token algorithm {alg} is not accepted"),
            AuthError::MissingKeyId => write!(f, "Token header has no key id"),
            AuthError::UnknownSigningKey(kid) => write!(f, "No signing key with id {kid}"),
            AuthError::InvalidSignature => write!(f, "Token signature is invalid"),
            AuthError::TokenExpired => write!(f, "Token has expired"),
            AuthError::TokenNotYetValid => write!(f, "Token is not yet valid"),
            AuthError::InvalidIssuer => write!(f, "Token issuer is invalid"),
            AuthError::InvalidAudience => write!(f, "Token audience is invalid"),
            AuthError::InvalidClaims(msg) => write!(f, "Token claims are invalid: {msg}"),
            AuthError::KeySetUnavailable(msg) => write!(f, "Signing keys unavailable: {msg}"),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            ErrorKind::ImmatureSignature => AuthError::TokenNotYetValid,
            ErrorKind::InvalidSignature => AuthError::InvalidSignature,
            ErrorKind::InvalidIssuer => AuthError::InvalidIssuer,
            ErrorKind::InvalidAudience => AuthError::InvalidAudience,
            ErrorKind::InvalidAlgorithm => AuthError::UnsupportedAlgorithm("mismatch".to_string()),
            ErrorKind::MissingRequiredClaim(claim) => AuthError::InvalidClaims(format!("missing {claim}")),
            _ => AuthError::MalformedToken,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        self.to_proxy_error().into_response()
    }
}
