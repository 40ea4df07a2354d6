// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Bearer token authentication for the gateway.
//!
//! ## Auth Flow
//!
//! 1. Frontend authenticates the user with the identity provider (Cognito)
//! 2. Frontend sends `Authorization: Bearer <ID token>`
//! 3. Gateway:
//!    - Fetches the provider's JWKS and caches it with a TTL
//!    - Verifies RS256 signature, expiry, issuer, audience
//!    - Forwards the verified claims to the backend in `X-User-Payload`
//!
//! ## Security
//!
//! - All proxied endpoints require authentication; health checks do not
//! - Only RS256 is accepted; `none` and symmetric algorithms are rejected
//! - Clients cannot tell which check failed
//! - Clock skew tolerance is 60 seconds

pub mod claims;
pub mod error;
pub mod jwks;
pub mod middleware;
pub mod verifier;

#[cfg(test)]
#[path = "../../tests/common/keys.rs"]
pub(crate) mod testutil;

pub use claims::VerifiedClaims;
pub use error::AuthError;
pub use jwks::{KeySetError, SigningKeyCache, SigningKeySet};
pub use middleware::identity_middleware;
pub use verifier::TokenVerifier;
