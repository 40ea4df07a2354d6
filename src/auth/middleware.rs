// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Identity middleware for the proxied routes.
//!
//! The gateway is the only writer of `X-User-Payload`: any client-supplied
//! value is removed before authentication, and on success the header is set
//! to the verified claims. Failures short-circuit before routing, so no
//! backend is contacted for an unauthenticated request.
//!
//! ```rust,ignore
//! let proxied = Router::new()
//!     .route("/api/{*path}", any(proxy))
//!     .route_layer(axum::middleware::from_fn_with_state(
//!         state.clone(),
//!         identity_middleware,
//!     ));
//! ```

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, warn};

use super::AuthError;
use crate::gateway::headers::USER_PAYLOAD_HEADER;
use crate::state::AppState;

/// Authentication middleware function.
pub async fn identity_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    // Removes every value under the name, not just the first.
    if request.headers_mut().remove(USER_PAYLOAD_HEADER).is_some() {
        warn!(path = %request.uri().path(), "Dropped client-supplied identity header");
    }

    let token = match bearer_token(request.headers()) {
        Ok(token) => token.to_string(),
        Err(e) => return reject(&request, e),
    };

    let claims = match state.verifier.verify(&token).await {
        Ok(claims) => claims,
        Err(e) => return reject(&request, e),
    };

    let identity = match claims.to_header_value() {
        Ok(value) => value,
        Err(_) => {
            return reject(
                &request,
                AuthError::InvalidClaims("claims are not representable as a header".to_string()),
            )
        }
    };

    debug!(sub = %claims.subject(), "Request authenticated");
    request.headers_mut().insert(USER_PAYLOAD_HEADER, identity);
    request.extensions_mut().insert(claims);
    next.run(request).await
}

/// Extract the token from `Authorization: Bearer <token>`.
///
/// The scheme is matched case-insensitively.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingAuthHeader)?
        .to_str()
        .map_err(|_| AuthError::InvalidAuthHeader)?;

    let (scheme, token) = value.split_once(' ').ok_or(AuthError::InvalidAuthHeader)?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(AuthError::InvalidAuthHeader);
    }
    Ok(token)
}

fn reject(request: &Request, error: AuthError) -> Response {
    warn!(
        method = %request.method(),
        path = %request.uri().path(),
        error_code = error.error_code(),
        error = %error,
        "Authentication failed"
    );
    error.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn parses_bearer_token() {
        assert_eq!(bearer_token(&headers_with("Bearer abc.def.ghi")).unwrap(), "abc.def.ghi");
        assert_eq!(bearer_token(&headers_with("bearer abc")).unwrap(), "abc");
        assert_eq!(bearer_token(&headers_with("Bearer   abc  ")).unwrap(), "abc");
    }

    #[test]
    fn rejects_missing_or_malformed_header() {
        assert_eq!(bearer_token(&HeaderMap::new()).unwrap_err(), AuthError::MissingAuthHeader);
        for value in ["Basic dXNlcjpwYXNz", "Bearer", "Bearer ", "Token abc", "abc"] {
            assert_eq!(
                bearer_token(&headers_with(value)).unwrap_err(),
                AuthError::InvalidAuthHeader,
                "{value}"
            );
        }
    }
}
