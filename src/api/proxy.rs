// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Catch-all handler for the proxied routes.
//!
//! Runs after the identity middleware, so the request already carries the
//! gateway-written `X-User-Payload` header and the verified claims.

use std::time::Instant;

use axum::{
    extract::{Request, State},
    response::Response,
};
use tracing::{error, info, warn};

use crate::auth::VerifiedClaims;
use crate::error::ProxyError;
use crate::gateway::{ForwardTarget, USER_PAYLOAD_HEADER};
use crate::state::AppState;

/// Resolve the backend for the request path and forward to it.
pub async fn proxy(State(state): State<AppState>, request: Request) -> Result<Response, ProxyError> {
    let started = Instant::now();
    let method = request.method().clone();
    let inbound_path = request.uri().path().to_string();

    let forwarded_path = state
        .forwarded_path(&inbound_path)
        .ok_or(ProxyError::NoMatchingRoute)?;
    let route = state.routes.resolve(forwarded_path).inspect_err(|_| {
        warn!(method = %method, path = %inbound_path, "No service for path");
    })?;

    // Set by the identity middleware; absent only if the route was mounted
    // without it.
    let identity = request
        .headers()
        .get(USER_PAYLOAD_HEADER)
        .cloned()
        .ok_or_else(ProxyError::unauthorized)?;
    let claims = request.extensions().get::<VerifiedClaims>().cloned();

    // Cancelled on shutdown, or when this future is dropped by a client
    // disconnect.
    let cancel = state.shutdown.child_token();
    let _cancel_on_drop = cancel.clone().drop_guard();
    let target = ForwardTarget {
        route,
        path: forwarded_path,
        identity: &identity,
        claims: claims.as_ref(),
    };

    match state.forwarder.forward(request, target, &cancel).await {
        Ok(response) => {
            info!(
                method = %method,
                path = %inbound_path,
                route = %route.name,
                status = response.status().as_u16(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Request forwarded"
            );
            Ok(response)
        }
        Err(e) => {
            error!(
                method = %method,
                path = %inbound_path,
                route = %route.name,
                kind = e.kind(),
                error = %e,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Forwarding failed"
            );
            Err(e)
        }
    }
}
