// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::auth::{SigningKeyCache, TokenVerifier};
use crate::gateway::{Forwarder, RouteTable};

/// Shared state for all handlers and middleware.
///
/// Everything here is built once at startup and read concurrently.
#[derive(Clone)]
pub struct AppState {
    pub verifier: Arc<TokenVerifier>,
    pub signing_keys: Arc<SigningKeyCache>,
    pub routes: Arc<RouteTable>,
    pub forwarder: Arc<Forwarder>,
    /// Prefix stripped from inbound paths before routing (e.g. `/api`)
    pub mount_path: String,
    /// Root token; cancelled when the server stops serving in-flight requests
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        signing_keys: Arc<SigningKeyCache>,
        verifier: TokenVerifier,
        routes: RouteTable,
        forwarder: Forwarder,
        mount_path: impl Into<String>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            verifier: Arc::new(verifier),
            signing_keys,
            routes: Arc::new(routes),
            forwarder: Arc::new(forwarder),
            mount_path: mount_path.into(),
            shutdown,
        }
    }

    /// Path to forward for an inbound request path: the mount prefix is
    /// removed and the remainder kept raw.
    ///
    /// Returns `None` for paths outside the mount and for paths with `.` or
    /// `..` segments, which the upstream URL would otherwise resolve away
    /// from the routed prefix.
    pub fn forwarded_path<'a>(&self, inbound: &'a str) -> Option<&'a str> {
        let rest = inbound.strip_prefix(self.mount_path.as_str())?;
        if !(rest.is_empty() || rest.starts_with('/')) {
            return None;
        }
        if rest.split('/').any(is_dot_segment) {
            return None;
        }
        Some(rest)
    }
}

/// `.` or `..`, including the percent-encoded `%2e` forms.
fn is_dot_segment(segment: &str) -> bool {
    if segment.is_empty() || segment.len() > 6 {
        return false;
    }
    let decoded = segment.to_ascii_lowercase().replace("%2e", ".");
    decoded == "." || decoded == ".."
}
