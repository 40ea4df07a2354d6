// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Static path-prefix routing to backend services.
//!
//! The route table is built once from configuration and never mutated.
//! Matching is done on the leading path segment only, so `/chats`,
//! `/chats/` and `/chats/42` all resolve to the route owning `chats`, while
//! `/chatsroom` does not.

use std::fmt;

use crate::error::ProxyError;

use super::body::BodyMode;

/// A backend service reachable by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendRoute {
    /// Service name, used in logs only
    pub name: String,
    /// Leading path segments owned by this service (without slashes)
    pub prefixes: Vec<String>,
    /// Backend host
    pub host: String,
    /// Backend port
    pub port: u16,
    /// How request bodies are forwarded to this backend
    pub body_mode: BodyMode,
}

impl BackendRoute {
    pub fn new(
        name: impl Into<String>,
        prefixes: impl IntoIterator<Item = impl Into<String>>,
        host: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            name: name.into(),
            prefixes: prefixes
                .into_iter()
                .map(|p| {
                    let p: String = p.into();
                    p.trim_matches('/').to_string()
                })
                .collect(),
            host: host.into(),
            port,
            body_mode: BodyMode::Opaque,
        }
    }

    /// Set the body mode for this route.
    pub fn with_body_mode(mut self, body_mode: BodyMode) -> Self {
        self.body_mode = body_mode;
        self
    }

    /// Base URL of the backend, without a trailing slash.
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    fn owns(&self, segment: &str) -> bool {
        self.prefixes.iter().any(|p| p == segment)
    }
}

impl fmt::Display for BackendRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}:{})", self.name, self.host, self.port)
    }
}

/// Ordered, immutable set of backend routes.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<BackendRoute>,
}

impl RouteTable {
    pub fn new(routes: Vec<BackendRoute>) -> Self {
        Self { routes }
    }

    pub fn routes(&self) -> &[BackendRoute] {
        &self.routes
    }

    /// Resolve a forwarded path to its backend.
    ///
    /// First route in declaration order owning the leading segment wins.
    pub fn resolve(&self, path: &str) -> Result<&BackendRoute, ProxyError> {
        let segment = leading_segment(path);
        if segment.is_empty() {
            return Err(ProxyError::NoMatchingRoute);
        }

        self.routes
            .iter()
            .find(|route| route.owns(segment))
            .ok_or(ProxyError::NoMatchingRoute)
    }
}

/// First non-empty segment of a path: `/messages/5?x=1` -> `messages`.
fn leading_segment(path: &str) -> &str {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    path.trim_start_matches('/')
        .split('/')
        .next()
        .unwrap_or_default()
}
