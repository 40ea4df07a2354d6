// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Shared fixtures for the gateway integration tests: a mock JWKS endpoint
//! and a router wired to mock backends. Signing keys live in `keys.rs`.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use chat_gateway::api::router;
use chat_gateway::auth::{SigningKeyCache, TokenVerifier};
use chat_gateway::config::CorsOrigins;
use chat_gateway::gateway::{BackendRoute, Forwarder, ForwarderSettings, RouteTable};
use chat_gateway::state::AppState;

mod keys;
pub use keys::*;

pub const JWKS_PATH: &str = "/.well-known/jwks.json";

pub fn jwks_body(keys: &[&TestKey]) -> Value {
    json!({ "keys": keys.iter().map(|k| jwk_json(k)).collect::<Vec<_>>() })
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

/// Mock identity provider publishing `keys` at [`JWKS_PATH`].
pub async fn jwks_server(keys: &[&TestKey]) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(jwks_body(keys)))
        .mount(&server)
        .await;
    server
}

/// Route `prefixes` to `backend`.
pub fn route_to(name: &str, prefixes: &[&str], backend: &MockServer) -> BackendRoute {
    let addr = backend.address();
    BackendRoute::new(name, prefixes.iter().copied(), addr.ip().to_string(), addr.port())
}

/// Gateway settings for a test.
pub struct TestGateway {
    pub routes: Vec<BackendRoute>,
    pub forwarder: ForwarderSettings,
    pub min_refresh_interval: Duration,
    pub mount_path: String,
}

impl TestGateway {
    pub fn new(routes: Vec<BackendRoute>) -> Self {
        Self {
            routes,
            forwarder: ForwarderSettings::default(),
            min_refresh_interval: Duration::ZERO,
            mount_path: "/api".to_string(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.forwarder.timeout = timeout;
        self
    }

    pub fn with_max_body_bytes(mut self, limit: usize) -> Self {
        self.forwarder.max_body_bytes = limit;
        self
    }

    pub fn build(self, jwks: &MockServer) -> Router {
        let keys = Arc::new(
            SigningKeyCache::new(format!("{}{JWKS_PATH}", jwks.uri()))
                .unwrap()
                .with_min_refresh_interval(self.min_refresh_interval),
        );
        let verifier = TokenVerifier::new(keys.clone(), ISSUER, AUDIENCE);
        let state = AppState::new(
            keys,
            verifier,
            RouteTable::new(self.routes),
            Forwarder::new(self.forwarder).unwrap(),
            self.mount_path,
            CancellationToken::new(),
        );
        router(state, &CorsOrigins::Any)
    }
}
