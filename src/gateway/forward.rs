// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Request forwarding and response relay.
//!
//! Handles:
//! - Rebuilding the inbound request for the backend (method, path, query,
//!   filtered headers, identity header, body)
//! - Bounded wait for the backend's response headers
//! - Cancellation when the inbound request goes away
//! - Streaming the backend response back without stale encoding headers
//!
//! Redirects are never followed; the backend's 3xx is relayed as-is.

use std::time::Duration;

use axum::{
    body::Body,
    extract::Request,
    http::HeaderValue,
    response::Response,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use super::body::{content_type, prepare_body, read_body};
use super::headers::{outbound_request_headers, relay_response_headers};
use super::routes::BackendRoute;
use crate::auth::VerifiedClaims;
use crate::error::ProxyError;

/// Default time allowed for the backend to send response headers.
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

/// Default maximum forwarded request body (25 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 25 * 1024 * 1024;

/// Forwarding settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwarderSettings {
    /// Time allowed for the backend to answer
    pub timeout: Duration,
    /// Whether the gateway's client transparently decodes gzip responses
    pub decompress: bool,
    /// Largest accepted request body
    pub max_body_bytes: usize,
}

impl Default for ForwarderSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_UPSTREAM_TIMEOUT,
            decompress: true,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

/// Everything the forwarder needs besides the request itself.
pub struct ForwardTarget<'a> {
    /// Resolved backend
    pub route: &'a BackendRoute,
    /// Path to request on the backend, raw (still percent-encoded)
    pub path: &'a str,
    /// Serialized identity for `X-User-Payload`
    pub identity: &'a HeaderValue,
    /// Verified claims, for structured bodies
    pub claims: Option<&'a VerifiedClaims>,
}

/// HTTP client for forwarding requests to backends.
pub struct Forwarder {
    client: reqwest::Client,
    settings: ForwarderSettings,
}

impl Forwarder {
    pub fn new(settings: ForwarderSettings) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .gzip(settings.decompress)
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(Duration::from_secs(5).min(settings.timeout))
            .read_timeout(settings.timeout)
            .tcp_keepalive(Duration::from_secs(30))
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;

        Ok(Self { client, settings })
    }

    pub fn settings(&self) -> &ForwarderSettings {
        &self.settings
    }

    /// Forward `request` to `target` and relay the backend's response.
    ///
    /// Cancelling `cancel` aborts the upstream call.
    pub async fn forward(
        &self,
        request: Request,
        target: ForwardTarget<'_>,
        cancel: &CancellationToken,
    ) -> Result<Response, ProxyError> {
        let (parts, body) = request.into_parts();
        let url = upstream_url(target.route, target.path, parts.uri.query());

        let raw = read_body(&parts.headers, body, self.settings.max_body_bytes).await?;
        let body = prepare_body(
            &target.route.body_mode,
            content_type(&parts.headers),
            raw,
            target.claims,
        );
        let headers = outbound_request_headers(&parts.headers, target.identity, self.settings.decompress);

        debug!(
            route = %target.route.name,
            method = %parts.method,
            body_bytes = body.len(),
            "Forwarding request"
        );

        let send = self
            .client
            .request(parts.method, url)
            .headers(headers)
            .body(body)
            .send();

        let response = tokio::select! {
            _ = cancel.cancelled() => {
                return Err(ProxyError::UpstreamUnreachable("request cancelled".to_string()));
            }
            result = tokio::time::timeout(self.settings.timeout, send) => match result {
                Err(_) => {
                    error!(route = %target.route.name, timeout_secs = self.settings.timeout.as_secs(), "Upstream timed out");
                    return Err(ProxyError::UpstreamTimeout(format!(
                        "no response within {}s",
                        self.settings.timeout.as_secs()
                    )));
                }
                Ok(Err(e)) => {
                    error!(route = %target.route.name, error = %e, "Failed to forward request to service");
                    return Err(classify(e));
                }
                Ok(Ok(response)) => response,
            },
        };

        self.relay(response)
    }

    /// Convert the backend response into the client response.
    fn relay(&self, response: reqwest::Response) -> Result<Response, ProxyError> {
        let status = response.status();
        if status.is_informational() {
            return Err(ProxyError::MalformedUpstreamResponse(format!(
                "unexpected status {status}"
            )));
        }

        let headers = relay_response_headers(response.headers(), self.settings.decompress);
        let mut relayed = Response::new(Body::from_stream(response.bytes_stream()));
        *relayed.status_mut() = status;
        *relayed.headers_mut() = headers;
        Ok(relayed)
    }
}

/// `http://{host}:{port}/{path}[?{query}]`, query kept verbatim.
pub fn upstream_url(route: &BackendRoute, path: &str, query: Option<&str>) -> String {
    let mut url = format!("{}/{}", route.base_url(), path.trim_start_matches('/'));
    if let Some(query) = query.filter(|q| !q.is_empty()) {
        url.push('?');
        url.push_str(query);
    }
    url
}

/// Map a send error to the client-facing error, without the backend URL.
fn classify(e: reqwest::Error) -> ProxyError {
    let timed_out = e.is_timeout();
    let detail = describe(&e.without_url());
    if timed_out {
        ProxyError::UpstreamTimeout(detail)
    } else {
        ProxyError::UpstreamUnreachable(detail)
    }
}

fn describe(e: &reqwest::Error) -> String {
    if e.is_connect() {
        "connection failed".to_string()
    } else if e.is_timeout() {
        "operation timed out".to_string()
    } else {
        e.to_string()
    }
}
