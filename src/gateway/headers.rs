// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Header rewriting for forwarded requests and relayed responses.

use axum::http::{
    header::{
        ACCEPT_ENCODING, CONNECTION, CONTENT_ENCODING, CONTENT_LENGTH, HOST, PROXY_AUTHENTICATE,
        PROXY_AUTHORIZATION, TE, TRAILER, TRANSFER_ENCODING, UPGRADE,
    },
    HeaderMap, HeaderName, HeaderValue,
};

/// Identity header written by the gateway and trusted by every backend.
pub const USER_PAYLOAD_HEADER: HeaderName = HeaderName::from_static("x-user-payload");

const KEEP_ALIVE: HeaderName = HeaderName::from_static("keep-alive");

/// Connection-scoped headers (RFC 9110 section 7.6.1).
const HOP_BY_HOP: [HeaderName; 8] = [
    CONNECTION,
    KEEP_ALIVE,
    PROXY_AUTHENTICATE,
    PROXY_AUTHORIZATION,
    TE,
    TRAILER,
    TRANSFER_ENCODING,
    UPGRADE,
];

/// Encodings the gateway's HTTP client decodes transparently.
const DECODED_ENCODINGS: [&str; 2] = ["gzip", "x-gzip"];

/// Build the headers for the outbound request.
///
/// Drops `host`, `content-length` and hop-by-hop headers, drops
/// `accept-encoding` when the client negotiates compression itself, and sets
/// the identity header, replacing any value the client sent.
pub fn outbound_request_headers(
    inbound: &HeaderMap,
    identity: &HeaderValue,
    client_decompresses: bool,
) -> HeaderMap {
    let mut headers = inbound.clone();
    strip_hop_by_hop(&mut headers);
    headers.remove(HOST);
    headers.remove(CONTENT_LENGTH);
    if client_decompresses {
        headers.remove(ACCEPT_ENCODING);
    }

    headers.insert(USER_PAYLOAD_HEADER, identity.clone());
    headers
}

/// Build the headers relayed back to the client.
///
/// When the gateway's client decoded the body, the upstream
/// `content-encoding` and `content-length` no longer describe it.
pub fn relay_response_headers(upstream: &HeaderMap, client_decompresses: bool) -> HeaderMap {
    let mut headers = upstream.clone();
    strip_hop_by_hop(&mut headers);

    if client_decompresses && was_decoded(upstream) {
        headers.remove(CONTENT_ENCODING);
        headers.remove(CONTENT_LENGTH);
    }
    headers
}

fn was_decoded(upstream: &HeaderMap) -> bool {
    upstream.get_all(CONTENT_ENCODING).iter().any(|value| {
        value.to_str().is_ok_and(|v| {
            v.split(',')
                .any(|enc| DECODED_ENCODINGS.contains(&enc.trim().to_ascii_lowercase().as_str()))
        })
    })
}

/// Remove hop-by-hop headers, including any listed in `Connection`.
fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
}
