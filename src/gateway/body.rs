// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Request body handling for forwarded requests.
//!
//! Bodies are forwarded as raw bytes unless a route opts into structured
//! mode. Structured mode only touches bodies whose media type is exactly JSON
//! and whose top-level value is an object; anything else falls back to the
//! raw bytes, so multipart and binary uploads are never re-encoded.

use axum::{
    body::{to_bytes, Body, Bytes},
    http::{header::CONTENT_LENGTH, header::CONTENT_TYPE, HeaderMap, HeaderValue},
};

use http_body_util::LengthLimitError;

use crate::auth::VerifiedClaims;
use crate::error::ProxyError;

/// How a route's request bodies are forwarded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum BodyMode {
    /// Forward the exact inbound bytes.
    #[default]
    Opaque,
    /// Decode JSON object bodies and set the verified claims under
    /// `claims_field` before re-encoding.
    Structured { claims_field: String },
}

/// Read the inbound body, enforcing `limit`.
pub async fn read_body(headers: &HeaderMap, body: Body, limit: usize) -> Result<Bytes, ProxyError> {
    let declared = headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared.is_some_and(|len| len > limit) {
        return Err(ProxyError::PayloadTooLarge { limit });
    }

    to_bytes(body, limit).await.map_err(|e| {
        let over_limit = std::error::Error::source(&e).is_some_and(|source| source.is::<LengthLimitError>());
        if over_limit {
            ProxyError::PayloadTooLarge { limit }
        } else {
            ProxyError::BadRequest(format!("Failed to read request body: {e}"))
        }
    })
}

/// Produce the outbound body for `mode`.
pub fn prepare_body(
    mode: &BodyMode,
    content_type: Option<&HeaderValue>,
    raw: Bytes,
    claims: Option<&VerifiedClaims>,
) -> Bytes {
    let BodyMode::Structured { claims_field } = mode else {
        return raw;
    };
    let Some(claims) = claims else {
        return raw;
    };
    if raw.is_empty() || !is_json_media_type(content_type) {
        return raw;
    }

    let mut value: serde_json::Value = match serde_json::from_slice(&raw) {
        Ok(value) => value,
        Err(_) => return raw,
    };
    let Some(object) = value.as_object_mut() else {
        return raw;
    };
    object.insert(claims_field.clone(), claims.to_json());

    match serde_json::to_vec(&value) {
        Ok(encoded) => Bytes::from(encoded),
        Err(_) => raw,
    }
}

/// True for `application/json` and `application/<subtype>+json`, ignoring
/// parameters and case. Loose matches like `text/json-ish` are rejected.
pub fn is_json_media_type(content_type: Option<&HeaderValue>) -> bool {
    let Some(value) = content_type.and_then(|v| v.to_str().ok()) else {
        return false;
    };
    let essence = value
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    match essence.split_once('/') {
        Some(("application", "json")) => true,
        Some(("application", subtype)) => subtype.ends_with("+json") && subtype.len() > "+json".len(),
        _ => false,
    }
}

/// Content type of a header map, if any.
pub fn content_type(headers: &HeaderMap) -> Option<&HeaderValue> {
    headers.get(CONTENT_TYPE)
}
