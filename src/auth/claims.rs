// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Verified token claims.
//!
//! [`VerifiedClaims`] is the only identity artifact the gateway hands to
//! backends. It can only be built by the token verifier after signature,
//! issuer, audience and expiry checks have all passed.

use std::fmt::Write as _;

use axum::http::{header::InvalidHeaderValue, HeaderValue};
use serde_json::{Map, Value};

/// Claims of a fully verified bearer token.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedClaims {
    claims: Map<String, Value>,
}

impl VerifiedClaims {
    /// Wrap decoded claims. Returns `None` when `sub` is missing or empty.
    pub(super) fn from_verified(claims: Map<String, Value>) -> Option<Self> {
        match claims.get("sub") {
            Some(Value::String(sub)) if !sub.is_empty() => Some(Self { claims }),
            _ => None,
        }
    }

    /// Subject (canonical user id).
    pub fn subject(&self) -> &str {
        self.claims
            .get("sub")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn email(&self) -> Option<&str> {
        self.claims.get("email").and_then(Value::as_str)
    }

    pub fn issuer(&self) -> Option<&str> {
        self.claims.get("iss").and_then(Value::as_str)
    }

    /// Token expiration (Unix timestamp).
    pub fn expires_at(&self) -> Option<i64> {
        self.claims.get("exp").and_then(Value::as_i64)
    }

    /// Any claim by name, including custom attributes.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.claims.get(name)
    }

    pub fn to_json(&self) -> Value {
        Value::Object(self.claims.clone())
    }

    /// Compact JSON for the identity header.
    ///
    /// Non-ASCII characters and DEL are escaped as `\uXXXX` so the value is
    /// always a legal header value and still valid JSON.
    pub fn to_header_value(&self) -> Result<HeaderValue, InvalidHeaderValue> {
        let compact = Value::Object(self.claims.clone()).to_string();
        HeaderValue::from_str(&escape_non_ascii(&compact))
    }

    #[cfg(test)]
    pub(crate) fn for_tests(value: Value) -> Self {
        match value {
            Value::Object(claims) => Self { claims },
            other => panic!("claims must be an object, got {other}"),
        }
    }
}

fn escape_non_ascii(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    for c in json.chars() {
        if c.is_ascii() && c != '\u{7f}' {
            out.push(c);
            continue;
        }
        let mut units = [0u16; 2];
        for unit in c.encode_utf16(&mut units) {
            let _ = write!(out, "\\u{unit:04x}");
        }
    }
    out
}
