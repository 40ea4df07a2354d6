// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Fixed RSA signing keys and token helpers, shared by the unit tests in
//! `src/auth` and the integration tests under `tests/`.

#![allow(dead_code)]

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};

pub const ISSUER: &str = "https://cognito-idp.eu-west-1.amazonaws.com/eu-west-1_gateway";
pub const AUDIENCE: &str = "gateway-client";

pub struct TestKey {
    pub kid: &'static str,
    pub private_pem: &'static str,
    pub n: &'static str,
}

pub const KEY_A: TestKey = TestKey {
    kid: "gateway-key-a",
    private_pem: include_str!("../fixtures/signing_key_a.pem"),
    n: include_str!("../fixtures/signing_key_a.n"),
};

pub const KEY_B: TestKey = TestKey {
    kid: "gateway-key-b",
    private_pem: include_str!("../fixtures/signing_key_b.pem"),
    n: include_str!("../fixtures/signing_key_b.n"),
};

/// Public JWK for `key`, as published by the identity provider.
pub fn jwk_json(key: &TestKey) -> Value {
    json!({
        "kty": "RSA",
        "kid": key.kid,
        "use": "sig",
        "alg": "RS256",
        "n": key.n.trim(),
        "e": "AQAB"
    })
}

/// Claims accepted by a verifier configured with `ISSUER` and `AUDIENCE`.
pub fn valid_claims(sub: &str) -> Value {
    let now = now();
    json!({
        "sub": sub,
        "email": format!("{sub}@example.com"),
        "iss": ISSUER,
        "aud": AUDIENCE,
        "iat": now,
        "exp": now + 3600,
        "token_use": "id"
    })
}

/// RS256 token signed by `key` with its kid in the header.
pub fn sign(key: &TestKey, claims: &Value) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(key.kid.to_string());
    let encoding_key = EncodingKey::from_rsa_pem(key.private_pem.as_bytes()).expect("valid test key");
    encode(&header, claims, &encoding_key).expect("token encodes")
}

pub fn now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("clock after epoch")
        .as_secs() as i64
}
