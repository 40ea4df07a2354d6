// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bearer token verification against the cached JWKS.
//!
//! Verification order:
//!
//! 1. Parse the unverified header; only RS256 with a `kid` is accepted
//! 2. Find the key by `kid`, refreshing the key set once on a miss
//! 3. Check the signature, then `iss`, `aud`, `exp`/`nbf` and `sub`
//!
//! Each step fails with its own [`AuthError`] variant so the cause can be
//! logged; the HTTP layer collapses them into one generic response.

use std::sync::Arc;

use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde_json::{Map, Value};

use super::jwks::SigningKeyCache;
use super::{AuthError, VerifiedClaims};

/// Clock skew tolerance (60 seconds).
pub const CLOCK_SKEW_LEEWAY: u64 = 60;

/// The only accepted signature algorithm.
const EXPECTED_ALGORITHM: Algorithm = Algorithm::RS256;

/// Verifies bearer tokens for one issuer and audience.
pub struct TokenVerifier {
    /// Signing key cache
    keys: Arc<SigningKeyCache>,
    /// Expected `iss`
    issuer: String,
    /// Expected `aud` (the identity provider's client id)
    audience: String,
    leeway: u64,
}

impl TokenVerifier {
    pub fn new(keys: Arc<SigningKeyCache>, issuer: impl Into<String>, audience: impl Into<String>) -> Self {
        Self {
            keys,
            issuer: issuer.into(),
            audience: audience.into(),
            leeway: CLOCK_SKEW_LEEWAY,
        }
    }

    /// Set the clock skew tolerance in seconds.
    pub fn with_leeway(mut self, leeway: u64) -> Self {
        self.leeway = leeway;
        self
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn audience(&self) -> &str {
        &self.audience
    }

    /// Verify `token` and return its claims.
    pub async fn verify(&self, token: &str) -> Result<VerifiedClaims, AuthError> {
        let header = decode_header(token).map_err(|_| AuthError::MalformedToken)?;
        if header.alg != EXPECTED_ALGORITHM {
            return Err(AuthError::UnsupportedAlgorithm(format!("{:?}", header.alg)));
        }
        let kid = header.kid.ok_or(AuthError::MissingKeyId)?;

        let key = self.signing_key(&kid).await?;
        let token_data = decode::<Map<String, Value>>(token, &key, &self.validation())?;

        VerifiedClaims::from_verified(token_data.claims)
            .ok_or_else(|| AuthError::InvalidClaims("sub must be a non-empty string".to_string()))
    }

    /// Key for `kid`, with exactly one forced refresh on a miss.
    async fn signing_key(&self, kid: &str) -> Result<DecodingKey, AuthError> {
        let keys = self
            .keys
            .keys()
            .await
            .map_err(|e| AuthError::KeySetUnavailable(e.to_string()))?;
        if let Some(key) = keys.get(kid) {
            return Ok(key.clone());
        }

        let refreshed = self
            .keys
            .refresh_after(keys.generation())
            .await
            .map_err(|e| AuthError::KeySetUnavailable(e.to_string()))?;
        refreshed
            .get(kid)
            .cloned()
            .ok_or_else(|| AuthError::UnknownSigningKey(kid.to_string()))
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(EXPECTED_ALGORITHM);
        validation.leeway = self.leeway;
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::testutil::{jwk_json, now, sign, valid_claims, AUDIENCE, ISSUER, KEY_A, KEY_B};
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn verifier_with(server: &MockServer, keys: &[serde_json::Value]) -> TokenVerifier {
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "keys": keys })))
            .mount(server)
            .await;
        verifier_for(server)
    }

    fn verifier_for(server: &MockServer) -> TokenVerifier {
        let cache = SigningKeyCache::new(format!("{}/.well-known/jwks.json", server.uri()))
            .unwrap()
            .with_min_refresh_interval(Duration::ZERO);
        TokenVerifier::new(Arc::new(cache), ISSUER, AUDIENCE)
    }

    fn encode_segment(value: &serde_json::Value) -> String {
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(value).unwrap())
    }

    #[tokio::test]
    async fn accepts_valid_token() {
        let server = MockServer::start().await;
        let verifier = verifier_with(&server, &[jwk_json(&KEY_A)]).await;

        let token = sign(&KEY_A, &valid_claims("user_123"));
        let claims = verifier.verify(&token).await.unwrap();

        assert_eq!(claims.subject(), "user_123");
        assert_eq!(claims.email(), Some("user_123@example.com"));
        assert_eq!(claims.get("token_use"), Some(&json!("id")));
    }

    #[tokio::test]
    async fn rejects_garbage() {
        let server = MockServer::start().await;
        let verifier = verifier_with(&server, &[jwk_json(&KEY_A)]).await;

        for token in ["", "abc", "a.b", "a.b.c", "not.a.jwt.at.all"] {
            assert_eq!(verifier.verify(token).await.unwrap_err(), AuthError::MalformedToken);
        }
    }

    #[tokio::test]
    async fn rejects_alg_none() {
        let server = MockServer::start().await;
        let verifier = verifier_with(&server, &[jwk_json(&KEY_A)]).await;

        let header = encode_segment(&json!({"alg": "none", "typ": "JWT", "kid": KEY_A.kid}));
        let payload = encode_segment(&valid_claims("attacker"));
        for token in [format!("{header}.{payload}."), format!("{header}.{payload}")] {
            assert!(verifier.verify(&token).await.is_err());
        }
    }

    #[tokio::test]
    async fn rejects_symmetric_algorithm_with_public_key_as_secret() {
        let server = MockServer::start().await;
        let verifier = verifier_with(&server, &[jwk_json(&KEY_A)]).await;

        let mut header = jsonwebtoken::Header::new(Algorithm::HS256);
        header.kid = Some(KEY_A.kid.to_string());
        let forged = jsonwebtoken::encode(
            &header,
            &valid_claims("attacker"),
            &jsonwebtoken::EncodingKey::from_secret(KEY_A.n.as_bytes()),
        )
        .unwrap();

        assert_eq!(
            verifier.verify(&forged).await.unwrap_err(),
            AuthError::UnsupportedAlgorithm("HS256".to_string())
        );
    }

    #[tokio::test]
    async fn rejects_tampered_payload() {
        let server = MockServer::start().await;
        let verifier = verifier_with(&server, &[jwk_json(&KEY_A)]).await;

        let token = sign(&KEY_A, &valid_claims("user_123"));
        let parts: Vec<&str> = token.split('.').collect();
        let tampered_payload = encode_segment(&valid_claims("admin"));
        let tampered = format!("{}.{}.{}", parts[0], tampered_payload, parts[2]);

        assert_eq!(verifier.verify(&tampered).await.unwrap_err(), AuthError::InvalidSignature);
    }

    #[tokio::test]
    async fn rejects_wrong_issuer_audience_and_expiry() {
        let server = MockServer::start().await;
        let verifier = verifier_with(&server, &[jwk_json(&KEY_A)]).await;

        let mut wrong_issuer = valid_claims("u");
        wrong_issuer["iss"] = json!("https://evil.example.com");
        assert_eq!(
            verifier.verify(&sign(&KEY_A, &wrong_issuer)).await.unwrap_err(),
            AuthError::InvalidIssuer
        );

        let mut wrong_audience = valid_claims("u");
        wrong_audience["aud"] = json!("another-client");
        assert_eq!(
            verifier.verify(&sign(&KEY_A, &wrong_audience)).await.unwrap_err(),
            AuthError::InvalidAudience
        );

        let mut expired = valid_claims("u");
        expired["exp"] = json!(now() - 3600);
        assert_eq!(
            verifier.verify(&sign(&KEY_A, &expired)).await.unwrap_err(),
            AuthError::TokenExpired
        );

        let mut immature = valid_claims("u");
        immature["nbf"] = json!(now() + 3600);
        assert_eq!(
            verifier.verify(&sign(&KEY_A, &immature)).await.unwrap_err(),
            AuthError::TokenNotYetValid
        );
    }

    #[tokio::test]
    async fn requires_subject_and_expiry() {
        let server = MockServer::start().await;
        let verifier = verifier_with(&server, &[jwk_json(&KEY_A)]).await;

        let mut no_sub = valid_claims("u");
        no_sub.as_object_mut().unwrap().remove("sub");
        assert!(matches!(
            verifier.verify(&sign(&KEY_A, &no_sub)).await.unwrap_err(),
            AuthError::InvalidClaims(_)
        ));

        let mut no_exp = valid_claims("u");
        no_exp.as_object_mut().unwrap().remove("exp");
        assert!(matches!(
            verifier.verify(&sign(&KEY_A, &no_exp)).await.unwrap_err(),
            AuthError::InvalidClaims(_)
        ));
    }

    #[tokio::test]
    async fn requires_key_id() {
        let server = MockServer::start().await;
        let verifier = verifier_with(&server, &[jwk_json(&KEY_A)]).await;

        let encoding_key = jsonwebtoken::EncodingKey::from_rsa_pem(KEY_A.private_pem.as_bytes()).unwrap();
        let token = jsonwebtoken::encode(
            &jsonwebtoken::Header::new(Algorithm::RS256),
            &valid_claims("u"),
            &encoding_key,
        )
        .unwrap();

        assert_eq!(verifier.verify(&token).await.unwrap_err(), AuthError::MissingKeyId);
    }

    #[tokio::test]
    async fn rotated_key_triggers_one_refetch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "keys": [jwk_json(&KEY_A)] })))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "keys": [jwk_json(&KEY_A), jwk_json(&KEY_B)] })),
            )
            .expect(1)
            .mount(&server)
            .await;
        let verifier = verifier_for(&server);

        verifier.verify(&sign(&KEY_A, &valid_claims("u1"))).await.unwrap();
        let claims = verifier.verify(&sign(&KEY_B, &valid_claims("u2"))).await.unwrap();
        assert_eq!(claims.subject(), "u2");
    }

    #[tokio::test]
    async fn unknown_key_fails_after_one_refetch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "keys": [jwk_json(&KEY_A)] })))
            .expect(2)
            .mount(&server)
            .await;
        let verifier = verifier_for(&server);

        let token = sign(&KEY_B, &valid_claims("u"));
        assert_eq!(
            verifier.verify(&token).await.unwrap_err(),
            AuthError::UnknownSigningKey(KEY_B.kid.to_string())
        );
    }

    #[tokio::test]
    async fn key_set_outage_is_reported_separately() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        let verifier = verifier_for(&server);

        let token = sign(&KEY_A, &valid_claims("u"));
        assert!(matches!(
            verifier.verify(&token).await.unwrap_err(),
            AuthError::KeySetUnavailable(_)
        ));
    }
}
