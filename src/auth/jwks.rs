// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWKS (JSON Web Key Set) fetching and caching.
//!
//! ## Behavior
//!
//! - Keys are fetched on first use and cached for a configurable TTL
//! - The whole key set is swapped on refresh, never edited in place
//! - At most one fetch is in flight; concurrent callers wait for it and
//!   reuse its result
//! - A failed refresh keeps serving the previous set (stale but available)
//! - Forced refreshes (unknown `kid`) are rate-limited so random key ids
//!   cannot hammer the JWKS endpoint
//!
//! ## Usage
//!
//! Build one `SigningKeyCache` at startup and share it through `AppState`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use jsonwebtoken::jwk::{AlgorithmParameters, Jwk, KeyAlgorithm, PublicKeyUse};
use jsonwebtoken::DecodingKey;
use serde::Deserialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

/// Default JWKS cache TTL (1 hour).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Default minimum spacing between forced refreshes.
pub const DEFAULT_MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(10);

/// Timeout for a single JWKS fetch.
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, thiserror::Error)]
pub enum KeySetError {
    #[error("failed to build HTTP client: {0}")]
    Client(String),

    #[error("failed to fetch JWKS: {0}")]
    Fetch(String),

    #[error("HTTP {0} from JWKS endpoint")]
    Status(u16),

    #[error("invalid JWKS document: {0}")]
    Decode(String),
}

/// Raw JWKS document. Entries are parsed one by one so a single
/// unsupported key does not invalidate the whole set.
#[derive(Deserialize)]
struct JwksDocument {
    keys: Vec<serde_json::Value>,
}

/// Immutable set of RS256 verification keys indexed by key id.
pub struct SigningKeySet {
    keys: HashMap<String, DecodingKey>,
    generation: u64,
}

impl SigningKeySet {
    fn from_jwks(jwks: &[Jwk], generation: u64) -> Self {
        let mut keys = HashMap::new();
        for jwk in jwks {
            let Some(kid) = jwk.common.key_id.clone() else {
                warn!("Skipping JWKS entry without kid");
                continue;
            };
            match rsa_signing_key(jwk) {
                Ok(key) => {
                    keys.insert(kid, key);
                }
                Err(reason) => warn!(kid = %kid, reason, "Skipping JWKS entry"),
            }
        }
        Self { keys, generation }
    }

    /// Decoding key for `kid`.
    pub fn get(&self, kid: &str) -> Option<&DecodingKey> {
        self.keys.get(kid)
    }

    pub fn contains(&self, kid: &str) -> bool {
        self.keys.contains_key(kid)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Monotonic counter of successful fetches; identifies this set.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

fn rsa_signing_key(jwk: &Jwk) -> Result<DecodingKey, &'static str> {
    if matches!(&jwk.common.public_key_use, Some(u) if *u != PublicKeyUse::Signature) {
        return Err("key is not a signature key");
    }
    if matches!(jwk.common.key_algorithm, Some(alg) if alg != KeyAlgorithm::RS256) {
        return Err("key algorithm is not RS256");
    }
    match &jwk.algorithm {
        AlgorithmParameters::RSA(rsa) => {
            DecodingKey::from_rsa_components(&rsa.n, &rsa.e).map_err(|_| "invalid RSA components")
        }
        _ => Err("key type is not RSA"),
    }
}

struct CacheEntry {
    keys: Arc<SigningKeySet>,
    fetched_at: Instant,
}

#[derive(Default)]
struct CacheState {
    entry: Option<CacheEntry>,
    /// Start of the last fetch attempt, successful or not
    last_attempt: Option<Instant>,
    /// Number of completed fetch attempts
    attempts: u64,
    /// Error of the last attempt, cleared on success
    last_error: Option<KeySetError>,
    generation: u64,
}

/// Process-wide signing key cache.
pub struct SigningKeyCache {
    /// JWKS endpoint URL
    jwks_url: String,
    /// Cache TTL
    cache_ttl: Duration,
    /// Minimum spacing between fetches once a set is cached
    min_refresh_interval: Duration,
    /// Cached key set
    state: RwLock<CacheState>,
    /// Held for the duration of a fetch (single-flight)
    refresh_lock: Mutex<()>,
    /// HTTP client
    client: reqwest::Client,
}

impl SigningKeyCache {
    /// Create a new cache for `jwks_url`. Nothing is fetched yet.
    pub fn new(jwks_url: impl Into<String>) -> Result<Self, KeySetError> {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| KeySetError::Client(e.to_string()))?;

        Ok(Self {
            jwks_url: jwks_url.into(),
            cache_ttl: DEFAULT_CACHE_TTL,
            min_refresh_interval: DEFAULT_MIN_REFRESH_INTERVAL,
            state: RwLock::new(CacheState::default()),
            refresh_lock: Mutex::new(()),
            client,
        })
    }

    /// Create with custom cache TTL.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Create with a custom forced-refresh cooldown.
    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    /// Get the JWKS URL.
    pub fn jwks_url(&self) -> &str {
        &self.jwks_url
    }

    /// Current key set, fetching it if absent or expired.
    ///
    /// A failed fetch falls back to the previous set when there is one.
    pub async fn keys(&self) -> Result<Arc<SigningKeySet>, KeySetError> {
        if let Some(keys) = self.fresh_keys().await {
            return Ok(keys);
        }

        let seen_attempts = self.attempts().await;
        let _flight = self.refresh_lock.lock().await;

        // Another caller may have fetched while we waited.
        if let Some(outcome) = self.outcome_since(seen_attempts).await {
            return outcome;
        }
        if let Some(keys) = self.fresh_keys().await {
            return Ok(keys);
        }
        if let Some(keys) = self.cooling_down_keys().await {
            return Ok(keys);
        }

        self.fetch_and_install().await
    }

    /// Force a refresh because a key id was missing from the set with
    /// `seen_generation`.
    ///
    /// Callers that raced on the same miss share one fetch: whoever gets the
    /// lock second sees a newer generation and returns it directly.
    pub async fn refresh_after(&self, seen_generation: u64) -> Result<Arc<SigningKeySet>, KeySetError> {
        let seen_attempts = self.attempts().await;
        let _flight = self.refresh_lock.lock().await;

        if let Some(outcome) = self.outcome_since(seen_attempts).await {
            return outcome;
        }

        {
            let state = self.state.read().await;
            if let Some(entry) = &state.entry {
                if entry.keys.generation() != seen_generation {
                    return Ok(entry.keys.clone());
                }
            }
        }
        if let Some(keys) = self.cooling_down_keys().await {
            return Ok(keys);
        }

        self.fetch_and_install().await
    }

    /// Fetch at startup so the first request does not pay for it.
    /// Failures are logged, not returned.
    pub async fn warm(&self) -> bool {
        match self.keys().await {
            Ok(keys) => !keys.is_empty(),
            Err(e) => {
                warn!(jwks_url = %self.jwks_url, error = %e, "Failed to fetch JWKS at startup (will retry on first token)");
                false
            }
        }
    }

    /// Check if a key set is cached and within its TTL.
    pub async fn is_fresh(&self) -> bool {
        self.fresh_keys().await.is_some()
    }

    async fn fresh_keys(&self) -> Option<Arc<SigningKeySet>> {
        let state = self.state.read().await;
        state
            .entry
            .as_ref()
            .filter(|entry| entry.fetched_at.elapsed() < self.cache_ttl)
            .map(|entry| entry.keys.clone())
    }

    async fn attempts(&self) -> u64 {
        self.state.read().await.attempts
    }

    /// Result of the attempt that finished after `seen_attempts`, if any.
    /// A failed attempt still yields the cached set when there is one.
    async fn outcome_since(&self, seen_attempts: u64) -> Option<Result<Arc<SigningKeySet>, KeySetError>> {
        let state = self.state.read().await;
        if state.attempts == seen_attempts {
            return None;
        }
        match (&state.entry, &state.last_error) {
            (Some(entry), _) => Some(Ok(entry.keys.clone())),
            (None, Some(e)) => Some(Err(e.clone())),
            (None, None) => None,
        }
    }

    /// The cached set, if the last attempt was too recent to try again.
    async fn cooling_down_keys(&self) -> Option<Arc<SigningKeySet>> {
        let state = self.state.read().await;
        let entry = state.entry.as_ref()?;
        let recent = state
            .last_attempt
            .is_some_and(|at| at.elapsed() < self.min_refresh_interval);
        recent.then(|| entry.keys.clone())
    }

    /// Fetch and swap in a new set. Must be called with `refresh_lock` held.
    async fn fetch_and_install(&self) -> Result<Arc<SigningKeySet>, KeySetError> {
        let started = Instant::now();
        let fetched = self.fetch_jwks().await;

        let mut state = self.state.write().await;
        state.last_attempt = Some(started);
        state.attempts += 1;

        match fetched {
            Ok(jwks) => {
                state.last_error = None;
                state.generation += 1;
                let keys = Arc::new(SigningKeySet::from_jwks(&jwks, state.generation));
                info!(
                    jwks_url = %self.jwks_url,
                    kid_count = keys.len(),
                    generation = keys.generation(),
                    "JWKS cached"
                );
                state.entry = Some(CacheEntry {
                    keys: keys.clone(),
                    fetched_at: Instant::now(),
                });
                Ok(keys)
            }
            Err(e) => {
                state.last_error = Some(e.clone());
                match &state.entry {
                    Some(entry) => {
                        warn!(jwks_url = %self.jwks_url, error = %e, "JWKS refresh failed, serving cached keys");
                        Ok(entry.keys.clone())
                    }
                    None => Err(e),
                }
            }
        }
    }

    /// Fetch JWKS from the endpoint.
    async fn fetch_jwks(&self) -> Result<Vec<Jwk>, KeySetError> {
        let response = self
            .client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| KeySetError::Fetch(e.without_url().to_string()))?;

        if !response.status().is_success() {
            return Err(KeySetError::Status(response.status().as_u16()));
        }

        let document: JwksDocument = response
            .json()
            .await
            .map_err(|e| KeySetError::Decode(e.without_url().to_string()))?;

        Ok(document
            .keys
            .into_iter()
            .filter_map(|raw| match serde_json::from_value::<Jwk>(raw) {
                Ok(jwk) => Some(jwk),
                Err(e) => {
                    warn!(error = %e, "Skipping unparseable JWKS entry");
                    None
                }
            })
            .collect())
    }
}
