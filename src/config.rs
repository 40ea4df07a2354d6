// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names and default values used
//! throughout the gateway. Configuration is loaded from the environment once
//! at startup; any invalid value aborts startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `GATEWAY_MOUNT_PATH` | Path prefix of the proxied routes | `/api` |
//! | `COGNITO_ISSUER_URL` | Identity provider base URL | Required |
//! | `COGNITO_POOL_ID` | User pool id, appended to the issuer URL | Optional |
//! | `COGNITO_CLIENT_ID` | Expected `aud` claim | Required |
//! | `JWKS_URL` | Signing key endpoint | `{issuer}/.well-known/jwks.json` |
//! | `JWKS_CACHE_TTL_SECS` | Signing key cache lifetime | `3600` |
//! | `JWKS_MIN_REFRESH_INTERVAL_SECS` | Minimum gap between unknown-key refetches | `10` |
//! | `CHAT_SERVICE_HOST` / `_PORT` | Chat backend | Required |
//! | `MEDIA_SERVICE_HOST` / `_PORT` | Media backend | Required |
//! | `NOTIFICATION_SERVICE_HOST` / `_PORT` | Notification backend | Required |
//! | `<SERVICE>_CLAIMS_BODY_FIELD` | Inject claims into JSON bodies under this field | Unset |
//! | `UPSTREAM_TIMEOUT_SECS` | Time allowed for a backend to respond | `30` |
//! | `UPSTREAM_DECOMPRESS` | Decode gzip backend responses | `true` |
//! | `MAX_BODY_BYTES` | Largest forwarded request body | `26214400` |
//! | `CORS_ALLOW_ORIGINS` | `*` or comma-separated origins | `*` |
//! | `TLS_CERT_PATH` / `TLS_KEY_PATH` | PEM files for TLS termination | Unset (plain HTTP) |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::{net::SocketAddr, path::PathBuf, time::Duration};

use axum::http::HeaderValue;

use crate::auth::jwks::{DEFAULT_CACHE_TTL, DEFAULT_MIN_REFRESH_INTERVAL};
use crate::gateway::forward::{DEFAULT_MAX_BODY_BYTES, DEFAULT_UPSTREAM_TIMEOUT};
use crate::gateway::{BackendRoute, BodyMode, ForwarderSettings};
use crate::logging::LogFormat;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const MOUNT_PATH_ENV: &str = "GATEWAY_MOUNT_PATH";

/// Identity provider base URL, e.g. `https://cognito-idp.eu-west-1.amazonaws.com`.
pub const ISSUER_URL_ENV: &str = "COGNITO_ISSUER_URL";
/// When set, the issuer is `{COGNITO_ISSUER_URL}/{COGNITO_POOL_ID}`.
pub const POOL_ID_ENV: &str = "COGNITO_POOL_ID";
pub const CLIENT_ID_ENV: &str = "COGNITO_CLIENT_ID";
pub const JWKS_URL_ENV: &str = "JWKS_URL";
pub const JWKS_CACHE_TTL_ENV: &str = "JWKS_CACHE_TTL_SECS";
pub const JWKS_MIN_REFRESH_INTERVAL_ENV: &str = "JWKS_MIN_REFRESH_INTERVAL_SECS";

pub const UPSTREAM_TIMEOUT_ENV: &str = "UPSTREAM_TIMEOUT_SECS";
pub const UPSTREAM_DECOMPRESS_ENV: &str = "UPSTREAM_DECOMPRESS";
pub const MAX_BODY_BYTES_ENV: &str = "MAX_BODY_BYTES";

pub const CORS_ALLOW_ORIGINS_ENV: &str = "CORS_ALLOW_ORIGINS";
pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_MOUNT_PATH: &str = "/api";

/// A backend service and the path prefixes it owns, in match order.
struct ServiceDefinition {
    env_prefix: &'static str,
    name: &'static str,
    prefixes: &'static [&'static str],
}

const SERVICES: [ServiceDefinition; 3] = [
    ServiceDefinition {
        env_prefix: "CHAT_SERVICE",
        name: "chat",
        prefixes: &["messages", "chats", "users"],
    },
    ServiceDefinition {
        env_prefix: "MEDIA_SERVICE",
        name: "media",
        prefixes: &["media"],
    },
    ServiceDefinition {
        env_prefix: "NOTIFICATION_SERVICE",
        name: "notification",
        prefixes: &["notifications"],
    },
];

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(String),

    #[error("invalid value for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

impl ConfigError {
    fn invalid(var: &str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            var: var.to_string(),
            reason: reason.into(),
        }
    }
}

/// Token verification settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSettings {
    /// Expected `iss` claim
    pub issuer: String,
    /// Expected `aud` claim
    pub audience: String,
    pub jwks_url: String,
    pub cache_ttl: Duration,
    pub min_refresh_interval: Duration,
}

/// Allowed CORS origins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsOrigins {
    /// Any origin, without credentials
    Any,
    /// Listed origins, with credentials
    List(Vec<HeaderValue>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsSettings {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

/// Complete gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub bind_addr: SocketAddr,
    /// Normalized mount prefix: empty, or `/segment[/segment...]` without a
    /// trailing slash
    pub mount_path: String,
    pub auth: AuthSettings,
    pub routes: Vec<BackendRoute>,
    pub upstream: ForwarderSettings,
    pub cors: CorsOrigins,
    pub tls: Option<TlsSettings>,
    pub log_format: LogFormat,
}

impl GatewayConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from `lookup`. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let host = env.get(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = env.parse(PORT_ENV)?.unwrap_or(DEFAULT_PORT);
        let bind_addr = format!("{host}:{port}")
            .parse()
            .map_err(|_| ConfigError::invalid(HOST_ENV, format!("cannot bind to {host}:{port}")))?;

        let mount_path = normalize_mount_path(
            &env.get(MOUNT_PATH_ENV).unwrap_or_else(|| DEFAULT_MOUNT_PATH.to_string()),
        )?;

        let upstream = ForwarderSettings {
            timeout: env
                .parse(UPSTREAM_TIMEOUT_ENV)?
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_UPSTREAM_TIMEOUT),
            decompress: env.flag(UPSTREAM_DECOMPRESS_ENV)?.unwrap_or(true),
            max_body_bytes: env.parse(MAX_BODY_BYTES_ENV)?.unwrap_or(DEFAULT_MAX_BODY_BYTES),
        };
        if upstream.timeout.is_zero() {
            return Err(ConfigError::invalid(UPSTREAM_TIMEOUT_ENV, "must be positive"));
        }

        let tls = match (env.get(TLS_CERT_PATH_ENV), env.get(TLS_KEY_PATH_ENV)) {
            (Some(cert), Some(key)) => Some(TlsSettings {
                cert_path: cert.into(),
                key_path: key.into(),
            }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing(TLS_KEY_PATH_ENV.to_string())),
            (None, Some(_)) => return Err(ConfigError::Missing(TLS_CERT_PATH_ENV.to_string())),
        };

        let log_format = match env.get(LOG_FORMAT_ENV) {
            Some(value) => value
                .parse()
                .map_err(|reason: String| ConfigError::invalid(LOG_FORMAT_ENV, reason))?,
            None => LogFormat::default(),
        };

        Ok(Self {
            bind_addr,
            mount_path,
            auth: auth_settings(&env)?,
            routes: backend_routes(&env)?,
            upstream,
            cors: cors_origins(env.get(CORS_ALLOW_ORIGINS_ENV).as_deref())?,
            tls,
            log_format,
        })
    }
}

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, name: &str) -> Option<String> {
        (self.0)(name)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn require(&self, name: &str) -> Result<String, ConfigError> {
        self.get(name).ok_or_else(|| ConfigError::Missing(name.to_string()))
    }

    fn parse<T>(&self, name: &str) -> Result<Option<T>, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        self.get(name)
            .map(|value| value.parse().map_err(|e: T::Err| ConfigError::invalid(name, e.to_string())))
            .transpose()
    }

    fn flag(&self, name: &str) -> Result<Option<bool>, ConfigError> {
        self.get(name)
            .map(|value| match value.to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(true),
                "false" | "0" | "no" | "off" => Ok(false),
                _ => Err(ConfigError::invalid(name, format!("expected a boolean, got {value:?}"))),
            })
            .transpose()
    }
}

fn auth_settings<F>(env: &Env<F>) -> Result<AuthSettings, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let base = env.require(ISSUER_URL_ENV)?;
    let base = base.trim_end_matches('/');
    let issuer = match env.get(POOL_ID_ENV) {
        Some(pool_id) => format!("{base}/{}", pool_id.trim_matches('/')),
        None => base.to_string(),
    };
    validate_url(ISSUER_URL_ENV, &issuer)?;

    let jwks_url = env
        .get(JWKS_URL_ENV)
        .unwrap_or_else(|| format!("{issuer}/.well-known/jwks.json"));
    validate_url(JWKS_URL_ENV, &jwks_url)?;

    Ok(AuthSettings {
        issuer,
        audience: env.require(CLIENT_ID_ENV)?,
        jwks_url,
        cache_ttl: env
            .parse(JWKS_CACHE_TTL_ENV)?
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_CACHE_TTL),
        min_refresh_interval: env
            .parse(JWKS_MIN_REFRESH_INTERVAL_ENV)?
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_MIN_REFRESH_INTERVAL),
    })
}

fn backend_routes<F>(env: &Env<F>) -> Result<Vec<BackendRoute>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    SERVICES
        .iter()
        .map(|service| {
            let host_var = format!("{}_HOST", service.env_prefix);
            let port_var = format!("{}_PORT", service.env_prefix);
            let host = env.require(&host_var)?;
            let port: u16 = env
                .parse(&port_var)?
                .ok_or_else(|| ConfigError::Missing(port_var.clone()))?;

            let body_mode = match env.get(&format!("{}_CLAIMS_BODY_FIELD", service.env_prefix)) {
                Some(claims_field) => BodyMode::Structured { claims_field },
                None => BodyMode::Opaque,
            };

            Ok(BackendRoute::new(service.name, service.prefixes.iter().copied(), host, port)
                .with_body_mode(body_mode))
        })
        .collect()
}

fn cors_origins(value: Option<&str>) -> Result<CorsOrigins, ConfigError> {
    let Some(value) = value else {
        return Ok(CorsOrigins::Any);
    };
    let origins: Vec<&str> = value
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .collect();

    if origins.is_empty() || origins.contains(&"*") {
        return Ok(CorsOrigins::Any);
    }

    origins
        .into_iter()
        .map(|origin| {
            HeaderValue::from_str(origin.trim_end_matches('/'))
                .map_err(|_| ConfigError::invalid(CORS_ALLOW_ORIGINS_ENV, format!("bad origin {origin:?}")))
        })
        .collect::<Result<_, _>>()
        .map(CorsOrigins::List)
}

fn normalize_mount_path(value: &str) -> Result<String, ConfigError> {
    let trimmed = value.trim_matches('/');
    if trimmed.is_empty() {
        return Ok(String::new());
    }
    if trimmed.contains(['{', '}', '*', '?', '#']) || trimmed.split('/').any(str::is_empty) {
        return Err(ConfigError::invalid(MOUNT_PATH_ENV, format!("unsupported path {value:?}")));
    }
    Ok(format!("/{trimmed}"))
}

fn validate_url(var: &str, value: &str) -> Result<(), ConfigError> {
    let parsed = url::Url::parse(value).map_err(|e| ConfigError::invalid(var, e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(ConfigError::invalid(var, format!("unsupported scheme {scheme}"))),
    }
}
