// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Chat API Gateway - Authenticating Reverse Proxy
//!
//! Single public entry point for the chat platform: verifies Cognito-issued
//! bearer tokens, routes each request to the backend owning its path prefix
//! and tells the backend who the caller is via `X-User-Payload`.
//!
//! ## Modules
//!
//! - `api` - HTTP surface (Axum): health probes, docs, proxied routes
//! - `auth` - Signing key cache, token verification, identity middleware
//! - `gateway` - Path routing and request forwarding
//! - `config` - Environment configuration

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod state;
pub mod tls;
