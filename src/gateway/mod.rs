// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Gateway Module
//!
//! Path routing and request forwarding to the backend services.
//!
//! ## Request Flow
//!
//! 1. The identity middleware verifies the bearer token and sets `X-User-Payload`
//! 2. [`RouteTable::resolve`] picks the backend from the leading path segment
//! 3. [`Forwarder::forward`] replays the request against the backend and
//!    streams the response back
//!
//! ## Routing
//!
//! | Prefix | Backend |
//! |--------|---------|
//! | `messages`, `chats`, `users` | chat service |
//! | `media` | media service |
//! | `notifications` | notification service |
//!
//! Prefixes match whole segments only: `/messagesX` belongs to no one.

pub mod body;
pub mod forward;
pub mod headers;
pub mod routes;

pub use body::BodyMode;
pub use forward::{ForwardTarget, Forwarder, ForwarderSettings};
pub use headers::USER_PAYLOAD_HEADER;
pub use routes::{BackendRoute, RouteTable};
