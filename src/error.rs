// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Client-facing gateway errors.
//!
//! Every failure the gateway reports to a client goes through [`ProxyError`],
//! which owns the status code and renders `{"detail": "..."}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Generic message returned for every authentication failure.
pub const UNAUTHORIZED_DETAIL: &str = "Invalid or expired token.";

/// Message returned when no backend owns the requested path.
pub const NO_ROUTE_DETAIL: &str = "Service not found for this path.";

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("{0}")]
    Unauthorized(String),

    #[error("{}", NO_ROUTE_DETAIL)]
    NoMatchingRoute,

    #[error("Error contacting service: {0}")]
    UpstreamUnreachable(String),

    #[error("Error contacting service: {0}")]
    UpstreamTimeout(String),

    #[error("Invalid response from service: {0}")]
    MalformedUpstreamResponse(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("Request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },
}

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

impl ProxyError {
    /// The generic authentication failure.
    pub fn unauthorized() -> Self {
        ProxyError::Unauthorized(UNAUTHORIZED_DETAIL.to_string())
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ProxyError::NoMatchingRoute => StatusCode::NOT_FOUND,
            ProxyError::UpstreamUnreachable(_)
            | ProxyError::UpstreamTimeout(_)
            | ProxyError::MalformedUpstreamResponse(_) => StatusCode::BAD_GATEWAY,
            ProxyError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ProxyError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }

    /// Short machine-readable kind, used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::Unauthorized(_) => "unauthorized",
            ProxyError::NoMatchingRoute => "no_matching_route",
            ProxyError::UpstreamUnreachable(_) => "upstream_unreachable",
            ProxyError::UpstreamTimeout(_) => "upstream_timeout",
            ProxyError::MalformedUpstreamResponse(_) => "malformed_upstream_response",
            ProxyError::BadRequest(_) => "bad_request",
            ProxyError::PayloadTooLarge { .. } => "payload_too_large",
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(ErrorBody {
            detail: self.to_string(),
        });
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(ProxyError::unauthorized().status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ProxyError::NoMatchingRoute.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ProxyError::UpstreamUnreachable("x".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ProxyError::UpstreamTimeout("x".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ProxyError::MalformedUpstreamResponse("x".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ProxyError::BadRequest("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ProxyError::PayloadTooLarge { limit: 1 }.status_code(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
    }

    #[tokio::test]
    async fn no_route_renders_detail_body() {
        let response = ProxyError::NoMatchingRoute.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(body_bytes.to_vec()).unwrap();
        assert_eq!(body, r#"{"detail":"Service not found for this path."}"#);
    }

    #[tokio::test]
    async fn upstream_errors_are_prefixed() {
        let response = ProxyError::UpstreamTimeout("operation timed out".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();
        assert_eq!(body["detail"], "Error contacting service: operation timed out");
    }
}
