// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::HeaderName,
    middleware,
    routing::{get, on, MethodFilter},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::identity_middleware,
    config::CorsOrigins,
    error::ProxyError,
    state::AppState,
};

pub mod health;
pub mod proxy;

const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Methods accepted on the proxied routes.
const PROXIED_METHODS: MethodFilter = MethodFilter::GET
    .or(MethodFilter::POST)
    .or(MethodFilter::PUT)
    .or(MethodFilter::DELETE)
    .or(MethodFilter::PATCH)
    .or(MethodFilter::OPTIONS);

pub fn router(state: AppState, cors: &CorsOrigins) -> Router {
    let proxy_path = format!("{}/{{*path}}", state.mount_path);

    let proxied = Router::new()
        .route(&proxy_path, on(PROXIED_METHODS, proxy::proxy))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            identity_middleware,
        ));

    Router::new()
        .route("/healthz", get(health::healthz))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .merge(proxied)
        .fallback(not_found)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(REQUEST_ID_HEADER, MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::new(REQUEST_ID_HEADER))
                .layer(cors_layer(cors)),
        )
}

/// CORS policy: any origin without credentials, or the listed origins with
/// credentials.
pub fn cors_layer(origins: &CorsOrigins) -> CorsLayer {
    match origins {
        CorsOrigins::Any => CorsLayer::permissive(),
        CorsOrigins::List(origins) => CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins.iter().cloned()))
            .allow_methods(AllowMethods::mirror_request())
            .allow_headers(AllowHeaders::mirror_request())
            .allow_credentials(true),
    }
}

async fn not_found() -> ProxyError {
    ProxyError::NoMatchingRoute
}

#[derive(OpenApi)]
#[openapi(
    paths(health::healthz, health::liveness, health::readiness),
    components(schemas(health::HealthResponse, health::ReadyResponse, health::HealthChecks)),
    tags(
        (name = "Health", description = "Gateway health probes")
    )
)]
struct ApiDoc;
