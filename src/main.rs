// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::{net::SocketAddr, process::ExitCode, sync::Arc, time::Duration};

use axum_server::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use chat_gateway::{
    api::router,
    auth::{SigningKeyCache, TokenVerifier},
    config::GatewayConfig,
    gateway::{Forwarder, RouteTable},
    logging,
    state::AppState,
    tls,
};

/// Time in-flight requests get to finish after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> ExitCode {
    let config = match GatewayConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            // Logging is configured from the same environment; fall back to
            // the default format to report the failure.
            let _ = logging::init(Default::default());
            error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = logging::init(config.log_format) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Gateway stopped with an error");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: GatewayConfig) -> Result<(), Box<dyn std::error::Error>> {
    // Install the ring crypto provider for rustls (must be done before any TLS operations)
    if !tls::install_crypto_provider() {
        warn!("A rustls crypto provider was already installed");
    }

    let signing_keys = Arc::new(
        SigningKeyCache::new(config.auth.jwks_url.clone())?
            .with_cache_ttl(config.auth.cache_ttl)
            .with_min_refresh_interval(config.auth.min_refresh_interval),
    );
    let verifier = TokenVerifier::new(
        signing_keys.clone(),
        config.auth.issuer.clone(),
        config.auth.audience.clone(),
    );

    if signing_keys.warm().await {
        info!(jwks_url = %signing_keys.jwks_url(), "Signing keys loaded");
    }

    for route in &config.routes {
        info!(route = %route, prefixes = ?route.prefixes, body_mode = ?route.body_mode, "Backend route");
    }

    let shutdown = CancellationToken::new();
    let state = AppState::new(
        signing_keys,
        verifier,
        RouteTable::new(config.routes.clone()),
        Forwarder::new(config.upstream.clone())?,
        config.mount_path.clone(),
        shutdown.clone(),
    );
    let app = router(state, &config.cors);

    let handle: Handle<SocketAddr> = Handle::new();
    tokio::spawn(shutdown_on_signal(handle.clone(), shutdown));

    let addr = config.bind_addr;
    match &config.tls {
        Some(settings) => {
            let tls_config = tls::load_rustls_config(settings).await?;
            info!(%addr, mount = %config.mount_path, "Gateway listening on https (docs at /docs)");
            axum_server::bind_rustls(addr, tls_config)
                .handle(handle)
                .serve(app.into_make_service())
                .await?;
        }
        None => {
            info!(%addr, mount = %config.mount_path, "Gateway listening on http (docs at /docs)");
            axum_server::bind(addr)
                .handle(handle)
                .serve(app.into_make_service())
                .await?;
        }
    }

    info!("Gateway stopped");
    Ok(())
}

/// Stop accepting connections on SIGINT/SIGTERM, then cancel whatever is
/// still in flight once the grace period is over.
async fn shutdown_on_signal(handle: Handle<SocketAddr>, shutdown: CancellationToken) {
    wait_for_signal().await;
    info!(grace_secs = SHUTDOWN_GRACE.as_secs(), "Shutdown signal received, draining connections");
    handle.graceful_shutdown(Some(SHUTDOWN_GRACE));

    tokio::time::sleep(SHUTDOWN_GRACE).await;
    shutdown.cancel();
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => info!("SIGTERM received"),
                    _ = tokio::signal::ctrl_c() => info!("SIGINT received"),
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to register SIGTERM handler, listening for SIGINT only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("Ctrl-C received");
    }
}
