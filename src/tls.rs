// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! TLS termination for the gateway listener.
//!
//! The ring crypto provider must be installed before [`load_rustls_config`]
//! is called.

use std::path::PathBuf;

use axum_server::tls_rustls::RustlsConfig;

use crate::config::TlsSettings;

#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("failed to load TLS certificate {} or key {}: {source}", cert.display(), key.display())]
    Load {
        cert: PathBuf,
        key: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Install the ring provider as the process default.
///
/// Returns false if another provider was installed first.
pub fn install_crypto_provider() -> bool {
    rustls::crypto::ring::default_provider().install_default().is_ok()
}

/// Build the server TLS config from PEM certificate chain and key files.
pub async fn load_rustls_config(settings: &TlsSettings) -> Result<RustlsConfig, TlsError> {
    RustlsConfig::from_pem_file(&settings.cert_path, &settings.key_path)
        .await
        .map_err(|source| TlsError::Load {
            cert: settings.cert_path.clone(),
            key: settings.key_path.clone(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_files_are_reported() {
        install_crypto_provider();
        let settings = TlsSettings {
            cert_path: "/nonexistent/gateway.pem".into(),
            key_path: "/nonexistent/gateway.key".into(),
        };

        let err = load_rustls_config(&settings).await.unwrap_err();
        assert!(err.to_string().contains("/nonexistent/gateway.pem"));
    }
}
