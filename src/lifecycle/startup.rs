//! Startup orchestration.
//!
//! # Responsibilities
//! - Check the on-disk site layout under the server root
//! - Load the inbound TLS certificate, or fall back to plain HTTP
//! - Turn the pull cache off when its directory is missing
//! - Bind listeners (traffic only when ready)
//!
//! # Design Decisions
//! - Missing `html/` or `error/` is fatal
//! - Certificate and cache problems degrade with a warning instead

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustls::ServerConfig as TlsServerConfig;
use thiserror::Error;
use tokio_rustls::TlsAcceptor;

use crate::config::GatewayConfig;
use crate::net::{load_server_config, ConnectionLimit, Listener, ListenerError};

/// Directories that must exist under the server root.
pub const REQUIRED_DIRS: [&str; 2] = ["html", "error"];

/// Inbound certificate chain, relative to the server root.
pub const CERT_FILE: &str = "ssl/server.crt";

/// Inbound private key, relative to the server root.
pub const KEY_FILE: &str = "ssl/server.key";

/// Fatal startup errors.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("required directory {} is missing", .0.display())]
    MissingDirectory(PathBuf),

    #[error(transparent)]
    Listener(#[from] ListenerError),
}

/// Configuration adjusted to what is actually on disk.
#[derive(Debug)]
pub struct Prepared {
    pub config: GatewayConfig,
    /// Inbound TLS configuration when HTTPS stays on.
    pub tls: Option<Arc<TlsServerConfig>>,
}

/// Bound listeners, ready to hand to the HTTP server.
pub struct Listeners {
    pub plain: Listener,
    pub secure: Option<(Listener, TlsAcceptor)>,
}

/// Check the site layout and settle HTTPS and pull-cache availability.
pub fn prepare(mut config: GatewayConfig) -> Result<Prepared, StartupError> {
    let root = PathBuf::from(&config.server.root);

    for dir in REQUIRED_DIRS {
        let path = root.join(dir);
        if !path.is_dir() {
            return Err(StartupError::MissingDirectory(path));
        }
    }

    let tls = if config.server.https {
        let tls = load_tls(&root);
        if tls.is_none() {
            config.server.https = false;
        }
        tls
    } else {
        None
    };

    if config.cache.enabled && !root.join("cache").is_dir() {
        tracing::warn!(
            path = %root.join("cache").display(),
            "Cache directory missing, pull cache disabled"
        );
        config.cache.enabled = false;
    }

    tracing::info!(
        root = %root.display(),
        https = config.server.https,
        cache = config.cache.enabled,
        "Site layout checked"
    );

    Ok(Prepared { config, tls })
}

fn load_tls(root: &Path) -> Option<Arc<TlsServerConfig>> {
    match load_server_config(&root.join(CERT_FILE), &root.join(KEY_FILE)) {
        Ok(tls) => Some(tls),
        Err(e) => {
            tracing::warn!(error = %e, "Unable to load TLS certificate, HTTPS disabled");
            None
        }
    }
}

/// Bind the plain listener, and the TLS listener when HTTPS is on.
pub async fn bind_listeners(
    config: &GatewayConfig,
    tls: Option<Arc<TlsServerConfig>>,
) -> Result<Listeners, StartupError> {
    let limit = ConnectionLimit::new(config.server.max_connections);
    let plain = Listener::bind(&config.server.http_address, limit.clone()).await?;

    let secure = match tls {
        Some(tls) if config.server.https => {
            let listener = Listener::bind(&config.server.https_address, limit).await?;
            Some((listener, TlsAcceptor::from(tls)))
        }
        _ => None,
    };

    Ok(Listeners { plain, secure })
}
