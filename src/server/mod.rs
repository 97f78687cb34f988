//! HTTP server for the dashboard
//!
//! Serves the analysis flow over a small JSON API: log in through the email
//! gate, upload a Search Console export, train a model, read back the
//! quadrant report.

mod api;
mod error;
mod handlers;
mod state;

pub use api::create_router;
pub use error::ApiError;
pub use state::AppState;

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, warn};

fn env_or<T: std::str::FromStr>(key: &str, fallback: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(fallback)
}

/// Server configuration, read from `SERPLENS_*` environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Signup webhook for the identity gate; unset means logins are
    /// accepted locally after validation only
    pub webhook_url: Option<String>,
    pub max_upload_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: env_or("SERPLENS_HOST", "127.0.0.1".to_string()),
            port: env_or("SERPLENS_PORT", 8080),
            webhook_url: std::env::var("SERPLENS_WEBHOOK_URL")
                .ok()
                .filter(|url| !url.is_empty()),
            max_upload_size: env_or("SERPLENS_MAX_UPLOAD_MB", 50usize) * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    pub fn with_address(mut self, host: String, port: u16) -> Self {
        self.host = host;
        self.port = port;
        self
    }
}

/// Bind and serve until ctrl+c
pub async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    let started = chrono::Utc::now();

    if config.webhook_url.is_none() {
        warn!("no signup webhook configured, logins are accepted after validation only");
    }

    let state = Arc::new(AppState::new(config.clone())?);
    let router = create_router(state, &config);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        address = %addr,
        pid = std::process::id(),
        max_upload_mb = config.max_upload_size / 1024 / 1024,
        api = %format!("http://{}/api", addr),
        "dashboard server listening"
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_on_ctrl_c(started))
        .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_on_ctrl_c(started: chrono::DateTime<chrono::Utc>) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        // Without a working signal handler the server runs until killed
        warn!(%err, "ctrl+c handler unavailable");
        std::future::pending::<()>().await;
    }
    let uptime = chrono::Utc::now().signed_duration_since(started);
    info!(
        uptime_secs = uptime.num_seconds(),
        "shutdown signal received, draining connections"
    );
}
