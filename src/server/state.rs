//! Shared handler state

use tokio::sync::RwLock;

use crate::error::Result;
use crate::gate::IdentityGate;
use crate::session::SessionContext;

use super::ServerConfig;

/// State shared across handlers. The server drives one analysis session at a
/// time, mirroring the single-user dashboard flow; the lock serializes
/// upload/train/classify steps against each other.
pub struct AppState {
    pub config: ServerConfig,
    pub gate: IdentityGate,
    pub session: RwLock<SessionContext>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Result<Self> {
        let gate = IdentityGate::new(config.webhook_url.clone())?;
        Ok(Self {
            config,
            gate,
            session: RwLock::new(SessionContext::new()),
        })
    }
}
