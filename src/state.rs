//! Application state shared by the HTTP handlers.

use std::sync::Arc;

use crate::client::Client;
use crate::config::Config;

/// State passed to all handlers
#[derive(Debug, Clone)]
pub struct AppState {
    /// Configuration
    pub config: Config,
    /// Client sharing one token session across requests
    pub client: Client,
}

impl AppState {
    pub fn new(config: Config, client: Client) -> Self {
        Self { config, client }
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}
