//! Shared application state

use std::sync::Arc;

use portrait::FetchOptions;
use tokio::sync::Semaphore;

use crate::config::ServerConfig;

/// Cheap-to-clone state handed to every handler. Holds configuration only;
/// each request builds its own buffers and temp directory.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub fetch: Arc<FetchOptions>,
    /// One permit per encode allowed to run at once.
    pub encode_slots: Arc<Semaphore>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        let fetch = config.fetch_options();
        let slots = config.max_jobs.max(1);
        Self {
            config: Arc::new(config),
            fetch: Arc::new(fetch),
            encode_slots: Arc::new(Semaphore::new(slots)),
        }
    }
}
