//! Application state.

use std::sync::Arc;

use vrelay_storage::SourceStore;
use vrelay_worker::Orchestrator;

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub orchestrator: Orchestrator,
    /// Used directly for search; job fetches go through the orchestrator.
    pub storage: Arc<dyn SourceStore>,
}

impl AppState {
    pub fn new(config: ApiConfig, orchestrator: Orchestrator, storage: Arc<dyn SourceStore>) -> Self {
        Self {
            config,
            orchestrator,
            storage,
        }
    }
}
