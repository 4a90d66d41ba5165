//! Shared application state threaded through the Control API and proxy handlers.

use crate::config::constants::default_config_path;
use crate::config::validation::ValidationOptions;
use crate::dynamic_router::DynamicRouter;
use crate::events::EventBus;
use crate::health::HealthTable;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub router: Arc<DynamicRouter>,
    pub health: HealthTable,
    pub http_client: reqwest::Client,
    pub config_path: PathBuf,
    pub validation_options: ValidationOptions,
    /// Whether `/config/hot-reload` and the File Watcher are permitted to publish
    /// updates at all (spec §6 `GET /config/status` `hotReloadEnabled` field).
    pub hot_reload_enabled: bool,
}

impl AppState {
    pub fn new(
        router: Arc<DynamicRouter>,
        health: HealthTable,
        config_path: PathBuf,
        validation_options: ValidationOptions,
    ) -> Self {
        Self {
            router,
            health,
            http_client: reqwest::Client::new(),
            config_path,
            validation_options,
            hot_reload_enabled: true,
        }
    }

    pub fn events(&self) -> &EventBus {
        self.router.events()
    }
}

pub fn resolve_config_path(explicit: Option<PathBuf>) -> PathBuf {
    explicit.unwrap_or_else(default_config_path)
}
