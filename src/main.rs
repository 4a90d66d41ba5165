use ccr_gateway::config::constants::{default_config_path, default_host, default_port};
use ccr_gateway::config::validation::ValidationOptions;
use ccr_gateway::dynamic_router::DynamicRouter;
use ccr_gateway::events::EventBus;
use ccr_gateway::health::HealthTable;
use ccr_gateway::state::AppState;
use ccr_gateway::{api, config, version};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config_path = std::env::args()
        .nth(1)
        .map(std::path::PathBuf::from)
        .unwrap_or_else(default_config_path);

    info!(path = %config_path.display(), "loading configuration");
    let initial_config = config::store::load(&config_path)
        .map_err(|e| anyhow::anyhow!("failed to load configuration: {}", e))?;

    let validation_options = ValidationOptions::default();
    let events = EventBus::new();
    let router = DynamicRouter::bootstrap(
        initial_config.clone(),
        validation_options,
        events.clone(),
        config_path.clone(),
    )
    .map_err(|e| anyhow::anyhow!("initial configuration is invalid: {}", e))?;

    let health = HealthTable::new();
    health.sync_providers(&initial_config).await;
    let _health_poll_handle = health
        .clone()
        .start_polling(reqwest::Client::new(), {
            let router = router.clone();
            move || router.snapshot().config.clone()
        });
    spawn_health_resync(health.clone(), router.clone(), events);

    let mut watched_paths = vec![config_path.clone()];
    if let Some(custom_router_path) = initial_config.custom_router_path.clone() {
        watched_paths.push(std::path::PathBuf::from(custom_router_path));
    }
    spawn_watcher(router.clone(), config_path.clone(), watched_paths);

    let state = AppState::new(router.clone(), health, config_path, validation_options);

    let host = initial_config.host.clone().unwrap_or_else(default_host);
    let port = initial_config.port.unwrap_or_else(default_port);
    let app = api::create_router(state);

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", host, port)).await?;
    info!(host = %host, port = port, "control api listening");
    axum::serve(listener, app).await?;

    Ok(())
}

/// Keeps the Provider Health Manager's table in step with the published config:
/// on every `configUpdated` event, drop runtime entries for removed providers,
/// seed entries for newly added ones, and probe the new ones immediately rather
/// than waiting for the next scheduled tick (spec §4.8 `updateProviders`).
fn spawn_health_resync(health: HealthTable, router: Arc<DynamicRouter>, events: EventBus) {
    let mut updates = events.config_updated.subscribe();
    tokio::spawn(async move {
        let client = reqwest::Client::new();
        while updates.recv().await.is_ok() {
            let config = router.snapshot().config.clone();
            let report = health.sync_providers(&config).await;
            if !report.added.is_empty() || !report.removed.is_empty() {
                info!(added = ?report.added, removed = ?report.removed, "resynced provider health table");
            }
            health.probe_added(&client, &config, &report).await;
        }
    });
}

/// Wires the File Watcher's change events into the Dynamic Router's update
/// pipeline, deduping on content checksum so a touch with unchanged bytes is a
/// no-op (spec §4.2, §4.9). Watches both the config file and, when configured,
/// the custom router script; a change to either goes through the same
/// `rollbackOnFailure`-aware `update` pipeline used by the Control API.
fn spawn_watcher(router: Arc<DynamicRouter>, config_path: std::path::PathBuf, watched_paths: Vec<std::path::PathBuf>) {
    let (watcher, mut events) = match config::watcher::FileWatcher::watch(watched_paths) {
        Ok(pair) => pair,
        Err(err) => {
            tracing::warn!(error = %err, "failed to start file watcher, hot-reload disabled");
            return;
        }
    };
    std::mem::forget(watcher);

    tokio::spawn(async move {
        let mut last_seen = std::collections::HashMap::new();
        while let Some(event) = events.recv().await {
            let Some(checksum) = event.checksum.as_deref() else {
                tracing::warn!(error = ?event.error, path = %event.path.display(), "failed to read changed watched file");
                continue;
            };
            if !config::watcher::is_real_change(&mut last_seen, &event.path, checksum) {
                continue;
            }

            if event.path == config_path {
                let content = event.content.unwrap_or_default();
                match serde_yaml::from_str(&content) {
                    Ok(new_config) => {
                        let result = router
                            .update(new_config, version::VersionSource::FileWatcher, None)
                            .await;
                        if !result.success {
                            tracing::warn!(rollback_performed = result.rollback_performed, "rejected config reload from file watcher");
                        }
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "changed config file is not valid YAML, ignoring");
                    }
                }
            } else {
                // The custom router script changed; re-run the pipeline against the
                // unchanged config so `do_apply` picks up the new script binding.
                let current = router.snapshot().config.clone();
                let result = router.update(current, version::VersionSource::FileWatcher, None).await;
                if !result.success {
                    tracing::warn!("custom router script reload rejected by the update pipeline");
                }
            }
        }
    });
}
