//! Provider Health Manager (spec §4.8): probes each configured provider on an
//! interval and tracks a status derived from recent probe outcomes.

use crate::config::constants::{DEFAULT_HEALTH_CHECK_INTERVAL_SECS, HEALTH_PROBE_TIMEOUT_SECS};
use crate::config::types::{ConfigDocument, ProviderRuntime, ProviderStatus};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

const FAILURE_THRESHOLD: u64 = 3;
const DEGRADED_LATENCY_MS: u128 = 5_000;

/// Probes a single provider's `api_base_url`: HEAD first, falling back to OPTIONS
/// for providers whose reverse proxies reject HEAD.
pub async fn probe(client: &reqwest::Client, base_url: &str) -> Result<Duration, String> {
    let timeout = Duration::from_secs(HEALTH_PROBE_TIMEOUT_SECS);
    let started = std::time::Instant::now();

    let head_result = client.head(base_url).timeout(timeout).send().await;
    if let Ok(resp) = &head_result {
        if !resp.status().is_server_error() {
            return Ok(started.elapsed());
        }
    }

    match client
        .request(reqwest::Method::OPTIONS, base_url)
        .timeout(timeout)
        .send()
        .await
    {
        Ok(resp) if !resp.status().is_server_error() => Ok(started.elapsed()),
        Ok(resp) => Err(format!("provider responded with {}", resp.status())),
        Err(err) => Err(err.to_string()),
    }
}

fn next_status(current: ProviderRuntime, probe: Result<Duration, String>) -> ProviderRuntime {
    match probe {
        Ok(elapsed) => ProviderRuntime {
            status: if elapsed.as_millis() > DEGRADED_LATENCY_MS {
                ProviderStatus::Degraded
            } else {
                ProviderStatus::Active
            },
            last_health_check: Some(chrono::Utc::now()),
            response_time_ms: Some(elapsed.as_millis() as u64),
            error_count: 0,
            last_error: None,
        },
        Err(err) => {
            let error_count = current.error_count + 1;
            ProviderRuntime {
                status: if error_count >= FAILURE_THRESHOLD {
                    ProviderStatus::Failed
                } else {
                    ProviderStatus::Degraded
                },
                last_health_check: Some(chrono::Utc::now()),
                response_time_ms: None,
                error_count,
                last_error: Some(err),
            }
        }
    }
}

/// What changed in a call to `HealthTable::sync_providers`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderSyncReport {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

/// Shared, lock-guarded table of per-provider runtime health state.
#[derive(Clone, Default)]
pub struct HealthTable {
    inner: Arc<RwLock<HashMap<String, ProviderRuntime>>>,
}

impl HealthTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self) -> HashMap<String, ProviderRuntime> {
        self.inner.read().await.clone()
    }

    pub async fn status_of(&self, provider_name: &str) -> ProviderStatus {
        self.inner
            .read()
            .await
            .get(provider_name)
            .map(|r| r.status)
            .unwrap_or(ProviderStatus::Inactive)
    }

    /// Probe every provider in `config` once, updating the table in place.
    pub async fn probe_all(&self, client: &reqwest::Client, config: &ConfigDocument) {
        for provider in &config.providers {
            let result = probe(client, &provider.api_base_url).await;
            let mut table = self.inner.write().await;
            let current = table.remove(&provider.name).unwrap_or_default();
            table.insert(provider.name.clone(), next_status(current, result));
        }
    }

    /// Drop runtime entries for providers no longer present in `config`, seed
    /// entries for newly added ones, and report what changed — called after every
    /// config update (spec §4.8 `updateProviders`).
    pub async fn sync_providers(&self, config: &ConfigDocument) -> ProviderSyncReport {
        let known: std::collections::HashSet<&str> =
            config.providers.iter().map(|p| p.name.as_str()).collect();
        let mut table = self.inner.write().await;

        let removed: Vec<String> = table
            .keys()
            .filter(|name| !known.contains(name.as_str()))
            .cloned()
            .collect();
        table.retain(|name, _| known.contains(name.as_str()));

        let mut added = Vec::new();
        for provider in &config.providers {
            if !table.contains_key(&provider.name) {
                added.push(provider.name.clone());
            }
            table.entry(provider.name.clone()).or_default();
        }

        ProviderSyncReport { added, removed }
    }

    /// Immediately probe every provider named in `report.added`, rather than
    /// waiting for the next scheduled tick (spec §4.8: "immediate probe on
    /// provider addition").
    pub async fn probe_added(
        &self,
        client: &reqwest::Client,
        config: &ConfigDocument,
        report: &ProviderSyncReport,
    ) {
        for provider in config
            .providers
            .iter()
            .filter(|p| report.added.contains(&p.name))
        {
            let result = probe(client, &provider.api_base_url).await;
            let mut table = self.inner.write().await;
            let current = table.remove(&provider.name).unwrap_or_default();
            table.insert(provider.name.clone(), next_status(current, result));
        }
    }

    /// Spawn a loop that probes every provider in `config_source()` at a fixed
    /// interval until the returned handle is dropped or aborted.
    pub fn start_polling(
        self,
        client: reqwest::Client,
        config_source: impl Fn() -> ConfigDocument + Send + 'static,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_secs(DEFAULT_HEALTH_CHECK_INTERVAL_SECS));
            loop {
                interval.tick().await;
                let config = config_source();
                self.probe_all(&client, &config).await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::Provider;

    fn config_with_provider(url: &str) -> ConfigDocument {
        ConfigDocument {
            providers: vec![Provider {
                name: "p1".to_string(),
                api_base_url: url.to_string(),
                api_key: "key".to_string(),
                models: vec!["m1".to_string()],
                transformer: None,
            }],
            ..Default::default()
        }
    }

    #[test]
    fn next_status_promotes_to_active_on_success() {
        let current = ProviderRuntime::default();
        let updated = next_status(current, Ok(Duration::from_millis(50)));
        assert_eq!(updated.status, ProviderStatus::Active);
        assert_eq!(updated.error_count, 0);
    }

    #[test]
    fn next_status_marks_degraded_below_failure_threshold() {
        let current = ProviderRuntime {
            error_count: 1,
            ..Default::default()
        };
        let updated = next_status(current, Err("timeout".to_string()));
        assert_eq!(updated.status, ProviderStatus::Degraded);
        assert_eq!(updated.error_count, 2);
    }

    #[test]
    fn next_status_marks_degraded_on_slow_success() {
        let current = ProviderRuntime::default();
        let updated = next_status(current, Ok(Duration::from_millis(5_001)));
        assert_eq!(updated.status, ProviderStatus::Degraded);
        assert_eq!(updated.error_count, 0);
    }

    #[test]
    fn next_status_marks_failed_at_threshold() {
        let current = ProviderRuntime {
            error_count: FAILURE_THRESHOLD - 1,
            ..Default::default()
        };
        let updated = next_status(current, Err("connection refused".to_string()));
        assert_eq!(updated.status, ProviderStatus::Failed);
        assert_eq!(updated.error_count, FAILURE_THRESHOLD);
    }

    #[tokio::test]
    async fn sync_providers_drops_removed_and_seeds_new() {
        let table = HealthTable::new();
        let report = table
            .sync_providers(&config_with_provider("https://a.example.com"))
            .await;
        assert_eq!(report.added, vec!["p1".to_string()]);
        assert!(table.snapshot().await.contains_key("p1"));

        let empty_config = ConfigDocument::default();
        let report = table.sync_providers(&empty_config).await;
        assert_eq!(report.removed, vec!["p1".to_string()]);
        assert!(!table.snapshot().await.contains_key("p1"));
    }

    #[tokio::test]
    async fn probe_all_records_failure_for_unreachable_provider() {
        let table = HealthTable::new();
        let client = reqwest::Client::new();
        let config = config_with_provider("http://127.0.0.1:1");
        table.probe_all(&client, &config).await;
        let status = table.status_of("p1").await;
        assert_ne!(status, ProviderStatus::Active);
    }
}
