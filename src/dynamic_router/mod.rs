//! Dynamic Router (spec §4.9): the coordinator that owns the single update lock,
//! runs the validate → version → recompute → publish pipeline, and exposes a
//! lock-light snapshot to request handlers.
//!
//! Mirrors the update/snapshot split the teacher's `AppState` used (one write path
//! behind a lock, one read path via a separately-guarded current view), generalized
//! from a single config-hash check into the full pipeline the spec requires.

use crate::config::types::ConfigDocument;
use crate::config::validation::{validate, ValidationOptions, ValidationResult};
use crate::custom_router::{CustomRouter, CustomRouterSlot};
use crate::error::GatewayError;
use crate::events::{ConfigUpdatedEvent, EventBus, GroupSwitchedEvent, RollbackCompletedEvent, UpdateFailedEvent};
use crate::router_group;
use crate::version::{VersionManager, VersionSource};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex as StdMutex;
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayStatus {
    Uninitialized,
    Healthy,
    Degraded,
    Failed,
}

/// Everything a request handler needs to route a single request, published
/// atomically by the update pipeline (spec §4.9: "readers never block on writers").
pub struct ActiveSnapshot {
    pub config: ConfigDocument,
    pub checksum: String,
    pub version_id: String,
    pub ordinal: u64,
    pub effective_rules: crate::config::types::RouterRules,
    pub custom_router: Option<Arc<CustomRouter>>,
    pub status: GatewayStatus,
}

/// Outcome of a `rollbackOnFailure`-aware update attempt (spec §4.9 step 2 /
/// §6 `POST /config/hot-reload`).
pub struct UpdateResult {
    pub success: bool,
    pub version_id: Option<String>,
    pub validation: ValidationResult,
    pub rollback_performed: bool,
}

pub struct DynamicRouter {
    update_lock: Mutex<()>,
    snapshot: RwLock<Arc<ActiveSnapshot>>,
    versions: StdMutex<VersionManager>,
    custom_router_slot: StdMutex<CustomRouterSlot>,
    options: ValidationOptions,
    events: EventBus,
    rollback_on_failure: bool,
    /// Consecutive update failures, driving the component state machine (spec
    /// §4.9): `degraded` after >2, `failed` after >3, reset on any success.
    consecutive_errors: AtomicU32,
    /// Path the Config Store reads from and writes through. Updates sourced from
    /// the File Watcher are never written back here (the file already holds that
    /// exact content, and re-saving it would just re-trigger the watcher).
    config_path: std::path::PathBuf,
}

impl DynamicRouter {
    pub fn bootstrap(
        config: ConfigDocument,
        options: ValidationOptions,
        events: EventBus,
        config_path: std::path::PathBuf,
    ) -> Result<Arc<Self>, GatewayError> {
        Self::bootstrap_with(config, options, events, true, config_path)
    }

    /// Like [`bootstrap`](Self::bootstrap) but lets the caller opt out of
    /// `rollbackOnFailure` (spec §4.9, §9.1 resolution (b) default is on).
    pub fn bootstrap_with(
        config: ConfigDocument,
        options: ValidationOptions,
        events: EventBus,
        rollback_on_failure: bool,
        config_path: std::path::PathBuf,
    ) -> Result<Arc<Self>, GatewayError> {
        let result = validate(&config, options);
        if !result.is_valid {
            return Err(GatewayError::ConfigValidationFailed(format!(
                "{:?}",
                result.errors
            )));
        }

        let mut versions = VersionManager::new();
        let version = versions.add_version(config.clone(), VersionSource::Bootstrap, None);
        let version_id = version.id.clone();
        let config_checksum = version.checksum.clone();
        let ordinal = version.ordinal;

        let mut custom_router_slot = CustomRouterSlot::empty();
        let custom_router = load_custom_router(&config, &mut custom_router_slot);

        let snapshot = Arc::new(ActiveSnapshot {
            effective_rules: router_group::effective_rules(&config),
            checksum: config_checksum,
            version_id,
            ordinal,
            custom_router,
            config,
            status: GatewayStatus::Healthy,
        });

        Ok(Arc::new(Self {
            update_lock: Mutex::new(()),
            snapshot: RwLock::new(snapshot),
            versions: StdMutex::new(versions),
            custom_router_slot: StdMutex::new(custom_router_slot),
            options,
            events,
            rollback_on_failure,
            consecutive_errors: AtomicU32::new(0),
            config_path,
        }))
    }

    pub fn snapshot(&self) -> Arc<ActiveSnapshot> {
        self.snapshot.read().unwrap().clone()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    fn status_for_error_count(count: u32) -> GatewayStatus {
        if count > 3 {
            GatewayStatus::Failed
        } else if count > 2 {
            GatewayStatus::Degraded
        } else {
            GatewayStatus::Healthy
        }
    }

    /// Validate, version, recompute router-group/custom-router bindings, and publish.
    /// Rejected configs never reach the snapshot; the previous one stays live. Assumes
    /// the caller already holds `update_lock` — never call this directly from outside
    /// the coordinator's own methods.
    async fn do_apply(
        &self,
        new_config: ConfigDocument,
        source: VersionSource,
        description: Option<String>,
    ) -> Result<Arc<ActiveSnapshot>, GatewayError> {
        let result = validate(&new_config, self.options);
        if !result.is_valid {
            self.events.update_failed.send(UpdateFailedEvent {
                reason: format!("{:?}", result.errors),
            }).ok();
            let count = self.consecutive_errors.fetch_add(1, Ordering::SeqCst) + 1;
            warn!(status = ?Self::status_for_error_count(count), "config update rejected");
            return Err(GatewayError::ConfigValidationFailed(format!(
                "{:?}",
                result.errors
            )));
        }

        // Successful updates are durable (spec §4.9): write through the Config
        // Store so a later restart or rollback reads what was actually applied.
        // Skip it for File Watcher sourced updates — that config was just read
        // from this same path, and writing it back would only re-trigger the
        // watcher for no reason.
        if !matches!(source, VersionSource::FileWatcher) {
            crate::config::store::save(&self.config_path, &new_config)?;
        }

        let (version_id, config_checksum, ordinal) = {
            let mut versions = self.versions.lock().unwrap();
            let version = versions.add_version(new_config.clone(), source, description);
            (version.id.clone(), version.checksum.clone(), version.ordinal)
        };

        let custom_router = {
            let mut slot = self.custom_router_slot.lock().unwrap();
            load_custom_router(&new_config, &mut slot)
        };

        let snapshot = Arc::new(ActiveSnapshot {
            effective_rules: router_group::effective_rules(&new_config),
            checksum: config_checksum.clone(),
            version_id: version_id.clone(),
            ordinal,
            custom_router,
            config: new_config,
            status: GatewayStatus::Healthy,
        });

        *self.snapshot.write().unwrap() = snapshot.clone();
        self.consecutive_errors.store(0, Ordering::SeqCst);

        self.events.config_updated.send(ConfigUpdatedEvent {
            version_id,
            checksum: config_checksum,
        }).ok();

        info!("published new config snapshot");
        Ok(snapshot)
    }

    /// Roll back to a previously recorded version without re-acquiring the update
    /// lock — assumes the caller already holds it.
    async fn do_rollback(&self, version_id: &str) -> Result<Arc<ActiveSnapshot>, GatewayError> {
        let target_config = {
            let mut versions = self.versions.lock().unwrap();
            versions.rollback_to(version_id)?
        };

        let snapshot = self
            .do_apply(
                target_config,
                VersionSource::Rollback,
                Some(format!("rollback to {}", version_id)),
            )
            .await?;

        self.events.rollback_completed.send(RollbackCompletedEvent {
            version_id: version_id.to_string(),
        }).ok();

        Ok(snapshot)
    }

    /// Run the full update pipeline against `new_config` and publish on success.
    /// Rejected configs never reach the snapshot; the previous one stays live
    /// (spec §4.9, §8 rollback scenario).
    pub async fn apply_config(
        &self,
        new_config: ConfigDocument,
        source: VersionSource,
        description: Option<String>,
    ) -> Result<Arc<ActiveSnapshot>, GatewayError> {
        let _guard = self.update_lock.lock().await;
        self.do_apply(new_config, source, description).await
    }

    /// Roll back to a previously recorded version, re-running the same pipeline so a
    /// rollback target that is itself now invalid (e.g. a referenced provider was
    /// since removed some other way) is still rejected rather than blindly applied.
    pub async fn rollback(&self, version_id: &str) -> Result<Arc<ActiveSnapshot>, GatewayError> {
        let _guard = self.update_lock.lock().await;
        self.do_rollback(version_id).await
    }

    /// Apply `new_config` through the `rollbackOnFailure`-aware pipeline used by the
    /// Control API's hot-reload endpoint and the File Watcher (spec §4.9 step 2):
    /// on a critical validation failure, attempt an automatic rollback to the most
    /// recent non-active `rollbackSupported` version before reporting failure.
    pub async fn update(
        &self,
        new_config: ConfigDocument,
        source: VersionSource,
        description: Option<String>,
    ) -> UpdateResult {
        let _guard = self.update_lock.lock().await;

        let validation = validate(&new_config, self.options);
        if !validation.is_valid {
            self.events.update_failed.send(UpdateFailedEvent {
                reason: format!("{:?}", validation.errors),
            }).ok();
            self.consecutive_errors.fetch_add(1, Ordering::SeqCst);

            let rollback_performed = if self.rollback_on_failure {
                let candidate = self
                    .versions
                    .lock()
                    .unwrap()
                    .most_recent_non_active_rollback_candidate()
                    .map(|v| v.id.clone());
                match candidate {
                    Some(id) => self.do_rollback(&id).await.is_ok(),
                    None => false,
                }
            } else {
                false
            };

            return UpdateResult {
                success: false,
                version_id: None,
                validation,
                rollback_performed,
            };
        }

        match self.do_apply(new_config, source, description).await {
            Ok(snapshot) => UpdateResult {
                success: true,
                version_id: Some(snapshot.version_id.clone()),
                validation,
                rollback_performed: false,
            },
            Err(_) => UpdateResult {
                success: false,
                version_id: None,
                validation,
                rollback_performed: false,
            },
        }
    }

    /// Switch `Router.activeGroup` to `group_id` without otherwise touching the
    /// config, going through the same update pipeline so the switch is versioned.
    pub async fn switch_group(&self, group_id: &str) -> Result<Arc<ActiveSnapshot>, GatewayError> {
        let _guard = self.update_lock.lock().await;
        let mut new_config = self.snapshot().config.clone();
        router_group::switch_to_group(&new_config, group_id)?;
        new_config.router.active_group = Some(group_id.to_string());

        let snapshot = self
            .do_apply(
                new_config,
                VersionSource::ControlApi,
                Some(format!("switch to group {}", group_id)),
            )
            .await?;

        self.events.group_switched.send(GroupSwitchedEvent {
            group_id: group_id.to_string(),
        }).ok();

        Ok(snapshot)
    }

    pub fn status(&self) -> GatewayStatus {
        Self::status_for_error_count(self.consecutive_errors.load(Ordering::SeqCst))
    }

    pub fn version_manager_snapshot(&self) -> Vec<crate::version::ConfigVersion> {
        self.versions.lock().unwrap().versions().cloned().collect()
    }

    /// `(total recorded versions, ring capacity)`, for the Control API's status and
    /// version-list endpoints (spec §6 `metadata`).
    pub fn version_metadata(&self) -> (usize, usize) {
        let versions = self.versions.lock().unwrap();
        (versions.versions().count(), versions.max_versions())
    }

    pub fn version_diff(
        &self,
        from_id: &str,
        to_id: &str,
    ) -> Result<crate::version::ConfigDiff, crate::version::VersionError> {
        self.versions.lock().unwrap().diff(from_id, to_id)
    }
}

fn load_custom_router(
    config: &ConfigDocument,
    slot: &mut CustomRouterSlot,
) -> Option<Arc<CustomRouter>> {
    let path = config.custom_router_path.as_ref()?;
    match slot.reload(std::path::Path::new(path)) {
        Ok(router) => Some(router),
        Err(err) => {
            warn!(error = %err, "custom router reload failed, keeping prior binding");
            slot.get()
        }
    }
}
