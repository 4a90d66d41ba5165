use std::env;

/// Default long-context token threshold applied when `Router.longContextThreshold` is absent.
pub const DEFAULT_LONG_CONTEXT_THRESHOLD: u64 = 60_000;

/// Default bounded ring size for the Version Manager.
pub const DEFAULT_MAX_VERSIONS: usize = 10;

/// Debounce window for the File Watcher, per spec 4.2.
pub const DEFAULT_DEBOUNCE_MS: u64 = 500;

/// Write-settle window the File Watcher waits before hashing a changed file.
pub const WRITE_SETTLE_MS: u64 = 100;

/// Health probe timeout (spec 4.8).
pub const HEALTH_PROBE_TIMEOUT_SECS: u64 = 10;

/// Default interval between scheduled health probes.
pub const DEFAULT_HEALTH_CHECK_INTERVAL_SECS: u64 = 300;

/// Validator connectivity-check timeout (spec 5).
pub const VALIDATOR_PROBE_TIMEOUT_SECS: u64 = 5;

/// Aggregate timeout for a full validation pass (spec 5).
pub const VALIDATION_AGGREGATE_TIMEOUT_SECS: u64 = 30;

/// Literal marker for the subagent routing override (spec 4.7).
pub const SUBAGENT_MARKER_OPEN: &str = "<CCR-SUBAGENT-MODEL>";
pub const SUBAGENT_MARKER_CLOSE: &str = "</CCR-SUBAGENT-MODEL>";

/// Default background-task model marker (spec 4.7); operator-configurable.
pub const DEFAULT_BACKGROUND_MARKER: &str = "claude-3-5-haiku";

pub fn default_config_path() -> std::path::PathBuf {
    if let Ok(explicit) = env::var("CCR_CONFIG_FILE") {
        return std::path::PathBuf::from(explicit);
    }
    let home = dirs::home_dir().unwrap_or_else(|| std::path::PathBuf::from("."));
    home.join(".claude-code-router").join("config.yaml")
}

pub fn default_host() -> String {
    "127.0.0.1".to_string()
}

pub fn default_port() -> u16 {
    7601
}
