//! The Configuration Document (spec §3) and its runtime augmentations.

use crate::config::constants::DEFAULT_LONG_CONTEXT_THRESHOLD;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderStatus {
    Active,
    Degraded,
    Inactive,
    Failed,
}

impl Default for ProviderStatus {
    fn default() -> Self {
        ProviderStatus::Inactive
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Provider {
    pub name: String,
    pub api_base_url: String,
    pub api_key: String,
    #[serde(default)]
    pub models: Vec<String>,
    /// Opaque per-provider transformer config; the transformer pipeline that consumes
    /// this is an external collaborator (spec §1) — the core only round-trips it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transformer: Option<serde_json::Value>,
}

/// A Router record: the base routing table plus any named Router-Group (spec §3).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RouterRules {
    pub default: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub think: Option<String>,
    #[serde(rename = "longContext", default, skip_serializing_if = "Option::is_none")]
    pub long_context: Option<String>,
    #[serde(rename = "webSearch", default, skip_serializing_if = "Option::is_none")]
    pub web_search: Option<String>,
    #[serde(rename = "longContextThreshold", default, skip_serializing_if = "Option::is_none")]
    pub long_context_threshold: Option<u64>,
}

impl RouterRules {
    pub fn long_context_threshold(&self) -> u64 {
        self.long_context_threshold.unwrap_or(DEFAULT_LONG_CONTEXT_THRESHOLD)
    }
}

/// The top-level `Router` block: `RouterRules` plus the active-group pointer.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RouterConfig {
    #[serde(flatten)]
    pub rules: RouterRules,
    #[serde(rename = "activeGroup", default, skip_serializing_if = "Option::is_none")]
    pub active_group: Option<String>,
}

/// A named routing profile (spec §4.5).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RouterGroup {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub rules: RouterRules,
}

fn default_api_timeout_ms() -> u64 {
    600_000
}

/// The Configuration Document (spec §3). Unrecognized top-level fields are preserved
/// verbatim in `extra` so a load→validate→save round trip never drops operator data.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConfigDocument {
    #[serde(rename = "Providers", default)]
    pub providers: Vec<Provider>,
    #[serde(rename = "Router", default)]
    pub router: RouterConfig,
    #[serde(rename = "RouterGroups", default, skip_serializing_if = "Option::is_none")]
    pub router_groups: Option<HashMap<String, RouterGroup>>,
    #[serde(rename = "CUSTOM_ROUTER_PATH", default, skip_serializing_if = "Option::is_none")]
    pub custom_router_path: Option<String>,
    #[serde(rename = "APIKEY", default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(rename = "HOST", default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(rename = "PORT", default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(rename = "PROXY_URL", default, skip_serializing_if = "Option::is_none")]
    pub proxy_url: Option<String>,
    #[serde(rename = "API_TIMEOUT_MS", default = "default_api_timeout_ms")]
    pub api_timeout_ms: u64,
    #[serde(rename = "LOG", default)]
    pub log: bool,
    #[serde(rename = "NON_INTERACTIVE_MODE", default)]
    pub non_interactive_mode: bool,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ConfigDocument {
    pub fn provider(&self, name: &str) -> Option<&Provider> {
        self.providers.iter().find(|p| p.name == name)
    }

    pub fn router_group(&self, id: &str) -> Option<&RouterGroup> {
        self.router_groups.as_ref().and_then(|groups| groups.get(id))
    }
}

/// Runtime-only provider health state (spec §3: "Runtime state is derived and never persisted").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRuntime {
    pub status: ProviderStatus,
    pub last_health_check: Option<chrono::DateTime<chrono::Utc>>,
    pub response_time_ms: Option<u64>,
    pub error_count: u64,
    pub last_error: Option<String>,
}

impl Default for ProviderRuntime {
    fn default() -> Self {
        Self {
            status: ProviderStatus::Inactive,
            last_health_check: None,
            response_time_ms: None,
            error_count: 0,
            last_error: None,
        }
    }
}
