//! Control API handlers (spec §6): the exact endpoint table — config read/write,
//! hot-reload, status, validation, rollback, router-group switching, and a
//! proxy-shaped routing-decision endpoint.

use crate::api::auth::{require_level, AccessLevel};
use crate::config::types::ConfigDocument;
use crate::config::validation::{validate, ValidationResult};
use crate::dynamic_router::GatewayStatus;
use crate::error::GatewayError;
use crate::routing::{decide_with_health, estimate_tokens, RouteDecision, RouteRequest};
use crate::state::AppState;
use crate::version::VersionSource;
use axum::extract::{Extension, Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

pub async fn healthz() -> &'static str {
    "ok"
}

/// `GET /config`: the current config document verbatim.
pub async fn get_config(
    Extension(access): Extension<AccessLevel>,
    State(state): State<AppState>,
) -> Result<Json<ConfigDocument>, GatewayError> {
    require_level(access, AccessLevel::Read)?;
    Ok(Json(state.router.snapshot().config.clone()))
}

#[derive(Serialize)]
pub struct SimpleResult {
    pub success: bool,
    pub message: String,
}

/// `POST /config`: validates and writes `body` to the config file (with a
/// timestamped backup of the prior contents). Does not itself publish the new
/// config to the running router — that's `/config/hot-reload`'s job.
pub async fn put_config(
    Extension(access): Extension<AccessLevel>,
    State(state): State<AppState>,
    Json(body): Json<ConfigDocument>,
) -> Result<Json<SimpleResult>, GatewayError> {
    require_level(access, AccessLevel::Full)?;
    let result = validate(&body, state.validation_options);
    if !result.is_valid {
        return Ok(Json(SimpleResult {
            success: false,
            message: format!("rejected: {:?}", result.errors),
        }));
    }
    crate::config::store::save(&state.config_path, &body)?;
    Ok(Json(SimpleResult {
        success: true,
        message: "config written".to_string(),
    }))
}

/// `POST /config/test`: an auth probe. Reaching the handler at all means the
/// caller already holds Full access.
pub async fn test_config(Extension(access): Extension<AccessLevel>) -> Result<Json<serde_json::Value>, GatewayError> {
    require_level(access, AccessLevel::Full)?;
    Ok(Json(serde_json::json!({ "success": true })))
}

#[derive(Serialize)]
pub struct HotReloadResponse {
    pub success: bool,
    pub version: Option<String>,
    pub validation: ValidationResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// `POST /config/hot-reload`: re-read the config file from disk and run it
/// through the `rollbackOnFailure`-aware update pipeline (spec §4.9 step 2).
pub async fn hot_reload(
    Extension(access): Extension<AccessLevel>,
    State(state): State<AppState>,
) -> Result<Json<HotReloadResponse>, GatewayError> {
    require_level(access, AccessLevel::Full)?;

    if !state.hot_reload_enabled {
        return Ok(Json(HotReloadResponse {
            success: false,
            version: None,
            validation: ValidationResult::default(),
            error: Some("hot reload is disabled".to_string()),
        }));
    }

    let new_config = crate::config::store::load(&state.config_path)?;
    let result = state.router.update(new_config, VersionSource::ControlApi, None).await;

    Ok(Json(HotReloadResponse {
        error: if result.success {
            None
        } else if result.rollback_performed {
            Some("validation failed, rolled back to the most recent valid version".to_string())
        } else {
            Some("validation failed".to_string())
        },
        success: result.success,
        version: result.version_id,
        validation: result.validation,
    }))
}

#[derive(Serialize)]
pub struct ConfigStatusResponse {
    pub status: GatewayStatus,
    pub version: VersionSummary,
    pub metadata: VersionMetadata,
    #[serde(rename = "hotReloadEnabled")]
    pub hot_reload_enabled: bool,
}

/// `GET /config/status`.
pub async fn config_status(
    Extension(access): Extension<AccessLevel>,
    State(state): State<AppState>,
) -> Result<Json<ConfigStatusResponse>, GatewayError> {
    require_level(access, AccessLevel::Read)?;
    let snapshot = state.router.snapshot();
    let (total, max) = state.router.version_metadata();
    Ok(Json(ConfigStatusResponse {
        status: state.router.status(),
        version: VersionSummary {
            id: snapshot.version_id.clone(),
            ordinal: snapshot.ordinal,
            checksum: snapshot.checksum.clone(),
        },
        metadata: VersionMetadata { total, max },
        hot_reload_enabled: state.hot_reload_enabled,
    }))
}

#[derive(Serialize)]
pub struct VersionSummary {
    pub id: String,
    pub ordinal: u64,
    pub checksum: String,
}

#[derive(Serialize)]
pub struct VersionMetadata {
    pub total: usize,
    pub max: usize,
}

#[derive(Serialize)]
pub struct ValidateResponse {
    pub success: bool,
    pub validation: ValidationResult,
}

/// `POST /config/validate`: validates the candidate config in the request body
/// without touching the running router or the file on disk.
pub async fn validate_config(
    Extension(access): Extension<AccessLevel>,
    State(state): State<AppState>,
    Json(candidate): Json<ConfigDocument>,
) -> Result<Json<ValidateResponse>, GatewayError> {
    require_level(access, AccessLevel::Full)?;
    let validation = validate(&candidate, state.validation_options);
    Ok(Json(ValidateResponse {
        success: validation.is_valid,
        validation,
    }))
}

#[derive(Deserialize)]
pub struct RollbackRequest {
    #[serde(rename = "versionId")]
    pub version_id: String,
}

/// `POST /config/rollback`.
pub async fn rollback(
    Extension(access): Extension<AccessLevel>,
    State(state): State<AppState>,
    Json(body): Json<RollbackRequest>,
) -> Result<Json<SimpleResult>, GatewayError> {
    require_level(access, AccessLevel::Full)?;
    state.router.rollback(&body.version_id).await?;
    Ok(Json(SimpleResult {
        success: true,
        message: format!("rolled back to {}", body.version_id),
    }))
}

#[derive(Serialize)]
pub struct VersionListEntry {
    pub id: String,
    pub ordinal: u64,
    pub checksum: String,
    #[serde(rename = "isActive")]
    pub is_active: bool,
    pub description: Option<String>,
}

impl From<crate::version::ConfigVersion> for VersionListEntry {
    fn from(v: crate::version::ConfigVersion) -> Self {
        Self {
            id: v.id,
            ordinal: v.ordinal,
            checksum: v.checksum,
            is_active: v.is_active,
            description: v.description,
        }
    }
}

#[derive(Serialize)]
pub struct VersionsResponse {
    pub current: Option<String>,
    pub metadata: VersionMetadata,
    pub versions: Vec<VersionListEntry>,
}

/// `GET /config/versions`.
pub async fn list_versions(
    Extension(access): Extension<AccessLevel>,
    State(state): State<AppState>,
) -> Result<Json<VersionsResponse>, GatewayError> {
    require_level(access, AccessLevel::Read)?;
    let (total, max) = state.router.version_metadata();
    let versions = state.router.version_manager_snapshot();
    let current = versions.iter().find(|v| v.is_active).map(|v| v.id.clone());
    Ok(Json(VersionsResponse {
        current,
        metadata: VersionMetadata { total, max },
        versions: versions.into_iter().map(VersionListEntry::from).collect(),
    }))
}

#[derive(Serialize)]
pub struct DiffResponse {
    pub diff: crate::version::ConfigDiff,
}

/// `GET /config/diff/{from}/{to}`.
pub async fn version_diff(
    Extension(access): Extension<AccessLevel>,
    State(state): State<AppState>,
    Path((from, to)): Path<(String, String)>,
) -> Result<Json<DiffResponse>, GatewayError> {
    require_level(access, AccessLevel::Read)?;
    let diff = state.router.version_diff(&from, &to)?;
    Ok(Json(DiffResponse { diff }))
}

#[derive(Serialize)]
pub struct RouterGroupSummary {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Serialize)]
pub struct RouterGroupsResponse {
    pub success: bool,
    pub groups: Vec<RouterGroupSummary>,
    #[serde(rename = "currentGroup")]
    pub current_group: Option<String>,
}

/// `GET /router-groups`.
pub async fn list_router_groups(
    Extension(access): Extension<AccessLevel>,
    State(state): State<AppState>,
) -> Result<Json<RouterGroupsResponse>, GatewayError> {
    require_level(access, AccessLevel::Read)?;
    let snapshot = state.router.snapshot();
    let groups = snapshot
        .config
        .router_groups
        .iter()
        .flat_map(|groups| groups.iter())
        .map(|(id, group)| RouterGroupSummary {
            id: id.clone(),
            name: group.name.clone(),
            description: group.description.clone(),
        })
        .collect();
    Ok(Json(RouterGroupsResponse {
        success: true,
        groups,
        current_group: crate::router_group::active_group_id(&snapshot.config),
    }))
}

#[derive(Deserialize)]
pub struct SwitchGroupRequest {
    #[serde(rename = "groupId")]
    pub group_id: String,
}

#[derive(Serialize)]
pub struct SwitchGroupResponse {
    pub success: bool,
    #[serde(rename = "currentGroup")]
    pub current_group: Option<String>,
}

/// `POST /router-groups/switch`: unlike most mutating endpoints, the spec grants
/// this one to any valid token (Read access is enough), and reports an unknown
/// group as `400` rather than the usual `404`.
pub async fn switch_router_group(
    Extension(access): Extension<AccessLevel>,
    State(state): State<AppState>,
    Json(body): Json<SwitchGroupRequest>,
) -> Result<Json<SwitchGroupResponse>, GatewayError> {
    require_level(access, AccessLevel::Read)?;
    state
        .router
        .switch_group(&body.group_id)
        .await
        .map_err(|_| GatewayError::InvalidRequest(format!("unknown router group '{}'", body.group_id)))?;
    Ok(Json(SwitchGroupResponse {
        success: true,
        current_group: Some(body.group_id),
    }))
}

#[derive(Serialize)]
pub struct RouterGroupResponse {
    pub success: bool,
    pub group: RouterGroupSummary,
    #[serde(rename = "isActive")]
    pub is_active: bool,
}

/// `GET /router-groups/{id}`.
pub async fn get_router_group(
    Extension(access): Extension<AccessLevel>,
    State(state): State<AppState>,
    Path(group_id): Path<String>,
) -> Result<Json<RouterGroupResponse>, GatewayError> {
    require_level(access, AccessLevel::Read)?;
    let snapshot = state.router.snapshot();
    let group = snapshot
        .config
        .router_group(&group_id)
        .ok_or_else(|| GatewayError::RouterGroupNotFound(group_id.clone()))?;
    let is_active = crate::router_group::active_group_id(&snapshot.config).as_deref() == Some(group_id.as_str());
    Ok(Json(RouterGroupResponse {
        success: true,
        group: RouterGroupSummary {
            id: group_id,
            name: group.name.clone(),
            description: group.description.clone(),
        },
        is_active,
    }))
}

#[derive(Serialize)]
pub struct RestartResponse {
    pub success: bool,
}

/// `POST /restart`: the actual process supervision is an external collaborator's
/// job (spec §1 Non-goals); this handler only acknowledges the request.
pub async fn restart(Extension(access): Extension<AccessLevel>) -> Result<Json<RestartResponse>, GatewayError> {
    require_level(access, AccessLevel::Full)?;
    Ok(Json(RestartResponse { success: true }))
}

#[derive(Deserialize)]
pub struct MessagesRequest {
    pub model: String,
    #[serde(default)]
    pub system: Option<String>,
    #[serde(default)]
    pub messages: Vec<serde_json::Value>,
    #[serde(default)]
    pub thinking: Option<serde_json::Value>,
    #[serde(default)]
    pub tools: Vec<serde_json::Value>,
}

/// Extract the text of the first `role: "user"` message, flattening Anthropic-style
/// content blocks (`[{"type": "text", "text": "..."}]`) down to plain text. The
/// subagent override marker (spec §4.7) lives here, never in `system`.
fn first_user_message_text(messages: &[serde_json::Value]) -> Option<String> {
    let message = messages.iter().find(|m| m.get("role").and_then(|r| r.as_str()) == Some("user"))?;
    message_text(message)
}

/// Flatten a single message's `content` (string or Anthropic-style content
/// blocks) down to its textual parts, joined with newlines.
fn message_text(message: &serde_json::Value) -> Option<String> {
    let content = message.get("content")?;
    if let Some(text) = content.as_str() {
        return Some(text.to_string());
    }
    let blocks = content.as_array()?;
    let combined = blocks
        .iter()
        .filter_map(|block| block.get("text").and_then(|t| t.as_str()))
        .collect::<Vec<_>>()
        .join("\n");
    if combined.is_empty() {
        None
    } else {
        Some(combined)
    }
}

/// Token count input per spec §4.7: "the concatenated textual parts of all
/// messages and tool schemas" — every message's text plus each tool's schema
/// serialized back to text, since a tool definition has no separate "text" field.
fn estimate_request_tokens(messages: &[serde_json::Value], tools: &[serde_json::Value]) -> u64 {
    let message_tokens: u64 = messages.iter().filter_map(message_text).map(|t| estimate_tokens(&t)).sum();
    let tool_tokens: u64 = tools
        .iter()
        .map(|tool| estimate_tokens(&tool.to_string()))
        .sum();
    message_tokens + tool_tokens
}

/// A request opts into web search when any declared tool's name mentions it
/// (spec §4.7: the exact tool-naming convention is an external collaborator's
/// concern; the router only needs to know whether one was offered).
fn requests_web_search(tools: &[serde_json::Value]) -> bool {
    tools.iter().any(|tool| {
        tool.get("name")
            .and_then(|n| n.as_str())
            .map(|name| name.contains("web_search"))
            .unwrap_or(false)
    })
}

#[derive(Serialize)]
pub struct MessagesRouteResponse {
    pub target: String,
    pub rule_matched: &'static str,
    pub degraded: bool,
}

/// Resolves the `(provider, model)` target for a `/v1/messages`-shaped request via
/// the Routing Decision Engine. Does not forward the request upstream — actually
/// calling providers is an external collaborator's job (spec §1 Non-goals).
pub async fn route_messages(
    Extension(access): Extension<AccessLevel>,
    State(state): State<AppState>,
    Json(body): Json<MessagesRequest>,
) -> Result<Json<MessagesRouteResponse>, GatewayError> {
    require_level(access, AccessLevel::Restricted)?;
    let snapshot = state.router.snapshot();

    if let Some(custom_router) = &snapshot.custom_router {
        let request_json = serde_json::json!({
            "model": body.model,
            "system": body.system,
            "messages": body.messages,
        });
        let config_json = serde_json::to_value(&snapshot.config).unwrap_or_default();
        match custom_router.route(&request_json, &config_json) {
            Ok(Some(target)) => {
                return Ok(Json(MessagesRouteResponse {
                    target,
                    rule_matched: "custom_router",
                    degraded: false,
                }));
            }
            Ok(None) => {}
            Err(err) => {
                state.events().emit_error(format!("custom router failed: {}", err));
            }
        }
    }

    let token_estimate = estimate_request_tokens(&body.messages, &body.tools);

    let request = RouteRequest {
        model: body.model,
        first_user_message: first_user_message_text(&body.messages),
        token_estimate,
        is_web_search: requests_web_search(&body.tools),
        thinking: body.thinking.is_some(),
    };

    let decision: RouteDecision = decide_with_health(&snapshot.effective_rules, &request, &state.health).await;
    Ok(Json(MessagesRouteResponse {
        target: decision.target,
        rule_matched: decision.rule_matched,
        degraded: decision.degraded,
    }))
}
