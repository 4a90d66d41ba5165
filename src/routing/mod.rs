//! Routing Decision Engine (spec §4.7): picks a `(provider, model)` target for an
//! incoming request by evaluating routing rules in priority order.

use crate::config::constants::{DEFAULT_BACKGROUND_MARKER, SUBAGENT_MARKER_CLOSE, SUBAGENT_MARKER_OPEN};
use crate::config::types::RouterRules;
use crate::health::HealthTable;
use serde::Serialize;

/// The subset of an inbound `/v1/messages`-shaped request the router needs.
#[derive(Debug, Clone, Default)]
pub struct RouteRequest {
    pub model: String,
    /// The first user-role message's text, inspected for the subagent override
    /// marker (spec §4.7). Not the system prompt — the marker is something the
    /// calling subagent prepends to its own message, not the request's system field.
    pub first_user_message: Option<String>,
    pub token_estimate: u64,
    pub is_web_search: bool,
    pub thinking: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RouteDecision {
    pub target: String,
    pub rule_matched: &'static str,
    pub degraded: bool,
}

/// Deterministic token-count heuristic standing in for a real tokenizer (spec §9
/// Open Question (c)): roughly 4 characters per token, consistent across calls so
/// the long-context threshold behaves predictably.
pub fn estimate_tokens(text: &str) -> u64 {
    (text.chars().count() as u64).div_ceil(4)
}

fn subagent_override(first_user_message: &Option<String>) -> Option<String> {
    let prompt = first_user_message.as_ref()?.trim();
    let after_open = prompt.strip_prefix(SUBAGENT_MARKER_OPEN)?;
    let close = after_open.find(SUBAGENT_MARKER_CLOSE)?;
    Some(after_open[..close].trim().to_string())
}

fn is_background_model(model: &str) -> bool {
    model.starts_with(DEFAULT_BACKGROUND_MARKER)
}

/// Evaluate `rules` against `request` in priority order: subagent override, then
/// web search, then long context, then thinking mode, then background, then default.
pub fn decide(rules: &RouterRules, request: &RouteRequest) -> (String, &'static str) {
    if let Some(target) = subagent_override(&request.first_user_message) {
        return (target, "subagent_override");
    }
    if request.is_web_search {
        if let Some(target) = &rules.web_search {
            return (target.clone(), "web_search");
        }
    }
    if request.token_estimate >= rules.long_context_threshold() {
        if let Some(target) = &rules.long_context {
            return (target.clone(), "long_context");
        }
    }
    if request.thinking {
        if let Some(target) = &rules.think {
            return (target.clone(), "think");
        }
    }
    if is_background_model(&request.model) {
        if let Some(target) = &rules.background {
            return (target.clone(), "background");
        }
    }
    (rules.default.clone(), "default")
}

/// Resolve a `RouteDecision`, consulting `health` to flag `degraded` when the
/// chosen provider is not `Active`.
pub async fn decide_with_health(
    rules: &RouterRules,
    request: &RouteRequest,
    health: &HealthTable,
) -> RouteDecision {
    let (target, rule_matched) = decide(rules, request);
    let provider_name = target.split(',').next().unwrap_or_default();
    let degraded = health.status_of(provider_name).await != crate::config::types::ProviderStatus::Active;
    RouteDecision {
        target,
        rule_matched,
        degraded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> RouterRules {
        RouterRules {
            default: "p1,default-model".to_string(),
            background: Some("p1,background-model".to_string()),
            think: Some("p1,think-model".to_string()),
            long_context: Some("p1,long-context-model".to_string()),
            web_search: Some("p1,search-model".to_string()),
            long_context_threshold: Some(1000),
        }
    }

    #[test]
    fn default_route_when_nothing_else_matches() {
        let request = RouteRequest {
            model: "claude-3-5-sonnet".to_string(),
            ..Default::default()
        };
        let (target, rule) = decide(&rules(), &request);
        assert_eq!(target, "p1,default-model");
        assert_eq!(rule, "default");
    }

    #[test]
    fn background_marker_in_model_name_routes_to_background() {
        let request = RouteRequest {
            model: "claude-3-5-haiku-20241022".to_string(),
            ..Default::default()
        };
        let (target, rule) = decide(&rules(), &request);
        assert_eq!(target, "p1,background-model");
        assert_eq!(rule, "background");
    }

    #[test]
    fn long_context_threshold_boundary() {
        let request = RouteRequest {
            token_estimate: 1000,
            ..Default::default()
        };
        let (target, rule) = decide(&rules(), &request);
        assert_eq!(target, "p1,long-context-model");
        assert_eq!(rule, "long_context");

        let below = RouteRequest {
            token_estimate: 999,
            ..Default::default()
        };
        let (_, rule) = decide(&rules(), &below);
        assert_eq!(rule, "default");
    }

    #[test]
    fn web_search_outranks_long_context() {
        let request = RouteRequest {
            token_estimate: 5000,
            is_web_search: true,
            ..Default::default()
        };
        let (target, rule) = decide(&rules(), &request);
        assert_eq!(target, "p1,search-model");
        assert_eq!(rule, "web_search");
    }

    #[test]
    fn subagent_marker_outranks_everything() {
        let request = RouteRequest {
            model: "claude-3-5-haiku".to_string(),
            is_web_search: true,
            token_estimate: 5000,
            first_user_message: Some(format!(
                "{}p2,override-model{} rest of the prompt",
                SUBAGENT_MARKER_OPEN, SUBAGENT_MARKER_CLOSE
            )),
            ..Default::default()
        };
        let (target, rule) = decide(&rules(), &request);
        assert_eq!(target, "p2,override-model");
        assert_eq!(rule, "subagent_override");
    }

    #[test]
    fn subagent_marker_mid_message_does_not_override() {
        let request = RouteRequest {
            is_web_search: true,
            first_user_message: Some(format!(
                "You are a helper. {}p2,override-model{}",
                SUBAGENT_MARKER_OPEN, SUBAGENT_MARKER_CLOSE
            )),
            ..Default::default()
        };
        let (_, rule) = decide(&rules(), &request);
        assert_eq!(rule, "web_search");
    }

    #[test]
    fn missing_rule_falls_through_to_default() {
        let mut no_think = rules();
        no_think.think = None;
        let request = RouteRequest {
            thinking: true,
            ..Default::default()
        };
        let (target, rule) = decide(&no_think, &request);
        assert_eq!(target, "p1,default-model");
        assert_eq!(rule, "default");
    }

    #[test]
    fn token_estimate_is_deterministic() {
        let text = "a".repeat(400);
        assert_eq!(estimate_tokens(&text), estimate_tokens(&text));
        assert_eq!(estimate_tokens(&text), 100);
    }
}
