//! Router Group Manager (spec §4.5): resolves which named routing profile is
//! active and exposes it as an effective `RouterRules` view.

use crate::config::types::{ConfigDocument, RouterRules};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RouterGroupError {
    #[error("router group '{0}' does not exist")]
    NotFound(String),
}

/// The effective routing rules after resolving `Router.activeGroup` (or the
/// legacy-compat base `Router` block when no groups are configured at all).
///
/// Per spec §4.5 the merged view is a shallow merge of the base `Router` block
/// and the active group's fields: the group's `default` always wins (every
/// group fully specifies one), and each optional field (`background`, `think`,
/// `longContext`, `webSearch`, `longContextThreshold`) falls back to the base
/// `Router`'s value when the group leaves it unset, so a group doesn't have to
/// redeclare every rule to inherit the legacy behavior for the ones it omits.
pub fn effective_rules(config: &ConfigDocument) -> RouterRules {
    match active_group_id(config) {
        Some(id) => match config.router_group(&id) {
            Some(group) => merge(&config.router.rules, &group.rules),
            None => config.router.rules.clone(),
        },
        None => config.router.rules.clone(),
    }
}

fn merge(base: &RouterRules, group: &RouterRules) -> RouterRules {
    RouterRules {
        default: if group.default.trim().is_empty() {
            base.default.clone()
        } else {
            group.default.clone()
        },
        background: group.background.clone().or_else(|| base.background.clone()),
        think: group.think.clone().or_else(|| base.think.clone()),
        long_context: group.long_context.clone().or_else(|| base.long_context.clone()),
        web_search: group.web_search.clone().or_else(|| base.web_search.clone()),
        long_context_threshold: group
            .long_context_threshold
            .or(base.long_context_threshold),
    }
}

/// The id of the group that should be considered active: `Router.activeGroup` if
/// set, else `"router1"` if it exists, else the first declared group, else none
/// (spec §4.5: legacy configs with no RouterGroups behave exactly as before).
pub fn active_group_id(config: &ConfigDocument) -> Option<String> {
    let groups = config.router_groups.as_ref()?;
    if groups.is_empty() {
        return None;
    }
    if let Some(explicit) = &config.router.active_group {
        if groups.contains_key(explicit) {
            return Some(explicit.clone());
        }
    }
    if groups.contains_key("router1") {
        return Some("router1".to_string());
    }
    let mut names: Vec<&String> = groups.keys().collect();
    names.sort();
    names.first().map(|s| (*s).clone())
}

/// Validate that `group_id` exists, returning the `RouterRules` a switch to it
/// would activate. The caller is responsible for actually persisting the new
/// `Router.activeGroup` and publishing a snapshot.
pub fn switch_to_group<'a>(
    config: &'a ConfigDocument,
    group_id: &str,
) -> Result<&'a RouterRules, RouterGroupError> {
    config
        .router_group(group_id)
        .map(|g| &g.rules)
        .ok_or_else(|| RouterGroupError::NotFound(group_id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::{RouterConfig, RouterGroup};
    use std::collections::HashMap;

    fn config_with_groups(active: Option<&str>) -> ConfigDocument {
        let mut groups = HashMap::new();
        groups.insert(
            "router1".to_string(),
            RouterGroup {
                name: "router1".to_string(),
                description: None,
                rules: RouterRules {
                    default: "p1,fast".to_string(),
                    ..Default::default()
                },
            },
        );
        groups.insert(
            "router2".to_string(),
            RouterGroup {
                name: "router2".to_string(),
                description: None,
                rules: RouterRules {
                    default: "p1,smart".to_string(),
                    ..Default::default()
                },
            },
        );
        ConfigDocument {
            router: RouterConfig {
                rules: RouterRules {
                    default: "p1,legacy".to_string(),
                    ..Default::default()
                },
                active_group: active.map(|s| s.to_string()),
            },
            router_groups: Some(groups),
            ..Default::default()
        }
    }

    #[test]
    fn no_groups_falls_back_to_base_router() {
        let config = ConfigDocument {
            router: RouterConfig {
                rules: RouterRules {
                    default: "p1,legacy".to_string(),
                    ..Default::default()
                },
                active_group: None,
            },
            ..Default::default()
        };
        assert_eq!(effective_rules(&config).default, "p1,legacy");
        assert_eq!(active_group_id(&config), None);
    }

    #[test]
    fn explicit_active_group_wins() {
        let config = config_with_groups(Some("router2"));
        assert_eq!(active_group_id(&config).as_deref(), Some("router2"));
        assert_eq!(effective_rules(&config).default, "p1,smart");
    }

    #[test]
    fn defaults_to_router1_when_unset() {
        let config = config_with_groups(None);
        assert_eq!(active_group_id(&config).as_deref(), Some("router1"));
        assert_eq!(effective_rules(&config).default, "p1,fast");
    }

    #[test]
    fn unknown_explicit_group_falls_back_to_router1() {
        let config = config_with_groups(Some("missing"));
        assert_eq!(active_group_id(&config).as_deref(), Some("router1"));
    }

    #[test]
    fn group_without_background_inherits_base_routers_background() {
        let mut config = config_with_groups(Some("router2"));
        config.router.rules.background = Some("p1,base-background".to_string());
        // router2 declares no background of its own.
        let merged = effective_rules(&config);
        assert_eq!(merged.default, "p1,smart");
        assert_eq!(merged.background.as_deref(), Some("p1,base-background"));
    }

    #[test]
    fn group_background_overrides_base_when_set() {
        let mut config = config_with_groups(Some("router2"));
        config.router.rules.background = Some("p1,base-background".to_string());
        if let Some(groups) = config.router_groups.as_mut() {
            groups.get_mut("router2").unwrap().rules.background =
                Some("p1,group-background".to_string());
        }
        let merged = effective_rules(&config);
        assert_eq!(merged.background.as_deref(), Some("p1,group-background"));
    }

    #[test]
    fn switch_to_unknown_group_errors() {
        let config = config_with_groups(None);
        assert!(matches!(
            switch_to_group(&config, "missing"),
            Err(RouterGroupError::NotFound(_))
        ));
    }

    #[test]
    fn switch_to_known_group_returns_its_rules() {
        let config = config_with_groups(None);
        let rules = switch_to_group(&config, "router2").unwrap();
        assert_eq!(rules.default, "p1,smart");
    }
}
