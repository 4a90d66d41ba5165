//! Validation of a `ConfigDocument` against the checks in spec §4.3.
//!
//! Schema and referential checks always run; security, performance, connectivity and
//! custom-router-loadability checks are independently toggleable via `ValidationOptions`
//! (resolving Open Question (a)).

use crate::config::constants::VALIDATOR_PROBE_TIMEOUT_SECS;
use crate::config::types::ConfigDocument;
use serde::Serialize;
use std::collections::HashSet;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    fn score_deduction(self) -> i32 {
        match self {
            Severity::Critical => 25,
            Severity::High => 15,
            Severity::Medium => 10,
            Severity::Low => 5,
            Severity::Warning => 2,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub code: String,
    pub message: String,
}

impl ValidationIssue {
    fn new(severity: Severity, code: &str, message: impl Into<String>) -> Self {
        Self {
            severity,
            code: code.to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationResult {
    #[serde(rename = "isValid")]
    pub is_valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
    pub score: u8,
}

impl Default for ValidationResult {
    /// An empty, passing result — used where a caller short-circuits before
    /// ever running a validation pass (e.g. hot-reload while disabled).
    fn default() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
            score: 100,
        }
    }
}

/// Which non-mandatory check categories to run (spec §9 Open Question (a)).
/// Schema and referential-integrity checks are not listed here because they
/// always run.
#[derive(Debug, Clone, Copy)]
pub struct ValidationOptions {
    pub security: bool,
    pub performance: bool,
    pub connectivity: bool,
    pub custom_router: bool,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            security: true,
            performance: true,
            connectivity: false,
            custom_router: true,
        }
    }
}

pub fn validate(config: &ConfigDocument, options: ValidationOptions) -> ValidationResult {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    validate_schema(config, &mut errors);
    validate_referential(config, &mut errors, &mut warnings);

    if options.security {
        validate_security(config, &mut errors, &mut warnings);
    }
    if options.performance {
        validate_performance(config, &mut warnings);
    }
    if options.custom_router {
        validate_custom_router_loadable(config, &mut errors);
    }

    let mut score: i32 = 100;
    for issue in errors.iter().chain(warnings.iter()) {
        score -= issue.severity.score_deduction();
    }
    let score = score.max(0) as u8;

    ValidationResult {
        is_valid: !errors.iter().any(|issue| issue.severity == Severity::Critical),
        errors,
        warnings,
        score,
    }
}

/// Best-effort connectivity probe, run only when `options.connectivity` is set — not part
/// of `validate` because it is I/O-bound and may exceed the aggregate validation timeout
/// on its own (spec §4.3).
pub async fn validate_connectivity(config: &ConfigDocument) -> Vec<ValidationIssue> {
    let client = reqwest::Client::new();
    let mut issues = Vec::new();
    for provider in &config.providers {
        let probe = client
            .head(&provider.api_base_url)
            .timeout(Duration::from_secs(VALIDATOR_PROBE_TIMEOUT_SECS))
            .send();
        match tokio::time::timeout(Duration::from_secs(VALIDATOR_PROBE_TIMEOUT_SECS), probe).await
        {
            Ok(Ok(resp)) if resp.status().is_server_error() => {
                issues.push(ValidationIssue::new(
                    Severity::Medium,
                    "connectivity.server_error",
                    format!(
                        "Provider '{}' at {} returned {}.",
                        provider.name,
                        provider.api_base_url,
                        resp.status()
                    ),
                ));
            }
            Ok(Err(err)) => {
                issues.push(ValidationIssue::new(
                    Severity::Medium,
                    "connectivity.unreachable",
                    format!("Provider '{}' is unreachable: {}.", provider.name, err),
                ));
            }
            Err(_) => {
                issues.push(ValidationIssue::new(
                    Severity::Medium,
                    "connectivity.timeout",
                    format!(
                        "Provider '{}' did not respond within {}s.",
                        provider.name, VALIDATOR_PROBE_TIMEOUT_SECS
                    ),
                ));
            }
            Ok(Ok(_)) => {}
        }
    }
    issues
}

fn validate_schema(config: &ConfigDocument, errors: &mut Vec<ValidationIssue>) {
    if config.providers.is_empty() {
        errors.push(ValidationIssue::new(
            Severity::Critical,
            "schema.no_providers",
            "Configuration declares no Providers.",
        ));
    }
    for provider in &config.providers {
        if provider.name.trim().is_empty() {
            errors.push(ValidationIssue::new(
                Severity::Critical,
                "schema.provider_name_empty",
                "A provider has an empty name.",
            ));
        }
        if provider.api_base_url.trim().is_empty() {
            errors.push(ValidationIssue::new(
                Severity::Critical,
                "schema.provider_api_base_empty",
                format!("Provider '{}' has no api_base_url.", provider.name),
            ));
        }
        if provider.models.is_empty() {
            errors.push(ValidationIssue::new(
                Severity::High,
                "schema.provider_no_models",
                format!("Provider '{}' declares no models.", provider.name),
            ));
        }
    }
    if config.router.rules.default.trim().is_empty() {
        errors.push(ValidationIssue::new(
            Severity::Critical,
            "schema.router_default_missing",
            "Router.default is required.",
        ));
    }
}

/// Whether `route` (`"provider,model"`) resolves: `None` if fully known, otherwise
/// whether the missing piece is the provider (spec §4.3: "missing provider is
/// high") or just the model within a known provider ("missing model is warning").
enum RouteLookup {
    Known,
    UnknownProvider,
    UnknownModel,
}

fn lookup_route(route: &str, config: &ConfigDocument) -> RouteLookup {
    let Some((provider_name, model)) = route.split_once(',') else {
        return RouteLookup::UnknownProvider;
    };
    match config.provider(provider_name) {
        None => RouteLookup::UnknownProvider,
        Some(provider) if provider.models.iter().any(|m| m == model) => RouteLookup::Known,
        Some(_) => RouteLookup::UnknownModel,
    }
}

fn validate_referential(
    config: &ConfigDocument,
    errors: &mut Vec<ValidationIssue>,
    warnings: &mut Vec<ValidationIssue>,
) {
    let mut check_route = |label: &str, route: &Option<String>| {
        if let Some(route) = route {
            match lookup_route(route, config) {
                RouteLookup::Known => {}
                RouteLookup::UnknownProvider => errors.push(ValidationIssue::new(
                    Severity::High,
                    "referential.unknown_provider",
                    format!("{} references unknown provider in '{}'.", label, route),
                )),
                RouteLookup::UnknownModel => warnings.push(ValidationIssue::new(
                    Severity::Warning,
                    "referential.unknown_model",
                    format!("{} references unknown model in '{}'.", label, route),
                )),
            }
        }
    };

    match lookup_route(&config.router.rules.default, config) {
        RouteLookup::Known => {}
        RouteLookup::UnknownProvider => errors.push(ValidationIssue::new(
            Severity::Critical,
            "referential.unknown_default_route",
            format!(
                "Router.default references unknown provider in '{}'.",
                config.router.rules.default
            ),
        )),
        RouteLookup::UnknownModel => warnings.push(ValidationIssue::new(
            Severity::Warning,
            "referential.unknown_model",
            format!(
                "Router.default references unknown model in '{}'.",
                config.router.rules.default
            ),
        )),
    }
    check_route("Router.background", &config.router.rules.background);
    check_route("Router.think", &config.router.rules.think);
    check_route("Router.longContext", &config.router.rules.long_context);
    check_route("Router.webSearch", &config.router.rules.web_search);

    if let Some(active) = &config.router.active_group {
        if config.router_group(active).is_none() {
            errors.push(ValidationIssue::new(
                Severity::High,
                "referential.unknown_active_group",
                format!("Router.activeGroup references unknown group '{}'.", active),
            ));
        }
    }

    if let Some(groups) = &config.router_groups {
        for (id, group) in groups {
            check_route(&format!("RouterGroups.{}.default", id), &Some(group.rules.default.clone()));
            check_route(&format!("RouterGroups.{}.background", id), &group.rules.background);
            check_route(&format!("RouterGroups.{}.think", id), &group.rules.think);
            check_route(&format!("RouterGroups.{}.longContext", id), &group.rules.long_context);
            check_route(&format!("RouterGroups.{}.webSearch", id), &group.rules.web_search);
        }
    }

    let mut seen_names = HashSet::new();
    for provider in &config.providers {
        if !seen_names.insert(&provider.name) {
            warnings.push(ValidationIssue::new(
                Severity::Medium,
                "referential.duplicate_provider_name",
                format!("Duplicate provider name '{}'.", provider.name),
            ));
        }
    }
}

/// Exact placeholder literals left over from example configs (spec §4.3).
const PLACEHOLDER_API_KEYS: &[&str] = &["sk-xxx", "your-api-key", "your-secret-key"];

fn validate_security(
    config: &ConfigDocument,
    errors: &mut Vec<ValidationIssue>,
    warnings: &mut Vec<ValidationIssue>,
) {
    for provider in &config.providers {
        if provider.api_base_url.starts_with("http://") {
            warnings.push(ValidationIssue::new(
                Severity::Medium,
                "security.insecure_transport",
                format!(
                    "Provider '{}' uses plaintext http:// for api_base_url.",
                    provider.name
                ),
            ));
        }
        if PLACEHOLDER_API_KEYS.contains(&provider.api_key.as_str()) {
            errors.push(ValidationIssue::new(
                Severity::High,
                "security.placeholder_api_key",
                format!(
                    "Provider '{}' still has the placeholder api_key '{}'.",
                    provider.name, provider.api_key
                ),
            ));
        } else if provider.api_key.len() < 10 {
            warnings.push(ValidationIssue::new(
                Severity::Low,
                "security.short_api_key",
                format!("Provider '{}' has an api_key under 10 characters.", provider.name),
            ));
        }
    }
    if config.api_key.as_ref().is_none_or(|k| k.trim().is_empty()) {
        warnings.push(ValidationIssue::new(
            Severity::Medium,
            "security.no_control_api_key",
            "APIKEY is not set; the Control API is unauthenticated.",
        ));
    }
    if config.host.as_deref() == Some("0.0.0.0") {
        warnings.push(ValidationIssue::new(
            Severity::Medium,
            "security.bind_all_interfaces",
            "HOST is 0.0.0.0; the Control API is reachable from any interface.",
        ));
    }
}

fn validate_performance(config: &ConfigDocument, warnings: &mut Vec<ValidationIssue>) {
    if config.api_timeout_ms < 1_000 || config.api_timeout_ms > 600_000 {
        warnings.push(ValidationIssue::new(
            Severity::Low,
            "performance.timeout_out_of_range",
            format!(
                "API_TIMEOUT_MS is {}ms, outside the recommended 1,000-600,000ms range.",
                config.api_timeout_ms
            ),
        ));
    }
    if config.providers.len() < 2 {
        warnings.push(ValidationIssue::new(
            Severity::Low,
            "performance.single_provider",
            "Fewer than two providers configured; no failover path exists.",
        ));
    }
    if config.router.rules.long_context_threshold() < 1_000 {
        warnings.push(ValidationIssue::new(
            Severity::Warning,
            "performance.low_long_context_threshold",
            "longContextThreshold is set very low; most requests will route as long-context.",
        ));
    }
}

fn validate_custom_router_loadable(config: &ConfigDocument, errors: &mut Vec<ValidationIssue>) {
    if let Some(path) = &config.custom_router_path {
        if !std::path::Path::new(path).exists() {
            errors.push(ValidationIssue::new(
                Severity::High,
                "custom_router.missing_file",
                format!("CUSTOM_ROUTER_PATH '{}' does not exist.", path),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::{Provider, RouterConfig, RouterGroup, RouterRules};
    use std::collections::HashMap;

    fn base_config() -> ConfigDocument {
        ConfigDocument {
            providers: vec![
                Provider {
                    name: "p1".to_string(),
                    api_base_url: "https://api.example.com".to_string(),
                    api_key: "a-sufficiently-long-api-key".to_string(),
                    models: vec!["m1".to_string()],
                    transformer: None,
                },
                Provider {
                    name: "p2".to_string(),
                    api_base_url: "https://api2.example.com".to_string(),
                    api_key: "another-sufficiently-long-key".to_string(),
                    models: vec!["m2".to_string()],
                    transformer: None,
                },
            ],
            router: RouterConfig {
                rules: RouterRules {
                    default: "p1,m1".to_string(),
                    ..Default::default()
                },
                active_group: None,
            },
            api_key: Some("secret".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn valid_config_passes() {
        let config = base_config();
        let result = validate(&config, ValidationOptions::default());
        assert!(result.is_valid);
        assert!(result.errors.is_empty());
        assert_eq!(result.score, 100);
    }

    #[test]
    fn unknown_default_route_provider_is_critical_error() {
        let mut config = base_config();
        config.router.rules.default = "p_missing,m1".to_string();
        let result = validate(&config, ValidationOptions::default());
        assert!(!result.is_valid);
        assert!(result
            .errors
            .iter()
            .any(|e| e.code == "referential.unknown_default_route"));
        assert!(result.score <= 75);
    }

    #[test]
    fn unknown_default_route_model_is_warning_only() {
        let mut config = base_config();
        config.router.rules.default = "p1,nonexistent".to_string();
        let result = validate(&config, ValidationOptions::default());
        assert!(result.is_valid);
        assert!(result
            .warnings
            .iter()
            .any(|w| w.code == "referential.unknown_model"));
    }

    #[test]
    fn unknown_provider_on_non_default_route_is_error_but_not_critical() {
        let mut config = base_config();
        config.router.rules.background = Some("pX,mZ".to_string());
        let result = validate(&config, ValidationOptions::default());
        assert!(result.is_valid);
        assert!(result
            .errors
            .iter()
            .any(|e| e.code == "referential.unknown_provider"));
        assert!(result.score < 100);
    }

    #[test]
    fn unknown_active_group_is_error_but_not_critical() {
        let mut config = base_config();
        config.router.active_group = Some("missing".to_string());
        let result = validate(&config, ValidationOptions::default());
        assert!(result.is_valid);
        assert!(result
            .errors
            .iter()
            .any(|e| e.code == "referential.unknown_active_group"));
        assert!(result.score < 100);
    }

    #[test]
    fn router_group_with_unknown_provider_is_error_but_not_critical() {
        let mut config = base_config();
        let mut groups = HashMap::new();
        groups.insert(
            "group1".to_string(),
            RouterGroup {
                name: "group1".to_string(),
                description: None,
                rules: RouterRules {
                    default: "p_missing,m1".to_string(),
                    ..Default::default()
                },
            },
        );
        config.router_groups = Some(groups);
        let result = validate(&config, ValidationOptions::default());
        assert!(result.is_valid);
        assert!(result
            .errors
            .iter()
            .any(|e| e.code == "referential.unknown_provider"));
    }

    #[test]
    fn router_group_with_unknown_model_is_warning_only() {
        let mut config = base_config();
        let mut groups = HashMap::new();
        groups.insert(
            "group1".to_string(),
            RouterGroup {
                name: "group1".to_string(),
                description: None,
                rules: RouterRules {
                    default: "p1,missing_model".to_string(),
                    ..Default::default()
                },
            },
        );
        config.router_groups = Some(groups);
        let result = validate(&config, ValidationOptions::default());
        assert!(result.is_valid);
        assert!(result
            .warnings
            .iter()
            .any(|w| w.code == "referential.unknown_model"));
    }

    #[test]
    fn insecure_transport_is_warning_not_error() {
        let mut config = base_config();
        config.providers[0].api_base_url = "http://api.example.com".to_string();
        let result = validate(&config, ValidationOptions::default());
        assert!(result.is_valid);
        assert!(result
            .warnings
            .iter()
            .any(|w| w.code == "security.insecure_transport"));
        assert!(result.score < 100);
    }

    #[test]
    fn missing_custom_router_file_is_error_but_not_critical() {
        let mut config = base_config();
        config.custom_router_path = Some("/nonexistent/path/router.rhai".to_string());
        let result = validate(&config, ValidationOptions::default());
        assert!(result.is_valid);
        assert!(result
            .errors
            .iter()
            .any(|e| e.code == "custom_router.missing_file"));
    }

    #[test]
    fn placeholder_api_key_is_error_but_not_critical() {
        let mut config = base_config();
        config.providers[0].api_key = "your-api-key".to_string();
        let result = validate(&config, ValidationOptions::default());
        assert!(result.is_valid);
        assert!(result
            .errors
            .iter()
            .any(|e| e.code == "security.placeholder_api_key"));
    }

    #[test]
    fn short_api_key_is_warning_only() {
        let mut config = base_config();
        config.providers[0].api_key = "short".to_string();
        let result = validate(&config, ValidationOptions::default());
        assert!(result.is_valid);
        assert!(result.warnings.iter().any(|w| w.code == "security.short_api_key"));
    }

    #[test]
    fn bind_all_interfaces_warns() {
        let mut config = base_config();
        config.host = Some("0.0.0.0".to_string());
        let result = validate(&config, ValidationOptions::default());
        assert!(result
            .warnings
            .iter()
            .any(|w| w.code == "security.bind_all_interfaces"));
    }

    #[test]
    fn timeout_out_of_range_warns() {
        let mut config = base_config();
        config.api_timeout_ms = 900_000;
        let result = validate(&config, ValidationOptions::default());
        assert!(result
            .warnings
            .iter()
            .any(|w| w.code == "performance.timeout_out_of_range"));
    }

    #[test]
    fn single_provider_warns() {
        let mut config = base_config();
        config.providers.truncate(1);
        let result = validate(&config, ValidationOptions::default());
        assert!(result
            .warnings
            .iter()
            .any(|w| w.code == "performance.single_provider"));
    }

    #[test]
    fn security_checks_skippable_via_options() {
        let mut config = base_config();
        config.providers[0].api_base_url = "http://api.example.com".to_string();
        let options = ValidationOptions {
            security: false,
            ..ValidationOptions::default()
        };
        let result = validate(&config, options);
        assert!(!result
            .warnings
            .iter()
            .any(|w| w.code == "security.insecure_transport"));
    }

    #[test]
    fn score_floors_at_zero() {
        let mut config = base_config();
        config.providers.clear();
        config.router.rules.default = String::new();
        let result = validate(&config, ValidationOptions::default());
        assert_eq!(result.score, 0);
    }
}
