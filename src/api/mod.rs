pub mod auth;
pub mod handlers;

use crate::state::AppState;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Builds the Control API router (spec §6). `/healthz` is unauthenticated so
/// orchestrators can probe liveness without a key; everything else goes through
/// `auth::require_auth`.
pub fn create_router(state: AppState) -> Router {
    let authenticated = Router::new()
        .route("/config", get(handlers::get_config).post(handlers::put_config))
        .route("/config/test", post(handlers::test_config))
        .route("/config/hot-reload", post(handlers::hot_reload))
        .route("/config/status", get(handlers::config_status))
        .route("/config/validate", post(handlers::validate_config))
        .route("/config/rollback", post(handlers::rollback))
        .route("/config/versions", get(handlers::list_versions))
        .route("/config/diff/{from}/{to}", get(handlers::version_diff))
        .route("/router-groups", get(handlers::list_router_groups))
        .route("/router-groups/switch", post(handlers::switch_router_group))
        .route("/router-groups/{id}", get(handlers::get_router_group))
        .route("/restart", post(handlers::restart))
        .route("/v1/messages", post(handlers::route_messages))
        .layer(middleware::from_fn_with_state(state.clone(), auth::require_auth));

    Router::new()
        .route("/healthz", get(handlers::healthz))
        .merge(authenticated)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::{ConfigDocument, Provider, RouterConfig, RouterRules};
    use crate::config::validation::ValidationOptions;
    use crate::dynamic_router::DynamicRouter;
    use crate::events::EventBus;
    use crate::health::HealthTable;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn sample_config() -> ConfigDocument {
        ConfigDocument {
            providers: vec![Provider {
                name: "p1".to_string(),
                api_base_url: "https://api.example.com".to_string(),
                api_key: "key".to_string(),
                models: vec!["m1".to_string()],
                transformer: None,
            }],
            router: RouterConfig {
                rules: RouterRules {
                    default: "p1,m1".to_string(),
                    ..Default::default()
                },
                active_group: None,
            },
            api_key: Some("secret-key".to_string()),
            ..Default::default()
        }
    }

    fn test_state() -> AppState {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.yaml");
        std::mem::forget(dir);
        let router = DynamicRouter::bootstrap(
            sample_config(),
            ValidationOptions::default(),
            EventBus::new(),
            config_path.clone(),
        )
        .unwrap();
        AppState::new(router, HealthTable::new(), config_path, ValidationOptions::default())
    }

    #[tokio::test]
    async fn healthz_requires_no_auth() {
        let app = create_router(test_state());
        let response = app
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn config_status_without_bearer_token_is_forbidden() {
        let app = create_router(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/config/status")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn hot_reload_without_bearer_token_is_forbidden() {
        let app = create_router(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/config/hot-reload")
                    .header("content-type", "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn wrong_bearer_token_is_unauthorized() {
        let app = create_router(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/config/status")
                    .header("authorization", "Bearer wrong-key")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn correct_bearer_token_grants_full_access_to_config_status() {
        let app = create_router(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/config/status")
                    .header("authorization", "Bearer secret-key")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_router_group_lookup_is_not_found() {
        let app = create_router(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/router-groups/nonexistent")
                    .header("authorization", "Bearer secret-key")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn switching_to_an_unknown_router_group_is_a_bad_request() {
        let app = create_router(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/router-groups/switch")
                    .header("authorization", "Bearer secret-key")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"groupId":"nonexistent"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn config_test_probe_succeeds_with_valid_token() {
        let app = create_router(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/config/test")
                    .header("authorization", "Bearer secret-key")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
