//! `GatewayError` (spec §7): the single error type returned across the HTTP
//! boundary, one variant per taxonomy entry, each carrying its documented status
//! code. Internal code uses `anyhow` and only converts to `GatewayError` here.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("insufficient access level for this operation")]
    Forbidden,

    #[error("config file not found at {0}")]
    ConfigNotFound(String),

    #[error("config is not valid YAML: {0}")]
    ConfigParseError(String),

    #[error("config failed validation: {0}")]
    ConfigValidationFailed(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("config version '{0}' not found")]
    VersionNotFound(String),

    #[error("config version '{0}' does not support rollback")]
    RollbackUnsupported(String),

    #[error("router group '{0}' not found")]
    RouterGroupNotFound(String),

    #[error("custom router script error: {0}")]
    CustomRouterError(String),

    #[error("no healthy provider available for route '{0}'")]
    NoHealthyProvider(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl GatewayError {
    fn status_and_tag(&self) -> (StatusCode, &'static str) {
        match self {
            GatewayError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized"),
            GatewayError::Forbidden => (StatusCode::FORBIDDEN, "forbidden"),
            GatewayError::ConfigNotFound(_) => (StatusCode::NOT_FOUND, "config_not_found"),
            GatewayError::ConfigParseError(_) => (StatusCode::BAD_REQUEST, "config_parse_error"),
            GatewayError::ConfigValidationFailed(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "config_validation_failed")
            }
            GatewayError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            GatewayError::VersionNotFound(_) => (StatusCode::NOT_FOUND, "version_not_found"),
            GatewayError::RollbackUnsupported(_) => {
                (StatusCode::CONFLICT, "rollback_unsupported")
            }
            GatewayError::RouterGroupNotFound(_) => {
                (StatusCode::NOT_FOUND, "router_group_not_found")
            }
            GatewayError::CustomRouterError(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "custom_router_error")
            }
            GatewayError::NoHealthyProvider(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "no_healthy_provider")
            }
            GatewayError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, tag) = self.status_and_tag();
        if matches!(self, GatewayError::Internal(_)) {
            tracing::error!(error = %self, "internal error");
        } else {
            tracing::warn!(error = %self, "request rejected");
        }
        (status, Json(json!({ "error": tag, "message": self.to_string() }))).into_response()
    }
}

impl From<crate::version::VersionError> for GatewayError {
    fn from(err: crate::version::VersionError) -> Self {
        match err {
            crate::version::VersionError::NotFound(id) => GatewayError::VersionNotFound(id),
            crate::version::VersionError::RollbackUnsupported(id) => {
                GatewayError::RollbackUnsupported(id)
            }
        }
    }
}

impl From<crate::router_group::RouterGroupError> for GatewayError {
    fn from(err: crate::router_group::RouterGroupError) -> Self {
        match err {
            crate::router_group::RouterGroupError::NotFound(id) => {
                GatewayError::RouterGroupNotFound(id)
            }
        }
    }
}

impl From<crate::config::ConfigIoError> for GatewayError {
    fn from(err: crate::config::ConfigIoError) -> Self {
        match err {
            crate::config::ConfigIoError::Read { path, .. } => {
                GatewayError::ConfigNotFound(path.display().to_string())
            }
            crate::config::ConfigIoError::Parse { source, .. } => {
                GatewayError::ConfigParseError(source.to_string())
            }
            crate::config::ConfigIoError::Write { path, source } => {
                GatewayError::Internal(anyhow::anyhow!("failed to write {}: {}", path.display(), source))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_maps_to_401() {
        let (status, tag) = GatewayError::Unauthorized.status_and_tag();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(tag, "unauthorized");
    }

    #[test]
    fn validation_failure_maps_to_422() {
        let (status, _) = GatewayError::ConfigValidationFailed("bad router".to_string())
            .status_and_tag();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn no_healthy_provider_maps_to_503() {
        let (status, _) = GatewayError::NoHealthyProvider("p1,m1".to_string()).status_and_tag();
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
