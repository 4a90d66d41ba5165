//! Bearer-token auth for the Control API (spec §6.1): requests bearing the
//! configured `APIKEY` get Full access; requests with no key at all get Restricted
//! access to the handful of endpoints that allow it; anything else is rejected.

use crate::error::GatewayError;
use crate::state::AppState;
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessLevel {
    Restricted,
    Read,
    Full,
}

pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, GatewayError> {
    let configured_key = state.router.snapshot().config.api_key.clone();

    let access = match (&configured_key, bearer_token(&request)) {
        (None, _) => AccessLevel::Full,
        (Some(expected), Some(presented)) if constant_time_eq(expected, &presented) => {
            AccessLevel::Full
        }
        (Some(_), None) => AccessLevel::Restricted,
        (Some(_), Some(_)) => return Err(GatewayError::Unauthorized),
    };

    request.extensions_mut().insert(access);
    Ok(next.run(request).await)
}

fn bearer_token(request: &Request) -> Option<String> {
    request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|v| v.to_string())
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    let a = a.as_bytes();
    let b = b.as_bytes();
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

pub fn require_level(access: AccessLevel, minimum: AccessLevel) -> Result<(), GatewayError> {
    let rank = |level: AccessLevel| match level {
        AccessLevel::Restricted => 0,
        AccessLevel::Read => 1,
        AccessLevel::Full => 2,
    };
    if rank(access) >= rank(minimum) {
        Ok(())
    } else {
        Err(GatewayError::Forbidden)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_time_eq_matches_equal_strings() {
        assert!(constant_time_eq("secret", "secret"));
    }

    #[test]
    fn constant_time_eq_rejects_mismatched_strings() {
        assert!(!constant_time_eq("secret", "wrong"));
        assert!(!constant_time_eq("secret", "secre"));
    }

    #[test]
    fn require_level_allows_equal_or_higher() {
        assert!(require_level(AccessLevel::Full, AccessLevel::Read).is_ok());
        assert!(require_level(AccessLevel::Read, AccessLevel::Read).is_ok());
    }

    #[test]
    fn require_level_rejects_lower() {
        assert!(require_level(AccessLevel::Restricted, AccessLevel::Read).is_err());
    }
}
