//! Resolving the calling user from request credentials.
//!
//! Tokens are issued elsewhere; this module only verifies them. Credentials
//! are tried in order and the first one naming an existing user wins, so a
//! stale bearer token still falls back to the legacy user header.

use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::ApiError;
use crate::models::user::User;
use crate::store::{StoreError, UserStore};

pub const LEGACY_USER_HEADER: &str = "x-user-id";

/// Bearer token claims. Only `sub` is required; `exp` is checked when present.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

/// One way the caller may have identified themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Credential<'a> {
    Token(&'a str),
    LegacyUserId(&'a str),
}

/// Query parameters accepted on the WebSocket route, where browsers cannot
/// set headers.
#[derive(Debug, Default, Deserialize)]
pub struct WsCredentials {
    pub token: Option<String>,
    pub user_id: Option<String>,
}

/// Verify an HS256 token and return its subject.
pub fn verify_token(token: &str, secret: &str) -> Option<String> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_required_spec_claims(&["sub"]);

    match jsonwebtoken::decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation) {
        Ok(data) if !data.claims.sub.is_empty() => Some(data.claims.sub),
        Ok(_) => None,
        Err(err) => {
            tracing::debug!(?err, "bearer token rejected");
            None
        }
    }
}

/// Credentials carried by request headers: the bearer token first, then the
/// legacy user header.
pub fn header_credentials(headers: &HeaderMap) -> Vec<Credential<'_>> {
    let mut found = Vec::new();
    if let Some(token) = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
    {
        found.push(Credential::Token(token));
    }
    if let Some(user_id) = headers
        .get(LEGACY_USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        found.push(Credential::LegacyUserId(user_id));
    }
    found
}

/// Credentials for a WebSocket upgrade: `Authorization`, then `?token=`,
/// then `?user_id=`, then `X-User-ID`.
pub fn ws_credentials<'a>(headers: &'a HeaderMap, query: &'a WsCredentials) -> Vec<Credential<'a>> {
    let from_headers = header_credentials(headers);
    let mut found: Vec<Credential<'a>> = from_headers
        .iter()
        .copied()
        .filter(|c| matches!(c, Credential::Token(_)))
        .collect();
    if let Some(token) = query.token.as_deref().filter(|t| !t.is_empty()) {
        found.push(Credential::Token(token));
    }
    if let Some(user_id) = query.user_id.as_deref().filter(|u| !u.is_empty()) {
        found.push(Credential::LegacyUserId(user_id));
    }
    found.extend(
        from_headers
            .into_iter()
            .filter(|c| matches!(c, Credential::LegacyUserId(_))),
    );
    found
}

/// Map credentials to a user id the configuration allows, without touching
/// storage.
pub fn claimed_user_id(credential: Credential<'_>, config: &Config) -> Option<String> {
    match credential {
        Credential::Token(token) => config
            .jwt_secret
            .as_deref()
            .and_then(|secret| verify_token(token, secret)),
        Credential::LegacyUserId(user_id) => config
            .allow_legacy_user_header
            .then(|| user_id.to_string()),
    }
}

/// Resolve the first credential that names an existing user.
pub async fn resolve_user(
    credentials: &[Credential<'_>],
    config: &Config,
    users: &dyn UserStore,
) -> Result<User, ApiError> {
    for credential in credentials {
        let Some(user_id) = claimed_user_id(*credential, config) else {
            continue;
        };
        match users.get_user(&user_id).await {
            Ok(user) => return Ok(user),
            Err(StoreError::NotFound) => {
                tracing::debug!(user_id = %user_id, "credential names unknown user");
            }
            Err(err) => return Err(err.into()),
        }
    }
    Err(ApiError::unauthorized("Authentication required"))
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;
    use jsonwebtoken::{EncodingKey, Header};

    use super::*;

    const SECRET: &str = "test-secret";

    fn token(sub: &str, exp: Option<i64>, secret: &str) -> String {
        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &Claims {
                sub: sub.to_string(),
                exp,
            },
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn config(secret: Option<&str>, legacy: bool) -> Config {
        Config {
            jwt_secret: secret.map(str::to_string),
            allow_legacy_user_header: legacy,
            ..Config::default()
        }
    }

    #[test]
    fn valid_token_yields_subject() {
        let t = token("usr_1", None, SECRET);
        assert_eq!(verify_token(&t, SECRET).as_deref(), Some("usr_1"));
    }

    #[test]
    fn wrong_secret_or_expired_token_is_rejected() {
        assert!(verify_token(&token("usr_1", None, "other"), SECRET).is_none());
        let expired = chrono::Utc::now().timestamp() - 3600;
        assert!(verify_token(&token("usr_1", Some(expired), SECRET), SECRET).is_none());
        assert!(verify_token("not-a-jwt", SECRET).is_none());
    }

    #[test]
    fn headers_yield_bearer_then_legacy() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        headers.insert(LEGACY_USER_HEADER, HeaderValue::from_static(" usr_9 "));
        assert_eq!(
            header_credentials(&headers),
            vec![Credential::Token("abc"), Credential::LegacyUserId("usr_9")]
        );
    }

    #[test]
    fn ws_query_sits_between_bearer_and_header() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer h"));
        headers.insert(LEGACY_USER_HEADER, HeaderValue::from_static("usr_h"));
        let query = WsCredentials {
            token: Some("q".into()),
            user_id: Some("usr_q".into()),
        };
        assert_eq!(
            ws_credentials(&headers, &query),
            vec![
                Credential::Token("h"),
                Credential::Token("q"),
                Credential::LegacyUserId("usr_q"),
                Credential::LegacyUserId("usr_h"),
            ]
        );
    }

    #[test]
    fn configuration_gates_each_credential_kind() {
        let t = token("usr_1", None, SECRET);
        let no_secret = config(None, true);
        assert_eq!(claimed_user_id(Credential::Token(&t), &no_secret), None);
        assert_eq!(
            claimed_user_id(Credential::LegacyUserId("usr_2"), &no_secret).as_deref(),
            Some("usr_2")
        );

        let strict = config(Some(SECRET), false);
        assert_eq!(claimed_user_id(Credential::Token(&t), &strict).as_deref(), Some("usr_1"));
        assert_eq!(claimed_user_id(Credential::LegacyUserId("usr_2"), &strict), None);
    }
}
