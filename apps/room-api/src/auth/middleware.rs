//! Caller extraction for REST handlers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::auth::identity;
use crate::error::ApiError;
use crate::models::user::User;
use crate::AppState;

/// The authenticated caller, from `Authorization: Bearer <jwt>` or the legacy
/// `X-User-ID` header.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
}

impl AuthUser {
    pub fn id(&self) -> &str {
        &self.user.id
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let credentials = identity::header_credentials(&parts.headers);
        let user =
            identity::resolve_user(&credentials, &state.config, state.stores.users.as_ref()).await?;
        Ok(AuthUser { user })
    }
}
