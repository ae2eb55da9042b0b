//! Authenticated-user extractor for REST handlers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::auth::credentials;
use crate::error::ApiError;
use crate::models::user::Identity;
use crate::AppState;

/// Caller resolved from a bearer header or the session cookie.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub identity: Identity,
}

impl AuthUser {
    pub fn id(&self) -> &str {
        &self.identity.id
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let identity =
            credentials::authenticate(state.store.as_ref(), &state.config, None, &parts.headers)
                .await
                .map_err(|failure| {
                    tracing::debug!(reason = failure.reason(), "request authentication failed");
                    ApiError::from(failure)
                })?;

        Ok(AuthUser { identity })
    }
}
