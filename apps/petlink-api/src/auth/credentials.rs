//! Credential extraction and identity resolution shared by REST and the
//! realtime gateway.
//!
//! A credential is looked up in priority order: the handshake auth field
//! (`?token=` on the upgrade request), then `Authorization: Bearer`, then
//! the `token` cookie (optionally `s:`-signed). Empty values count as absent.

use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::HeaderMap;

use crate::auth::cookie;
use crate::auth::tokens;
use crate::config::Config;
use crate::db::store::ChatStore;
use crate::error::AuthFailure;
use crate::models::user::Identity;

/// Where a credential was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    AuthField,
    BearerHeader,
    Cookie,
}

impl CredentialSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialSource::AuthField => "auth_field",
            CredentialSource::BearerHeader => "bearer_header",
            CredentialSource::Cookie => "cookie",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentedCredential {
    pub token: String,
    pub source: CredentialSource,
}

/// Outcome of probing every credential location.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialProbe {
    /// The highest-priority usable credential, if any.
    pub credential: Option<PresentedCredential>,
    pub has_auth_field: bool,
    pub has_bearer: bool,
    pub has_cookie: bool,
    /// A signed cookie was present but its signature did not verify.
    pub bad_cookie_signature: bool,
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Probe all credential locations and pick the first present one.
pub fn extract_credential(
    auth_field: Option<&str>,
    headers: &HeaderMap,
    cookie_secret: &str,
) -> CredentialProbe {
    let auth_field = non_empty(auth_field);

    let bearer = non_empty(
        headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer ")),
    );

    let session_cookie = headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(|header| cookie::read_session_cookie(header, cookie_secret))
        .find(|c| c.present)
        .unwrap_or_default();

    let credential = auth_field
        .map(|t| (t.to_string(), CredentialSource::AuthField))
        .or_else(|| bearer.map(|t| (t.to_string(), CredentialSource::BearerHeader)))
        .or_else(|| {
            session_cookie
                .token
                .clone()
                .map(|t| (t, CredentialSource::Cookie))
        })
        .map(|(token, source)| PresentedCredential { token, source });

    CredentialProbe {
        credential,
        has_auth_field: auth_field.is_some(),
        has_bearer: bearer.is_some(),
        has_cookie: session_cookie.present,
        bad_cookie_signature: session_cookie.signed && session_cookie.token.is_none(),
    }
}

/// Resolve the caller's [`Identity`] from whichever credential it presented.
pub async fn authenticate(
    store: &dyn ChatStore,
    config: &Config,
    auth_field: Option<&str>,
    headers: &HeaderMap,
) -> Result<Identity, AuthFailure> {
    let probe = extract_credential(auth_field, headers, &config.cookie_secret);

    let Some(credential) = probe.credential else {
        tracing::debug!(
            has_cookie = probe.has_cookie,
            bad_cookie_signature = probe.bad_cookie_signature,
            "no usable credential presented"
        );
        return Err(AuthFailure::Unauthenticated);
    };

    let claims = tokens::verify_session_token(&config.jwt_secret, &credential.token)?;

    let identity = store
        .find_identity(&claims.user_id)
        .await?
        .ok_or(AuthFailure::UnknownIdentity)?;

    tracing::debug!(
        user_id = %identity.id,
        source = credential.source.as_str(),
        "credential accepted"
    );
    Ok(identity)
}
