//! Session token minting and verification (HS256 JWT).

use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, AuthFailure, CredentialDefect};

/// Claims carried by a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub iat: i64,
    pub exp: i64,
}

/// Mint a session token for `user_id`, valid for `ttl_secs` seconds.
pub fn mint_session_token(secret: &str, user_id: &str, ttl_secs: i64) -> Result<String, ApiError> {
    let now = Utc::now().timestamp();
    let claims = SessionClaims {
        user_id: user_id.to_string(),
        iat: now,
        exp: now + ttl_secs,
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| {
        tracing::error!(?e, "session token signing failed");
        ApiError::internal("Erro interno do servidor")
    })
}

/// Verify signature and expiry of a session token and return its claims.
pub fn verify_session_token(secret: &str, token: &str) -> Result<SessionClaims, AuthFailure> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation.set_required_spec_claims(&["exp"]);

    jsonwebtoken::decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| {
        let defect = match e.kind() {
            ErrorKind::ExpiredSignature => CredentialDefect::Expired,
            _ => CredentialDefect::Malformed,
        };
        tracing::debug!(?e, "session token rejected");
        AuthFailure::InvalidCredential(defect)
    })
}
