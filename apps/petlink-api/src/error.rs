use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::db::store::StoreError;

/// Structured API error returned to clients.
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiErrorBody {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<FieldError>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Application-level error type that converts into an HTTP response.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
    pub details: Option<Vec<FieldError>>,
}

impl ApiError {
    fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "FORBIDDEN", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, "CONFLICT", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }

    pub fn validation(details: Vec<FieldError>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "VALIDATION_ERROR".to_string(),
            message: "Dados inválidos".to_string(),
            details: Some(details),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: ApiErrorDetail {
                code: self.code,
                message: self.message,
                details: self.details,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(what) => Self::conflict(format!("{what} já está em uso")),
            other => {
                tracing::error!(err = %other, "store error");
                Self::internal("Erro interno do servidor")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Credential / identity failures
// ---------------------------------------------------------------------------

/// Why a presented credential could not be accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CredentialDefect {
    #[error("Token expirado")]
    Expired,
    #[error("Token inválido")]
    Malformed,
}

/// Failure while resolving a connection or request to an [`Identity`].
///
/// [`Identity`]: crate::models::user::Identity
#[derive(Debug, thiserror::Error)]
pub enum AuthFailure {
    /// No credential in any of the accepted locations.
    #[error("Token de acesso requerido")]
    Unauthenticated,
    /// Signature, expiry or structure check failed.
    #[error("{0}")]
    InvalidCredential(CredentialDefect),
    /// Credential is valid but its subject no longer exists.
    #[error("Usuário não encontrado")]
    UnknownIdentity,
    #[error("identity lookup failed: {0}")]
    Store(#[from] StoreError),
}

impl AuthFailure {
    /// Short machine-readable reason used in structured logs.
    pub fn reason(&self) -> &'static str {
        match self {
            AuthFailure::Unauthenticated => "unauthenticated",
            AuthFailure::InvalidCredential(CredentialDefect::Expired) => "credential_expired",
            AuthFailure::InvalidCredential(CredentialDefect::Malformed) => "credential_invalid",
            AuthFailure::UnknownIdentity => "unknown_identity",
            AuthFailure::Store(_) => "store_error",
        }
    }
}

impl From<AuthFailure> for ApiError {
    fn from(failure: AuthFailure) -> Self {
        match failure {
            AuthFailure::Store(err) => ApiError::from(err),
            other => ApiError::unauthorized(other.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Conversation join failures
// ---------------------------------------------------------------------------

/// Ack message sent when the caller is not a participant of the conversation.
pub const ACCESS_DENIED_MESSAGE: &str = "Acesso negado à conversa";

/// Ack message sent when the participation lookup itself failed.
pub const JOIN_FAILED_MESSAGE: &str = "Erro ao entrar na conversa";

#[derive(Debug, thiserror::Error)]
pub enum JoinError {
    #[error("Acesso negado à conversa")]
    AccessDenied,
    #[error("participation lookup failed: {0}")]
    Store(#[from] StoreError),
}

impl JoinError {
    /// Message surfaced to the client through the acknowledgment.
    pub fn ack_message(&self) -> &'static str {
        match self {
            JoinError::AccessDenied => ACCESS_DENIED_MESSAGE,
            JoinError::Store(_) => JOIN_FAILED_MESSAGE,
        }
    }
}
