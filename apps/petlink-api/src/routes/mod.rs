pub mod auth;
pub mod chat;
pub mod health;

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::config::Config;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(crate::gateway::server::router())
        .merge(auth::router())
        .merge(chat::router())
}

/// CORS for REST and the socket upgrade. Credentials are allowed so the
/// session cookie travels cross-origin, which rules out wildcard origins.
pub fn cors(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins()
        .iter()
        .map(|origin| HeaderValue::from_static(origin))
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        // Health
        health::health,
        // Auth
        auth::register,
        auth::login,
        auth::logout,
        auth::me,
        // Chat
        chat::create_conversation,
        chat::list_conversations,
        chat::list_messages,
        chat::send_message,
    ),
    components(
        schemas(
            // Error types
            crate::error::ApiErrorBody,
            crate::error::ApiErrorDetail,
            crate::error::FieldError,
            // Envelope
            crate::response::Pagination,
            // Models
            crate::models::user::Identity,
            crate::models::user::UserResponse,
            crate::models::conversation::Conversation,
            crate::models::conversation::Participant,
            crate::models::conversation::ConversationSummary,
            crate::models::conversation::ParticipantProfile,
            crate::models::message::Message,
            crate::db::store::SortOrder,
            // Route request/response types
            health::HealthResponse,
            auth::RegisterRequest,
            auth::LoginRequest,
            auth::LoginResponse,
            chat::CreateConversationRequest,
            chat::SendMessageRequest,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check"),
        (name = "Auth", description = "Accounts and session cookies"),
        (name = "Chat", description = "Tutor/adopter conversations. New messages and conversations are also pushed over `GET /socket` as `message:new` and `conversation:new`"),
    )
)]
pub struct ApiDoc;
