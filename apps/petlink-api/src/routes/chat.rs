//! Conversation and message endpoints.

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::auth::middleware::AuthUser;
use crate::chat::{ChatService, ConversationSubject};
use crate::db::store::{Page, SortOrder};
use crate::error::{ApiError, ApiErrorBody, FieldError};
use crate::models::conversation::{Conversation, ConversationSummary};
use crate::models::message::Message;
use crate::response::{ApiResponse, PaginatedResponse, Pagination};
use crate::AppState;

/// Longest accepted message body, in characters.
pub const MAX_MESSAGE_CHARS: usize = 2000;

const DEFAULT_CONVERSATIONS_LIMIT: i64 = 10;
const DEFAULT_MESSAGES_LIMIT: i64 = 20;
const MAX_PAGE_LIMIT: i64 = 100;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/chat/conversations",
            post(create_conversation).get(list_conversations),
        )
        .route(
            "/chat/conversations/{id}/messages",
            get(list_messages).post(send_message),
        )
}

fn field_error(field: &str, message: &str) -> FieldError {
    FieldError {
        field: field.to_string(),
        message: message.to_string(),
    }
}

fn validate_content(field: &str, content: &str) -> Result<(), ApiError> {
    let chars = content.chars().count();
    if chars == 0 {
        return Err(ApiError::validation(vec![field_error(
            field,
            "Mensagem deve ter pelo menos 1 caractere",
        )]));
    }
    if chars > MAX_MESSAGE_CHARS {
        return Err(ApiError::validation(vec![field_error(
            field,
            "Mensagem muito longa",
        )]));
    }
    Ok(())
}

fn page_from(page: Option<i64>, limit: Option<i64>, default_limit: i64) -> Result<Page, ApiError> {
    let page = page.unwrap_or(1);
    let limit = limit.unwrap_or(default_limit);
    if page < 1 || !(1..=MAX_PAGE_LIMIT).contains(&limit) {
        return Err(ApiError::validation(vec![field_error(
            "page",
            "Page deve ser >= 1 e limit deve estar entre 1 e 100",
        )]));
    }
    Ok(Page::new(page, limit))
}

// ---------------------------------------------------------------------------
// POST /chat/conversations
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateConversationRequest {
    pub pet_id: Option<String>,
    pub adoption_process_id: Option<String>,
    pub initial_message: Option<String>,
}

#[utoipa::path(
    post,
    path = "/chat/conversations",
    tag = "Chat",
    security(("bearer" = [])),
    request_body = CreateConversationRequest,
    responses(
        (status = 200, description = "Conversation ready (created or reused)", body = ApiResponse<Conversation>),
        (status = 400, description = "Validation error or same user on both sides", body = ApiErrorBody),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 404, description = "Pet or adoption process not found", body = ApiErrorBody),
    ),
)]
pub async fn create_conversation(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(body): Json<CreateConversationRequest>,
) -> Result<Json<ApiResponse<Conversation>>, ApiError> {
    let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());

    let subject = match (
        non_empty(body.pet_id),
        non_empty(body.adoption_process_id),
    ) {
        (Some(pet_id), _) => ConversationSubject::Pet(pet_id),
        (None, Some(process_id)) => ConversationSubject::AdoptionProcess(process_id),
        (None, None) => {
            return Err(ApiError::validation(vec![field_error(
                "petId",
                "Informe petId ou adoptionProcessId",
            )]))
        }
    };

    if let Some(content) = body.initial_message.as_deref() {
        validate_content("initialMessage", content)?;
    }

    let service = ChatService::new(state.store.as_ref(), &state.dispatcher);
    let conversation = service
        .create_or_get_conversation(auth.id(), subject, body.initial_message.as_deref())
        .await?;

    Ok(Json(ApiResponse::with_message(conversation, "Conversa pronta")))
}

// ---------------------------------------------------------------------------
// GET /chat/conversations
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ConversationsParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[utoipa::path(
    get,
    path = "/chat/conversations",
    tag = "Chat",
    security(("bearer" = [])),
    params(
        ("page" = Option<i64>, Query, description = "Page number (>= 1, default 1)"),
        ("limit" = Option<i64>, Query, description = "Page size (1-100, default 10)"),
    ),
    responses(
        (status = 200, description = "Caller's conversations, most recent first", body = PaginatedResponse<ConversationSummary>),
        (status = 400, description = "Invalid pagination", body = ApiErrorBody),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
    ),
)]
pub async fn list_conversations(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<ConversationsParams>,
) -> Result<Json<PaginatedResponse<ConversationSummary>>, ApiError> {
    let page = page_from(params.page, params.limit, DEFAULT_CONVERSATIONS_LIMIT)?;

    let service = ChatService::new(state.store.as_ref(), &state.dispatcher);
    let (total, conversations) = service.list_my_conversations(auth.id(), page).await?;

    Ok(Json(
        PaginatedResponse::new(conversations, Pagination::new(page.page, page.limit, total))
            .with_message("Conversas obtidas"),
    ))
}

// ---------------------------------------------------------------------------
// GET /chat/conversations/{id}/messages
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagesParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub sort_order: Option<SortOrder>,
}

#[utoipa::path(
    get,
    path = "/chat/conversations/{id}/messages",
    tag = "Chat",
    security(("bearer" = [])),
    params(
        ("id" = String, Path, description = "Conversation ID"),
        ("page" = Option<i64>, Query, description = "Page number (>= 1, default 1)"),
        ("limit" = Option<i64>, Query, description = "Page size (1-100, default 20)"),
        ("sortOrder" = Option<SortOrder>, Query, description = "`asc` (default) or `desc` by creation time"),
    ),
    responses(
        (status = 200, description = "Messages of the conversation", body = PaginatedResponse<Message>),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 403, description = "Caller is not a participant", body = ApiErrorBody),
    ),
)]
pub async fn list_messages(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
    Query(params): Query<MessagesParams>,
) -> Result<Json<PaginatedResponse<Message>>, ApiError> {
    let page = page_from(params.page, params.limit, DEFAULT_MESSAGES_LIMIT)?;
    let order = params.sort_order.unwrap_or_default();

    let service = ChatService::new(state.store.as_ref(), &state.dispatcher);
    let (total, messages) = service
        .get_messages(&conversation_id, auth.id(), page, order)
        .await?;

    Ok(Json(PaginatedResponse::new(
        messages,
        Pagination::new(page.page, page.limit, total),
    )))
}

// ---------------------------------------------------------------------------
// POST /chat/conversations/{id}/messages
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct SendMessageRequest {
    pub content: Option<String>,
}

#[utoipa::path(
    post,
    path = "/chat/conversations/{id}/messages",
    tag = "Chat",
    security(("bearer" = [])),
    params(
        ("id" = String, Path, description = "Conversation ID"),
    ),
    request_body = SendMessageRequest,
    responses(
        (status = 200, description = "Message stored and broadcast as `message:new`", body = ApiResponse<Message>),
        (status = 400, description = "Validation error", body = ApiErrorBody),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 403, description = "Caller is not a participant", body = ApiErrorBody),
    ),
)]
pub async fn send_message(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
    Json(body): Json<SendMessageRequest>,
) -> Result<Json<ApiResponse<Message>>, ApiError> {
    let content = body.content.unwrap_or_default();
    validate_content("content", &content)?;

    let service = ChatService::new(state.store.as_ref(), &state.dispatcher);
    let message = service
        .send_message(&conversation_id, auth.id(), &content)
        .await?;

    Ok(Json(ApiResponse::with_message(message, "Mensagem enviada")))
}
