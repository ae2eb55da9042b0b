//! Account routes: register, login, logout, current user.

use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::middleware::AuthUser;
use crate::auth::password::{self, INVALID_CREDENTIALS_MESSAGE};
use crate::auth::{cookie, tokens};
use crate::error::{ApiError, ApiErrorBody, FieldError};
use crate::models::user::{Identity, UserResponse};
use crate::response::ApiResponse;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
}

fn field_error(field: &str, message: &str) -> FieldError {
    FieldError {
        field: field.to_string(),
        message: message.to_string(),
    }
}

fn set_cookie_header(value: String) -> Result<HeaderMap, ApiError> {
    let mut headers = HeaderMap::new();
    let value = HeaderValue::from_str(&value).map_err(|e| {
        tracing::error!(?e, "invalid Set-Cookie value");
        ApiError::internal("Erro interno do servidor")
    })?;
    headers.insert(SET_COOKIE, value);
    Ok(headers)
}

// ---------------------------------------------------------------------------
// POST /auth/register
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub email: Option<String>,
    pub name: Option<String>,
    pub password: Option<String>,
}

#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "Auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = ApiResponse<UserResponse>),
        (status = 400, description = "Validation error", body = ApiErrorBody),
        (status = 409, description = "Email already in use", body = ApiErrorBody),
    ),
)]
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<UserResponse>>), ApiError> {
    let email = body.email.as_deref().map(str::trim).unwrap_or_default();
    let name = body.name.as_deref().map(str::trim).filter(|n| !n.is_empty());
    let password = body.password.as_deref().unwrap_or_default();

    let mut errors = Vec::new();
    if email.is_empty() || !email.contains('@') {
        errors.push(field_error("email", "Email inválido"));
    }
    if name.is_some_and(|n| n.chars().count() < 2) {
        errors.push(field_error("name", "Nome deve ter pelo menos 2 caracteres"));
    }
    if password.chars().count() < 6 {
        errors.push(field_error("password", "Senha deve ter pelo menos 6 caracteres"));
    }
    if !errors.is_empty() {
        return Err(ApiError::validation(errors));
    }

    let email = email.to_lowercase();
    let password_hash = password::hash_password(password)?;
    let user = state.store.create_user(&email, name, &password_hash).await?;

    tracing::info!(user_id = %user.id, "user registered");

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            UserResponse::from(user),
            "Usuário criado com sucesso",
        )),
    ))
}

// ---------------------------------------------------------------------------
// POST /auth/login
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub user: UserResponse,
    pub token: String,
}

#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful; sets the signed `token` cookie", body = ApiResponse<LoginResponse>),
        (status = 401, description = "Invalid credentials", body = ApiErrorBody),
    ),
)]
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<(HeaderMap, Json<ApiResponse<LoginResponse>>), ApiError> {
    let (Some(email), Some(password)) = (body.email.as_deref(), body.password.as_deref()) else {
        return Err(ApiError::unauthorized(INVALID_CREDENTIALS_MESSAGE));
    };

    let user = state
        .store
        .find_user_by_email(&email.trim().to_lowercase())
        .await?
        .ok_or_else(|| ApiError::unauthorized(INVALID_CREDENTIALS_MESSAGE))?;

    password::verify_password(password, &user.password_hash)?;

    let token = tokens::mint_session_token(
        &state.config.jwt_secret,
        &user.id,
        state.config.session_ttl_secs,
    )?;

    let headers = set_cookie_header(cookie::session_set_cookie(
        &token,
        &state.config.cookie_secret,
        state.config.is_production(),
        state.config.session_ttl_secs,
    ))?;

    tracing::info!(user_id = %user.id, "user logged in");

    Ok((
        headers,
        Json(ApiResponse::with_message(
            LoginResponse {
                user: UserResponse::from(user),
                token,
            },
            "Login realizado com sucesso",
        )),
    ))
}

// ---------------------------------------------------------------------------
// POST /auth/logout
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "Auth",
    responses(
        (status = 200, description = "Session cookie cleared"),
    ),
)]
pub async fn logout(
    State(state): State<AppState>,
) -> Result<(HeaderMap, Json<ApiResponse<()>>), ApiError> {
    let headers = set_cookie_header(cookie::session_clear_cookie(state.config.is_production()))?;
    Ok((
        headers,
        Json(ApiResponse::with_message((), "Logout realizado com sucesso")),
    ))
}

// ---------------------------------------------------------------------------
// GET /auth/me
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "Auth",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Current user", body = ApiResponse<Identity>),
        (status = 401, description = "Missing or invalid credential", body = ApiErrorBody),
    ),
)]
pub async fn me(auth: AuthUser) -> Json<ApiResponse<Identity>> {
    Json(ApiResponse::with_message(
        auth.identity,
        "Perfil obtido com sucesso",
    ))
}
