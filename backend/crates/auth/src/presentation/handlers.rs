//! HTTP Handlers

use std::sync::Arc;

use axum::Json;
use axum::extract::{Extension, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use chrono::Utc;
use platform::client::extract_bearer_token;
use serde_json::json;

use crate::application::{
    AuthServices, AuthenticateUseCase, AuthenticatedUser, LoginInput, LoginUseCase, LogoutInput,
    LogoutUseCase, ProfileUseCase, RefreshInput, RefreshUseCase, RegisterInput, RegisterUseCase,
    TokenCheck,
};
use crate::domain::AuthStore;
use crate::domain::value_object::user_role::UserRole;
use crate::error::AuthResult;
use crate::presentation::dto::{
    ApiResponse, AuthResponse, LoginRequest, MessageResponse, RefreshRequest, RegisterRequest,
    TokenResponse, UserResponse,
};
use crate::presentation::extract::{AuthJson, ClientContext};

/// Shared state for auth handlers
#[derive(Clone)]
pub struct AuthAppState<R>
where
    R: AuthStore,
{
    pub repo: Arc<R>,
    pub services: AuthServices,
}

// ============================================================================
// Register
// ============================================================================

/// POST /auth/register
pub async fn register<R>(
    State(state): State<AuthAppState<R>>,
    ClientContext(client): ClientContext,
    AuthJson(req): AuthJson<RegisterRequest>,
) -> AuthResult<impl IntoResponse>
where
    R: AuthStore,
{
    let use_case = RegisterUseCase::new(state.repo.clone(), state.services.clone());

    let output = use_case
        .execute(RegisterInput {
            email: req.email,
            password: req.password,
            full_name: req.full_name,
            phone_number: req.phone_number,
            country_code: req.country_code,
            client,
        })
        .await?;

    let user = UserResponse::new(&output.user, &[UserRole::default()]);

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(AuthResponse::new(user, output.tokens))),
    ))
}

// ============================================================================
// Login
// ============================================================================

/// POST /auth/login
pub async fn login<R>(
    State(state): State<AuthAppState<R>>,
    ClientContext(client): ClientContext,
    AuthJson(req): AuthJson<LoginRequest>,
) -> AuthResult<Json<ApiResponse<AuthResponse>>>
where
    R: AuthStore,
{
    let use_case = LoginUseCase::new(state.repo.clone(), state.repo.clone(), state.services.clone());

    let output = use_case
        .execute(LoginInput {
            email: req.email,
            password: req.password,
            client,
        })
        .await?;

    let user = UserResponse::new(&output.user, &output.roles);

    Ok(Json(ApiResponse::ok(AuthResponse::new(user, output.tokens))))
}

// ============================================================================
// Refresh
// ============================================================================

/// POST /auth/refresh
pub async fn refresh<R>(
    State(state): State<AuthAppState<R>>,
    AuthJson(req): AuthJson<RefreshRequest>,
) -> AuthResult<Json<ApiResponse<TokenResponse>>>
where
    R: AuthStore,
{
    let use_case =
        RefreshUseCase::new(state.repo.clone(), state.repo.clone(), state.services.clone());

    let tokens = use_case
        .execute(RefreshInput {
            refresh_token: req.refresh_token,
        })
        .await?;

    Ok(Json(ApiResponse::ok(tokens.into())))
}

// ============================================================================
// Logout
// ============================================================================

/// POST /auth/logout
///
/// A token that is already revoked still logs out successfully.
pub async fn logout<R>(
    State(state): State<AuthAppState<R>>,
    ClientContext(client): ClientContext,
    headers: HeaderMap,
) -> AuthResult<Json<MessageResponse>>
where
    R: AuthStore,
{
    let token = extract_bearer_token(&headers);

    let check = AuthenticateUseCase::new(state.repo.clone(), state.services.clone())
        .check(token)
        .await?;
    let user_id = match check {
        TokenCheck::Live(user) => Some(user.user_id),
        TokenCheck::Revoked => None,
    };

    LogoutUseCase::new(state.repo.clone(), state.repo.clone(), state.services.clone())
        .execute(LogoutInput {
            access_token: token.map(str::to_string),
            user_id,
            client,
        })
        .await?;

    Ok(Json(MessageResponse::new("Logged out successfully")))
}

// ============================================================================
// Profile (requires authentication)
// ============================================================================

/// GET /auth/profile
pub async fn profile<R>(
    State(state): State<AuthAppState<R>>,
    Extension(caller): Extension<AuthenticatedUser>,
) -> AuthResult<Json<ApiResponse<UserResponse>>>
where
    R: AuthStore,
{
    let output = ProfileUseCase::new(state.repo.clone())
        .execute(&caller.user_id)
        .await?;

    Ok(Json(ApiResponse::ok(UserResponse::new(
        &output.user,
        &output.roles,
    ))))
}

// ============================================================================
// Health
// ============================================================================

/// GET /health
pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "auth-service",
        "timestamp": Utc::now(),
    }))
}
