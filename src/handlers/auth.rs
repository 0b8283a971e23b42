use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use garde::Validate;
use serde::{Deserialize, Serialize};

use crate::{
    error::{AppError, Result},
    extract::AppJson,
    middleware_layer::auth::bearer_token,
    models::user::{AuthUser, User},
    state::AppState,
    validation::{
        auth::{validate_login_field, validate_password, validate_username},
        validate_request, ValidationRules,
    },
};

/// The request payload for user registration.
#[derive(Deserialize, Validate)]
#[garde(context(ValidationRules))]
pub struct RegisterRequest {
    #[garde(custom(validate_username))]
    pub username: String,
    #[garde(email, length(max = 255))]
    pub email: String,
    #[garde(custom(validate_password))]
    pub password: String,
}

/// The request payload for user login.
#[derive(Deserialize, Validate)]
#[garde(context(ValidationRules))]
pub struct LoginRequest {
    #[garde(custom(validate_login_field))]
    pub username: String,
    #[garde(custom(validate_login_field))]
    pub password: String,
}

#[derive(Serialize)]
pub struct UserResponse {
    pub user: User,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

/// Handles user registration.
pub async fn register(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RegisterRequest>,
) -> Result<impl IntoResponse> {
    tracing::info!("📝 Register attempt: {}", payload.username);
    validate_request(&payload, &state.config.validation)?;

    let RegisterRequest {
        username,
        email,
        password,
    } = payload;

    let user = state.sessions.register(&username, &email, password).await?;

    tracing::info!("✅ User registered: {}", user.id);
    Ok((StatusCode::CREATED, Json(UserResponse { user })))
}

/// Handles user login.
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<impl IntoResponse> {
    tracing::info!("🔐 Login attempt: {}", payload.username);
    validate_request(&payload, &state.config.validation)
        .map_err(|_| AppError::Authentication("Invalid username or password".to_string()))?;

    let LoginRequest { username, password } = payload;
    let issued = state.sessions.login(&username, password).await?;

    Ok((StatusCode::OK, Json(issued)))
}

/// Handles user logout.
///
/// Revoking a token that is already gone still answers 200.
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Result<impl IntoResponse> {
    let token = bearer_token(&headers)
        .ok_or_else(|| AppError::Validation("Missing bearer token".to_string()))?;

    match state.sessions.logout(token).await {
        Ok(()) | Err(AppError::NotFound) => {}
        Err(e) => return Err(e),
    }

    Ok((
        StatusCode::OK,
        Json(MessageResponse {
            success: true,
            message: "Logout successful".to_string(),
        }),
    ))
}

/// Returns the authenticated user's profile.
pub async fn profile(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse> {
    let user = state.sessions.profile(user.id).await?;
    Ok(Json(UserResponse { user }))
}
