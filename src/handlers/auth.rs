use axum::{extract::State, http::StatusCode, response::Json, Extension};
use validator::Validate;

use crate::dtos::auth_dtos::{
    ChangePasswordRequest, ChangePasswordResponse, LoginRequest, RefreshRequest, SignUpRequest,
};
use crate::errors::{AppError, Result};
use crate::middleware::auth::CurrentUser;
use crate::models::user::{AccessToken, SignupResponse, TokenPair};
use crate::state::AppState;

pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignUpRequest>,
) -> Result<(StatusCode, Json<SignupResponse>)> {
    payload.validate()?;
    if !payload.passwords_match() {
        return Err(AppError::invalid_data("passwords do not match"));
    }

    let user = state
        .users
        .create_user(&payload.email, &payload.name, &payload.password)
        .await?;
    let token = state.tokens.issue_pair(&user)?;

    tracing::info!("New account {}", user.id);

    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            id: user.id,
            name: user.name,
            email: user.email,
            token,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<TokenPair>> {
    payload.validate()?;

    let user = state
        .users
        .find_by_email(&payload.email)
        .await?
        .filter(|user| user.can_authenticate())
        .ok_or(AppError::AuthError)?;

    if !state.users.verify_password(&user, &payload.password) {
        return Err(AppError::AuthError);
    }

    if let Err(e) = state.users.touch_last_login(&user.id).await {
        tracing::warn!("Failed to record login for user {}: {}", user.id, e);
    }

    Ok(Json(state.tokens.issue_pair(&user)?))
}

pub async fn refresh_token(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<AccessToken>> {
    Ok(Json(state.tokens.refresh(&payload.refresh)?))
}

pub async fn change_password(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<(StatusCode, Json<ChangePasswordResponse>)> {
    payload.validate()?;

    state
        .password_reset()
        .change_password(&user, &payload.old_password, &payload.new_password)
        .await?;

    Ok((StatusCode::CREATED, Json(ChangePasswordResponse::default())))
}
