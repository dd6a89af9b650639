use axum::{extract::State, Json};
use validator::Validate;

use crate::dtos::auth_dtos::{
    ForgotPasswordRequest, ForgotPasswordResponse, ResetPasswordRequest, ResetPasswordResponse,
};
use crate::errors::Result;
use crate::state::AppState;

// Request a reset code by email
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(req): Json<ForgotPasswordRequest>,
) -> Result<Json<ForgotPasswordResponse>> {
    req.validate()?;

    let response = state.password_reset().request_reset(&req.email).await?;
    Ok(Json(response))
}

// Exchange token + code for a new password
pub async fn reset_password(
    State(state): State<AppState>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<Json<ResetPasswordResponse>> {
    req.validate()?;

    state
        .password_reset()
        .reset_password(&req.token, &req.code, &req.password)
        .await?;

    Ok(Json(ResetPasswordResponse {
        message: "Password set succesfully".to_string(),
    }))
}
