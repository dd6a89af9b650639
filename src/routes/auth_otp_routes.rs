use axum::{routing::post, Router};

use crate::{handlers::auth_otp, state::AppState};

pub fn auth_otp_routes() -> Router<AppState> {
    Router::new()
        // Mail a reset code
        .route("/auth/forget-password/", post(auth_otp::forgot_password))
        // Set a new password with token + code
        .route("/auth/reset-password/", post(auth_otp::reset_password))
}
