use axum::{middleware, routing::post, Router};

use crate::handlers::auth;
use crate::middleware::auth::auth_middleware;
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/auth/change-password/", post(auth::change_password))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware));

    Router::new()
        .route("/auth/signup/", post(auth::signup))
        .route("/auth/login/", post(auth::login))
        .route("/auth/refresh-token/", post(auth::refresh_token))
        .merge(protected)
}
