use axum::{http::Method, response::Json, routing::get, Router};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub mod auth;
pub mod auth_otp_routes;
pub mod users;

pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .merge(auth::routes(state.clone()))
        .merge(auth_otp_routes::auth_otp_routes())
        .merge(users::user_routes(state.clone()));

    let mut router = Router::new()
        .route("/health", get(health_check))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http());

    if state.config.cors_allow_all_origins {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::OPTIONS,
            ])
            .allow_headers(Any)
            .allow_credentials(false);
        router = router.layer(cors);
    }

    router.with_state(state)
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
