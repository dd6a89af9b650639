use axum::{middleware, routing::get, Router};

use crate::handlers::users::{get_user, list_users, me, update_user};
use crate::middleware::auth::auth_middleware;
use crate::state::AppState;

pub fn user_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/users/", get(list_users))
        .route("/users/me/", get(me))
        .route("/users/:id/", get(get_user).patch(update_user).put(update_user))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}
