use axum::{
    extract::{Path, Query, State},
    response::Json,
    Extension,
};
use validator::Validate;

use crate::dtos::user_dtos::{UpdateUserRequest, UserQuery};
use crate::errors::{AppError, Result};
use crate::middleware::auth::CurrentUser;
use crate::models::page::Page;
use crate::models::user::{UserRecord, UserResponse, UserUpdate};
use crate::state::AppState;

// Non-admins only ever read their own record.
fn visible_to(viewer: &UserRecord, id: &str) -> bool {
    viewer.is_admin() || viewer.id == id
}

pub async fn list_users(
    State(state): State<AppState>,
    Extension(CurrentUser(viewer)): Extension<CurrentUser>,
    Query(query): Query<UserQuery>,
) -> Result<Json<Page<UserResponse>>> {
    let owner_id = (!viewer.is_admin()).then(|| viewer.id.clone());
    let (filter, page) = query.into_parts(owner_id);

    let users = state.users.list(&filter, page).await?;
    Ok(Json(users.map(|user| UserResponse::from(&user))))
}

pub async fn me(Extension(CurrentUser(viewer)): Extension<CurrentUser>) -> Json<UserResponse> {
    Json(UserResponse::from(&viewer))
}

pub async fn get_user(
    State(state): State<AppState>,
    Extension(CurrentUser(viewer)): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<UserResponse>> {
    if !visible_to(&viewer, &id) {
        return Err(AppError::DocumentNotFound);
    }

    let user = state
        .users
        .find_by_id(&id)
        .await?
        .ok_or(AppError::DocumentNotFound)?;

    Ok(Json(UserResponse::from(&user)))
}

/// Handles both PATCH and PUT; absent fields are left unchanged.
pub async fn update_user(
    State(state): State<AppState>,
    Extension(CurrentUser(viewer)): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>> {
    // profiles are only ever edited by their owner, admins included
    if viewer.id != id {
        return Err(AppError::DocumentNotFound);
    }
    payload.validate()?;

    let update = UserUpdate::from(payload);
    let user = if update.is_empty() {
        state.users.find_by_id(&id).await?
    } else {
        state.users.update_profile(&id, &update).await?
    }
    .ok_or(AppError::DocumentNotFound)?;

    tracing::info!("Updated profile of user {}", user.id);
    Ok(Json(UserResponse::from(&user)))
}
