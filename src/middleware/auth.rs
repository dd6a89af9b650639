use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::errors::AppError;
use crate::models::user::UserRecord;
use crate::state::AppState;

/// The authenticated user, inserted into request extensions by [`auth_middleware`].
#[derive(Debug, Clone)]
pub struct CurrentUser(pub UserRecord);

pub async fn auth_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))
        .ok_or(AppError::Unauthorized)?;

    let claims = state.tokens.decode_access(token)?;

    let user = state
        .users
        .find_by_id(&claims.user_id)
        .await?
        .filter(UserRecord::can_authenticate)
        .ok_or(AppError::Unauthorized)?;

    request.extensions_mut().insert(CurrentUser(user));

    Ok(next.run(request).await)
}
