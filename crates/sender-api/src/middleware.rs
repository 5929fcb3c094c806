use axum::{
    Extension,
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
    typed_header::TypedHeaderRejection,
};
use tracing::{debug, warn};

use sender_types::models::User;

use crate::error::ApiError;
use crate::state::{AppState, with_db};

/// Identity resolved by `require_auth`, freshly read from the store for this request.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// Resolve the bearer token to a stored user and attach it as `CurrentUser`.
pub async fn require_auth(
    State(state): State<AppState>,
    bearer: Result<TypedHeader<Authorization<Bearer>>, TypedHeaderRejection>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let TypedHeader(Authorization(bearer)) = bearer.map_err(|rejection| {
        if rejection.is_missing() {
            ApiError::Unauthenticated("Not authenticated")
        } else {
            ApiError::Unauthenticated("Invalid authorization header")
        }
    })?;

    let claims = state
        .tokens
        .verify(bearer.token())
        .map_err(|_| ApiError::Unauthenticated("Invalid token"))?;

    let user_id = claims.sub;
    let user = with_db(&state, move |db| db.get_user_by_id(user_id))
        .await?
        .ok_or_else(|| {
            warn!("Token for unknown user {}", user_id);
            ApiError::Unauthenticated("User not found")
        })?;

    if user.token_epoch != claims.epoch {
        debug!(
            "Stale token for user {} (epoch {} != {})",
            user.id, claims.epoch, user.token_epoch
        );
        return Err(ApiError::Unauthenticated("Token has been revoked"));
    }

    req.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(req).await)
}

/// Admin gate. Must run inside `require_auth`.
pub async fn require_admin(
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !user.is_admin() {
        warn!("Non-admin {} denied on {}", user.username, req.uri().path());
        return Err(ApiError::Forbidden);
    }
    Ok(next.run(req).await)
}
