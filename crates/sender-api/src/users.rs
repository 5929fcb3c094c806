use axum::{Extension, Json, extract::State};
use tracing::info;
use uuid::Uuid;

use sender_db::models::timestamp_now;
use sender_types::api::{MessageResponse, SubscriptionQuery, UnlimitedQuery, UserResponse};
use sender_types::models::PlanId;

use crate::error::ApiError;
use crate::extract::{ApiPath, ApiQuery};
use crate::middleware::CurrentUser;
use crate::state::{AppState, with_db};

const USER_LIST_LIMIT: u32 = 1000;

/// GET /users (admin only)
pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let users = with_db(&state, |db| db.list_users(USER_LIST_LIMIT)).await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// PUT /users/{id}/subscription?plan=<id>
pub async fn update_subscription(
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<Uuid>,
    ApiQuery(query): ApiQuery<SubscriptionQuery>,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
) -> Result<Json<MessageResponse>, ApiError> {
    let plan: PlanId = query
        .plan
        .parse()
        .map_err(|_| ApiError::Validation("Invalid subscription plan".into()))?;

    let found = with_db(&state, move |db| db.set_subscription_plan(user_id, plan, timestamp_now())).await?;
    if !found {
        return Err(ApiError::NotFound("User not found"));
    }

    info!("{} set plan of {} to {}", admin.username, user_id, plan);
    Ok(Json(MessageResponse::new("Subscription updated successfully")))
}

/// PUT /users/{id}/unlimited?is_unlimited=<bool>
pub async fn update_unlimited(
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<Uuid>,
    ApiQuery(query): ApiQuery<UnlimitedQuery>,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
) -> Result<Json<MessageResponse>, ApiError> {
    let is_unlimited = query.is_unlimited;
    let found = with_db(&state, move |db| db.set_unlimited(user_id, is_unlimited, timestamp_now())).await?;
    if !found {
        return Err(ApiError::NotFound("User not found"));
    }

    let verb = if is_unlimited { "granted" } else { "revoked" };
    info!("{} {} unlimited access for {}", admin.username, verb, user_id);
    Ok(Json(MessageResponse::new(format!("Unlimited access {verb}"))))
}

/// POST /users/{id}/revoke-tokens: invalidates every outstanding token of the user.
pub async fn revoke_tokens(
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<Uuid>,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
) -> Result<Json<MessageResponse>, ApiError> {
    let epoch = with_db(&state, move |db| db.bump_token_epoch(user_id, timestamp_now()))
        .await?
        .ok_or(ApiError::NotFound("User not found"))?;

    info!("{} revoked tokens of {} (epoch now {})", admin.username, user_id, epoch);
    Ok(Json(MessageResponse::new("Tokens revoked")))
}
