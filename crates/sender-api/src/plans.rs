use axum::{Extension, Json, extract::State};
use tracing::{info, warn};

use sender_types::api::{MessageResponse, PlanCatalog, PlanPriceQuery};
use sender_types::models::PlanId;

use crate::error::ApiError;
use crate::extract::{ApiPath, ApiQuery};
use crate::middleware::CurrentUser;
use crate::state::{AppState, with_db};

/// How many times a price update re-reads the plan after losing a compare-and-set.
const PRICE_UPDATE_ATTEMPTS: usize = 3;

enum PriceUpdate {
    Updated { old: i64 },
    Missing,
    Contended,
}

/// GET /subscription-plans
pub async fn list_plans(State(state): State<AppState>) -> Result<Json<PlanCatalog>, ApiError> {
    let plans = with_db(&state, |db| db.list_plans()).await?;
    Ok(Json(plans.into_iter().collect()))
}

/// PUT /subscription-plans/{id}?price=<int>
pub async fn update_plan_price(
    State(state): State<AppState>,
    ApiPath(plan_id): ApiPath<String>,
    ApiQuery(query): ApiQuery<PlanPriceQuery>,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
) -> Result<Json<MessageResponse>, ApiError> {
    let plan: PlanId = plan_id
        .parse()
        .map_err(|_| ApiError::Validation("Invalid plan ID".into()))?;
    if query.price < 0 {
        return Err(ApiError::Validation("Price must not be negative".into()));
    }

    let price = query.price;
    let outcome = with_db(&state, move |db| {
        for _ in 0..PRICE_UPDATE_ATTEMPTS {
            let Some(current) = db.get_plan(plan)? else {
                return Ok(PriceUpdate::Missing);
            };
            if db.compare_and_set_plan_price(plan, current.version, price)? {
                return Ok(PriceUpdate::Updated { old: current.price });
            }
        }
        Ok(PriceUpdate::Contended)
    })
    .await?;

    match outcome {
        PriceUpdate::Updated { old } => {
            info!("{} changed price of {} from {} to {}", admin.username, plan, old, price);
            Ok(Json(MessageResponse::new("Plan updated successfully")))
        }
        PriceUpdate::Missing => Err(ApiError::Validation("Invalid plan ID".into())),
        PriceUpdate::Contended => {
            warn!("Price update for {} kept losing to concurrent writers", plan);
            Err(ApiError::Conflict("Plan was modified concurrently, retry"))
        }
    }
}
