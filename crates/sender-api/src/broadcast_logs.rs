use axum::{Extension, Json, extract::State};

use sender_types::models::BroadcastLog;

use crate::error::ApiError;
use crate::middleware::CurrentUser;
use crate::state::{AppState, with_db};

const LOG_LIST_LIMIT: u32 = 100;

/// GET /broadcast-logs. Nothing in this service writes logs.
pub async fn list_logs(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<Vec<BroadcastLog>>, ApiError> {
    let logs = with_db(&state, move |db| db.list_broadcast_logs(user.id, LOG_LIST_LIMIT)).await?;
    Ok(Json(logs))
}
