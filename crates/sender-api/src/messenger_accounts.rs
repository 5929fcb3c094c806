use axum::{Extension, Json, extract::State};
use tracing::info;
use uuid::Uuid;

use sender_db::models::timestamp_now;
use sender_types::api::CreateMessengerAccountRequest;
use sender_types::models::{MessengerAccount, MessengerType};

use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::middleware::CurrentUser;
use crate::state::{AppState, with_db};

const ACCOUNT_LIST_LIMIT: u32 = 100;

pub async fn list_accounts(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<Vec<MessengerAccount>>, ApiError> {
    let accounts = with_db(&state, move |db| {
        db.list_messenger_accounts(user.id, ACCOUNT_LIST_LIMIT)
    })
    .await?;
    Ok(Json(accounts))
}

pub async fn create_account(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ApiJson(req): ApiJson<CreateMessengerAccountRequest>,
) -> Result<Json<MessengerAccount>, ApiError> {
    let messenger_type: MessengerType = req
        .messenger_type
        .parse()
        .map_err(|_| ApiError::Validation("Invalid messenger type".into()))?;
    if req.account_name.trim().is_empty() {
        return Err(ApiError::Validation("Account name must not be empty".into()));
    }

    let account = MessengerAccount {
        id: Uuid::new_v4(),
        user_id: user.id,
        messenger_type,
        account_name: req.account_name,
        session_data: req.session_data,
        is_active: true,
        created_at: timestamp_now(),
    };

    let record = account.clone();
    with_db(&state, move |db| db.insert_messenger_account(&record)).await?;

    info!("User {} added {} account {}", user.username, messenger_type, account.id);
    Ok(Json(account))
}
