use axum::{Extension, Json, extract::State};
use uuid::Uuid;

use sender_db::models::timestamp_now;
use sender_types::api::CreateContactRequest;
use sender_types::models::Contact;

use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::middleware::CurrentUser;
use crate::state::{AppState, with_db};

const CONTACT_LIST_LIMIT: u32 = 1000;

pub async fn list_contacts(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<Vec<Contact>>, ApiError> {
    let contacts = with_db(&state, move |db| db.list_contacts(user.id, CONTACT_LIST_LIMIT)).await?;
    Ok(Json(contacts))
}

pub async fn create_contact(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ApiJson(req): ApiJson<CreateContactRequest>,
) -> Result<Json<Contact>, ApiError> {
    if req.name.trim().is_empty() {
        return Err(ApiError::Validation("Contact name must not be empty".into()));
    }

    let contact = Contact {
        id: Uuid::new_v4(),
        user_id: user.id,
        name: req.name,
        phone: blank_to_none(req.phone),
        telegram_username: blank_to_none(req.telegram_username),
        created_at: timestamp_now(),
    };

    let record = contact.clone();
    with_db(&state, move |db| db.insert_contact(&record)).await?;
    Ok(Json(contact))
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
