use axum::{Extension, Json, extract::State};
use uuid::Uuid;

use sender_db::models::timestamp_now;
use sender_types::api::CreateTemplateRequest;
use sender_types::models::Template;

use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::middleware::CurrentUser;
use crate::state::{AppState, with_db};

const TEMPLATE_LIST_LIMIT: u32 = 100;

pub async fn list_templates(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<Vec<Template>>, ApiError> {
    let templates = with_db(&state, move |db| db.list_templates(user.id, TEMPLATE_LIST_LIMIT)).await?;
    Ok(Json(templates))
}

pub async fn create_template(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ApiJson(req): ApiJson<CreateTemplateRequest>,
) -> Result<Json<Template>, ApiError> {
    if req.name.trim().is_empty() {
        return Err(ApiError::Validation("Template name must not be empty".into()));
    }

    let template = Template {
        id: Uuid::new_v4(),
        user_id: user.id,
        name: req.name,
        content: req.content,
        created_at: timestamp_now(),
    };

    let record = template.clone();
    with_db(&state, move |db| db.insert_template(&record)).await?;
    Ok(Json(template))
}
