use axum::{Extension, Json, extract::State};
use tracing::{info, warn};
use uuid::Uuid;
use validator::ValidateEmail;

use sender_db::InsertOutcome;
use sender_db::models::timestamp_now;
use sender_types::api::{LoginRequest, LoginResponse, RegisterRequest, UserResponse};
use sender_types::models::{PlanId, Role, User};

use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::middleware::CurrentUser;
use crate::password::{hash_password, verify_password_or_dummy};
use crate::state::{AppState, blocking, with_db};

const USERNAME_MIN: usize = 3;
const USERNAME_MAX: usize = 32;
const PASSWORD_MIN: usize = 8;

pub async fn register(
    State(state): State<AppState>,
    ApiJson(mut req): ApiJson<RegisterRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    req.email = normalize_email(&req.email);
    validate_registration(&req)?;

    let (email, username) = (req.email.clone(), req.username.clone());
    if with_db(&state, move |db| db.user_exists(&email, &username)).await? {
        return Err(ApiError::Validation("User already exists".into()));
    }

    let password = req.password;
    let password_hash = blocking(move || hash_password(&password)).await??;

    let now = timestamp_now();
    let user = User {
        id: Uuid::new_v4(),
        email: req.email,
        username: req.username,
        password_hash,
        role: Role::User,
        subscription_plan: PlanId::Free,
        is_unlimited: false,
        messages_sent_this_month: 0,
        token_epoch: 0,
        created_at: now,
        updated_at: now,
    };

    let record = user.clone();
    match with_db(&state, move |db| db.insert_user(&record)).await? {
        InsertOutcome::Inserted => {}
        // Lost a race with a concurrent registration for the same email/username
        InsertOutcome::Duplicate => return Err(ApiError::Validation("User already exists".into())),
    }

    info!("Registered user {} ({})", user.username, user.id);
    Ok(Json(user.into()))
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let email = normalize_email(&req.email);
    let user = with_db(&state, move |db| db.get_user_by_email(&email)).await?;

    let digest = user.as_ref().map(|u| u.password_hash.clone());
    let password = req.password;
    let valid = blocking(move || verify_password_or_dummy(&password, digest.as_deref())).await?;
    let user = match user {
        Some(user) if valid => user,
        Some(user) => {
            warn!("Failed login for {}", user.email);
            return Err(ApiError::InvalidCredentials);
        }
        None => return Err(ApiError::InvalidCredentials),
    };

    let access_token = state.tokens.issue(user.id, user.token_epoch)?;

    info!("User {} logged in", user.username);
    Ok(Json(LoginResponse {
        access_token,
        token_type: "bearer".to_string(),
        user: user.into(),
    }))
}

pub async fn me(Extension(CurrentUser(user)): Extension<CurrentUser>) -> Json<UserResponse> {
    Json(user.into())
}

fn validate_registration(req: &RegisterRequest) -> Result<(), ApiError> {
    if !is_plausible_email(&req.email) {
        return Err(ApiError::Validation("Invalid email address".into()));
    }
    let name_len = req.username.chars().count();
    if !(USERNAME_MIN..=USERNAME_MAX).contains(&name_len) {
        return Err(ApiError::Validation(format!(
            "Username must be {USERNAME_MIN}-{USERNAME_MAX} characters"
        )));
    }
    if req.password.chars().count() < PASSWORD_MIN {
        return Err(ApiError::Validation(format!(
            "Password must be at least {PASSWORD_MIN} characters"
        )));
    }
    Ok(())
}

/// Domains are case-insensitive; the local part is kept as typed.
pub(crate) fn normalize_email(email: &str) -> String {
    match email.rsplit_once('@') {
        Some((local, domain)) => format!("{local}@{}", domain.to_lowercase()),
        None => email.to_string(),
    }
}

/// RFC shape check plus a dotted domain; deliverability is not our concern.
fn is_plausible_email(email: &str) -> bool {
    email.validate_email()
        && email
            .rsplit_once('@')
            .is_some_and(|(_, domain)| domain.contains('.'))
}
