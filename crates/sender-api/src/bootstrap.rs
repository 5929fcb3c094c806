use anyhow::Result;
use tracing::{info, warn};
use uuid::Uuid;

use sender_db::models::timestamp_now;
use sender_db::{Database, InsertOutcome};
use sender_types::models::{PlanId, Role, User};

use crate::auth::normalize_email;
use crate::password::hash_password;

pub const DEFAULT_ADMIN_EMAIL: &str = "admin@sender.app";
pub const DEFAULT_ADMIN_USERNAME: &str = "admin";
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin123";

/// Credentials for the first admin account.
#[derive(Debug, Clone)]
pub struct AdminSeed {
    pub email: String,
    pub username: String,
    pub password: String,
}

impl Default for AdminSeed {
    fn default() -> Self {
        Self {
            email: DEFAULT_ADMIN_EMAIL.to_string(),
            username: DEFAULT_ADMIN_USERNAME.to_string(),
            password: DEFAULT_ADMIN_PASSWORD.to_string(),
        }
    }
}

/// Create the admin account if no admin exists yet. Returns true if one was created.
///
/// Blocking: call from `spawn_blocking` or before the runtime starts serving.
pub fn ensure_admin(db: &Database, seed: &AdminSeed) -> Result<bool> {
    if db.admin_exists()? {
        return Ok(false);
    }

    let now = timestamp_now();
    let admin = User {
        id: Uuid::new_v4(),
        email: normalize_email(&seed.email),
        username: seed.username.clone(),
        password_hash: hash_password(&seed.password)?,
        role: Role::Admin,
        subscription_plan: PlanId::Unlimited,
        is_unlimited: true,
        messages_sent_this_month: 0,
        token_epoch: 0,
        created_at: now,
        updated_at: now,
    };

    match db.insert_user(&admin)? {
        InsertOutcome::Inserted => {}
        InsertOutcome::Duplicate => anyhow::bail!(
            "cannot create admin: email {} or username {} is taken by a regular user",
            seed.email,
            seed.username
        ),
    }

    info!("Admin user created: {}", seed.email);
    if seed.password == DEFAULT_ADMIN_PASSWORD {
        warn!("Admin account uses the default password; change SENDER_ADMIN_PASSWORD");
    }
    Ok(true)
}
