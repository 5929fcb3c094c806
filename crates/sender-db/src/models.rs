//! Database row types. These map directly to SQLite rows and are kept
//! distinct from the `sender-types` models so the schema can drift from the wire format.

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};

use sender_types::models::{
    BroadcastLog, Contact, MessengerAccount, SubscriptionPlan, Template, User,
};

pub struct UserRow {
    pub id: String,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub role: String,
    pub subscription_plan: String,
    pub is_unlimited: bool,
    pub messages_sent_this_month: i64,
    pub token_epoch: i64,
    pub created_at: String,
    pub updated_at: String,
}

pub struct MessengerAccountRow {
    pub id: String,
    pub user_id: String,
    pub messenger_type: String,
    pub account_name: String,
    pub session_data: String,
    pub is_active: bool,
    pub created_at: String,
}

pub struct TemplateRow {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub content: String,
    pub created_at: String,
}

pub struct ContactRow {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub phone: Option<String>,
    pub telegram_username: Option<String>,
    pub created_at: String,
}

pub struct BroadcastLogRow {
    pub id: String,
    pub user_id: String,
    pub messenger_type: String,
    pub total_contacts: i64,
    pub successful_sends: i64,
    pub failed_sends: i64,
    pub status: String,
    pub created_at: String,
    pub completed_at: Option<String>,
}

pub struct PlanRow {
    pub id: String,
    pub name: String,
    pub message_limit: i64,
    pub price: i64,
    pub version: i64,
}

/// Current time at the precision the store keeps (microseconds).
pub fn timestamp_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Fixed-width RFC 3339 so that lexical order in SQLite equals time order.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // Rows written by hand through the sqlite shell use datetime('now').
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .with_context(|| format!("corrupt timestamp '{}'", raw))
}

impl TryFrom<UserRow> for User {
    type Error = anyhow::Error;

    fn try_from(row: UserRow) -> Result<Self> {
        Ok(User {
            id: row.id.parse().with_context(|| format!("corrupt user id '{}'", row.id))?,
            role: row.role.parse()?,
            subscription_plan: row.subscription_plan.parse()?,
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
            email: row.email,
            username: row.username,
            password_hash: row.password_hash,
            is_unlimited: row.is_unlimited,
            messages_sent_this_month: row.messages_sent_this_month,
            token_epoch: row.token_epoch,
        })
    }
}

impl TryFrom<MessengerAccountRow> for MessengerAccount {
    type Error = anyhow::Error;

    fn try_from(row: MessengerAccountRow) -> Result<Self> {
        Ok(MessengerAccount {
            id: row.id.parse()?,
            user_id: row.user_id.parse()?,
            messenger_type: row.messenger_type.parse()?,
            session_data: serde_json::from_str(&row.session_data)
                .with_context(|| format!("corrupt session_data on account '{}'", row.id))?,
            created_at: parse_timestamp(&row.created_at)?,
            account_name: row.account_name,
            is_active: row.is_active,
        })
    }
}

impl TryFrom<TemplateRow> for Template {
    type Error = anyhow::Error;

    fn try_from(row: TemplateRow) -> Result<Self> {
        Ok(Template {
            id: row.id.parse()?,
            user_id: row.user_id.parse()?,
            created_at: parse_timestamp(&row.created_at)?,
            name: row.name,
            content: row.content,
        })
    }
}

impl TryFrom<ContactRow> for Contact {
    type Error = anyhow::Error;

    fn try_from(row: ContactRow) -> Result<Self> {
        Ok(Contact {
            id: row.id.parse()?,
            user_id: row.user_id.parse()?,
            created_at: parse_timestamp(&row.created_at)?,
            name: row.name,
            phone: row.phone,
            telegram_username: row.telegram_username,
        })
    }
}

impl TryFrom<BroadcastLogRow> for BroadcastLog {
    type Error = anyhow::Error;

    fn try_from(row: BroadcastLogRow) -> Result<Self> {
        Ok(BroadcastLog {
            id: row.id.parse()?,
            user_id: row.user_id.parse()?,
            messenger_type: row.messenger_type.parse()?,
            status: row.status.parse()?,
            created_at: parse_timestamp(&row.created_at)?,
            completed_at: row.completed_at.as_deref().map(parse_timestamp).transpose()?,
            total_contacts: row.total_contacts,
            successful_sends: row.successful_sends,
            failed_sends: row.failed_sends,
        })
    }
}

impl From<PlanRow> for SubscriptionPlan {
    fn from(row: PlanRow) -> Self {
        SubscriptionPlan {
            name: row.name,
            message_limit: row.message_limit,
            price: row.price,
        }
    }
}
