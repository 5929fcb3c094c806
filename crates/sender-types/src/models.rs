use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Returned when a role/plan/messenger/status string is not one of the known values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownVariant {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

// -- Role --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            other => Err(UnknownVariant::new("role", other)),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// -- Subscription plans --

/// Subscription tier key. Order of declaration is tier order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanId {
    #[default]
    Free,
    Basic,
    Professional,
    Corporate,
    Unlimited,
}

impl PlanId {
    pub const ALL: [PlanId; 5] = [
        Self::Free,
        Self::Basic,
        Self::Professional,
        Self::Corporate,
        Self::Unlimited,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Basic => "basic",
            Self::Professional => "professional",
            Self::Corporate => "corporate",
            Self::Unlimited => "unlimited",
        }
    }
}

impl FromStr for PlanId {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|plan| plan.as_str() == s)
            .ok_or_else(|| UnknownVariant::new("subscription plan", s))
    }
}

impl fmt::Display for PlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sentinel quota meaning "no monthly limit".
pub const UNLIMITED_MESSAGES: i64 = -1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionPlan {
    pub name: String,
    pub message_limit: i64,
    pub price: i64,
}

// -- Messengers --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessengerType {
    Telegram,
    Whatsapp,
}

impl MessengerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Telegram => "telegram",
            Self::Whatsapp => "whatsapp",
        }
    }
}

impl FromStr for MessengerType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "telegram" => Ok(Self::Telegram),
            "whatsapp" => Ok(Self::Whatsapp),
            other => Err(UnknownVariant::new("messenger type", other)),
        }
    }
}

impl fmt::Display for MessengerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// -- Broadcasts --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BroadcastStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl BroadcastStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl FromStr for BroadcastStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(UnknownVariant::new("broadcast status", other)),
        }
    }
}

impl fmt::Display for BroadcastStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// -- Entities --

/// Full user record. The password hash never leaves the server; see `api::UserResponse`.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    pub subscription_plan: PlanId,
    pub is_unlimited: bool,
    pub messages_sent_this_month: i64,
    pub token_epoch: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessengerAccount {
    pub id: Uuid,
    pub user_id: Uuid,
    pub messenger_type: MessengerType,
    pub account_name: String,
    pub session_data: serde_json::Map<String, serde_json::Value>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub phone: Option<String>,
    pub telegram_username: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Outcome record of a broadcast run. Nothing in this service writes one yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BroadcastLog {
    pub id: Uuid,
    pub user_id: Uuid,
    pub messenger_type: MessengerType,
    pub total_contacts: i64,
    pub successful_sends: i64,
    pub failed_sends: i64,
    pub status: BroadcastStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_ids_parse_in_tier_order() {
        let parsed: Vec<PlanId> = ["free", "basic", "professional", "corporate", "unlimited"]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();
        assert_eq!(parsed, PlanId::ALL.to_vec());
        assert!(PlanId::Free < PlanId::Unlimited);
    }

    #[test]
    fn unknown_plan_is_rejected() {
        let err = "platinum".parse::<PlanId>().unwrap_err();
        assert_eq!(err.value, "platinum");
        assert_eq!(err.to_string(), "unknown subscription plan: platinum");
    }

    #[test]
    fn parsing_is_case_sensitive() {
        assert!("Telegram".parse::<MessengerType>().is_err());
        assert!("ADMIN".parse::<Role>().is_err());
    }

    #[test]
    fn serde_uses_wire_names() {
        assert_eq!(
            serde_json::to_value(BroadcastStatus::InProgress).unwrap(),
            serde_json::json!("in_progress")
        );
        assert_eq!(
            serde_json::from_value::<MessengerType>(serde_json::json!("whatsapp")).unwrap(),
            MessengerType::Whatsapp
        );
        assert_eq!(serde_json::to_value(Role::Admin).unwrap(), serde_json::json!("admin"));
    }

    #[test]
    fn display_matches_as_str() {
        for plan in PlanId::ALL {
            assert_eq!(plan.to_string(), plan.as_str());
        }
        assert_eq!(BroadcastStatus::Completed.to_string(), "completed");
    }
}
