use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{PlanId, Role, SubscriptionPlan, User};

// -- JWT Claims --

/// Bearer token claims. `epoch` must match the user's current token epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub epoch: i64,
    pub iat: usize,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub user: UserResponse,
}

/// Public view of a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub role: Role,
    pub subscription_plan: PlanId,
    pub is_unlimited: bool,
    pub messages_sent_this_month: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            username: user.username,
            role: user.role,
            subscription_plan: user.subscription_plan,
            is_unlimited: user.is_unlimited,
            messages_sent_this_month: user.messages_sent_this_month,
            created_at: user.created_at,
        }
    }
}

// -- Admin --

#[derive(Debug, Deserialize)]
pub struct SubscriptionQuery {
    pub plan: String,
}

#[derive(Debug, Deserialize)]
pub struct UnlimitedQuery {
    #[serde(deserialize_with = "deserialize_query_bool")]
    pub is_unlimited: bool,
}

/// Query-string boolean. Accepts `true/false`, `1/0`, `yes/no`, `on/off` in any case.
fn deserialize_query_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_query_bool(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid boolean: {raw}")))
}

fn parse_query_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
pub struct PlanPriceQuery {
    pub price: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// `plan_id -> plan` keyed in tier order.
pub type PlanCatalog = BTreeMap<PlanId, SubscriptionPlan>;

// -- Per-user resources --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateMessengerAccountRequest {
    pub messenger_type: String,
    pub account_name: String,
    #[serde(default)]
    pub session_data: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateTemplateRequest {
    pub name: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateContactRequest {
    pub name: String,
    pub phone: Option<String>,
    pub telegram_username: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_bool_accepts_common_spellings() {
        assert_eq!(parse_query_bool("True"), Some(true));
        assert_eq!(parse_query_bool("0"), Some(false));
        assert_eq!(parse_query_bool("OFF"), Some(false));
        assert_eq!(parse_query_bool("maybe"), None);
    }

    #[test]
    fn plan_catalog_serializes_as_object_in_tier_order() {
        let mut catalog = PlanCatalog::new();
        for (plan, price) in [(PlanId::Unlimited, 0), (PlanId::Free, 0), (PlanId::Basic, 999)] {
            catalog.insert(
                plan,
                SubscriptionPlan {
                    name: plan.as_str().to_string(),
                    message_limit: 1,
                    price,
                },
            );
        }

        let json = serde_json::to_string(&catalog).unwrap();
        let free = json.find("\"free\"").unwrap();
        let basic = json.find("\"basic\"").unwrap();
        let unlimited = json.find("\"unlimited\"").unwrap();
        assert!(free < basic && basic < unlimited);
    }

    #[test]
    fn unknown_register_fields_are_rejected() {
        let res = serde_json::from_str::<RegisterRequest>(
            r#"{"email":"a@x.com","username":"alice","password":"pw123456","role":"admin"}"#,
        );
        assert!(res.is_err());
    }
}
