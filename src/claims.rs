//! Authorization claims bound to a session.
//!
//! Claims are a snapshot of the user record taken when the credential was
//! issued. They can drift from the live record until the session is refreshed.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Role of the account owning a session.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, DeriveActiveEnum,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum Role {
    /// Regular job seeker account.
    #[sea_orm(string_value = "USER")]
    User,
    /// Staff account. Carries no extra rights at the gate.
    #[sea_orm(string_value = "ADMIN")]
    Admin,
}

/// Stored result of the payment provider integration.
///
/// Only [`SubscriptionStatus::Active`] satisfies a subscription requirement.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, DeriveActiveEnum,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum SubscriptionStatus {
    #[sea_orm(string_value = "ACTIVE")]
    Active,
    #[sea_orm(string_value = "INACTIVE")]
    Inactive,
    #[sea_orm(string_value = "TRIALING")]
    Trialing,
    #[sea_orm(string_value = "PAST_DUE")]
    PastDue,
    #[sea_orm(string_value = "CANCELED")]
    Canceled,
}

impl SubscriptionStatus {
    /// Whether the status satisfies [`crate::AccessLevel::Subscribed`].
    pub fn is_active(self) -> bool {
        self == SubscriptionStatus::Active
    }
}

/// Authorization-relevant facts about the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    /// Id of the user owning the session.
    pub user_id: String,
    pub role: Role,
    /// Gates every [`crate::AccessLevel::Verified`] path.
    pub is_email_verified: bool,
    /// Gates every [`crate::AccessLevel::Subscribed`] path.
    pub subscription_status: SubscriptionStatus,
}

impl Claims {
    /// Shorthand for `subscription_status.is_active()`.
    pub fn is_subscribed(&self) -> bool {
        self.subscription_status.is_active()
    }
}
