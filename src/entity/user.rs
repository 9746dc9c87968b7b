//! User entity model. Only the columns the gate depends on are mapped.

use sea_orm::entity::prelude::*;

use crate::claims::{Role, SubscriptionStatus};

/// Sea-ORM entity model for the user table, read when claims are derived.
///
/// # Database Schema
///
/// | Column              | Type               | Description                          |
/// |---------------------|--------------------|--------------------------------------|
/// | id                  | TEXT (Primary Key) | User id                              |
/// | email               | TEXT (Unique)      | Login email                          |
/// | role                | TEXT               | `USER` or `ADMIN`                    |
/// | is_email_verified   | BOOLEAN            | Set once the email link is confirmed |
/// | subscription_status | TEXT               | `ACTIVE`, `INACTIVE`, `TRIALING`, …  |
/// | created_at          | TIMESTAMPTZ        | Sign-up time                         |
/// | updated_at          | TIMESTAMPTZ        | Last change                          |
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub id: String,
    #[sea_orm(column_type = "Text", unique)]
    pub email: String,
    pub role: Role,
    pub is_email_verified: bool,
    /// Written by the payment integration; the gate only reads it.
    pub subscription_status: SubscriptionStatus,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::session::Entity")]
    Session,
}

impl Related<super::session::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Session.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
