//! Session entity model for Sea-ORM database interaction.

use sea_orm::entity::prelude::*;

/// Sea-ORM entity model representing an issued session.
///
/// # Database Schema
///
/// | Column      | Type                    | Description                               |
/// |-------------|-------------------------|-------------------------------------------|
/// | id          | TEXT (Primary Key)      | Session token id, embedded in credentials |
/// | user_id     | TEXT                    | Owning user                               |
/// | claims      | BYTEA                   | MessagePack claims snapshot               |
/// | expires_at  | TIMESTAMPTZ             | Absolute expiry                           |
/// | created_at  | TIMESTAMPTZ             | Issue time                                |
/// | updated_at  | TIMESTAMPTZ             | Last refresh                              |
/// | revoked_at  | TIMESTAMPTZ NULL        | Set on logout                             |
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "session")]
pub struct Model {
    /// Session token id, the `sid` of every credential for this session.
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub id: String,

    /// Foreign key to [`super::user::Model::id`].
    #[sea_orm(column_type = "Text", indexed)]
    pub user_id: String,

    /// MessagePack-serialized [`crate::Claims`] the current credential carries.
    pub claims: Vec<u8>,

    /// Absolute expiry. Moved forward by a refresh, never past a revocation.
    pub expires_at: DateTimeWithTimeZone,

    pub created_at: DateTimeWithTimeZone,

    /// Time of the last refresh or revocation.
    pub updated_at: DateTimeWithTimeZone,

    /// Set once on logout. A non-null value makes the session permanently invalid.
    pub revoked_at: Option<DateTimeWithTimeZone>,
}

/// Each session belongs to one user.
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
