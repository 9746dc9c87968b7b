//! Schema migrations for the session and user tables.

pub use sea_orm_migration::prelude::*;

mod m20240101_000001_create_user_table;
mod m20240101_000002_create_session_table;

/// Creates the `users` and `session` tables.
///
/// ```no_run
/// use jobai_access_gate::migration::{Migrator, MigratorTrait};
///
/// # async fn run(conn: &sea_orm::DatabaseConnection) -> Result<(), sea_orm::DbErr> {
/// Migrator::up(conn, None).await?;
/// # Ok(())
/// # }
/// ```
pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    // Own migration table so the host application's migrator is unaffected
    fn migration_table_name() -> sea_orm::DynIden {
        Alias::new("jobai_access_gate_migrations").into_iden()
    }

    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_user_table::Migration),
            Box::new(m20240101_000002_create_session_table::Migration),
        ]
    }
}
