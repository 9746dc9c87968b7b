//! Process-owned database handle with lazy, single-flight connection.

use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use tokio::sync::OnceCell;
use tracing::info;

/// Owns the database connection for the lifetime of the process.
///
/// The first caller of [`Connector::connection`] opens the pool; concurrent
/// first callers wait on that same attempt instead of racing their own. A
/// failed attempt leaves the handle unconnected so the next caller retries.
#[derive(Debug)]
pub struct Connector {
    options: Option<ConnectOptions>,
    conn: OnceCell<DatabaseConnection>,
}

impl Connector {
    /// A handle that connects on first use.
    pub fn lazy(options: ConnectOptions) -> Self {
        Self {
            options: Some(options),
            conn: OnceCell::new(),
        }
    }

    /// A handle around an already established connection.
    pub fn ready(conn: DatabaseConnection) -> Self {
        Self {
            options: None,
            conn: OnceCell::new_with(Some(conn)),
        }
    }

    /// Pool settings for `database_url`.
    pub fn options(database_url: impl Into<String>) -> ConnectOptions {
        let mut opt = ConnectOptions::new(database_url.into());
        opt.max_connections(10)
            .min_connections(1)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(10 * 60))
            .max_lifetime(Duration::from_secs(30 * 60))
            .sqlx_logging(false);
        opt
    }

    /// Whether a connection has been established.
    pub fn is_connected(&self) -> bool {
        self.conn.initialized()
    }

    /// Returns the shared connection, connecting first if needed.
    pub async fn connection(&self) -> Result<&DatabaseConnection, DbErr> {
        self.conn
            .get_or_try_init(|| async {
                let options = self
                    .options
                    .clone()
                    .ok_or_else(|| DbErr::Custom("no connection options configured".into()))?;
                info!("connecting to database");
                Database::connect(options).await
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn memory() -> Connector {
        let mut opt = ConnectOptions::new("sqlite::memory:");
        opt.max_connections(1);
        Connector::lazy(opt)
    }

    #[tokio::test]
    async fn connects_once_for_concurrent_callers() {
        let connector = Arc::new(memory());
        assert!(!connector.is_connected());

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let connector = connector.clone();
                tokio::spawn(async move { connector.connection().await.map(|_| ()) })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert!(connector.is_connected());
        let first = connector.connection().await.unwrap() as *const DatabaseConnection;
        let second = connector.connection().await.unwrap() as *const DatabaseConnection;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn failed_connects_can_be_retried() {
        let mut opt = ConnectOptions::new("not-a-database://nowhere");
        opt.connect_timeout(Duration::from_millis(50));
        let connector = Connector::lazy(opt);

        assert!(connector.connection().await.is_err());
        assert!(!connector.is_connected());
        assert!(connector.connection().await.is_err());
    }
}
