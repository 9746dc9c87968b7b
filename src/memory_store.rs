//! In-process store for tests, demos and single-node deployments.

use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::store::{new_session_token, SessionRecord, SessionStore, UserDirectory, UserRecord};

/// [`SessionStore`] and [`UserDirectory`] over two locked maps.
#[derive(Debug, Default)]
pub struct MemoryStore {
    sessions: RwLock<HashMap<String, SessionRecord>>,
    users: RwLock<HashMap<String, UserRecord>>,
}

impl MemoryStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a user record.
    pub async fn put_user(&self, user: UserRecord) {
        self.users.write().await.insert(user.id.clone(), user);
    }

    /// Number of session rows held, expired and revoked ones included.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn create(&self, record: &mut SessionRecord) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().await;
        while sessions.contains_key(&record.token) {
            record.token = new_session_token();
        }
        sessions.insert(record.token.clone(), record.clone());
        Ok(())
    }

    async fn save(&self, record: &SessionRecord) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().await;
        let revoked_at = sessions
            .get(&record.token)
            .and_then(|stored| stored.revoked_at)
            .or(record.revoked_at);
        sessions.insert(
            record.token.clone(),
            SessionRecord {
                revoked_at,
                ..record.clone()
            },
        );
        Ok(())
    }

    async fn renew(&self, record: &SessionRecord) -> Result<bool, StoreError> {
        let now = OffsetDateTime::now_utc();
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(&record.token) {
            Some(stored) if stored.is_valid_at(now) => {
                stored.claims = record.claims.clone();
                stored.expires_at = record.expires_at;
                stored.updated_at = record.updated_at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn load(&self, token: &str) -> Result<Option<SessionRecord>, StoreError> {
        let now = OffsetDateTime::now_utc();
        Ok(self
            .sessions
            .read()
            .await
            .get(token)
            .filter(|record| record.is_valid_at(now))
            .cloned())
    }

    async fn revoke(&self, token: &str, at: OffsetDateTime) -> Result<(), StoreError> {
        if let Some(record) = self.sessions.write().await.get_mut(token) {
            if record.revoked_at.is_none() {
                record.revoked_at = Some(at);
                record.updated_at = at;
            }
        }
        Ok(())
    }

    async fn delete_expired(&self) -> Result<u64, StoreError> {
        let now = OffsetDateTime::now_utc();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, record| record.expires_at > now);
        Ok((before - sessions.len()) as u64)
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn find_user(&self, user_id: &str) -> Result<Option<UserRecord>, StoreError> {
        Ok(self.users.read().await.get(user_id).cloned())
    }
}
