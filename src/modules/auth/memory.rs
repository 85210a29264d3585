use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::interface::{AuthError, Result, UserStore};
use super::model::{UserRecord, UserUpdate};

#[derive(Default)]
struct Tables {
    users: HashMap<String, UserRecord>,
    // email -> id
    by_email: HashMap<String, String>,
}

/// User store held in process memory. Used when no database is configured
/// and by the test suite.
///
/// Each update runs under the write lock, which gives the single-record
/// atomicity `UserStore` promises.
#[derive(Default)]
pub struct InMemoryUserStore {
    tables: RwLock<Tables>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.tables.read().await.users.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let tables = self.tables.read().await;
        Ok(tables
            .by_email
            .get(&email.to_lowercase())
            .and_then(|id| tables.users.get(id))
            .cloned())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<UserRecord>> {
        Ok(self.tables.read().await.users.get(id).cloned())
    }

    async fn insert(&self, user: &UserRecord) -> Result<()> {
        let mut tables = self.tables.write().await;
        let email_key = user.email.to_lowercase();

        if tables.by_email.contains_key(&email_key) || tables.users.contains_key(&user.id) {
            return Err(AuthError::EmailAlreadyExists);
        }

        tables.by_email.insert(email_key, user.id.clone());
        tables.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn update(&self, id: &str, changes: &UserUpdate) -> Result<()> {
        let mut tables = self.tables.write().await;
        let user = tables.users.get_mut(id).ok_or(AuthError::UserNotFound)?;
        changes.apply(user);
        Ok(())
    }
}
