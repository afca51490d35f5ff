use async_trait::async_trait;
use uuid::Uuid;

use super::{MemoryStore, StoreError, StoreResult, UserStore};
use crate::auth::repo_types::{AccessLevel, AuthToken, User};

/// Memory-backed user store whose token lookup and token removal can be
/// switched to fail as if the database connection were gone.
#[derive(Default)]
pub struct BrokenTokenStore {
    inner: MemoryStore,
    pub fail_lookup: bool,
    pub fail_remove: bool,
}

impl BrokenTokenStore {
    pub fn failing_lookup() -> Self {
        Self {
            fail_lookup: true,
            ..Self::default()
        }
    }

    pub fn failing_remove() -> Self {
        Self {
            fail_remove: true,
            ..Self::default()
        }
    }
}

fn unavailable() -> StoreError {
    StoreError::Database(sqlx::Error::PoolTimedOut)
}

#[async_trait]
impl UserStore for BrokenTokenStore {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        self.inner.find_by_id(id).await
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        self.inner.find_by_email(email).await
    }

    async fn insert(&self, user: &User) -> StoreResult<()> {
        UserStore::insert(&self.inner, user).await
    }

    async fn save(&self, user: &User) -> StoreResult<()> {
        self.inner.save(user).await
    }

    async fn push_token(&self, user_id: Uuid, token: &AuthToken) -> StoreResult<()> {
        self.inner.push_token(user_id, token).await
    }

    async fn find_by_token(
        &self,
        user_id: Uuid,
        access: AccessLevel,
        token: &str,
    ) -> StoreResult<Option<User>> {
        if self.fail_lookup {
            return Err(unavailable());
        }
        self.inner.find_by_token(user_id, access, token).await
    }

    async fn remove_token(
        &self,
        user_id: Uuid,
        access: AccessLevel,
        token: &str,
    ) -> StoreResult<()> {
        if self.fail_remove {
            return Err(unavailable());
        }
        self.inner.remove_token(user_id, access, token).await
    }
}
