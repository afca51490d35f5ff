use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::auth::repo_types::{AccessLevel, AuthToken, User};
use crate::todos::repo_types::{Todo, TodoPatch};

pub mod memory;
pub mod postgres;
#[cfg(test)]
pub mod testing;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("duplicate {0}")]
    Conflict(&'static str),
    #[error("user {0} does not exist")]
    MissingUser(Uuid),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Users and their session tokens.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    /// Fails with [`StoreError::Conflict`] when the email is taken.
    async fn insert(&self, user: &User) -> StoreResult<()>;
    /// Overwrites email and password hash of an existing user.
    async fn save(&self, user: &User) -> StoreResult<()>;
    async fn push_token(&self, user_id: Uuid, token: &AuthToken) -> StoreResult<()>;
    /// Returns the user only if it still holds the given token.
    async fn find_by_token(
        &self,
        user_id: Uuid,
        access: AccessLevel,
        token: &str,
    ) -> StoreResult<Option<User>>;
    /// Removes the exact `(access, token)` record; no-op when absent.
    async fn remove_token(&self, user_id: Uuid, access: AccessLevel, token: &str)
        -> StoreResult<()>;
}

/// Todos, always addressed through their creator.
#[async_trait]
pub trait TodoStore: Send + Sync {
    async fn insert(&self, todo: &Todo) -> StoreResult<()>;
    async fn list_by_creator(&self, creator_id: Uuid) -> StoreResult<Vec<Todo>>;
    async fn find_one(&self, id: Uuid, creator_id: Uuid) -> StoreResult<Option<Todo>>;
    async fn remove(&self, id: Uuid, creator_id: Uuid) -> StoreResult<Option<Todo>>;
    async fn update(
        &self,
        id: Uuid,
        creator_id: Uuid,
        patch: &TodoPatch,
    ) -> StoreResult<Option<Todo>>;
}
