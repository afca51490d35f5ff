use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{StoreError, StoreResult, TodoStore, UserStore};
use crate::auth::repo_types::{AccessLevel, AuthToken, User};
use crate::todos::repo_types::{Todo, TodoPatch};

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, User>,
    tokens: HashMap<Uuid, Vec<AuthToken>>,
    todos: HashMap<Uuid, Todo>,
}

/// In-process store used by tests and by local runs without a database.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub async fn tokens_of(&self, user_id: Uuid) -> Vec<AuthToken> {
        let inner = self.inner.read().await;
        inner.tokens.get(&user_id).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner.users.values().find(|u| u.email == email).cloned())
    }

    async fn insert(&self, user: &User) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if inner.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict("email"));
        }
        inner.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn save(&self, user: &User) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if inner
            .users
            .values()
            .any(|u| u.id != user.id && u.email == user.email)
        {
            return Err(StoreError::Conflict("email"));
        }
        let stored = inner
            .users
            .get_mut(&user.id)
            .ok_or(StoreError::MissingUser(user.id))?;
        stored.email = user.email.clone();
        stored.password_hash = user.password_hash.clone();
        Ok(())
    }

    async fn push_token(&self, user_id: Uuid, token: &AuthToken) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if !inner.users.contains_key(&user_id) {
            return Err(StoreError::MissingUser(user_id));
        }
        inner.tokens.entry(user_id).or_default().push(token.clone());
        Ok(())
    }

    async fn find_by_token(
        &self,
        user_id: Uuid,
        access: AccessLevel,
        token: &str,
    ) -> StoreResult<Option<User>> {
        let inner = self.inner.read().await;
        let holds = inner
            .tokens
            .get(&user_id)
            .is_some_and(|ts| ts.iter().any(|t| t.access == access && t.token == token));
        if !holds {
            return Ok(None);
        }
        Ok(inner.users.get(&user_id).cloned())
    }

    async fn remove_token(
        &self,
        user_id: Uuid,
        access: AccessLevel,
        token: &str,
    ) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if let Some(tokens) = inner.tokens.get_mut(&user_id) {
            tokens.retain(|t| !(t.access == access && t.token == token));
        }
        Ok(())
    }
}

#[async_trait]
impl TodoStore for MemoryStore {
    async fn insert(&self, todo: &Todo) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if !inner.users.contains_key(&todo.creator_id) {
            return Err(StoreError::MissingUser(todo.creator_id));
        }
        inner.todos.insert(todo.id, todo.clone());
        Ok(())
    }

    async fn list_by_creator(&self, creator_id: Uuid) -> StoreResult<Vec<Todo>> {
        let inner = self.inner.read().await;
        let mut todos: Vec<Todo> = inner
            .todos
            .values()
            .filter(|t| t.creator_id == creator_id)
            .cloned()
            .collect();
        todos.sort_by_key(|t| t.created_at);
        Ok(todos)
    }

    async fn find_one(&self, id: Uuid, creator_id: Uuid) -> StoreResult<Option<Todo>> {
        let inner = self.inner.read().await;
        Ok(inner
            .todos
            .get(&id)
            .filter(|t| t.creator_id == creator_id)
            .cloned())
    }

    async fn remove(&self, id: Uuid, creator_id: Uuid) -> StoreResult<Option<Todo>> {
        let mut inner = self.inner.write().await;
        let owned = inner
            .todos
            .get(&id)
            .is_some_and(|t| t.creator_id == creator_id);
        if !owned {
            return Ok(None);
        }
        Ok(inner.todos.remove(&id))
    }

    async fn update(
        &self,
        id: Uuid,
        creator_id: Uuid,
        patch: &TodoPatch,
    ) -> StoreResult<Option<Todo>> {
        let mut inner = self.inner.write().await;
        match inner.todos.get_mut(&id) {
            Some(todo) if todo.creator_id == creator_id => {
                todo.apply(patch);
                Ok(Some(todo.clone()))
            }
            _ => Ok(None),
        }
    }
}
