use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{StoreError, StoreResult, TodoStore, UserStore};
use crate::auth::repo_types::{AccessLevel, AuthToken, User};
use crate::todos::repo_types::{Todo, TodoPatch};

#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub fn pool(&self) -> &PgPool {
        &self.db
    }
}

/// Which unique value a violated constraint protects.
fn conflict_target(constraint: Option<&str>) -> &'static str {
    match constraint {
        Some("user_tokens_token_key") => "token",
        Some("users_email_key") => "email",
        _ => "record",
    }
}

/// Maps constraint violations onto store-level errors.
fn classify(e: sqlx::Error, user_id: Uuid) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return StoreError::Conflict(conflict_target(db.constraint()));
        }
        if db.is_foreign_key_violation() {
            return StoreError::MissingUser(user_id);
        }
    }
    StoreError::Database(e)
}

#[async_trait]
impl UserStore for PgStore {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn insert(&self, user: &User) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, password_hash, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .execute(&self.db)
        .await
        .map_err(|e| classify(e, user.id))?;
        Ok(())
    }

    async fn save(&self, user: &User) -> StoreResult<()> {
        let res = sqlx::query(
            r#"
            UPDATE users
               SET email = $2, password_hash = $3
             WHERE id = $1
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .execute(&self.db)
        .await
        .map_err(|e| classify(e, user.id))?;
        if res.rows_affected() == 0 {
            return Err(StoreError::MissingUser(user.id));
        }
        Ok(())
    }

    async fn push_token(&self, user_id: Uuid, token: &AuthToken) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO user_tokens (user_id, access, token)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(user_id)
        .bind(token.access.as_str())
        .bind(&token.token)
        .execute(&self.db)
        .await
        .map_err(|e| classify(e, user_id))?;
        Ok(())
    }

    async fn find_by_token(
        &self,
        user_id: Uuid,
        access: AccessLevel,
        token: &str,
    ) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT u.id, u.email, u.password_hash, u.created_at
              FROM users u
              JOIN user_tokens t ON t.user_id = u.id
             WHERE u.id = $1 AND t.access = $2 AND t.token = $3
            "#,
        )
        .bind(user_id)
        .bind(access.as_str())
        .bind(token)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn remove_token(
        &self,
        user_id: Uuid,
        access: AccessLevel,
        token: &str,
    ) -> StoreResult<()> {
        sqlx::query(
            r#"DELETE FROM user_tokens WHERE user_id = $1 AND access = $2 AND token = $3"#,
        )
        .bind(user_id)
        .bind(access.as_str())
        .bind(token)
        .execute(&self.db)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl TodoStore for PgStore {
    async fn insert(&self, todo: &Todo) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO todos (id, creator_id, text, completed, completed_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(todo.id)
        .bind(todo.creator_id)
        .bind(&todo.text)
        .bind(todo.completed)
        .bind(todo.completed_at)
        .bind(todo.created_at)
        .execute(&self.db)
        .await
        .map_err(|e| classify(e, todo.creator_id))?;
        Ok(())
    }

    async fn list_by_creator(&self, creator_id: Uuid) -> StoreResult<Vec<Todo>> {
        let rows = sqlx::query_as::<_, Todo>(
            r#"
            SELECT id, creator_id, text, completed, completed_at, created_at
              FROM todos
             WHERE creator_id = $1
             ORDER BY created_at ASC
            "#,
        )
        .bind(creator_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn find_one(&self, id: Uuid, creator_id: Uuid) -> StoreResult<Option<Todo>> {
        let row = sqlx::query_as::<_, Todo>(
            r#"
            SELECT id, creator_id, text, completed, completed_at, created_at
              FROM todos
             WHERE id = $1 AND creator_id = $2
            "#,
        )
        .bind(id)
        .bind(creator_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn remove(&self, id: Uuid, creator_id: Uuid) -> StoreResult<Option<Todo>> {
        let row = sqlx::query_as::<_, Todo>(
            r#"
            DELETE FROM todos
             WHERE id = $1 AND creator_id = $2
            RETURNING id, creator_id, text, completed, completed_at, created_at
            "#,
        )
        .bind(id)
        .bind(creator_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn update(
        &self,
        id: Uuid,
        creator_id: Uuid,
        patch: &TodoPatch,
    ) -> StoreResult<Option<Todo>> {
        let row = sqlx::query_as::<_, Todo>(
            r#"
            UPDATE todos
               SET text = COALESCE($3, text),
                   completed = $4,
                   completed_at = $5
             WHERE id = $1 AND creator_id = $2
            RETURNING id, creator_id, text, completed, completed_at, created_at
            "#,
        )
        .bind(id)
        .bind(creator_id)
        .bind(patch.text.as_deref())
        .bind(patch.completed)
        .bind(patch.completed_at)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }
}
