use std::fmt;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use super::password::Hasher;

/// User record in the store.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 PHC string, never exposed
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl User {
    /// Builds a new user, hashing `password`.
    pub fn new(email: String, password: &str, hasher: &Hasher) -> anyhow::Result<Self> {
        let mut user = Self {
            id: Uuid::new_v4(),
            email,
            password_hash: String::new(),
            created_at: OffsetDateTime::now_utc(),
        };
        user.set_password(password, hasher)?;
        Ok(user)
    }

    /// The only place the hash is recomputed.
    pub fn set_password(&mut self, password: &str, hasher: &Hasher) -> anyhow::Result<()> {
        self.password_hash = hasher.hash(password)?;
        Ok(())
    }
}

/// Purpose tag carried by every token.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    Auth,
}

impl AccessLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessLevel::Auth => "auth",
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One active session token of a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthToken {
    pub access: AccessLevel,
    pub token: String,
}
