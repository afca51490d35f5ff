use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Todo record owned by a single user.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Todo {
    pub id: Uuid,
    pub creator_id: Uuid,
    pub text: String,
    pub completed: bool,
    pub completed_at: Option<i64>, // unix millis
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Todo {
    pub fn new(creator_id: Uuid, text: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            creator_id,
            text,
            completed: false,
            completed_at: None,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    pub fn apply(&mut self, patch: &TodoPatch) {
        if let Some(text) = &patch.text {
            self.text = text.clone();
        }
        self.completed = patch.completed;
        self.completed_at = patch.completed_at;
    }
}

/// Resolved update for a todo. `completed` and `completed_at` are always
/// written; `text` only when present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TodoPatch {
    pub text: Option<String>,
    pub completed: bool,
    pub completed_at: Option<i64>,
}

impl TodoPatch {
    /// Only an explicit `completed: true` marks the todo done and stamps
    /// it; anything else resets completion.
    pub fn new(text: Option<String>, completed: Option<bool>, now: OffsetDateTime) -> Self {
        match completed {
            Some(true) => Self {
                text,
                completed: true,
                completed_at: Some(unix_millis(now)),
            },
            _ => Self {
                text,
                completed: false,
                completed_at: None,
            },
        }
    }
}

pub fn unix_millis(at: OffsetDateTime) -> i64 {
    (at.unix_timestamp_nanos() / 1_000_000) as i64
}
