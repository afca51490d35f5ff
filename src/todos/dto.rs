use serde::{Deserialize, Serialize};

use super::repo_types::Todo;

#[derive(Debug, Deserialize)]
pub struct CreateTodoRequest {
    #[serde(default)]
    pub text: Option<String>,
}

/// Only `text` and `completed` are honoured; other fields are ignored.
/// A non-boolean `completed` counts as not completed.
#[derive(Debug, Deserialize)]
pub struct PatchTodoRequest {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub completed: Option<serde_json::Value>,
}

impl PatchTodoRequest {
    pub fn completed(&self) -> Option<bool> {
        self.completed.as_ref().and_then(|v| v.as_bool())
    }
}

#[derive(Debug, Serialize)]
pub struct TodoEnvelope {
    pub todo: Todo,
}

#[derive(Debug, Serialize)]
pub struct TodoList {
    pub todos: Vec<Todo>,
}
