use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::{CreateTodoRequest, PatchTodoRequest, TodoEnvelope, TodoList},
    repo_types::{Todo, TodoPatch},
};
use crate::{
    auth::AuthUser,
    error::{AppError, AppJson},
    state::AppState,
};

pub fn todo_routes() -> Router<AppState> {
    Router::new()
        .route("/todos", get(list_todos).post(create_todo))
        .route(
            "/todos/:id",
            get(get_todo).delete(delete_todo).patch(patch_todo),
        )
}

fn not_found() -> AppError {
    AppError::NotFound("Todo not found.".into())
}

/// Malformed ids are reported like missing todos.
fn parse_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::NotFound("Invalid Id.".into()))
}

fn clean_text(text: Option<String>) -> Result<String, AppError> {
    let text = text.map(|t| t.trim().to_string()).unwrap_or_default();
    if text.is_empty() {
        return Err(AppError::Validation("text is required".into()));
    }
    Ok(text)
}

#[instrument(skip_all, fields(user_id = %caller.user.id))]
pub async fn create_todo(
    State(state): State<AppState>,
    caller: AuthUser,
    AppJson(body): AppJson<CreateTodoRequest>,
) -> Result<Json<Todo>, AppError> {
    let text = clean_text(body.text).map_err(|e| {
        warn!("todo without text");
        e
    })?;
    let todo = Todo::new(caller.user.id, text);
    state.todos.insert(&todo).await?;
    info!(todo_id = %todo.id, "todo created");
    Ok(Json(todo))
}

#[instrument(skip_all, fields(user_id = %caller.user.id))]
pub async fn list_todos(
    State(state): State<AppState>,
    caller: AuthUser,
) -> Result<Json<TodoList>, AppError> {
    let todos = state.todos.list_by_creator(caller.user.id).await?;
    Ok(Json(TodoList { todos }))
}

#[instrument(skip(state, caller), fields(user_id = %caller.user.id))]
pub async fn get_todo(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<TodoEnvelope>, AppError> {
    let id = parse_id(&id)?;
    let todo = state
        .todos
        .find_one(id, caller.user.id)
        .await?
        .ok_or_else(not_found)?;
    Ok(Json(TodoEnvelope { todo }))
}

#[instrument(skip(state, caller), fields(user_id = %caller.user.id))]
pub async fn delete_todo(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<TodoEnvelope>, AppError> {
    let id = parse_id(&id)?;
    let todo = state
        .todos
        .remove(id, caller.user.id)
        .await?
        .ok_or_else(not_found)?;
    info!(todo_id = %todo.id, "todo deleted");
    Ok(Json(TodoEnvelope { todo }))
}

#[instrument(skip(state, caller, body), fields(user_id = %caller.user.id))]
pub async fn patch_todo(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
    AppJson(body): AppJson<PatchTodoRequest>,
) -> Result<Json<TodoEnvelope>, AppError> {
    let id = parse_id(&id)?;
    let completed = body.completed();
    let text = match body.text {
        Some(t) => Some(clean_text(Some(t))?),
        None => None,
    };
    let patch = TodoPatch::new(text, completed, OffsetDateTime::now_utc());
    let todo = state
        .todos
        .update(id, caller.user.id, &patch)
        .await?
        .ok_or_else(not_found)?;
    Ok(Json(TodoEnvelope { todo }))
}
