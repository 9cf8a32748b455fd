/*
 * Responsibility
 * - The permission-guarded todo surface of the demo host
 * - Every handler builds the request-scoped AuthorizationContext from the
 *   SessionInfo established by the middleware stack and authorizes through
 *   the ServicePermissionChecker before touching the store
 */
use std::sync::atomic::{AtomicU64, Ordering};

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::session::SessionInfo;
use crate::state::AppState;

/// Catalog service name for the todo actions. Callers that only know the
/// contract name `ITodoService` resolve to the same entries via alias.
pub const SERVICE: &str = "TodoService";

#[derive(Debug, Clone, Serialize)]
pub struct Todo {
    pub id: u64,
    pub title: String,
    pub done: bool,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTodoRequest {
    pub title: String,
}

/// In-memory todo store; the demo host has no database.
#[derive(Debug, Default)]
pub struct TodoStore {
    next_id: AtomicU64,
    todos: DashMap<u64, Todo>,
}

impl TodoStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, title: String, created_by: String) -> Todo {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let todo = Todo {
            id,
            title,
            done: false,
            created_by,
            created_at: Utc::now(),
        };
        self.todos.insert(id, todo.clone());
        todo
    }

    pub fn list(&self) -> Vec<Todo> {
        let mut todos: Vec<Todo> = self.todos.iter().map(|t| t.value().clone()).collect();
        todos.sort_by_key(|t| t.id);
        todos
    }

    pub fn remove(&self, id: u64) -> Option<Todo> {
        self.todos.remove(&id).map(|(_, todo)| todo)
    }

    pub fn len(&self) -> usize {
        self.todos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.todos.is_empty()
    }
}

pub async fn list_todos(
    State(state): State<AppState>,
    session: SessionInfo,
) -> Result<impl IntoResponse, AppError> {
    let mut ctx = state.authz.context(session);
    state
        .checker
        .check_service_permission(&mut ctx, SERVICE, "list")
        .await?;

    Ok(Json(state.todos.list()))
}

pub async fn create_todo(
    State(state): State<AppState>,
    session: SessionInfo,
    Json(body): Json<CreateTodoRequest>,
) -> Result<impl IntoResponse, AppError> {
    if body.title.trim().is_empty() {
        return Err(AppError::InvalidRequest("title must not be empty".into()));
    }

    let mut ctx = state.authz.context(session);
    state
        .checker
        .check_service_permission(&mut ctx, SERVICE, "create")
        .await?;

    let todo = state
        .todos
        .insert(body.title, ctx.session().user_id.clone());

    Ok((StatusCode::CREATED, Json(todo)))
}

pub async fn delete_todo(
    State(state): State<AppState>,
    session: SessionInfo,
    Path(todo_id): Path<u64>,
) -> Result<impl IntoResponse, AppError> {
    let mut ctx = state.authz.context(session);
    state
        .checker
        .check_service_permission(&mut ctx, SERVICE, "remove")
        .await?;

    match state.todos.remove(todo_id) {
        Some(_) => Ok(StatusCode::NO_CONTENT),
        None => Err(AppError::NotFound),
    }
}
