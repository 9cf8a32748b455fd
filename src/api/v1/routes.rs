/*
 * Responsibility
 * - v1 URL structure
 * - Everything nested here sits behind bearer auth + role augmentation,
 *   which app.rs applies to the whole v1 router
 */
use axum::{
    Router,
    routing::{delete, get, post},
};

use crate::api::v1::handlers::{
    admin::flush_cache,
    todos::{create_todo, delete_todo, list_todos},
};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/todos", get(list_todos).post(create_todo))
        .route("/todos/{todo_id}", delete(delete_todo))
        .route("/admin/flush-cache", post(flush_cache))
}
