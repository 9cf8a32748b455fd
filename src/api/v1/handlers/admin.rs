/*
 * Responsibility
 * - Administrative operations: snapshot-cache flush
 * - Demonstrates the trusted-call bypass for internal sub-operations
 */
use std::sync::Arc;

use axum::{Json, extract::State, response::IntoResponse};
use serde_json::json;

use crate::error::AppError;
use crate::services::authz::{AuthorizationContext, ServicePermissionChecker, TrustedCall};
use crate::session::SessionInfo;
use crate::state::AppState;

pub const SERVICE: &str = "AdminService";

/// POST /admin/flush-cache
///
/// Clears every authorization snapshot so permission changes at the
/// authority take effect immediately instead of after TTL expiry. The
/// todo count in the response goes through the regular checked read path,
/// but under a trusted scope: holding the flush permission must not also
/// require read permission on todos.
pub async fn flush_cache(
    State(state): State<AppState>,
    session: SessionInfo,
) -> Result<impl IntoResponse, AppError> {
    let mut ctx = state.authz.context(session);
    state
        .checker
        .check_service_permission(&mut ctx, SERVICE, "flush_cache")
        .await?;

    ctx.flush_cache().await?;
    tracing::info!(user = %ctx.session().user_id, "authorization cache flushed");

    let todo_count = {
        let _trusted = TrustedCall::enter(Arc::clone(ctx.trusted()));
        count_todos(&state, &mut ctx).await?
    };

    Ok(Json(json!({"flushed": true, "todos": todo_count})))
}

/// Internal checked read; callable from trusted scopes without the
/// caller holding todo permissions.
async fn count_todos(
    state: &AppState,
    ctx: &mut AuthorizationContext,
) -> Result<usize, AppError> {
    enforce_todo_read(&state.checker, ctx).await?;
    Ok(state.todos.len())
}

async fn enforce_todo_read(
    checker: &ServicePermissionChecker,
    ctx: &mut AuthorizationContext,
) -> Result<(), AppError> {
    checker
        .check_service_permission(ctx, super::todos::SERVICE, "list")
        .await?;
    Ok(())
}
