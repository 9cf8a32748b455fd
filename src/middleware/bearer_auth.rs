//! Bearer-token verification → `Identity` in request extensions.
//!
//! Upstream of the role-augmentation middleware: this layer only
//! establishes *who* the caller is; roles and permissions are attached
//! further down the stack.
use axum::{
    Router,
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::{self, Next},
    response::Response,
};

use crate::error::AppError;
use crate::state::AppState;

/// Apply bearer authentication to every route of `router`.
pub fn apply(router: Router<AppState>, state: AppState) -> Router<AppState> {
    // axum's from_fn cannot take a State extractor on its own, so the
    // state is passed explicitly with from_fn_with_state.
    router.layer(middleware::from_fn_with_state(state, bearer_middleware))
}

async fn bearer_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let auth = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::Unauthorized)?;

    let token = auth.strip_prefix("Bearer ").ok_or(AppError::Unauthorized)?;

    let identity = match state.verifier.verify(token) {
        Ok(identity) => identity,
        Err(err) => {
            tracing::warn!(error = %err, "access token verification failed");
            return Err(AppError::Unauthorized);
        }
    };

    // middleware → downstream handoff
    req.extensions_mut().insert(identity);

    Ok(next.run(req).await)
}
