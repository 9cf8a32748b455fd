//! Role-augmentation middleware.
//!
//! Installed after bearer authentication. Once the identity is
//! established this layer:
//! 1. reads the configured name claim from the identity; a missing claim
//!    is a deployment misconfiguration and fails the request hard, never
//!    a guessed fallback;
//! 2. resolves the identity's roles from the role authority (through the
//!    bounded TTL cache, at most one resolver call per identity name per
//!    interval) and appends them to the identity's role set in place;
//! 3. builds the request's `SessionInfo` (user id = name-claim value,
//!    system = `X-System` header or the configured default) for the
//!    authorization context downstream.
//!
//! A failed or timed-out resolution fails the whole authorization check
//! for the request; there is no "grant nothing" fallback.
use axum::{
    Router,
    body::Body,
    extract::State,
    http::Request,
    middleware::{self, Next},
    response::Response,
};

use crate::error::AppError;
use crate::services::roles::ResolutionError;
use crate::session::{Identity, SessionInfo};
use crate::state::AppState;

const SYSTEM_HEADER: &str = "x-system";
const REQUEST_ID_HEADER: &str = "x-request-id";

/// Apply role augmentation to every route of `router`.
pub fn apply(router: Router<AppState>, state: AppState) -> Router<AppState> {
    router.layer(middleware::from_fn_with_state(state, role_augment_middleware))
}

async fn role_augment_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let Some(mut identity) = req.extensions().get::<Identity>().cloned() else {
        // Bearer middleware not installed upstream of this layer.
        tracing::error!("role augmentation reached without an established identity");
        return Err(AppError::Internal);
    };

    let Some(match_name) = identity.claim(&state.name_claim).map(str::to_string) else {
        tracing::error!(
            claim = %state.name_claim,
            "configured name claim is missing from the identity"
        );
        return Err(AppError::Internal);
    };

    let roles = match state.role_cache.get(&match_name) {
        Some(roles) => roles,
        None => {
            let resolve = state.role_resolver.resolve_roles(&identity, &match_name);
            let roles = match tokio::time::timeout(state.resolver_timeout, resolve).await {
                Ok(Ok(roles)) => roles,
                Ok(Err(err)) => return Err(err.into()),
                // Fail closed on a slow authority.
                Err(_) => return Err(ResolutionError::Timeout.into()),
            };
            state.role_cache.insert(match_name.clone(), roles.clone());
            roles
        }
    };

    identity.add_roles(roles);

    let system = req
        .headers()
        .get(SYSTEM_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or(&state.default_system)
        .to_string();

    let request_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let session = SessionInfo::new(match_name, system, identity.authenticated)
        .with_request_id(request_id);

    req.extensions_mut().insert(identity);
    req.extensions_mut().insert(session);

    Ok(next.run(req).await)
}
