/*
 * Responsibility
 * - Shared context bound to the Router (AppState)
 * - Clone-cheap by construction (Arc'd services inside)
 */
use std::sync::Arc;
use std::time::Duration;

use crate::api::v1::handlers::todos::TodoStore;
use crate::services::authz::{AuthzService, ServicePermissionChecker};
use crate::services::roles::{RoleCache, RoleResolver};
use crate::services::token::TokenVerifier;

#[derive(Clone)]
pub struct AppState {
    pub verifier: TokenVerifier,
    pub authz: Arc<AuthzService>,
    pub checker: Arc<ServicePermissionChecker>,
    pub role_resolver: Arc<dyn RoleResolver>,
    pub role_cache: Arc<RoleCache>,
    pub todos: Arc<TodoStore>,

    /// Claim that names the user in the role authority's namespace.
    pub name_claim: Arc<str>,
    /// System id applied when a request carries no `X-System` header.
    pub default_system: Arc<str>,
    /// Upper bound for one role-resolver call.
    pub resolver_timeout: Duration,
    /// Upper bound on an incoming request body.
    pub max_body_bytes: usize,
    /// Deadline for one whole request.
    pub request_timeout: Duration,
}
