/*
 * Responsibility
 * - Request-scoped identity/session types handed from middleware to handlers
 *   via request extensions.
 * - No ambient "current session" statics: everything here travels with the
 *   request, so one request's state cannot leak into another, including
 *   across async continuations on reused worker threads.
 */
use std::collections::HashMap;

use axum::{extract::FromRequestParts, http::request::Parts};
use chrono::{DateTime, Utc};

use crate::error::AppError;

/// The authenticated identity established by the bearer middleware.
///
/// - `claims` holds the token's string claims (issuer claims plus whatever
///   the deployment configured as the name claim).
/// - `roles` starts with the roles carried in the token and is extended in
///   place by the role-augmentation middleware. Appending a role that is
///   already present is harmless for queries; no dedup is performed.
#[derive(Debug, Clone, Default)]
pub struct Identity {
    pub authenticated: bool,
    pub claims: HashMap<String, String>,
    pub roles: Vec<String>,
}

impl Identity {
    pub fn claim(&self, name: &str) -> Option<&str> {
        self.claims.get(name).map(String::as_str)
    }

    pub fn add_roles<I>(&mut self, roles: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.roles.extend(roles);
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// Session context for one in-flight logical call.
///
/// Built by the role-augmentation middleware once the identity is fully
/// established; the authorization context keys its cache off
/// `(user_id, system)`.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub request_id: Option<String>,
    pub request_time: DateTime<Utc>,
    pub user_id: String,
    pub system: String,
    authenticated: bool,
}

impl SessionInfo {
    pub fn new(user_id: impl Into<String>, system: impl Into<String>, authenticated: bool) -> Self {
        Self {
            request_id: None,
            request_time: Utc::now(),
            user_id: user_id.into(),
            system: system.into(),
            authenticated,
        }
    }

    pub fn with_request_id(mut self, request_id: Option<String>) -> Self {
        self.request_id = request_id;
        self
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated && !self.user_id.is_empty()
    }

    /// The user id, or the given fallback when no user is established.
    /// Used for log lines that must always carry a principal.
    pub fn user_id_or<'a>(&'a self, anonymous: &'a str) -> &'a str {
        if self.user_id.is_empty() {
            anonymous
        } else {
            &self.user_id
        }
    }
}

impl<S> FromRequestParts<S> for SessionInfo
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Inserted by the role-augmentation middleware; absence means the
        // route was wired outside the authenticated stack.
        parts
            .extensions
            .get::<SessionInfo>()
            .cloned()
            .ok_or(AppError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_user_is_not_authenticated() {
        let session = SessionInfo::new("", "todo", true);
        assert!(!session.is_authenticated());
        assert_eq!(session.user_id_or("anonymous"), "anonymous");
    }

    #[test]
    fn authenticated_session_reports_user() {
        let session = SessionInfo::new("alice", "todo", true);
        assert!(session.is_authenticated());
        assert_eq!(session.user_id_or("anonymous"), "alice");
    }

    #[test]
    fn roles_append_in_place_without_dedup() {
        let mut identity = Identity {
            authenticated: true,
            roles: vec!["reader".to_string()],
            ..Default::default()
        };

        identity.add_roles(vec!["reader".to_string(), "writer".to_string()]);

        assert_eq!(identity.roles.len(), 3);
        assert!(identity.has_role("writer"));
    }
}
