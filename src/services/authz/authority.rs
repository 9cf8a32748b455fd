//! The external authorization authority contract.
use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::services::authz::snapshot::PermissionGrant;

/// Errors from the authorization authority.
#[derive(Debug, Error)]
pub enum AuthorityError {
    #[error("authorization authority unreachable: {0}")]
    Unreachable(String),
    #[error("authorization authority rejected user {0:?}")]
    Rejected(String),
    #[error("authorization authority call timed out")]
    Timeout,
}

/// Delivers the full permission set of a user.
///
/// Called once per (user, system) cache miss by the authorization service;
/// the result is snapshotted and cached for the configured TTL. A user
/// with no permissions is a valid answer (an empty grant list), not an
/// error.
#[async_trait]
pub trait AuthorizationAuthority: Send + Sync {
    async fn fetch_permissions(
        &self,
        user_id: &str,
        authenticated: bool,
    ) -> Result<Vec<PermissionGrant>, AuthorityError>;
}

/// Table-backed authority for the demo binary and tests.
#[derive(Debug, Default)]
pub struct StaticAuthority {
    grants_by_user: HashMap<String, Vec<PermissionGrant>>,
}

impl StaticAuthority {
    pub fn new(grants_by_user: HashMap<String, Vec<PermissionGrant>>) -> Self {
        Self { grants_by_user }
    }

    pub fn with_user<I>(mut self, user_id: impl Into<String>, permissions: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.grants_by_user.insert(
            user_id.into(),
            permissions
                .into_iter()
                .map(|identifier| PermissionGrant::new(identifier, true))
                .collect(),
        );
        self
    }
}

#[async_trait]
impl AuthorizationAuthority for StaticAuthority {
    async fn fetch_permissions(
        &self,
        user_id: &str,
        _authenticated: bool,
    ) -> Result<Vec<PermissionGrant>, AuthorityError> {
        // Unknown users simply hold no permissions; the authority only
        // fails on transport problems, which a table never has.
        Ok(self.grants_by_user.get(user_id).cloned().unwrap_or_default())
    }
}
