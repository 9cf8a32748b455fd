//! Role resolution against the external identity authority.
use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::session::Identity;

/// Errors from the external role authority.
///
/// An empty role set is a valid "no roles" answer and is *not* an error;
/// these variants mean the lookup itself failed and the request must be
/// rejected rather than silently granted nothing.
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("role authority unreachable: {0}")]
    Unreachable(String),
    #[error("identity {0:?} is unknown to the role authority")]
    UnknownIdentity(String),
    #[error("role authority call timed out")]
    Timeout,
}

/// Resolves the roles of an identity as known by the external authority.
///
/// `match_name` is the identity name in the authority's namespace (the
/// value of the configured name claim), which is not necessarily the same
/// as any local user id. Implementations are swappable (production
/// service client vs. table-backed test double) and may cache internally;
/// the contract itself is a pure lookup.
#[async_trait]
pub trait RoleResolver: Send + Sync {
    async fn resolve_roles(
        &self,
        identity: &Identity,
        match_name: &str,
    ) -> Result<Vec<String>, ResolutionError>;
}

/// Table-backed resolver.
///
/// Serves as the demo-binary authority and as the test double. Identities
/// absent from the table are unknown, which is a hard failure, distinct
/// from a present identity with an empty role list.
#[derive(Debug, Default)]
pub struct StaticRoleResolver {
    roles_by_name: HashMap<String, Vec<String>>,
}

impl StaticRoleResolver {
    pub fn new(roles_by_name: HashMap<String, Vec<String>>) -> Self {
        Self { roles_by_name }
    }

    pub fn with_identity<I>(mut self, name: impl Into<String>, roles: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.roles_by_name
            .insert(name.into(), roles.into_iter().map(Into::into).collect());
        self
    }
}

#[async_trait]
impl RoleResolver for StaticRoleResolver {
    async fn resolve_roles(
        &self,
        _identity: &Identity,
        match_name: &str,
    ) -> Result<Vec<String>, ResolutionError> {
        self.roles_by_name
            .get(match_name)
            .cloned()
            .ok_or_else(|| ResolutionError::UnknownIdentity(match_name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn known_identity_resolves_roles() {
        let resolver = StaticRoleResolver::default().with_identity("alice", ["reader", "writer"]);

        let roles = resolver
            .resolve_roles(&Identity::default(), "alice")
            .await
            .unwrap();

        assert_eq!(roles, vec!["reader".to_string(), "writer".to_string()]);
    }

    #[tokio::test]
    async fn empty_role_list_is_a_valid_answer() {
        let resolver = StaticRoleResolver::default().with_identity("bob", Vec::<String>::new());

        let roles = resolver
            .resolve_roles(&Identity::default(), "bob")
            .await
            .unwrap();

        assert!(roles.is_empty());
    }

    #[tokio::test]
    async fn unknown_identity_is_a_hard_failure() {
        let resolver = StaticRoleResolver::default();

        let err = resolver
            .resolve_roles(&Identity::default(), "nobody")
            .await
            .unwrap_err();

        assert!(matches!(err, ResolutionError::UnknownIdentity(_)));
    }
}
