//! Per-action permission enforcement.
use std::sync::Arc;

use thiserror::Error;

use crate::services::authz::catalog::PermissionCatalog;
use crate::services::authz::context::{AuthorizationContext, AuthzError};

const ANONYMOUS_USER: &str = "anonymous";

/// Outcome of a failed permission check.
#[derive(Debug, Error)]
pub enum PermissionError {
    /// The user holds none of the required permissions. Expected and
    /// user-visible; the `tried` list is for logs only and must not be
    /// echoed to untrusted callers.
    #[error("user {user:?} is not permitted to perform {action:?}")]
    Denied {
        user: String,
        action: String,
        tried: Vec<String>,
    },

    #[error(transparent)]
    Authz(#[from] AuthzError),
}

/// Orchestrates one action authorization against the catalog and the
/// request's authorization context.
pub struct ServicePermissionChecker {
    catalog: Arc<PermissionCatalog>,
}

impl ServicePermissionChecker {
    pub fn new(catalog: Arc<PermissionCatalog>) -> Self {
        Self { catalog }
    }

    /// Required permission names declared for `service.action`, if any.
    pub fn required_permissions(&self, service: &str, action: &str) -> Option<&[String]> {
        self.catalog.required_permissions(service, action)
    }

    /// Authorize `service.action` for the request behind `ctx`.
    ///
    /// Order matters:
    /// 1. A trusted scope bypasses everything, including the catalog.
    /// 2. An action with no declared requirement is open; authorization
    ///    data is not even loaded for it.
    /// 3. Otherwise load the snapshot (cached or from the authority) and
    ///    allow on the first required name the user holds.
    pub async fn check_service_permission(
        &self,
        ctx: &mut AuthorizationContext,
        service: &str,
        action: &str,
    ) -> Result<(), PermissionError> {
        if ctx.trusted().is_trusted() {
            return Ok(());
        }

        let Some(required) = self.catalog.required_permissions(service, action) else {
            return Ok(());
        };
        if required.is_empty() {
            return Ok(());
        }

        let required = required.to_vec();
        let action_label = format!("{service}.{action}");

        ctx.load_authorization_data().await?;
        self.check_permission(ctx, &required, &action_label)
    }

    /// Authorize against an explicit requirement set (any-of semantics).
    /// The context must already be loaded unless the scope is trusted or
    /// the set is empty.
    pub fn check_permission(
        &self,
        ctx: &AuthorizationContext,
        required: &[String],
        action_label: &str,
    ) -> Result<(), PermissionError> {
        if ctx.trusted().is_trusted() {
            return Ok(());
        }
        if required.is_empty() {
            return Ok(());
        }

        let user = ctx.session().user_id_or(ANONYMOUS_USER).to_string();

        for name in required {
            tracing::debug!(user = %user, permission = %name, "checking permission");
            if ctx.has_permission(name)? {
                // At least one granted permission is sufficient.
                return Ok(());
            }
        }

        let denied = PermissionError::Denied {
            user: user.clone(),
            action: action_label.to_string(),
            tried: required.to_vec(),
        };
        tracing::warn!(
            user = %user,
            action = %action_label,
            tried = ?required,
            "permission denied"
        );
        Err(denied)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::services::authz::authority::StaticAuthority;
    use crate::services::authz::catalog::PermissionCatalog;
    use crate::services::authz::context::AuthzService;
    use crate::services::authz::trusted::TrustedCall;
    use crate::services::cache::MemoryCacheStore;
    use crate::session::SessionInfo;

    fn checker() -> ServicePermissionChecker {
        let catalog = PermissionCatalog::builder()
            .action("TodoService", "create", ["Todo.Write"])
            .unwrap()
            .action("TodoService", "remove", ["Todo.Write", "Todo.Admin"])
            .unwrap()
            .action("TodoService", "list", Vec::<String>::new())
            .unwrap()
            .build();
        ServicePermissionChecker::new(Arc::new(catalog))
    }

    fn service() -> Arc<AuthzService> {
        let authority = StaticAuthority::default()
            .with_user("alice", ["Todo.Read", "Todo.Write"])
            .with_user("bob", Vec::<String>::new());
        Arc::new(AuthzService::new(
            Arc::new(MemoryCacheStore::new()),
            Arc::new(authority),
            Duration::from_secs(60),
            Duration::from_millis(200),
        ))
    }

    #[tokio::test]
    async fn granted_permission_allows_the_action() {
        let checker = checker();
        let mut ctx = service().context(SessionInfo::new("alice", "S1", true));

        checker
            .check_service_permission(&mut ctx, "TodoService", "create")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn any_of_semantics_allow_on_the_first_match() {
        let checker = checker();
        let mut ctx = service().context(SessionInfo::new("alice", "S1", true));

        // alice holds Todo.Write but not Todo.Admin.
        checker
            .check_service_permission(&mut ctx, "TodoService", "remove")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn missing_permissions_deny_with_the_tried_list() {
        let checker = checker();
        let mut ctx = service().context(SessionInfo::new("bob", "S1", true));

        let err = checker
            .check_service_permission(&mut ctx, "TodoService", "create")
            .await
            .unwrap_err();

        match err {
            PermissionError::Denied { user, action, tried } => {
                assert_eq!(user, "bob");
                assert_eq!(action, "TodoService.create");
                assert_eq!(tried, vec!["Todo.Write".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn trusted_scope_bypasses_catalog_and_authority() {
        let checker = checker();
        // Unauthenticated on purpose: if the checker touched the catalog
        // result or loaded authorization data, this would fail.
        let mut ctx = service().context(SessionInfo::new("alice", "S1", false));

        let guard = TrustedCall::enter(Arc::clone(ctx.trusted()));
        let result = checker
            .check_service_permission(&mut ctx, "TodoService", "create")
            .await;
        drop(guard);

        result.unwrap();
    }

    #[tokio::test]
    async fn open_actions_succeed_without_loading_authorization_data() {
        let checker = checker();
        // Unauthenticated: a load attempt would error, so success proves
        // no permission query happened.
        let mut ctx = service().context(SessionInfo::new("alice", "S1", false));

        checker
            .check_service_permission(&mut ctx, "TodoService", "list")
            .await
            .unwrap();
        checker
            .check_service_permission(&mut ctx, "TodoService", "unregistered")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn explicit_requirement_check_needs_a_loaded_context() {
        let checker = checker();
        let ctx = service().context(SessionInfo::new("alice", "S1", true));

        let err = checker
            .check_permission(&ctx, &["Todo.Write".to_string()], "TodoService.create")
            .unwrap_err();

        assert!(matches!(err, PermissionError::Authz(AuthzError::NotLoaded)));
    }
}
