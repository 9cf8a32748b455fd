//! Authorization data loading and the per-request authorization context.
//!
//! Responsibility:
//! - `AuthzService`: process-wide loader that caches one immutable
//!   [`AuthorizationSnapshot`] per (user, system) with a fixed TTL and
//!   guarantees at most one authority call per key per TTL window.
//! - `AuthorizationContext`: the request-scoped view over one loaded
//!   snapshot, carrying the trusted-scope flag for the same logical call.
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::services::authz::authority::{AuthorityError, AuthorizationAuthority};
use crate::services::authz::snapshot::AuthorizationSnapshot;
use crate::services::authz::trusted::TrustedScope;
use crate::services::cache::{CacheError, CacheStore};
use crate::session::SessionInfo;

const KEY_SEPARATOR: char = '|';

/// Errors raised while loading or querying authorization data.
#[derive(Debug, Error)]
pub enum AuthzError {
    /// The session reports not-authenticated; fatal for this request.
    #[error("user {user:?} is not authenticated")]
    NotAuthenticated { user: String },

    /// A permission query ran before `load_authorization_data()`. Failing
    /// here keeps "not yet loaded" from masquerading as "no permission".
    #[error("authorization data has not been loaded for this request")]
    NotLoaded,

    #[error(transparent)]
    Authority(#[from] AuthorityError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Cache-backed loader for authorization snapshots.
///
/// Concurrent misses for the same key serialize on a per-key mutex (a
/// single-flight registry), not a global lock, so loads for different
/// users never contend while duplicate authority calls for one key are
/// joined to the in-flight computation. Authority calls are bounded by a
/// timeout and fail closed.
pub struct AuthzService {
    cache: Arc<dyn CacheStore>,
    authority: Arc<dyn AuthorizationAuthority>,
    snapshot_ttl: Duration,
    authority_timeout: Duration,
    flights: DashMap<String, Arc<Mutex<()>>>,
}

impl AuthzService {
    pub fn new(
        cache: Arc<dyn CacheStore>,
        authority: Arc<dyn AuthorizationAuthority>,
        snapshot_ttl: Duration,
        authority_timeout: Duration,
    ) -> Self {
        Self {
            cache,
            authority,
            snapshot_ttl,
            authority_timeout,
            flights: DashMap::new(),
        }
    }

    /// Composite cache key for one (user, system) pair.
    fn cache_key(user_id: &str, system: &str) -> String {
        format!("{user_id}{KEY_SEPARATOR}{system}{KEY_SEPARATOR}")
    }

    /// Create the request-scoped context bound to `session`.
    pub fn context(self: &Arc<Self>, session: SessionInfo) -> AuthorizationContext {
        AuthorizationContext {
            service: Arc::clone(self),
            session,
            data: None,
            trusted: Arc::new(TrustedScope::new()),
        }
    }

    /// Load the snapshot for the session's (user, system), from cache when
    /// fresh, otherwise from the authority (at most once per key per TTL
    /// window, even under concurrent callers).
    pub async fn load(
        &self,
        session: &SessionInfo,
    ) -> Result<Arc<AuthorizationSnapshot>, AuthzError> {
        if !session.is_authenticated() {
            return Err(AuthzError::NotAuthenticated {
                user: session.user_id_or("anonymous").to_string(),
            });
        }

        let key = Self::cache_key(&session.user_id, &session.system);

        // Fast path: fresh snapshot already cached.
        if let Some(snapshot) = self.cached(&key).await? {
            return Ok(snapshot);
        }

        let flight = self
            .flights
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = flight.lock().await;

        let result = self.load_under_flight(&key, session).await;

        // The flight entry must go on every exit, or keys whose loads keep
        // failing accumulate registry entries forever.
        drop(guard);
        self.flights.remove(&key);

        result
    }

    async fn load_under_flight(
        &self,
        key: &str,
        session: &SessionInfo,
    ) -> Result<Arc<AuthorizationSnapshot>, AuthzError> {
        // Joiners land here after the winner has stored the snapshot.
        if let Some(snapshot) = self.cached(key).await? {
            return Ok(snapshot);
        }

        let fetch = self
            .authority
            .fetch_permissions(&session.user_id, session.is_authenticated());
        let permissions = match tokio::time::timeout(self.authority_timeout, fetch).await {
            Ok(result) => result?,
            // Fail closed: a slow authority denies, it never grants.
            Err(_) => return Err(AuthorityError::Timeout.into()),
        };

        let snapshot = Arc::new(AuthorizationSnapshot::new(
            session.user_id.clone(),
            permissions,
        ));

        let payload = serde_json::to_string(snapshot.as_ref())
            .map_err(|e| CacheError::InvalidValue(e.to_string()))?;
        self.cache
            .set_string_with_ttl(key, &payload, self.snapshot_ttl)
            .await?;

        tracing::debug!(
            user = %session.user_id,
            system = %session.system,
            permissions = snapshot.permissions.len(),
            backend = self.cache.backend_name(),
            "authorization snapshot loaded"
        );

        Ok(snapshot)
    }

    #[cfg(test)]
    fn flight_count(&self) -> usize {
        self.flights.len()
    }

    async fn cached(&self, key: &str) -> Result<Option<Arc<AuthorizationSnapshot>>, AuthzError> {
        let Some(payload) = self.cache.get_string(key).await? else {
            return Ok(None);
        };

        match serde_json::from_str::<AuthorizationSnapshot>(&payload) {
            Ok(snapshot) => Ok(Some(Arc::new(snapshot))),
            Err(err) => {
                // A corrupt entry is a miss, not a failure: drop it and
                // let the caller recompute.
                tracing::warn!(error = %err, "discarding undecodable authorization snapshot");
                self.cache.del(key).await?;
                Ok(None)
            }
        }
    }

    /// Clear every entry from the underlying store.
    pub async fn flush_cache(&self) -> Result<(), AuthzError> {
        self.cache.flush().await?;
        Ok(())
    }
}

/// The per-request authorization view.
///
/// Constructed by [`AuthzService::context`] for exactly one logical call;
/// it is never shared between requests. All permission queries require a
/// prior successful [`load_authorization_data`](Self::load_authorization_data).
pub struct AuthorizationContext {
    service: Arc<AuthzService>,
    session: SessionInfo,
    data: Option<Arc<AuthorizationSnapshot>>,
    trusted: Arc<TrustedScope>,
}

impl AuthorizationContext {
    pub fn session(&self) -> &SessionInfo {
        &self.session
    }

    /// The trusted-scope flag for this logical call.
    pub fn trusted(&self) -> &Arc<TrustedScope> {
        &self.trusted
    }

    /// Load (or re-use the cached) snapshot for the current (user, system).
    pub async fn load_authorization_data(&mut self) -> Result<(), AuthzError> {
        let snapshot = self.service.load(&self.session).await?;
        self.data = Some(snapshot);
        Ok(())
    }

    fn snapshot(&self) -> Result<&AuthorizationSnapshot, AuthzError> {
        self.data.as_deref().ok_or(AuthzError::NotLoaded)
    }

    pub fn has_permission(&self, action: &str) -> Result<bool, AuthzError> {
        Ok(self.snapshot()?.has_permission(action))
    }

    pub fn has_any_permission(&self) -> Result<bool, AuthzError> {
        Ok(self.snapshot()?.has_any_permission())
    }

    pub fn has_permission_unlimited(&self, action: &str) -> Result<bool, AuthzError> {
        Ok(self.snapshot()?.has_permission_unlimited(action))
    }

    pub fn has_any_permission_unlimited<I>(&self, actions: I) -> Result<bool, AuthzError>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        Ok(self.snapshot()?.has_any_permission_unlimited(actions))
    }

    pub fn get_intersected_permission_identifiers<'a, I>(
        &self,
        candidates: I,
    ) -> Result<Vec<String>, AuthzError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        Ok(self.snapshot()?.intersected_permission_identifiers(candidates))
    }

    /// Flush the whole snapshot cache (all users, all systems).
    pub async fn flush_cache(&self) -> Result<(), AuthzError> {
        self.service.flush_cache().await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::services::authz::snapshot::PermissionGrant;
    use crate::services::cache::MemoryCacheStore;

    /// Counts authority calls; optionally delays or hangs to exercise the
    /// single-flight and timeout paths.
    struct CountingAuthority {
        calls: AtomicUsize,
        delay: Option<Duration>,
        hang: bool,
    }

    impl CountingAuthority {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                delay: None,
                hang: false,
            }
        }

        fn with_delay(delay: Duration) -> Self {
            Self {
                delay: Some(delay),
                ..Self::new()
            }
        }

        fn hanging() -> Self {
            Self {
                hang: true,
                ..Self::new()
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AuthorizationAuthority for CountingAuthority {
        async fn fetch_permissions(
            &self,
            _user_id: &str,
            _authenticated: bool,
        ) -> Result<Vec<PermissionGrant>, AuthorityError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.hang {
                std::future::pending::<()>().await;
            }
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            Ok(vec![
                PermissionGrant::new("Read", true),
                PermissionGrant::new("Write", true),
            ])
        }
    }

    fn service_with(authority: Arc<CountingAuthority>, ttl: Duration) -> Arc<AuthzService> {
        Arc::new(AuthzService::new(
            Arc::new(MemoryCacheStore::new()),
            authority,
            ttl,
            Duration::from_millis(200),
        ))
    }

    fn session(user: &str, system: &str) -> SessionInfo {
        SessionInfo::new(user, system, true)
    }

    #[tokio::test]
    async fn second_load_within_ttl_reuses_the_cached_snapshot() {
        let authority = Arc::new(CountingAuthority::new());
        let service = service_with(Arc::clone(&authority), Duration::from_secs(60));

        let mut ctx = service.context(session("alice", "S1"));
        ctx.load_authorization_data().await.unwrap();
        ctx.load_authorization_data().await.unwrap();

        assert_eq!(authority.calls(), 1);
        assert!(ctx.has_permission("read").unwrap());
    }

    #[tokio::test]
    async fn changing_the_system_produces_a_distinct_cache_key() {
        let authority = Arc::new(CountingAuthority::new());
        let service = service_with(Arc::clone(&authority), Duration::from_secs(60));

        let mut first = service.context(session("alice", "S1"));
        first.load_authorization_data().await.unwrap();
        let mut second = service.context(session("alice", "S2"));
        second.load_authorization_data().await.unwrap();

        assert_eq!(authority.calls(), 2);
    }

    #[tokio::test]
    async fn concurrent_misses_for_one_key_call_the_authority_once() {
        let authority = Arc::new(CountingAuthority::with_delay(Duration::from_millis(50)));
        let service = service_with(Arc::clone(&authority), Duration::from_secs(60));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let service = Arc::clone(&service);
            tasks.push(tokio::spawn(async move {
                service.load(&session("alice", "S1")).await.unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(authority.calls(), 1);
    }

    #[tokio::test]
    async fn unauthenticated_session_is_rejected() {
        let authority = Arc::new(CountingAuthority::new());
        let service = service_with(Arc::clone(&authority), Duration::from_secs(60));

        let mut ctx = service.context(SessionInfo::new("alice", "S1", false));
        let err = ctx.load_authorization_data().await.unwrap_err();

        assert!(matches!(err, AuthzError::NotAuthenticated { .. }));
        assert_eq!(authority.calls(), 0);
    }

    #[tokio::test]
    async fn queries_before_load_fail_instead_of_denying() {
        let authority = Arc::new(CountingAuthority::new());
        let service = service_with(authority, Duration::from_secs(60));

        let ctx = service.context(session("alice", "S1"));

        assert!(matches!(ctx.has_permission("Read"), Err(AuthzError::NotLoaded)));
        assert!(matches!(ctx.has_any_permission(), Err(AuthzError::NotLoaded)));
        assert!(matches!(
            ctx.get_intersected_permission_identifiers(["Read"]),
            Err(AuthzError::NotLoaded)
        ));
    }

    #[tokio::test]
    async fn authority_timeout_fails_closed() {
        let authority = Arc::new(CountingAuthority::hanging());
        let service = service_with(Arc::clone(&authority), Duration::from_secs(60));

        let err = service.load(&session("alice", "S1")).await.unwrap_err();

        assert!(matches!(
            err,
            AuthzError::Authority(AuthorityError::Timeout)
        ));
    }

    #[tokio::test]
    async fn flight_registry_is_emptied_after_a_successful_load() {
        let authority = Arc::new(CountingAuthority::new());
        let service = service_with(Arc::clone(&authority), Duration::from_secs(60));

        service.load(&session("alice", "S1")).await.unwrap();

        assert_eq!(service.flight_count(), 0);
    }

    #[tokio::test]
    async fn flight_registry_is_emptied_after_failed_loads() {
        let authority = Arc::new(CountingAuthority::hanging());
        let service = service_with(Arc::clone(&authority), Duration::from_secs(60));

        for user in ["alice", "bob", "carol"] {
            service.load(&session(user, "S1")).await.unwrap_err();
        }

        // Failing keys must not accumulate registry entries.
        assert_eq!(service.flight_count(), 0);
    }

    #[tokio::test]
    async fn flush_forces_a_fresh_authority_call() {
        let authority = Arc::new(CountingAuthority::new());
        let service = service_with(Arc::clone(&authority), Duration::from_secs(60));

        let mut ctx = service.context(session("alice", "S1"));
        ctx.load_authorization_data().await.unwrap();
        ctx.flush_cache().await.unwrap();
        ctx.load_authorization_data().await.unwrap();

        assert_eq!(authority.calls(), 2);
    }

    #[tokio::test]
    async fn corrupt_cache_entry_is_recomputed() {
        let cache = Arc::new(MemoryCacheStore::new());
        let authority = Arc::new(CountingAuthority::new());
        let service = Arc::new(AuthzService::new(
            Arc::clone(&cache) as Arc<dyn CacheStore>,
            Arc::clone(&authority) as Arc<dyn AuthorizationAuthority>,
            Duration::from_secs(60),
            Duration::from_millis(200),
        ));

        cache
            .set_string_with_ttl("alice|S1|", "not json", Duration::from_secs(60))
            .await
            .unwrap();

        let snapshot = service.load(&session("alice", "S1")).await.unwrap();

        assert_eq!(authority.calls(), 1);
        assert!(snapshot.has_permission("write"));
    }

    #[tokio::test]
    async fn expired_snapshot_is_reloaded() {
        let authority = Arc::new(CountingAuthority::new());
        let service = service_with(Arc::clone(&authority), Duration::from_millis(0));

        service.load(&session("alice", "S1")).await.unwrap();
        service.load(&session("alice", "S1")).await.unwrap();

        assert_eq!(authority.calls(), 2);
    }
}
