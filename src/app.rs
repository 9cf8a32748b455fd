/*
 * Responsibility
 * - Config load → dependency construction → Router assembly
 * - Middleware application (http layers, bearer auth, role augmentation)
 * - Startup of axum::serve()
 *
 * The permission catalog is built here so a conflicting declaration
 * aborts startup instead of surfacing per request.
 */
use std::sync::Arc;
use std::{panic, process};

use anyhow::{Context, Result};
use axum::{Router, routing::get};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api;
use crate::api::v1::handlers::health::health;
use crate::api::v1::handlers::todos::TodoStore;
use crate::config::{CacheBackend, Config};
use crate::middleware;
use crate::services::authz::{
    AuthzService, PermissionCatalog, ServicePermissionChecker, StaticAuthority,
};
use crate::services::cache::{CacheStore, MemoryCacheStore, ValkeyCacheStore};
use crate::services::roles::{RoleCache, StaticRoleResolver};
use crate::services::token::TokenVerifier;
use crate::state::AppState;

fn init_tracing() {
    // Prefer RUST_LOG if set; otherwise use a sensible default.
    // Ex:
    // RUST_LOG=info,authz_core=debug,tower_http=debug cargo run
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn init_panic_hook(abort_on_panic: bool) {
    // Keep the default hook as a fallback (prints to stderr with location/payload).
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        // Always surface panics via tracing so they don't get lost
        // (stderr can be hidden depending on how the process is launched).
        tracing::error!(?info, "panic");

        if abort_on_panic {
            process::abort();
        } else {
            default_hook(info);
        }
    }))
}

pub async fn run() -> Result<()> {
    init_tracing();
    let config = Config::from_env().context("loading configuration")?;

    let abort_on_panic = !config.app_env.is_production();
    init_panic_hook(abort_on_panic);

    tracing::info!(
        "starting authorization host in {:?} mode on {}",
        config.app_env,
        config.addr
    );

    let state = build_state(&config).await?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .context("binding listener")?;
    axum::serve(listener, app).await.context("serving")?;

    Ok(())
}

/// Required-permission declarations for every guarded action.
///
/// `ITodoService` is the contract-name alias: a caller authorizing through
/// the contract name and one authorizing through the implementation name
/// must resolve to the identical requirement sets.
pub fn permission_catalog() -> Result<PermissionCatalog, crate::services::authz::CatalogError> {
    Ok(PermissionCatalog::builder()
        .action("TodoService", "list", ["Todo.Read"])?
        .action("TodoService", "create", ["Todo.Write"])?
        .action("TodoService", "remove", ["Todo.Write", "Todo.Admin"])?
        .action("AdminService", "flush_cache", ["Admin.FlushCache"])?
        .service_alias("ITodoService", "TodoService")?
        .build())
}

async fn build_state(config: &Config) -> Result<AppState> {
    let cache: Arc<dyn CacheStore> = match config.cache_backend {
        CacheBackend::Memory => Arc::new(MemoryCacheStore::new()),
        CacheBackend::Valkey => {
            let url = config
                .valkey_url
                .as_deref()
                .context("VALKEY_URL must be set for the valkey backend")?;
            Arc::new(
                ValkeyCacheStore::new(url)
                    .await
                    .context("connecting to valkey")?,
            )
        }
    };

    // Demo tables standing in for the external role/authorization
    // authorities. Real deployments implement RoleResolver and
    // AuthorizationAuthority against their identity systems and hand them
    // in here.
    let role_resolver = Arc::new(
        StaticRoleResolver::default()
            .with_identity("alice@corp", ["reader", "writer"])
            .with_identity("bob@corp", ["reader"])
            .with_identity("ops@corp", ["operator"]),
    );
    let authority = Arc::new(
        StaticAuthority::default()
            .with_user("alice@corp", ["Todo.Read", "Todo.Write"])
            .with_user("bob@corp", ["Todo.Read"])
            .with_user("ops@corp", ["Admin.FlushCache"]),
    );

    let authz = Arc::new(AuthzService::new(
        cache,
        authority,
        config.authz_cache_ttl,
        config.authority_timeout,
    ));

    let catalog = permission_catalog().context("building permission catalog")?;
    let checker = Arc::new(ServicePermissionChecker::new(Arc::new(catalog)));

    let verifier = TokenVerifier::new(
        &config.auth_hmac_secret,
        &config.auth_issuer,
        &config.auth_audience,
        config.access_token_leeway_seconds,
    );

    Ok(AppState {
        verifier,
        authz,
        checker,
        role_resolver,
        role_cache: Arc::new(RoleCache::new(
            config.role_cache_ttl,
            config.role_cache_max_entries,
        )),
        todos: Arc::new(TodoStore::new()),
        name_claim: Arc::from(config.name_claim.as_str()),
        default_system: Arc::from(config.default_system.as_str()),
        resolver_timeout: config.authority_timeout,
        max_body_bytes: config.max_body_bytes,
        request_timeout: config.request_timeout,
    })
}

/// Assemble the full router: public health, authenticated `/api/v1/*`.
pub fn build_router(state: AppState) -> Router {
    let max_body_bytes = state.max_body_bytes;
    let request_timeout = state.request_timeout;

    let v1 = api::v1::routes::routes();
    let v1 = middleware::role_augment::apply(v1, state.clone());
    let v1 = middleware::bearer_auth::apply(v1, state.clone());

    let router = Router::new()
        .route("/health", get(health))
        .nest("/api/v1", v1)
        .with_state(state);

    middleware::http::apply(router, max_body_bytes, request_timeout)
}
