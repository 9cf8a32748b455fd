/*
 * Responsibility
 * - Environment/configuration loading (bind address, auth settings,
 *   cache backend, TTLs)
 * - Validation of the values (startup fails on missing mandatory keys)
 */
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    pub fn from_env() -> Self {
        match std::env::var("APP_ENV")
            .unwrap_or_else(|_| "development".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Which backend serves the authorization snapshot cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackend {
    Memory,
    Valkey,
}

#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,

    pub auth_issuer: String,
    pub auth_audience: String,
    pub auth_hmac_secret: String,
    pub access_token_leeway_seconds: u64,

    /// The claim whose value names the user in the role authority's
    /// namespace. Mandatory: there is no sensible fallback to guess.
    pub name_claim: String,

    /// Default system identifier when a request carries no `X-System`.
    pub default_system: String,

    pub cache_backend: CacheBackend,
    pub valkey_url: Option<String>,

    pub authz_cache_ttl: Duration,
    pub role_cache_ttl: Duration,
    pub role_cache_max_entries: usize,
    pub authority_timeout: Duration,

    /// Upper bound on an incoming request body.
    pub max_body_bytes: usize,
    /// Deadline for one whole request.
    pub request_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let port: u16 = std::env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3000);

        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let app_env = AppEnv::from_env();

        let auth_issuer =
            std::env::var("AUTH_ISSUER").map_err(|_| ConfigError::Missing("AUTH_ISSUER"))?;

        let auth_audience =
            std::env::var("AUTH_AUDIENCE").map_err(|_| ConfigError::Missing("AUTH_AUDIENCE"))?;

        let auth_hmac_secret = std::env::var("AUTH_JWT_HMAC_SECRET")
            .map_err(|_| ConfigError::Missing("AUTH_JWT_HMAC_SECRET"))?;
        if auth_hmac_secret.len() < 32 {
            return Err(ConfigError::Invalid("AUTH_JWT_HMAC_SECRET"));
        }

        let access_token_leeway_seconds = std::env::var("ACCESS_TOKEN_LEEWAY_SECONDS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(60);

        let name_claim =
            std::env::var("NAME_CLAIM").map_err(|_| ConfigError::Missing("NAME_CLAIM"))?;
        if name_claim.trim().is_empty() {
            return Err(ConfigError::Invalid("NAME_CLAIM"));
        }

        let default_system = std::env::var("SYSTEM_ID").unwrap_or_else(|_| "todo".to_string());

        let cache_backend = match std::env::var("CACHE_BACKEND")
            .unwrap_or_else(|_| "memory".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "memory" => CacheBackend::Memory,
            "valkey" | "redis" => CacheBackend::Valkey,
            _ => return Err(ConfigError::Invalid("CACHE_BACKEND")),
        };

        let valkey_url = std::env::var("VALKEY_URL").ok();
        if cache_backend == CacheBackend::Valkey && valkey_url.is_none() {
            return Err(ConfigError::Missing("VALKEY_URL"));
        }

        let authz_cache_ttl = Duration::from_secs(
            std::env::var("AUTHZ_CACHE_TTL_SECONDS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(15 * 60),
        );

        let role_cache_ttl = Duration::from_secs(
            std::env::var("ROLE_CACHE_TTL_SECONDS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60 * 60),
        );

        let role_cache_max_entries = std::env::var("ROLE_CACHE_MAX_ENTRIES")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(10_000);

        let authority_timeout = Duration::from_secs(
            std::env::var("AUTHORITY_TIMEOUT_SECONDS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(5),
        );

        let max_body_bytes = std::env::var("MAX_BODY_BYTES")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(1024 * 1024);

        let request_timeout = Duration::from_secs(
            std::env::var("REQUEST_TIMEOUT_SECONDS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(30),
        );

        Ok(Self {
            addr,
            app_env,
            auth_issuer,
            auth_audience,
            auth_hmac_secret,
            access_token_leeway_seconds,
            name_claim,
            default_system,
            cache_backend,
            valkey_url,
            authz_cache_ttl,
            role_cache_ttl,
            role_cache_max_entries,
            authority_timeout,
            max_body_bytes,
            request_timeout,
        })
    }
}
