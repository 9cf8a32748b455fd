//! Static catalog of required permissions per service action.
//!
//! Replaces per-request attribute reflection with a lookup table populated
//! once at startup through an explicit registration API. Attribute
//! scanning (or any other discovery mechanism) is a *source* for this
//! table; the authorization core only consumes the lookup.
use std::collections::{HashMap, HashSet};

use thiserror::Error;

/// Developer-facing configuration faults. These abort startup; they are
/// never recoverable at request time.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error(
        "conflicting permission sets for {service}.{action}: {existing:?} vs {conflicting:?}"
    )]
    AmbiguousPermission {
        service: String,
        action: String,
        existing: Vec<String>,
        conflicting: Vec<String>,
    },
    #[error("service alias {alias:?} already points at {existing:?}, not {conflicting:?}")]
    ConflictingAlias {
        alias: String,
        existing: String,
        conflicting: String,
    },
}

/// Lookup table: (service, action) → required permission names.
///
/// An action may be reachable through several declared entry points (for
/// example a contract trait and the implementing service); aliases map the
/// alternate service names onto one canonical entry so every entry point
/// yields the identical requirement set. Actions absent from the catalog
/// are unrestricted.
#[derive(Debug, Default)]
pub struct PermissionCatalog {
    actions: HashMap<(String, String), Vec<String>>,
    service_aliases: HashMap<String, String>,
}

impl PermissionCatalog {
    pub fn builder() -> PermissionCatalogBuilder {
        PermissionCatalogBuilder::default()
    }

    /// Required permission names for one action, or `None` when the action
    /// declares no requirement (open action).
    pub fn required_permissions(&self, service: &str, action: &str) -> Option<&[String]> {
        let canonical = self
            .service_aliases
            .get(service)
            .map(String::as_str)
            .unwrap_or(service);

        self.actions
            .get(&(canonical.to_string(), action.to_string()))
            .map(Vec::as_slice)
    }
}

/// Startup-time registration API for the catalog.
#[derive(Debug, Default)]
pub struct PermissionCatalogBuilder {
    catalog: PermissionCatalog,
}

impl PermissionCatalogBuilder {
    /// Declare the permission names guarding `service.action`.
    ///
    /// Re-declaring an action with the identical set is a no-op (the same
    /// action may be declared from several entry points); a differing set
    /// is a configuration error and fails loudly.
    pub fn action<I>(
        mut self,
        service: impl Into<String>,
        action: impl Into<String>,
        permissions: I,
    ) -> Result<Self, CatalogError>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let service = service.into();
        let action = action.into();
        let permissions: Vec<String> = permissions.into_iter().map(Into::into).collect();

        let key = (service.clone(), action.clone());
        if let Some(existing) = self.catalog.actions.get(&key) {
            if !same_permission_set(existing, &permissions) {
                return Err(CatalogError::AmbiguousPermission {
                    service,
                    action,
                    existing: existing.clone(),
                    conflicting: permissions,
                });
            }
            return Ok(self);
        }

        self.catalog.actions.insert(key, permissions);
        Ok(self)
    }

    /// Make lookups through `alias` resolve as `canonical`, so a caller
    /// holding the contract name and one holding the implementation name
    /// are authorized identically.
    pub fn service_alias(
        mut self,
        alias: impl Into<String>,
        canonical: impl Into<String>,
    ) -> Result<Self, CatalogError> {
        let alias = alias.into();
        let canonical = canonical.into();

        if let Some(existing) = self.catalog.service_aliases.get(&alias) {
            if existing != &canonical {
                return Err(CatalogError::ConflictingAlias {
                    alias,
                    existing: existing.clone(),
                    conflicting: canonical,
                });
            }
            return Ok(self);
        }

        self.catalog.service_aliases.insert(alias, canonical);
        Ok(self)
    }

    pub fn build(self) -> PermissionCatalog {
        self.catalog
    }
}

fn same_permission_set(a: &[String], b: &[String]) -> bool {
    let a: HashSet<&str> = a.iter().map(String::as_str).collect();
    let b: HashSet<&str> = b.iter().map(String::as_str).collect();
    a == b
}
