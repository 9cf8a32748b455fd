//! Bounded TTL cache for resolved role sets.
//!
//! Keyed by the identity name in the role authority's namespace. Shared
//! process-wide (one instance in `AppState`), so a role set resolved for
//! one request serves every request for the same identity until the
//! configured interval elapses. Entries expire on read; inserts evict
//! expired entries first and then the oldest live ones once the configured
//! capacity is reached, so the map stays bounded under many distinct
//! identities.
use std::time::{Duration, Instant};

use dashmap::DashMap;

#[derive(Debug, Clone)]
struct CachedRoles {
    roles: Vec<String>,
    resolved_at: Instant,
}

#[derive(Debug)]
pub struct RoleCache {
    entries: DashMap<String, CachedRoles>,
    ttl: Duration,
    max_entries: usize,
}

impl RoleCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    /// Roles for `name` if resolved within the TTL window.
    pub fn get(&self, name: &str) -> Option<Vec<String>> {
        let now = Instant::now();

        let expired = match self.entries.get(name) {
            Some(cached) if now.duration_since(cached.resolved_at) < self.ttl => {
                return Some(cached.roles.clone());
            }
            Some(_) => true,
            None => return None,
        };

        if expired {
            self.entries.remove(name);
        }
        None
    }

    pub fn insert(&self, name: impl Into<String>, roles: Vec<String>) {
        let now = Instant::now();

        if self.entries.len() >= self.max_entries {
            self.entries
                .retain(|_, cached| now.duration_since(cached.resolved_at) < self.ttl);
        }
        // Still full of live entries: drop the stalest one rather than grow.
        if self.entries.len() >= self.max_entries {
            if let Some(oldest) = self
                .entries
                .iter()
                .min_by_key(|entry| entry.resolved_at)
                .map(|entry| entry.key().clone())
            {
                self.entries.remove(&oldest);
            }
        }

        self.entries.insert(
            name.into(),
            CachedRoles {
                roles,
                resolved_at: now,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
