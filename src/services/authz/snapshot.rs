//! The per-user authorization snapshot.
use serde::{Deserialize, Serialize};

/// One permission granted to a user.
///
/// `active` travels with the grant as delivered by the authority but does
/// not filter membership checks; the authority decides what it hands out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionGrant {
    pub identifier: String,
    pub active: bool,
}

impl PermissionGrant {
    pub fn new(identifier: impl Into<String>, active: bool) -> Self {
        Self {
            identifier: identifier.into(),
            active,
        }
    }
}

/// The full set of permissions granted to one user for one system at one
/// point in time.
///
/// Immutable once constructed: snapshots are rebuilt wholesale on cache
/// expiry, never patched in place. Serialized as JSON for the cache store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationSnapshot {
    pub user_id: String,
    pub permissions: Vec<PermissionGrant>,
}

impl AuthorizationSnapshot {
    pub fn new(user_id: impl Into<String>, permissions: Vec<PermissionGrant>) -> Self {
        Self {
            user_id: user_id.into(),
            permissions,
        }
    }

    fn contains(&self, action: &str) -> bool {
        self.permissions
            .iter()
            .any(|grant| grant.identifier.eq_ignore_ascii_case(action))
    }

    /// Whether `action` is in the granted set (case-insensitive match).
    pub fn has_permission(&self, action: &str) -> bool {
        !self.permissions.is_empty() && self.contains(action)
    }

    /// Whether the user holds any permission at all.
    pub fn has_any_permission(&self) -> bool {
        !self.permissions.is_empty()
    }

    /// Equivalent to [`has_permission`](Self::has_permission): the snapshot
    /// carries no scope qualifier that would distinguish an "unlimited"
    /// grant. Kept as a named operation for symmetry with the data model.
    pub fn has_permission_unlimited(&self, action: &str) -> bool {
        self.has_permission(action)
    }

    /// Whether any of `actions` is in the granted set.
    pub fn has_any_permission_unlimited<I>(&self, actions: I) -> bool
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        actions
            .into_iter()
            .any(|action| self.has_permission(action.as_ref()))
    }

    /// The elements of `candidates` that are also granted.
    ///
    /// Membership is case-insensitive; the result preserves the order,
    /// spelling, and duplicates of `candidates`. Empty when either side
    /// is empty.
    pub fn intersected_permission_identifiers<'a, I>(&self, candidates: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        candidates
            .into_iter()
            .filter(|candidate| self.has_permission(candidate))
            .map(str::to_string)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(perms: &[&str]) -> AuthorizationSnapshot {
        AuthorizationSnapshot::new(
            "alice",
            perms
                .iter()
                .map(|p| PermissionGrant::new(*p, true))
                .collect(),
        )
    }

    #[test]
    fn permission_match_is_case_insensitive() {
        let snap = snapshot(&["Read", "Write"]);

        assert!(snap.has_permission("read"));
        assert!(snap.has_permission("WRITE"));
        assert!(!snap.has_permission("Delete"));
    }

    #[test]
    fn empty_snapshot_denies_without_error() {
        let snap = snapshot(&[]);

        assert!(!snap.has_permission("anything"));
        assert!(!snap.has_any_permission());
    }

    #[test]
    fn unlimited_checks_are_equivalent_to_plain_checks() {
        let snap = snapshot(&["Read"]);

        assert_eq!(snap.has_permission("read"), snap.has_permission_unlimited("read"));
        assert!(snap.has_any_permission_unlimited(["Delete", "READ"]));
        assert!(!snap.has_any_permission_unlimited(["Delete", "Admin"]));
    }

    #[test]
    fn inactive_grants_still_count_as_membership() {
        let snap = AuthorizationSnapshot::new(
            "alice",
            vec![PermissionGrant::new("Read", false)],
        );

        assert!(snap.has_permission("read"));
    }

    #[test]
    fn intersection_preserves_candidate_order_and_case() {
        let snap = snapshot(&["Read", "Write"]);

        let result = snap.intersected_permission_identifiers(["Write", "Delete", "READ"]);

        assert_eq!(result, vec!["Write".to_string(), "READ".to_string()]);
    }

    #[test]
    fn intersection_preserves_duplicates() {
        let snap = snapshot(&["Read"]);

        let result = snap.intersected_permission_identifiers(["read", "read"]);

        assert_eq!(result, vec!["read".to_string(), "read".to_string()]);
    }

    #[test]
    fn intersection_is_empty_when_either_side_is_empty() {
        assert!(snapshot(&[]).intersected_permission_identifiers(["Read"]).is_empty());
        assert!(
            snapshot(&["Read"])
                .intersected_permission_identifiers(std::iter::empty())
                .is_empty()
        );
    }

    #[test]
    fn snapshot_round_trips_through_cache_wire_format() {
        let snap = snapshot(&["Read", "Write"]);

        let json = serde_json::to_string(&snap).unwrap();
        let restored: AuthorizationSnapshot = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.user_id, "alice");
        assert!(restored.has_permission("write"));
    }
}
