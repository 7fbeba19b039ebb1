//! Role-to-permission map
//!
//! Built once at startup and shared read-only (`Arc<RolePermissionMap>`).
//! There is no API that mutates a map after construction.

use std::collections::{BTreeSet, HashMap};

use super::{Permission, Role};

/// Immutable mapping from role to granted permissions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RolePermissionMap {
    grants: HashMap<Role, BTreeSet<Permission>>,
}

impl RolePermissionMap {
    /// The platform's role table.
    pub fn standard() -> Self {
        use Permission::*;

        let viewer = [ViewPublic, DownloadPublication];
        let student = [Comment, Submit, ViewOwnSubmissions];
        let staff = [
            Moderate,
            ApproveSubmission,
            RejectSubmission,
            RequestRevision,
            ManagePublications,
            ViewAnalytics,
        ];

        Self::from_grants([
            (Role::Viewer, viewer.to_vec()),
            (Role::Student, [&viewer[..], &student[..]].concat()),
            (Role::Staff, [&viewer[..], &student[..], &staff[..]].concat()),
            (Role::Admin, vec![All]),
        ])
    }

    /// Build a table from explicit grants. Roles left out get no permissions.
    pub fn from_grants<I, P>(grants: I) -> Self
    where
        I: IntoIterator<Item = (Role, P)>,
        P: IntoIterator<Item = Permission>,
    {
        let grants = grants
            .into_iter()
            .map(|(role, permissions)| (role, permissions.into_iter().collect()))
            .collect();

        Self { grants }
    }

    /// Granted permissions of a role, as configured (the wildcard role keeps `ALL`).
    pub fn permissions_for(&self, role: impl Into<Option<Role>>) -> BTreeSet<Permission> {
        role.into()
            .and_then(|role| self.grants.get(&role))
            .cloned()
            .unwrap_or_default()
    }

    /// Effective permissions, with the wildcard expanded to every permission except `ALL`.
    pub fn effective_permissions(&self, role: impl Into<Option<Role>>) -> BTreeSet<Permission> {
        let granted = self.permissions_for(role);
        if granted.contains(&Permission::All) {
            Permission::all().filter(|p| !p.is_wildcard()).collect()
        } else {
            granted
        }
    }

    pub fn has_permission(
        &self,
        role: impl Into<Option<Role>>,
        permission: impl Into<Option<Permission>>,
    ) -> bool {
        let (Some(role), Some(permission)) = (role.into(), permission.into()) else {
            return false;
        };

        match self.grants.get(&role) {
            Some(granted) => granted.contains(&Permission::All) || granted.contains(&permission),
            None => false,
        }
    }

    /// True when at least one permission is held; false for an empty list.
    pub fn has_any(&self, role: impl Into<Option<Role>>, permissions: &[Permission]) -> bool {
        let role = role.into();
        permissions.iter().any(|p| self.has_permission(role, *p))
    }

    /// True when every permission is held; true for an empty list.
    pub fn has_all(&self, role: impl Into<Option<Role>>, permissions: &[Permission]) -> bool {
        let role = role.into();
        role.is_some() && permissions.iter().all(|p| self.has_permission(role, *p))
    }

    /// Roles present in the table, in declaration order
    pub fn roles(&self) -> impl Iterator<Item = Role> + '_ {
        Role::ALL.into_iter().filter(|role| self.grants.contains_key(role))
    }
}

impl Default for RolePermissionMap {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staff_scenario() {
        let map = RolePermissionMap::standard();
        assert!(map.has_permission(Role::Staff, Permission::Moderate));
        assert!(!map.has_permission(Role::Staff, Permission::ManageUsers));
    }

    #[test]
    fn test_has_permission_matches_granted_set() {
        let map = RolePermissionMap::standard();
        for role in Role::ALL {
            let granted = map.permissions_for(role);
            for permission in Permission::all() {
                let expected = granted.contains(&permission) || granted.contains(&Permission::All);
                assert_eq!(
                    map.has_permission(role, permission),
                    expected,
                    "{} / {}",
                    role,
                    permission
                );
            }
        }
    }

    #[test]
    fn test_wildcard_role_has_everything() {
        let map = RolePermissionMap::standard();
        for permission in Permission::all() {
            assert!(map.has_permission(Role::Admin, permission));
        }

        let effective = map.effective_permissions(Role::Admin);
        assert!(!effective.contains(&Permission::All));
        assert_eq!(effective.len(), Permission::CATALOG.len() - 1);
    }

    #[test]
    fn test_roles_are_nested() {
        let map = RolePermissionMap::standard();
        let viewer = map.effective_permissions(Role::Viewer);
        let student = map.effective_permissions(Role::Student);
        let staff = map.effective_permissions(Role::Staff);
        let admin = map.effective_permissions(Role::Admin);

        assert!(viewer.is_subset(&student));
        assert!(student.is_subset(&staff));
        assert!(staff.is_subset(&admin));
    }

    #[test]
    fn test_absent_role_fails_closed() {
        let map = RolePermissionMap::from_grants([(Role::Student, vec![Permission::Submit])]);
        assert!(map.permissions_for(Role::Staff).is_empty());
        assert!(!map.has_permission(Role::Staff, Permission::ViewPublic));
        assert_eq!(map.roles().collect::<Vec<_>>(), vec![Role::Student]);
    }

    #[test]
    fn test_none_inputs_return_false() {
        let map = RolePermissionMap::standard();
        assert!(!map.has_permission(None::<Role>, Permission::ViewPublic));
        assert!(!map.has_permission(Role::Admin, None::<Permission>));
        assert!(map.permissions_for(None::<Role>).is_empty());
        assert!(!map.has_any(None::<Role>, &[Permission::ViewPublic]));
        assert!(!map.has_all(None::<Role>, &[]));
    }

    #[test]
    fn test_any_and_all() {
        let map = RolePermissionMap::standard();
        assert!(map.has_any(Role::Student, &[Permission::ManageUsers, Permission::Submit]));
        assert!(!map.has_any(Role::Student, &[]));
        assert!(map.has_all(Role::Student, &[]));
        assert!(map.has_all(Role::Staff, &[Permission::Moderate, Permission::ApproveSubmission]));
        assert!(!map.has_all(Role::Student, &[Permission::Submit, Permission::Moderate]));
    }

    #[test]
    fn test_permissions_for_is_stable() {
        let map = RolePermissionMap::standard();
        for role in Role::ALL {
            assert_eq!(map.permissions_for(role), map.permissions_for(role));
        }
    }
}
