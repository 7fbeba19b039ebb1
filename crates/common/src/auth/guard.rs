//! Authorization guard
//!
//! Pure predicates over an already-resolved role and the static role table.
//! No I/O happens here; callers decide how to report a denial.

use std::sync::Arc;

use serde_json::json;
use thiserror::Error;

use super::{Permission, Role, RolePermissionMap};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: role {} lacks permission '{permission}'", display_role(.role))]
    MissingPermission {
        role: Option<Role>,
        permission: Permission,
    },

    #[error("forbidden: role {} lacks any of {}", display_role(.role), join(.permissions))]
    MissingAnyPermission {
        role: Option<Role>,
        permissions: Vec<Permission>,
    },

    #[error("forbidden: role {} is not one of {}", display_role(.role), join(.allowed))]
    RoleNotAllowed { role: Option<Role>, allowed: Vec<Role> },
}

fn display_role(role: &Option<Role>) -> String {
    role.map(|r| r.to_string()).unwrap_or_else(|| "<none>".to_string())
}

fn join<T: ToString>(items: &[T]) -> String {
    let items: Vec<String> = items.iter().map(ToString::to_string).collect();
    format!("[{}]", items.join(", "))
}

impl AuthzError {
    /// What was required, for the response body
    pub fn details(&self) -> serde_json::Value {
        match self {
            AuthzError::MissingPermission { permission, .. } => json!({ "required": permission }),
            AuthzError::MissingAnyPermission { permissions, .. } => {
                json!({ "requiredAny": permissions })
            }
            AuthzError::RoleNotAllowed { allowed, .. } => json!({ "allowedRoles": allowed }),
        }
    }

    /// Label used for denial metrics
    pub fn requirement(&self) -> String {
        match self {
            AuthzError::MissingPermission { permission, .. } => permission.code().to_string(),
            AuthzError::MissingAnyPermission { permissions, .. } => join(permissions),
            AuthzError::RoleNotAllowed { allowed, .. } => join(allowed),
        }
    }
}

/// Checks resolved roles against the shared role table.
#[derive(Debug, Clone)]
pub struct RoleGuard {
    map: Arc<RolePermissionMap>,
}

impl RoleGuard {
    pub fn new(map: Arc<RolePermissionMap>) -> Self {
        Self { map }
    }

    /// The role table this guard reads
    pub fn map(&self) -> &RolePermissionMap {
        &self.map
    }

    pub fn require_permission(
        &self,
        role: impl Into<Option<Role>>,
        permission: Permission,
    ) -> Result<(), AuthzError> {
        let role = role.into();
        if self.map.has_permission(role, permission) {
            Ok(())
        } else {
            Err(AuthzError::MissingPermission { role, permission })
        }
    }

    /// Succeeds when any listed permission is held. An empty list never succeeds.
    pub fn require_any_permission(
        &self,
        role: impl Into<Option<Role>>,
        permissions: &[Permission],
    ) -> Result<(), AuthzError> {
        let role = role.into();
        if self.map.has_any(role, permissions) {
            Ok(())
        } else {
            Err(AuthzError::MissingAnyPermission {
                role,
                permissions: permissions.to_vec(),
            })
        }
    }

    /// Succeeds when every listed permission is held; reports the first one missing.
    pub fn require_all_permissions(
        &self,
        role: impl Into<Option<Role>>,
        permissions: &[Permission],
    ) -> Result<(), AuthzError> {
        let role = role.into();
        for permission in permissions {
            self.require_permission(role, *permission)?;
        }
        if role.is_none() {
            return Err(AuthzError::MissingAnyPermission {
                role,
                permissions: permissions.to_vec(),
            });
        }
        Ok(())
    }

    /// Coarse role membership check
    pub fn require_role_in(
        &self,
        role: impl Into<Option<Role>>,
        allowed: &[Role],
    ) -> Result<(), AuthzError> {
        let role = role.into();
        match role {
            Some(r) if allowed.contains(&r) => Ok(()),
            _ => Err(AuthzError::RoleNotAllowed {
                role,
                allowed: allowed.to_vec(),
            }),
        }
    }
}

impl Default for RoleGuard {
    fn default() -> Self {
        Self::new(Arc::new(RolePermissionMap::standard()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_require_permission() {
        let guard = RoleGuard::default();
        assert_ok!(guard.require_permission(Role::Staff, Permission::ApproveSubmission));

        let err = guard
            .require_permission(Role::Student, Permission::ApproveSubmission)
            .unwrap_err();
        assert_eq!(
            err,
            AuthzError::MissingPermission {
                role: Some(Role::Student),
                permission: Permission::ApproveSubmission,
            }
        );
        assert!(err.to_string().contains("APPROVE_SUBMISSION"));
        assert_eq!(err.details()["required"], "APPROVE_SUBMISSION");
    }

    #[test]
    fn test_wildcard_role_passes_everything() {
        let guard = RoleGuard::default();
        for permission in Permission::all() {
            assert_ok!(guard.require_permission(Role::Admin, permission));
        }
        assert_ok!(guard.require_all_permissions(Role::Admin, &Permission::CATALOG));
    }

    #[test]
    fn test_require_any_and_all() {
        let guard = RoleGuard::default();
        assert_ok!(guard.require_any_permission(
            Role::Viewer,
            &[Permission::Moderate, Permission::ViewPublic]
        ));
        assert_err!(guard.require_any_permission(Role::Viewer, &[]));
        assert_err!(guard.require_any_permission(Role::Viewer, &[Permission::Submit]));

        assert_ok!(guard.require_all_permissions(Role::Student, &[]));
        let err = guard
            .require_all_permissions(Role::Student, &[Permission::Submit, Permission::Moderate])
            .unwrap_err();
        assert_eq!(err.requirement(), "MODERATE");
    }

    #[test]
    fn test_require_role_in() {
        let guard = RoleGuard::default();
        assert_ok!(guard.require_role_in(Role::Staff, &[Role::Staff, Role::Admin]));
        let err = guard
            .require_role_in(Role::Student, &[Role::Staff, Role::Admin])
            .unwrap_err();
        assert_eq!(err.to_string(), "forbidden: role STUDENT is not one of [STAFF, ADMIN]");
        assert_err!(guard.require_role_in(None::<Role>, &Role::ALL));
    }

    #[test]
    fn test_missing_role_is_denied() {
        let guard = RoleGuard::default();
        assert_err!(guard.require_permission(None::<Role>, Permission::ViewPublic));
        assert_err!(guard.require_all_permissions(None::<Role>, &[]));
    }
}
