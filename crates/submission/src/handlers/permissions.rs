//! Permission introspection

use axum::{extract::State, Json};
use campuspress_common::auth::{Identity, Permission, Role};
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MyPermissionsResponse {
    pub user_id: Option<String>,
    pub role: Role,
    /// Granted codes as configured (the wildcard role reports `ALL`)
    pub permissions: Vec<&'static str>,
    /// Granted codes with the wildcard expanded
    pub effective_permissions: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct PermissionInfo {
    pub code: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Serialize)]
pub struct RoleInfo {
    pub role: Role,
    pub description: &'static str,
    pub permissions: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct CatalogResponse {
    pub permissions: Vec<PermissionInfo>,
    pub roles: Vec<RoleInfo>,
}

fn codes(permissions: impl IntoIterator<Item = Permission>) -> Vec<&'static str> {
    permissions.into_iter().map(|p| p.code()).collect()
}

/// Role and permissions of the caller
pub async fn my_permissions(
    State(state): State<AppState>,
    identity: Identity,
) -> Json<MyPermissionsResponse> {
    let map = state.submissions.guard().map();
    Json(MyPermissionsResponse {
        permissions: codes(map.permissions_for(identity.role)),
        effective_permissions: codes(map.effective_permissions(identity.role)),
        user_id: identity.user_id,
        role: identity.role,
    })
}

/// Permission catalog and the role table
pub async fn catalog(State(state): State<AppState>) -> Json<CatalogResponse> {
    let map = state.submissions.guard().map();
    Json(CatalogResponse {
        permissions: Permission::all()
            .map(|p| PermissionInfo {
                code: p.code(),
                description: p.description(),
            })
            .collect(),
        roles: Role::ALL
            .iter()
            .map(|role| RoleInfo {
                role: *role,
                description: role.description(),
                permissions: codes(map.permissions_for(*role)),
            })
            .collect(),
    })
}
