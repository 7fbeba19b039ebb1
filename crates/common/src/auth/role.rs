//! Roles and the role resolver

use serde::{Deserialize, Serialize};
use std::fmt;

/// A named bundle of permissions assigned to an authenticated actor.
///
/// The set is closed. Roles are resolved once per request from the identity
/// headers and never stored as free text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Staff,
    Student,
    Viewer,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Admin, Role::Staff, Role::Student, Role::Viewer];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Staff => "STAFF",
            Role::Student => "STUDENT",
            Role::Viewer => "VIEWER",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Role::Admin => "Platform administrator with all permissions",
            Role::Staff => "University staff moderating submissions and publications",
            Role::Student => "Student author submitting works for review",
            Role::Viewer => "Anonymous or unprivileged reader",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolve a raw role hint (header or token claim) to a role.
///
/// Trusts its input as already authenticated upstream. Unknown, empty or
/// missing values resolve to [`Role::Viewer`]; this function never fails.
pub fn resolve_role(raw: Option<&str>) -> Role {
    let Some(raw) = raw else {
        return Role::Viewer;
    };

    let normalized = raw.trim().to_uppercase();
    let normalized = normalized.strip_prefix("ROLE_").unwrap_or(&normalized);

    match normalized {
        "ADMIN" | "ADMINISTRATOR" | "ADMINISTRATEUR" => Role::Admin,
        "STAFF" | "PERSONNEL" | "EMPLOYEE" | "EMPLOYE" | "EMPLOYÉ" | "TEACHER" | "ENSEIGNANT" => {
            Role::Staff
        }
        "STUDENT" | "ETUDIANT" | "ÉTUDIANT" | "ELEVE" | "ÉLÈVE" => Role::Student,
        _ => Role::Viewer,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_canonical_names() {
        for role in Role::ALL {
            assert_eq!(resolve_role(Some(role.as_str())), role);
        }
    }

    #[test]
    fn test_resolve_aliases() {
        assert_eq!(resolve_role(Some("personnel")), Role::Staff);
        assert_eq!(resolve_role(Some("Employee")), Role::Staff);
        assert_eq!(resolve_role(Some("étudiant")), Role::Student);
        assert_eq!(resolve_role(Some("ETUDIANT")), Role::Student);
        assert_eq!(resolve_role(Some("administrateur")), Role::Admin);
        assert_eq!(resolve_role(Some("visitor")), Role::Viewer);
    }

    #[test]
    fn test_resolve_trims_and_strips_prefix() {
        assert_eq!(resolve_role(Some("  staff \n")), Role::Staff);
        assert_eq!(resolve_role(Some("ROLE_ADMIN")), Role::Admin);
        assert_eq!(resolve_role(Some("role_student")), Role::Student);
    }

    #[test]
    fn test_unknown_empty_missing_resolve_to_viewer() {
        for raw in [None, Some(""), Some("   "), Some("root"), Some("STAFFER"), Some("ROLE_")] {
            assert_eq!(resolve_role(raw), Role::Viewer, "input {:?}", raw);
        }
    }

    #[test]
    fn test_role_serde() {
        assert_eq!(serde_json::to_string(&Role::Staff).unwrap(), "\"STAFF\"");
        let role: Role = serde_json::from_str("\"STUDENT\"").unwrap();
        assert_eq!(role, Role::Student);
    }
}
