//! Permission catalog
//!
//! Atomic, checkable capabilities. Each permission has a stable code that is
//! exposed to clients for introspection, plus a human-readable description.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An atomic capability that can be granted to a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Permission {
    ViewPublic,
    DownloadPublication,
    Comment,
    Submit,
    ViewOwnSubmissions,
    Moderate,
    ApproveSubmission,
    RejectSubmission,
    RequestRevision,
    ManagePublications,
    ViewAnalytics,
    ManageUsers,
    /// Wildcard: grants every permission
    All,
}

impl Permission {
    /// Every permission in the catalog, wildcard last
    pub const CATALOG: [Permission; 13] = [
        Permission::ViewPublic,
        Permission::DownloadPublication,
        Permission::Comment,
        Permission::Submit,
        Permission::ViewOwnSubmissions,
        Permission::Moderate,
        Permission::ApproveSubmission,
        Permission::RejectSubmission,
        Permission::RequestRevision,
        Permission::ManagePublications,
        Permission::ViewAnalytics,
        Permission::ManageUsers,
        Permission::All,
    ];

    /// Iterate over the whole catalog
    pub fn all() -> impl Iterator<Item = Permission> {
        Self::CATALOG.into_iter()
    }

    /// Stable code exposed to clients
    pub fn code(&self) -> &'static str {
        match self {
            Permission::ViewPublic => "VIEW_PUBLIC",
            Permission::DownloadPublication => "DOWNLOAD_PUBLICATION",
            Permission::Comment => "COMMENT",
            Permission::Submit => "SUBMIT",
            Permission::ViewOwnSubmissions => "VIEW_OWN_SUBMISSIONS",
            Permission::Moderate => "MODERATE",
            Permission::ApproveSubmission => "APPROVE_SUBMISSION",
            Permission::RejectSubmission => "REJECT_SUBMISSION",
            Permission::RequestRevision => "REQUEST_REVISION",
            Permission::ManagePublications => "MANAGE_PUBLICATIONS",
            Permission::ViewAnalytics => "VIEW_ANALYTICS",
            Permission::ManageUsers => "MANAGE_USERS",
            Permission::All => "ALL",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Permission::ViewPublic => "Browse and read published works",
            Permission::DownloadPublication => "Download the files of published works",
            Permission::Comment => "Comment on published works",
            Permission::Submit => "Submit a work for editorial review",
            Permission::ViewOwnSubmissions => "View and track one's own submissions",
            Permission::Moderate => "Access the moderation queue and any submission",
            Permission::ApproveSubmission => "Approve a submission for publication",
            Permission::RejectSubmission => "Reject a submission",
            Permission::RequestRevision => "Ask the author of a submission for revisions",
            Permission::ManagePublications => "Manage published works",
            Permission::ViewAnalytics => "View platform analytics",
            Permission::ManageUsers => "Administer user accounts and roles",
            Permission::All => "Wildcard permission - grants all permissions",
        }
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, Permission::All)
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Error returned when parsing an unknown permission code
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown permission code '{0}'")]
pub struct UnknownPermission(pub String);

impl FromStr for Permission {
    type Err = UnknownPermission;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase();
        Permission::all()
            .find(|p| p.code() == normalized)
            .ok_or_else(|| UnknownPermission(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_codes_are_unique() {
        let codes: HashSet<&str> = Permission::all().map(|p| p.code()).collect();
        assert_eq!(codes.len(), Permission::CATALOG.len());
    }

    #[test]
    fn test_parse_code_case_insensitive() {
        assert_eq!("moderate".parse::<Permission>().unwrap(), Permission::Moderate);
        assert_eq!(" APPROVE_SUBMISSION ".parse::<Permission>().unwrap(), Permission::ApproveSubmission);
        assert!("FLY".parse::<Permission>().is_err());
    }

    #[test]
    fn test_serde_uses_code() {
        let json = serde_json::to_string(&Permission::RequestRevision).unwrap();
        assert_eq!(json, "\"REQUEST_REVISION\"");

        for permission in Permission::all() {
            let json = serde_json::to_string(&permission).unwrap();
            assert_eq!(json, format!("\"{}\"", permission.code()));
        }
    }

    #[test]
    fn test_only_all_is_wildcard() {
        assert_eq!(Permission::all().filter(|p| p.is_wildcard()).count(), 1);
        assert!(Permission::All.is_wildcard());
    }
}
