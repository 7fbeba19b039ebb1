//! Submission workflow state machine
//!
//! Every status change goes through [`transition`], a single lookup in the
//! table below. Terminal statuses reject every event.
//!
//! | From               | Event            | To         |
//! |--------------------|------------------|------------|
//! | PENDING, IN_REVIEW | approve          | VALIDATED  |
//! | PENDING, IN_REVIEW | reject           | REJECTED   |
//! | PENDING            | request revision | IN_REVIEW  |
//! | PENDING, IN_REVIEW | withdraw         | WITHDRAWN  |

use std::fmt;
use std::str::FromStr;

use campuspress_common::{AppError, Permission};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmissionStatus {
    Pending,
    InReview,
    Validated,
    Rejected,
    Withdrawn,
}

impl SubmissionStatus {
    pub const ALL: [SubmissionStatus; 5] = [
        SubmissionStatus::Pending,
        SubmissionStatus::InReview,
        SubmissionStatus::Validated,
        SubmissionStatus::Rejected,
        SubmissionStatus::Withdrawn,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Pending => "PENDING",
            SubmissionStatus::InReview => "IN_REVIEW",
            SubmissionStatus::Validated => "VALIDATED",
            SubmissionStatus::Rejected => "REJECTED",
            SubmissionStatus::Withdrawn => "WITHDRAWN",
        }
    }

    /// No event is accepted from a terminal status
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SubmissionStatus::Validated | SubmissionStatus::Rejected | SubmissionStatus::Withdrawn
        )
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown submission status '{0}'")]
pub struct UnknownStatus(pub String);

impl FromStr for SubmissionStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase();
        SubmissionStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

/// Something an actor does to a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmissionEvent {
    Approve,
    Reject,
    RequestRevision,
    Withdraw,
}

impl SubmissionEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionEvent::Approve => "APPROVE",
            SubmissionEvent::Reject => "REJECT",
            SubmissionEvent::RequestRevision => "REQUEST_REVISION",
            SubmissionEvent::Withdraw => "WITHDRAW",
        }
    }

    /// Verb used in error messages
    pub fn verb(&self) -> &'static str {
        match self {
            SubmissionEvent::Approve => "approve",
            SubmissionEvent::Reject => "reject",
            SubmissionEvent::RequestRevision => "request revisions on",
            SubmissionEvent::Withdraw => "withdraw",
        }
    }

    /// Permission a moderator needs. Withdrawal is reserved to the owner instead.
    pub fn required_permission(&self) -> Option<Permission> {
        match self {
            SubmissionEvent::Approve => Some(Permission::ApproveSubmission),
            SubmissionEvent::Reject => Some(Permission::RejectSubmission),
            SubmissionEvent::RequestRevision => Some(Permission::RequestRevision),
            SubmissionEvent::Withdraw => None,
        }
    }
}

impl fmt::Display for SubmissionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("submission already finalized")]
    Finalized {
        current: SubmissionStatus,
        event: SubmissionEvent,
    },

    #[error("{event} is not allowed from {current}")]
    NotAllowed {
        current: SubmissionStatus,
        event: SubmissionEvent,
    },
}

impl TransitionError {
    pub fn current(&self) -> SubmissionStatus {
        match self {
            TransitionError::Finalized { current, .. } | TransitionError::NotAllowed { current, .. } => {
                *current
            }
        }
    }

    pub fn event(&self) -> SubmissionEvent {
        match self {
            TransitionError::Finalized { event, .. } | TransitionError::NotAllowed { event, .. } => {
                *event
            }
        }
    }
}

impl From<TransitionError> for AppError {
    fn from(err: TransitionError) -> Self {
        AppError::IllegalStateTransition {
            current: err.current().to_string(),
            attempted: err.event().verb().to_string(),
            reason: err.to_string(),
        }
    }
}

/// Compute the status `event` leads to from `from`
pub fn transition(
    from: SubmissionStatus,
    event: SubmissionEvent,
) -> Result<SubmissionStatus, TransitionError> {
    use SubmissionEvent::*;
    use SubmissionStatus::*;

    if from.is_terminal() {
        return Err(TransitionError::Finalized { current: from, event });
    }

    match (from, event) {
        (Pending | InReview, Approve) => Ok(Validated),
        (Pending | InReview, Reject) => Ok(Rejected),
        (Pending, RequestRevision) => Ok(InReview),
        (Pending | InReview, Withdraw) => Ok(Withdrawn),
        _ => Err(TransitionError::NotAllowed { current: from, event }),
    }
}

/// Whether some event moves a submission from `from` to `to`
pub fn can_transition(from: SubmissionStatus, to: SubmissionStatus) -> bool {
    [
        SubmissionEvent::Approve,
        SubmissionEvent::Reject,
        SubmissionEvent::RequestRevision,
        SubmissionEvent::Withdraw,
    ]
    .into_iter()
    .any(|event| transition(from, event) == Ok(to))
}

#[cfg(test)]
mod tests {
    use super::*;
    use SubmissionEvent::*;
    use SubmissionStatus::*;

    const EVENTS: [SubmissionEvent; 4] = [Approve, Reject, RequestRevision, Withdraw];

    #[test]
    fn test_transition_table() {
        assert_eq!(transition(Pending, Approve), Ok(Validated));
        assert_eq!(transition(InReview, Approve), Ok(Validated));
        assert_eq!(transition(Pending, Reject), Ok(Rejected));
        assert_eq!(transition(InReview, Reject), Ok(Rejected));
        assert_eq!(transition(Pending, RequestRevision), Ok(InReview));
        assert_eq!(transition(Pending, Withdraw), Ok(Withdrawn));
        assert_eq!(transition(InReview, Withdraw), Ok(Withdrawn));

        assert_eq!(
            transition(InReview, RequestRevision),
            Err(TransitionError::NotAllowed { current: InReview, event: RequestRevision })
        );
    }

    #[test]
    fn test_terminal_states_reject_every_event() {
        for status in [Validated, Rejected, Withdrawn] {
            assert!(status.is_terminal());
            for event in EVENTS {
                let err = transition(status, event).unwrap_err();
                assert_eq!(err, TransitionError::Finalized { current: status, event });
                assert_eq!(err.to_string(), "submission already finalized");
            }
        }
    }

    #[test]
    fn test_can_transition() {
        assert!(can_transition(Pending, InReview));
        assert!(can_transition(InReview, Validated));
        assert!(!can_transition(InReview, Pending));
        assert!(!can_transition(Pending, Pending));
        for to in SubmissionStatus::ALL {
            assert!(!can_transition(Withdrawn, to));
        }
    }

    #[test]
    fn test_required_permissions() {
        assert_eq!(Approve.required_permission(), Some(Permission::ApproveSubmission));
        assert_eq!(Reject.required_permission(), Some(Permission::RejectSubmission));
        assert_eq!(RequestRevision.required_permission(), Some(Permission::RequestRevision));
        assert_eq!(Withdraw.required_permission(), None);
    }

    #[test]
    fn test_status_codes() {
        for status in SubmissionStatus::ALL {
            assert_eq!(status.as_str().parse::<SubmissionStatus>(), Ok(status));
        }
        assert_eq!("in_review".parse::<SubmissionStatus>(), Ok(InReview));
        assert!("DRAFT".parse::<SubmissionStatus>().is_err());
        assert_eq!(serde_json::to_string(&InReview).unwrap(), "\"IN_REVIEW\"");
    }

    #[test]
    fn test_into_app_error_carries_current_status() {
        let err: AppError = transition(Validated, Withdraw).unwrap_err().into();
        let details = err.details().unwrap();
        assert_eq!(details["currentStatus"], "VALIDATED");
        assert_eq!(err.to_string(), "Cannot withdraw submission in status VALIDATED: submission already finalized");
    }
}
