//! Stack status values and the poll action each one maps to.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// What the poll loop does after observing a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollAction {
    /// Creation or update in progress.
    Wait,
    /// Cleanup after a successful update; not terminal yet.
    WaitOk,
    /// Terminal success; outputs are readable.
    Succeed,
    /// Terminal failure.
    Error,
    /// Rollback in progress; will end in `Error`.
    WaitError,
}

impl PollAction {
    pub fn is_terminal(self) -> bool {
        matches!(self, PollAction::Succeed | PollAction::Error)
    }
}

macro_rules! stack_statuses {
    ($($variant:ident => $text:literal => $action:ident,)+) => {
        /// Every stack status the control plane reports.
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum StackStatus {
            $($variant,)+
        }

        impl StackStatus {
            pub fn as_str(self) -> &'static str {
                match self {
                    $(StackStatus::$variant => $text,)+
                }
            }

            pub fn action(self) -> PollAction {
                match self {
                    $(StackStatus::$variant => PollAction::$action,)+
                }
            }
        }

        impl FromStr for StackStatus {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(StackStatus::$variant),)+
                    other => Err(Error::UnknownStackStatus {
                        status: other.to_string(),
                    }),
                }
            }
        }
    };
}

stack_statuses! {
    CreateInProgress => "CREATE_IN_PROGRESS" => Wait,
    UpdateInProgress => "UPDATE_IN_PROGRESS" => Wait,
    ReviewInProgress => "REVIEW_IN_PROGRESS" => Wait,
    UpdateCompleteCleanupInProgress => "UPDATE_COMPLETE_CLEANUP_IN_PROGRESS" => WaitOk,
    CreateComplete => "CREATE_COMPLETE" => Succeed,
    UpdateComplete => "UPDATE_COMPLETE" => Succeed,
    CreateFailed => "CREATE_FAILED" => Error,
    RollbackFailed => "ROLLBACK_FAILED" => Error,
    RollbackComplete => "ROLLBACK_COMPLETE" => Error,
    DeleteFailed => "DELETE_FAILED" => Error,
    DeleteComplete => "DELETE_COMPLETE" => Error,
    UpdateRollbackFailed => "UPDATE_ROLLBACK_FAILED" => Error,
    UpdateRollbackComplete => "UPDATE_ROLLBACK_COMPLETE" => Error,
    RollbackInProgress => "ROLLBACK_IN_PROGRESS" => WaitError,
    UpdateRollbackInProgress => "UPDATE_ROLLBACK_IN_PROGRESS" => WaitError,
    UpdateRollbackCompleteCleanupInProgress => "UPDATE_ROLLBACK_COMPLETE_CLEANUP_IN_PROGRESS" => WaitError,
    DeleteInProgress => "DELETE_IN_PROGRESS" => WaitError,
}

impl fmt::Display for StackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_actions() {
        let cases = [
            ("CREATE_IN_PROGRESS", PollAction::Wait),
            ("REVIEW_IN_PROGRESS", PollAction::Wait),
            ("UPDATE_COMPLETE_CLEANUP_IN_PROGRESS", PollAction::WaitOk),
            ("CREATE_COMPLETE", PollAction::Succeed),
            ("UPDATE_COMPLETE", PollAction::Succeed),
            ("ROLLBACK_COMPLETE", PollAction::Error),
            ("DELETE_COMPLETE", PollAction::Error),
            ("UPDATE_ROLLBACK_COMPLETE", PollAction::Error),
            ("UPDATE_ROLLBACK_IN_PROGRESS", PollAction::WaitError),
            ("DELETE_IN_PROGRESS", PollAction::WaitError),
        ];
        for (text, action) in cases {
            let status: StackStatus = text.parse().unwrap();
            assert_eq!(status.action(), action, "{text}");
            assert_eq!(status.to_string(), text);
        }
    }

    #[test]
    fn test_unknown_status_is_error() {
        let err = "IMPORT_IN_PROGRESS".parse::<StackStatus>().unwrap_err();
        assert!(matches!(err, Error::UnknownStackStatus { ref status } if status == "IMPORT_IN_PROGRESS"));
    }

    #[test]
    fn test_terminal_actions() {
        assert!(PollAction::Succeed.is_terminal());
        assert!(PollAction::Error.is_terminal());
        assert!(!PollAction::Wait.is_terminal());
        assert!(!PollAction::WaitOk.is_terminal());
        assert!(!PollAction::WaitError.is_terminal());
    }
}
