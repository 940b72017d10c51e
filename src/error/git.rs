//! Git working copy errors

use super::BootstrapError;

/// Creates a "no repository present" error
pub fn no_repository(path: impl Into<String>) -> BootstrapError {
    BootstrapError::NoGitRepository { path: path.into() }
}

/// Creates a generic git operation failure
pub fn operation_failed(message: impl Into<String>) -> BootstrapError {
    BootstrapError::GitOperationFailed {
        message: message.into(),
    }
}

/// Creates a single clone attempt failure
pub fn clone_attempt_failed(url: impl Into<String>, reason: impl Into<String>) -> BootstrapError {
    BootstrapError::CloneAttemptFailed {
        url: url.into(),
        reason: reason.into(),
    }
}

/// Creates a terminal clone failure wrapping the last attempt
pub fn clone_failed(
    url: impl Into<String>,
    attempts: usize,
    last: BootstrapError,
) -> BootstrapError {
    BootstrapError::CloneFailed {
        url: url.into(),
        attempts,
        source: Box::new(last),
    }
}

/// Creates a directory clean failure
pub fn clean_failed(path: impl Into<String>, reason: impl Into<String>) -> BootstrapError {
    BootstrapError::CleanFailed {
        path: path.into(),
        reason: reason.into(),
    }
}

/// Creates a commit failure
pub fn commit_failed(path: impl Into<String>, reason: impl Into<String>) -> BootstrapError {
    BootstrapError::CommitFailed {
        path: path.into(),
        reason: reason.into(),
    }
}

/// Creates a push failure
pub fn push_failed(reason: impl Into<String>) -> BootstrapError {
    BootstrapError::PushFailed {
        reason: reason.into(),
    }
}
