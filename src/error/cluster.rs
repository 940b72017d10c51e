//! Cluster apply and query errors

use super::BootstrapError;

/// Creates an apply failure
pub fn apply_failed(target: impl Into<String>, reason: impl Into<String>) -> BootstrapError {
    BootstrapError::ApplyFailed {
        target: target.into(),
        reason: reason.into(),
    }
}

/// Creates a cluster query failure
pub fn query_failed(reason: impl Into<String>) -> BootstrapError {
    BootstrapError::ClusterQueryFailed {
        reason: reason.into(),
    }
}

/// Creates an external command failure
pub fn command_failed(program: impl Into<String>, reason: impl Into<String>) -> BootstrapError {
    BootstrapError::CommandFailed {
        program: program.into(),
        reason: reason.into(),
    }
}
