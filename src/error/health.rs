//! Aggregated health check failures
//!
//! Both health checks of an installation always run; whatever they report is
//! collected here and surfaced as a single [`BootstrapError::HealthCheckTimeout`].

use std::fmt;

use super::{BootstrapError, Result};

/// Which health check produced an issue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthCheck {
    /// The sync object pulling the management repository into the cluster
    SyncObject,
    /// The installed component workloads
    Components,
}

impl fmt::Display for HealthCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthCheck::SyncObject => write!(f, "sync object"),
            HealthCheck::Components => write!(f, "components"),
        }
    }
}

/// One unconverged check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthIssue {
    pub check: HealthCheck,
    /// What was being waited for, e.g. `flux-system/flux-system`
    pub subject: String,
    pub message: String,
}

impl fmt::Display for HealthIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.check, self.subject, self.message)
    }
}

/// Multi-error container for health issues
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HealthErrors {
    issues: Vec<HealthIssue>,
}

impl HealthErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, issue: HealthIssue) {
        self.issues.push(issue);
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HealthIssue> {
        self.issues.iter()
    }

    /// Whether any collected issue came from `check`
    pub fn contains(&self, check: HealthCheck) -> bool {
        self.issues.iter().any(|issue| issue.check == check)
    }

    /// `Ok(())` when nothing was collected, the aggregated error otherwise
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(BootstrapError::HealthCheckTimeout { issues: self })
        }
    }
}

impl fmt::Display for HealthErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, issue) in self.issues.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "  - {issue}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue(check: HealthCheck, message: &str) -> HealthIssue {
        HealthIssue {
            check,
            subject: "flux-system/flux-system".to_string(),
            message: message.to_string(),
        }
    }

    #[test]
    fn test_empty_is_ok() {
        let errors = HealthErrors::new();
        assert!(errors.is_empty());
        assert!(errors.into_result().is_ok());
    }

    #[test]
    fn test_all_issues_are_reported() {
        let mut errors = HealthErrors::new();
        errors.push(issue(HealthCheck::SyncObject, "timed out"));
        errors.push(issue(HealthCheck::Components, "source-controller not ready"));
        assert_eq!(errors.len(), 2);
        assert!(errors.contains(HealthCheck::SyncObject));

        let err = errors.into_result().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("sync object flux-system/flux-system: timed out"));
        assert!(message.contains("source-controller not ready"));
    }
}
