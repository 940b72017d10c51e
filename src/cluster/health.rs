//! Health reporting after an installation
//!
//! Two checks run one after the other, each bounded by the same timeout:
//! the sync object must be ready (at the pushed revision when known) and every
//! component workload must be ready. Neither check short-circuits the other;
//! their issues end up together in one [`HealthErrors`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::{Cluster, revision_matches};
use crate::cancel::CancelToken;
use crate::error::{HealthCheck, HealthErrors, HealthIssue, Result};

/// Call `probe` until it reports convergence or `timeout` elapses
///
/// `probe` returns `Err(reason)` while not converged. Returns `Ok(None)` once
/// converged and `Ok(Some(reason))` with the last reason on timeout. The probe
/// always runs at least once. Fails with `Cancelled` as soon as `cancel` fires.
pub fn poll_until<F>(
    timeout: Duration,
    interval: Duration,
    cancel: &CancelToken,
    mut probe: F,
) -> Result<Option<String>>
where
    F: FnMut() -> std::result::Result<(), String>,
{
    let deadline = Instant::now() + timeout;
    loop {
        cancel.check()?;
        let reason = match probe() {
            Ok(()) => return Ok(None),
            Err(reason) => reason,
        };

        let now = Instant::now();
        if now >= deadline {
            return Ok(Some(reason));
        }
        debug!(%reason, "not converged yet");
        cancel.sleep(interval.min(deadline - now))?;
    }
}

/// Sync object to wait for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncTarget {
    pub namespace: String,
    pub name: String,
    /// Commit the sync agent must have applied; any revision when `None`
    pub expected_revision: Option<String>,
}

impl SyncTarget {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            expected_revision: None,
        }
    }

    #[must_use]
    pub fn with_expected_revision(mut self, revision: Option<String>) -> Self {
        self.expected_revision = revision;
        self
    }

    fn subject(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

/// Polls the cluster until the installation converges
pub struct HealthReporter {
    cluster: Arc<dyn Cluster>,
    timeout: Duration,
    poll_interval: Duration,
}

impl HealthReporter {
    pub fn new(cluster: Arc<dyn Cluster>, timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            cluster,
            timeout,
            poll_interval,
        }
    }

    fn probe_sync(&self, target: &SyncTarget) -> std::result::Result<(), String> {
        let status = self
            .cluster
            .sync_status(&target.namespace, &target.name)
            .map_err(|e| e.to_string())?
            .ok_or_else(|| "not found".to_string())?;

        if !status.ready {
            return Err(status
                .message
                .unwrap_or_else(|| "not ready".to_string()));
        }
        if let Some(expected) = &target.expected_revision {
            let applied = status.last_applied_revision.as_deref().unwrap_or_default();
            if !revision_matches(applied, expected) {
                return Err(format!(
                    "waiting for revision {expected}, last applied '{applied}'"
                ));
            }
        }
        Ok(())
    }

    fn probe_components(
        &self,
        namespace: &str,
        names: &[String],
    ) -> std::result::Result<(), String> {
        let mut pending = Vec::new();
        for name in names {
            match self.cluster.workload_status(namespace, name) {
                Ok(Some(status)) if status.is_ready() => {}
                Ok(Some(status)) => pending.push(format!(
                    "{name} ({}/{} ready)",
                    status.ready_replicas, status.desired_replicas
                )),
                Ok(None) => pending.push(format!("{name} (not found)")),
                Err(e) => pending.push(format!("{name} ({e})")),
            }
        }
        if pending.is_empty() {
            Ok(())
        } else {
            Err(format!("not ready: {}", pending.join(", ")))
        }
    }

    /// Wait for the sync object, returning the issue on timeout
    pub fn check_sync(
        &self,
        target: &SyncTarget,
        cancel: &CancelToken,
    ) -> Result<Option<HealthIssue>> {
        debug!(subject = %target.subject(), "waiting for sync object");
        let reason = poll_until(self.timeout, self.poll_interval, cancel, || {
            self.probe_sync(target)
        })?;
        Ok(reason.map(|message| HealthIssue {
            check: HealthCheck::SyncObject,
            subject: target.subject(),
            message: format!("timed out after {:?}: {message}", self.timeout),
        }))
    }

    /// Wait for the named deployments, returning the issue on timeout
    pub fn check_components(
        &self,
        namespace: &str,
        names: &[String],
        cancel: &CancelToken,
    ) -> Result<Option<HealthIssue>> {
        debug!(namespace, components = names.len(), "waiting for components");
        let reason = poll_until(self.timeout, self.poll_interval, cancel, || {
            self.probe_components(namespace, names)
        })?;
        Ok(reason.map(|message| HealthIssue {
            check: HealthCheck::Components,
            subject: namespace.to_string(),
            message: format!("timed out after {:?}: {message}", self.timeout),
        }))
    }

    /// Run both checks and report every issue together
    pub fn report(
        &self,
        sync: &SyncTarget,
        namespace: &str,
        names: &[String],
        cancel: &CancelToken,
    ) -> Result<()> {
        self.collect(sync, namespace, names, cancel)?.into_result()
    }

    /// Run both checks, returning the issues instead of failing on them
    ///
    /// Only cancellation aborts early.
    pub fn collect(
        &self,
        sync: &SyncTarget,
        namespace: &str,
        names: &[String],
        cancel: &CancelToken,
    ) -> Result<HealthErrors> {
        let mut errors = HealthErrors::new();

        match self.check_sync(sync, cancel)? {
            Some(issue) => {
                warn!(%issue, "sync object did not converge");
                errors.push(issue);
            }
            None => info!(subject = %sync.subject(), "sync object is ready"),
        }
        match self.check_components(namespace, names, cancel)? {
            Some(issue) => {
                warn!(%issue, "components did not converge");
                errors.push(issue);
            }
            None => info!(namespace, "components are ready"),
        }

        Ok(errors)
    }
}
