//! Cluster access
//!
//! This module handles:
//! - The [`Cluster`] seam: applying manifests and querying object status
//! - Deciding whether manifests must be applied directly ([`must_apply`])
//! - Polling health until convergence ([`health`])
//! - A `kubectl` implementation ([`kubectl`])

pub mod health;
pub mod kubectl;

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::Result;
use crate::manifest::KUSTOMIZATION_FILE;

pub use health::{HealthReporter, SyncTarget, poll_until};
pub use kubectl::KubectlCluster;

/// What to apply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyTarget {
    /// Directory holding a `kustomization.yaml`
    Kustomization(PathBuf),
    /// Single manifest file
    File(PathBuf),
}

impl fmt::Display for ApplyTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplyTarget::Kustomization(dir) => write!(f, "kustomization {}", dir.display()),
            ApplyTarget::File(file) => write!(f, "manifest {}", file.display()),
        }
    }
}

/// Observed state of the sync object
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStatus {
    /// `Ready` condition is `True`
    pub ready: bool,
    /// Message of the `Ready` condition
    pub message: Option<String>,
    /// Revision the sync agent last applied; `None` if it never applied one
    pub last_applied_revision: Option<String>,
}

/// Observed state of one workload
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkloadStatus {
    pub desired_replicas: i64,
    pub ready_replicas: i64,
    pub updated_replicas: i64,
    pub generation: i64,
    pub observed_generation: i64,
}

impl WorkloadStatus {
    /// All desired replicas are updated and ready at the current generation
    pub fn is_ready(&self) -> bool {
        self.observed_generation >= self.generation
            && self.updated_replicas >= self.desired_replicas
            && self.ready_replicas >= self.desired_replicas
    }
}

/// Kubernetes-style cluster
pub trait Cluster: Send + Sync {
    fn apply(&self, target: &ApplyTarget) -> Result<()>;

    /// Apply manifests given as YAML bytes
    fn apply_manifest(&self, manifest: &[u8]) -> Result<()>;

    /// Status of the sync object, `None` if it does not exist
    fn sync_status(&self, namespace: &str, name: &str) -> Result<Option<SyncStatus>>;

    /// Status of a deployment, `None` if it does not exist
    fn workload_status(&self, namespace: &str, name: &str) -> Result<Option<WorkloadStatus>>;
}

/// Whether manifests must be applied directly instead of left to the sync agent
///
/// True when the sync object is absent, cannot be queried, or has never
/// applied a revision.
pub fn must_apply(cluster: &dyn Cluster, namespace: &str, name: &str) -> bool {
    match cluster.sync_status(namespace, name) {
        Ok(Some(status)) => status.last_applied_revision.is_none(),
        Ok(None) => true,
        Err(e) => {
            debug!(namespace, name, error = %e, "sync object query failed, applying directly");
            true
        }
    }
}

/// Target for the manifest at `manifest_path` inside `root`
///
/// The manifest's directory is applied as a kustomization when it holds a
/// `kustomization.yaml`, otherwise the file alone.
pub fn apply_target(root: &Path, manifest_path: &str) -> ApplyTarget {
    let manifest = root.join(manifest_path);
    match manifest.parent() {
        Some(dir) if dir.join(KUSTOMIZATION_FILE).is_file() => {
            ApplyTarget::Kustomization(dir.to_path_buf())
        }
        _ => ApplyTarget::File(manifest),
    }
}

/// Apply the committed manifest at `manifest_path` when the cluster needs it
///
/// Returns the applied target, or `None` when the sync agent already owns it.
pub fn apply_components(
    cluster: &dyn Cluster,
    root: &Path,
    manifest_path: &str,
    sync_namespace: &str,
    sync_name: &str,
) -> Result<Option<ApplyTarget>> {
    if !must_apply(cluster, sync_namespace, sync_name) {
        debug!(manifest_path, "sync agent is active, skipping direct apply");
        return Ok(None);
    }
    let target = apply_target(root, manifest_path);
    info!(%target, "applying components");
    cluster.apply(&target)?;
    Ok(Some(target))
}

/// Whether a sync agent revision refers to commit `head`
///
/// Accepts a bare commit id and the `<branch>@sha1:<id>` and `<branch>/<id>`
/// forms sync agents report.
pub fn revision_matches(revision: &str, head: &str) -> bool {
    !head.is_empty()
        && (revision == head
            || revision.ends_with(&format!(":{head}"))
            || revision.ends_with(&format!("/{head}")))
}
