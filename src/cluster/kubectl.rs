//! `kubectl`-backed cluster client

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use super::{ApplyTarget, Cluster, SyncStatus, WorkloadStatus};
use crate::command::{CommandOptions, CommandRunner};
use crate::error::{Result, cluster};

/// Resource name of the sync object
pub const SYNC_RESOURCE: &str = "kustomizations.kustomize.toolkit.fluxcd.io";

/// Resource name of the workloads health is checked on
pub const WORKLOAD_RESOURCE: &str = "deployments.apps";

/// Cluster reached through the `kubectl` binary
pub struct KubectlCluster {
    runner: Arc<dyn CommandRunner>,
    program: String,
    kubeconfig: Option<PathBuf>,
    context: Option<String>,
    request_timeout: Option<Duration>,
}

impl KubectlCluster {
    pub fn new(runner: Arc<dyn CommandRunner>, program: impl Into<String>) -> Self {
        Self {
            runner,
            program: program.into(),
            kubeconfig: None,
            context: None,
            request_timeout: None,
        }
    }

    #[must_use]
    pub fn with_kubeconfig(mut self, kubeconfig: Option<PathBuf>) -> Self {
        self.kubeconfig = kubeconfig;
        self
    }

    #[must_use]
    pub fn with_context(mut self, context: Option<String>) -> Self {
        self.context = context;
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    fn args<'a>(&'a self, extra: &[&'a str], scratch: &'a mut Vec<String>) -> Vec<&'a str> {
        scratch.clear();
        if let Some(kubeconfig) = &self.kubeconfig {
            scratch.push(format!("--kubeconfig={}", kubeconfig.display()));
        }
        if let Some(context) = &self.context {
            scratch.push(format!("--context={context}"));
        }
        if let Some(timeout) = self.request_timeout {
            scratch.push(format!("--request-timeout={}s", timeout.as_secs().max(1)));
        }
        let mut args: Vec<&str> = scratch.iter().map(String::as_str).collect();
        args.extend_from_slice(extra);
        args
    }

    fn run(&self, extra: &[&str], options: &CommandOptions) -> Result<Vec<u8>> {
        let mut scratch = Vec::new();
        let args = self.args(extra, &mut scratch);
        self.runner.run_checked(&self.program, &args, options)
    }

    /// `kubectl get` one object as JSON, `None` if it does not exist
    fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        resource: &str,
        namespace: &str,
        name: &str,
    ) -> Result<Option<T>> {
        let stdout = self
            .run(
                &[
                    "get",
                    resource,
                    name,
                    "--namespace",
                    namespace,
                    "--output=json",
                    "--ignore-not-found",
                ],
                &CommandOptions::default(),
            )
            .map_err(|e| cluster::query_failed(e.to_string()))?;

        if stdout.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        serde_json::from_slice(&stdout)
            .map(Some)
            .map_err(|e| cluster::query_failed(format!("{resource} {namespace}/{name}: {e}")))
    }
}

impl Cluster for KubectlCluster {
    fn apply(&self, target: &ApplyTarget) -> Result<()> {
        let (flag, path) = match target {
            ApplyTarget::Kustomization(dir) => ("--kustomize", dir.to_string_lossy()),
            ApplyTarget::File(file) => ("--filename", file.to_string_lossy()),
        };
        debug!(%target, "kubectl apply");
        self.run(&["apply", flag, path.as_ref()], &CommandOptions::default())
            .map_err(|e| cluster::apply_failed(target.to_string(), e.to_string()))?;
        Ok(())
    }

    fn apply_manifest(&self, manifest: &[u8]) -> Result<()> {
        self.run(
            &["apply", "--filename", "-"],
            &CommandOptions::with_stdin(manifest),
        )
        .map_err(|e| cluster::apply_failed("manifest from stdin", e.to_string()))?;
        Ok(())
    }

    fn sync_status(&self, namespace: &str, name: &str) -> Result<Option<SyncStatus>> {
        let object: Option<SyncObject> = self.get_json(SYNC_RESOURCE, namespace, name)?;
        Ok(object.map(|object| {
            let ready = object
                .status
                .conditions
                .iter()
                .find(|c| c.condition_type == "Ready");
            SyncStatus {
                ready: ready.is_some_and(|c| c.status == "True"),
                message: ready.and_then(|c| c.message.clone()),
                last_applied_revision: object
                    .status
                    .last_applied_revision
                    .filter(|r| !r.is_empty()),
            }
        }))
    }

    fn workload_status(&self, namespace: &str, name: &str) -> Result<Option<WorkloadStatus>> {
        let object: Option<Deployment> = self.get_json(WORKLOAD_RESOURCE, namespace, name)?;
        Ok(object.map(|d| WorkloadStatus {
            desired_replicas: d.spec.replicas.unwrap_or(1),
            ready_replicas: d.status.ready_replicas,
            updated_replicas: d.status.updated_replicas,
            generation: d.metadata.generation,
            observed_generation: d.status.observed_generation,
        }))
    }
}

#[derive(Debug, Default, Deserialize)]
struct SyncObject {
    #[serde(default)]
    status: SyncObjectStatus,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SyncObjectStatus {
    #[serde(default)]
    conditions: Vec<Condition>,
    #[serde(default)]
    last_applied_revision: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Condition {
    #[serde(rename = "type")]
    condition_type: String,
    status: String,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Deployment {
    #[serde(default)]
    metadata: ObjectMeta,
    #[serde(default)]
    spec: DeploymentSpec,
    #[serde(default)]
    status: DeploymentStatus,
}

#[derive(Debug, Default, Deserialize)]
struct ObjectMeta {
    #[serde(default)]
    generation: i64,
}

#[derive(Debug, Default, Deserialize)]
struct DeploymentSpec {
    #[serde(default)]
    replicas: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeploymentStatus {
    #[serde(default)]
    ready_replicas: i64,
    #[serde(default)]
    updated_replicas: i64,
    #[serde(default)]
    observed_generation: i64,
}
