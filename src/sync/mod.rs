//! Sync agent bootstrap
//!
//! After the component manifests are pushed, the sync agent needs two more
//! things before it can take over:
//!
//! 1. A source secret with the repository credentials, applied to the cluster
//! 2. A sync configuration (`gotk-sync.yaml`) and a `kustomization.yaml` index,
//!    committed next to the component manifests:
//!
//! ```text
//! <target_path>/<namespace>/
//! ├── gotk-components.yaml
//! ├── gotk-sync.yaml        # GitRepository + Kustomization
//! └── kustomization.yaml    # lists the two files above
//! ```
//!
//! The sync configuration is applied directly only while the sync agent has
//! not picked anything up yet.

pub mod manifests;

use std::sync::Arc;

use tracing::{debug, info};

use crate::cluster::{ApplyTarget, Cluster, must_apply};
use crate::error::{Result, ResultExt};
use crate::git::{CommitRequest, GitReconciler, WorkingCopy, manifest_path};
use crate::manifest::{COMPONENTS_FILE, KUSTOMIZATION_FILE, Kustomization};

use manifests::{
    CrossNamespaceSourceReference, GitReference, GitRepository, GitRepositorySpec,
    LocalObjectReference, ObjectMeta, SOURCE_API_VERSION, SYNC_API_VERSION, Secret,
    SyncKustomization, SyncKustomizationSpec, format_interval, sync_path, yaml_document,
};

/// File the sync configuration is committed as
pub const SYNC_FILE: &str = "gotk-sync.yaml";

/// Commit message of the sync configuration commit
pub const SYNC_COMMIT_MESSAGE: &str = "Add Flux sync manifests";

/// Settings of the sync agent's source and sync objects
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    /// Namespace and name of the source, secret and sync objects
    pub namespace: String,
    pub name: String,
    /// URL the sync agent pulls from
    pub url: String,
    pub branch: String,
    pub target_path: String,
    pub interval_secs: u64,
    pub username: String,
    /// Repository password or token; no secret is created without one
    pub password: Option<String>,
}

/// Commit author and message appendix shared by every bootstrap commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitSettings {
    pub author_name: String,
    pub author_email: String,
    pub message_appendix: Option<String>,
}

impl CommitSettings {
    /// `message`, followed by a blank line and the appendix when one is set
    pub fn message(&self, message: &str) -> String {
        match self.message_appendix.as_deref() {
            Some(appendix) if !appendix.is_empty() => format!("{message}\n\n{appendix}"),
            _ => message.to_string(),
        }
    }

    pub fn request(&self, message: &str, files: Vec<(String, Vec<u8>)>) -> CommitRequest {
        CommitRequest {
            author_name: self.author_name.clone(),
            author_email: self.author_email.clone(),
            message: self.message(message),
            files,
        }
    }
}

/// Drives the source secret and sync configuration reconciliations
pub struct SyncBootstrap {
    cluster: Arc<dyn Cluster>,
    options: SyncOptions,
    commit: CommitSettings,
}

impl SyncBootstrap {
    pub fn new(cluster: Arc<dyn Cluster>, options: SyncOptions, commit: CommitSettings) -> Self {
        Self {
            cluster,
            options,
            commit,
        }
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    fn meta(&self) -> ObjectMeta {
        ObjectMeta::new(&self.options.name, &self.options.namespace)
    }

    /// The source secret, `None` without a password
    pub fn secret_manifest(&self) -> Result<Option<String>> {
        let Some(password) = self.options.password.as_deref() else {
            return Ok(None);
        };
        let secret = Secret::basic_auth(self.meta(), &self.options.username, password);
        yaml_document("source secret", &secret).map(Some)
    }

    /// `gotk-sync.yaml`: the source object followed by the sync object
    pub fn sync_manifest(&self) -> Result<String> {
        let interval = format_interval(self.options.interval_secs);
        let source = GitRepository {
            api_version: SOURCE_API_VERSION.to_string(),
            kind: "GitRepository".to_string(),
            metadata: self.meta(),
            spec: GitRepositorySpec {
                interval: interval.clone(),
                reference: GitReference {
                    branch: self.options.branch.clone(),
                },
                secret_ref: self.options.password.as_ref().map(|_| LocalObjectReference {
                    name: self.options.name.clone(),
                }),
                url: self.options.url.clone(),
            },
        };
        let sync = SyncKustomization {
            api_version: SYNC_API_VERSION.to_string(),
            kind: "Kustomization".to_string(),
            metadata: self.meta(),
            spec: SyncKustomizationSpec {
                interval,
                path: sync_path(&self.options.target_path),
                prune: true,
                source_ref: CrossNamespaceSourceReference {
                    kind: "GitRepository".to_string(),
                    name: self.options.name.clone(),
                },
            },
        };

        let mut out = yaml_document("sync source", &source)?;
        out.push_str(&yaml_document("sync object", &sync)?);
        Ok(out)
    }

    /// `kustomization.yaml` listing the component and sync manifests
    pub fn index_manifest(&self) -> Result<String> {
        Kustomization::with_resources([COMPONENTS_FILE, SYNC_FILE]).to_yaml()
    }

    /// Apply the source secret to the cluster
    ///
    /// The secret never goes into the repository.
    pub fn reconcile_source_secret(&self) -> Result<bool> {
        let Some(secret) = self.secret_manifest()? else {
            debug!("no repository password, skipping source secret");
            return Ok(false);
        };
        self.cluster
            .apply_manifest(secret.as_bytes())
            .context("failed to reconcile source secret")?;
        info!(
            namespace = %self.options.namespace,
            name = %self.options.name,
            "source secret applied"
        );
        Ok(true)
    }

    /// Commit and push the sync configuration, applying it when needed
    ///
    /// Returns the commit created, `None` when the repository already held it.
    pub fn reconcile_sync_config(
        &self,
        wc: &mut dyn WorkingCopy,
        reconciler: &GitReconciler,
    ) -> Result<Option<String>> {
        let target = &self.options.target_path;
        let namespace = &self.options.namespace;
        let files = vec![
            (
                manifest_path(target, namespace, SYNC_FILE),
                self.sync_manifest()?.into_bytes(),
            ),
            (
                manifest_path(target, namespace, KUSTOMIZATION_FILE),
                self.index_manifest()?.into_bytes(),
            ),
        ];
        let request = self.commit.request(SYNC_COMMIT_MESSAGE, files);
        let commit = reconciler
            .commit_and_push(wc, &request)
            .context("failed to reconcile sync config")?;

        if must_apply(self.cluster.as_ref(), namespace, &self.options.name) {
            let dir = wc.path().join(manifest_path(target, namespace, ""));
            let apply = ApplyTarget::Kustomization(dir);
            info!(target = %apply, "applying sync configuration");
            self.cluster
                .apply(&apply)
                .context("failed to reconcile sync config")?;
        } else {
            debug!("sync agent is active, skipping direct apply of sync configuration");
        }
        Ok(commit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{SyncStatus, WorkloadStatus};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingCluster {
        manifests: Mutex<Vec<String>>,
        applied: Mutex<Vec<ApplyTarget>>,
    }

    impl Cluster for RecordingCluster {
        fn apply(&self, target: &ApplyTarget) -> Result<()> {
            self.applied.lock().unwrap().push(target.clone());
            Ok(())
        }

        fn apply_manifest(&self, manifest: &[u8]) -> Result<()> {
            self.manifests
                .lock()
                .unwrap()
                .push(String::from_utf8_lossy(manifest).into_owned());
            Ok(())
        }

        fn sync_status(&self, _: &str, _: &str) -> Result<Option<SyncStatus>> {
            Ok(None)
        }

        fn workload_status(&self, _: &str, _: &str) -> Result<Option<WorkloadStatus>> {
            Ok(None)
        }
    }

    fn options(password: Option<&str>) -> SyncOptions {
        SyncOptions {
            namespace: "flux-system".to_string(),
            name: "flux-system".to_string(),
            url: "https://git.example.com/platform/management.git".to_string(),
            branch: "main".to_string(),
            target_path: "clusters/prod".to_string(),
            interval_secs: 60,
            username: "git".to_string(),
            password: password.map(ToString::to_string),
        }
    }

    fn settings() -> CommitSettings {
        CommitSettings {
            author_name: "Flux".to_string(),
            author_email: "flux@users.noreply.local".to_string(),
            message_appendix: None,
        }
    }

    #[test]
    fn test_sync_manifest_documents() {
        let sync = SyncBootstrap::new(
            Arc::new(RecordingCluster::default()),
            options(Some("token")),
            settings(),
        );
        let manifest = sync.sync_manifest().unwrap();
        let docs: Vec<serde_yaml::Value> = serde_yaml::Deserializer::from_str(&manifest)
            .map(|doc| serde::Deserialize::deserialize(doc).unwrap())
            .collect();

        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0]["kind"], "GitRepository");
        assert_eq!(docs[0]["spec"]["ref"]["branch"], "main");
        assert_eq!(docs[0]["spec"]["secretRef"]["name"], "flux-system");
        assert_eq!(docs[0]["spec"]["interval"], "1m0s");
        assert_eq!(docs[1]["kind"], "Kustomization");
        assert_eq!(docs[1]["spec"]["path"], "./clusters/prod");
        assert_eq!(docs[1]["spec"]["prune"], true);
        assert_eq!(docs[1]["spec"]["sourceRef"]["kind"], "GitRepository");
    }

    #[test]
    fn test_no_secret_without_password() {
        let cluster = Arc::new(RecordingCluster::default());
        let sync = SyncBootstrap::new(cluster.clone(), options(None), settings());

        assert!(!sync.reconcile_source_secret().unwrap());
        assert!(cluster.manifests.lock().unwrap().is_empty());
        assert!(!sync.sync_manifest().unwrap().contains("secretRef"));
    }

    #[test]
    fn test_source_secret_applied() {
        let cluster = Arc::new(RecordingCluster::default());
        let sync = SyncBootstrap::new(cluster.clone(), options(Some("token")), settings());

        assert!(sync.reconcile_source_secret().unwrap());
        let manifests = cluster.manifests.lock().unwrap();
        assert!(manifests[0].contains("kind: Secret"));
        assert!(manifests[0].contains("username: git"));
    }

    #[test]
    fn test_index_lists_both_manifests() {
        let sync = SyncBootstrap::new(
            Arc::new(RecordingCluster::default()),
            options(None),
            settings(),
        );
        let index: Kustomization = serde_yaml::from_str(&sync.index_manifest().unwrap()).unwrap();
        assert_eq!(index.resources, vec![COMPONENTS_FILE, SYNC_FILE]);
    }

    #[test]
    fn test_commit_message_appendix() {
        let mut settings = settings();
        assert_eq!(settings.message(SYNC_COMMIT_MESSAGE), "Add Flux sync manifests");
        settings.message_appendix = Some("[skip ci]".to_string());
        assert_eq!(
            settings.message(SYNC_COMMIT_MESSAGE),
            "Add Flux sync manifests\n\n[skip ci]"
        );
    }
}
