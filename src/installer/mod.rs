//! Installation orchestration for one component
//!
//! This module handles:
//! - Resolving the version and extracting its resources
//! - Generating the manifests and reconciling them into the repository
//! - Applying them to the cluster and bootstrapping the sync agent
//! - Waiting for the installation to become healthy
//!
//! Every step runs in order and the first failure ends the install. Nothing
//! touches the repository before extraction has succeeded.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use crate::bootstrap::InstallProfile;
use crate::cancel::CancelToken;
use crate::cluster::{ApplyTarget, Cluster, HealthReporter, SyncTarget, apply_components};
use crate::component::ComponentRepository;
use crate::error::{HealthErrors, Result, ResultExt};
use crate::extract::{ExtractedResources, extract};
use crate::git::{
    CommitRequest, GitReconciler, ReconcileOutcome, WorkingCopy, commit_message, manifest_path,
};
use crate::manifest::{COMPONENTS_FILE, ManifestBundle, ManifestGenerator};
use crate::resolver::{ResolvedComponent, resolve};
use crate::sync::{CommitSettings, SyncBootstrap};

/// State accumulated while one install runs
///
/// Each field is filled by the step that produces it.
#[derive(Debug, Default)]
pub struct InstallationRun {
    pub resolved: Option<ResolvedComponent>,
    pub extracted: Option<ExtractedResources>,
    pub bundle: Option<ManifestBundle>,
    pub reconcile: Option<ReconcileOutcome>,
    pub applied: Option<ApplyTarget>,
    pub secret_applied: bool,
    pub sync_commit: Option<String>,
    pub health: HealthErrors,
}

/// Summary of a finished install
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    pub component: String,
    pub version: String,
    /// Repository path the manifests were committed to
    pub manifest_path: String,
    pub reconcile: ReconcileOutcome,
    /// What was applied directly, `None` when left to the sync agent
    pub applied: Option<ApplyTarget>,
    pub secret_applied: bool,
    pub sync_commit: Option<String>,
    /// HEAD of the repository at the end of the install
    pub head: Option<String>,
}

/// Installs one component according to its profile
pub struct Installation<'a> {
    profile: InstallProfile,
    repository: &'a dyn ComponentRepository,
    generator: ManifestGenerator,
    reconciler: GitReconciler,
    cluster: Arc<dyn Cluster>,
    health: HealthReporter,
    sync: Option<SyncBootstrap>,
    sync_object: SyncTarget,
    target_path: String,
    commit: CommitSettings,
}

impl<'a> Installation<'a> {
    pub fn new(
        profile: InstallProfile,
        repository: &'a dyn ComponentRepository,
        generator: ManifestGenerator,
        reconciler: GitReconciler,
        cluster: Arc<dyn Cluster>,
        health: HealthReporter,
    ) -> Self {
        Self {
            profile,
            repository,
            generator,
            reconciler,
            cluster,
            health,
            sync: None,
            sync_object: SyncTarget::new("flux-system", "flux-system"),
            target_path: String::new(),
            commit: CommitSettings {
                author_name: "Flux".to_string(),
                author_email: "flux@users.noreply.local".to_string(),
                message_appendix: None,
            },
        }
    }

    /// Bootstrap the sync agent after the component manifests are pushed
    #[must_use]
    pub fn with_sync(mut self, sync: Option<SyncBootstrap>) -> Self {
        self.sync = sync;
        self
    }

    /// Sync object consulted for the apply decision and health
    #[must_use]
    pub fn with_sync_object(mut self, namespace: &str, name: &str) -> Self {
        self.sync_object = SyncTarget::new(namespace, name);
        self
    }

    #[must_use]
    pub fn with_target_path(mut self, target_path: impl Into<String>) -> Self {
        self.target_path = target_path.into();
        self
    }

    #[must_use]
    pub fn with_commit_settings(mut self, commit: CommitSettings) -> Self {
        self.commit = commit;
        self
    }

    pub fn profile(&self) -> &InstallProfile {
        &self.profile
    }

    /// Repository path of the component manifests
    pub fn manifest_path(&self) -> String {
        manifest_path(&self.target_path, &self.profile.namespace, COMPONENTS_FILE)
    }

    /// Run every step of the install
    ///
    /// `component` and `constraint` select the version; manifests are rendered
    /// in `render_dir` and committed through `wc`.
    pub fn install(
        &self,
        component: &str,
        constraint: &str,
        render_dir: &Path,
        wc: &mut dyn WorkingCopy,
        cancel: &CancelToken,
    ) -> Result<InstallReport> {
        cancel.check()?;
        let resolved = self.resolve(component, constraint)?;
        self.install_resolved(resolved, render_dir, wc, cancel)
    }

    /// Resolve `constraint` against the versions of `component`
    pub fn resolve(&self, component: &str, constraint: &str) -> Result<ResolvedComponent> {
        let resolved = resolve(self.repository, component, constraint)
            .context("failed to get component version")?;
        info!(component, version = %resolved.version, "resolved component version");
        Ok(resolved)
    }

    /// Run every step after resolution
    pub fn install_resolved(
        &self,
        resolved: ResolvedComponent,
        render_dir: &Path,
        wc: &mut dyn WorkingCopy,
        cancel: &CancelToken,
    ) -> Result<InstallReport> {
        let mut run = InstallationRun::default();

        cancel.check()?;
        let resource = self.profile.resource_for(&resolved.component_version);
        let extracted = extract(&resolved.component_version, resource)
            .context("failed to get resources")?;
        debug!(
            images = extracted.images.len(),
            components = ?extracted.component_names,
            "extracted resources"
        );

        cancel.check()?;
        let bundle = self
            .generator
            .generate(render_dir, &extracted)
            .context("failed to generate component manifests")?;
        debug!(bytes = bundle.len(), "rendered manifests");

        let path = self.manifest_path();
        let request = CommitRequest {
            author_name: self.commit.author_name.clone(),
            author_email: self.commit.author_email.clone(),
            message: commit_message(
                &self.profile.display_name,
                &resolved.version,
                self.commit.message_appendix.as_deref(),
            ),
            files: vec![(path.clone(), bundle.as_bytes().to_vec())],
        };
        let outcome = self
            .reconciler
            .reconcile(wc, &request, cancel)
            .context("failed to reconcile components")?;

        run.applied = apply_components(
            self.cluster.as_ref(),
            wc.path(),
            &path,
            &self.sync_object.namespace,
            &self.sync_object.name,
        )
        .context("failed to reconcile components")?;

        if let Some(sync) = &self.sync {
            cancel.check()?;
            run.secret_applied = sync.reconcile_source_secret()?;
            run.sync_commit = sync.reconcile_sync_config(wc, &self.reconciler)?;
        }

        let head = wc.head()?;
        let sync_target = self
            .sync_object
            .clone()
            .with_expected_revision(head.clone());
        run.health = self.health.collect(
            &sync_target,
            &self.profile.namespace,
            &extracted.component_names,
            cancel,
        )?;

        run.resolved = Some(resolved);
        run.extracted = Some(extracted);
        run.bundle = Some(bundle);
        run.reconcile = Some(outcome);
        self.finish(run, path, head)
    }

    fn finish(
        &self,
        run: InstallationRun,
        manifest_path: String,
        head: Option<String>,
    ) -> Result<InstallReport> {
        let InstallationRun {
            resolved,
            reconcile,
            applied,
            secret_applied,
            sync_commit,
            health,
            ..
        } = run;
        health.into_result()?;

        let (component, version) = resolved
            .map(|r| (r.name, r.version))
            .unwrap_or_default();
        Ok(InstallReport {
            component,
            version,
            manifest_path,
            reconcile: reconcile.unwrap_or_default(),
            applied,
            secret_applied,
            sync_commit,
            head,
        })
    }
}
