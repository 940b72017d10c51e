//! Bootstrap runner
//!
//! Installs every configured component, one after the other in configuration
//! order, and stops at the first failure. Each component gets its own scratch
//! directory:
//!
//! ```text
//! <tmp>/<name>-install*/
//! ├── render/   # kustomize input, see crate::manifest
//! └── repo/     # working copy of the management repository
//! ```

pub mod profile;

use std::path::PathBuf;
use std::sync::Arc;

use console::style;
use tracing::info;

use crate::cancel::CancelToken;
use crate::cluster::{Cluster, HealthReporter, KubectlCluster};
use crate::command::{CommandRunner, SystemCommandRunner};
use crate::component::ArchiveRepository;
use crate::config::{BootstrapConfig, ComponentConfig};
use crate::error::{Result, config};
use crate::git::{Git2WorkingCopy, GitCredentials, GitReconciler};
use crate::installer::{InstallReport, Installation};
use crate::manifest::{DirLocks, KustomizeCommand, ManifestGenerator, Renderer};
use crate::progress::InstallProgress;
use crate::sync::{CommitSettings, SyncBootstrap, SyncOptions};
use crate::temp::{create_work_dir, temp_dir_base};

pub use profile::{InstallProfile, ProfileRegistry};

/// Runs a full bootstrap from a [`BootstrapConfig`]
pub struct Bootstrap {
    config: BootstrapConfig,
    profiles: ProfileRegistry,
    cluster: Arc<dyn Cluster>,
    renderer: Arc<dyn Renderer>,
    locks: Arc<DirLocks>,
    work_root: PathBuf,
    interactive: bool,
}

impl Bootstrap {
    /// Bootstrap against the cluster and kustomize binaries named in `config`
    pub fn new(config: BootstrapConfig, profiles: ProfileRegistry) -> Self {
        let runner: Arc<dyn CommandRunner> = Arc::new(SystemCommandRunner);
        let cluster = KubectlCluster::new(runner.clone(), config.cluster.kubectl.clone())
            .with_kubeconfig(config.cluster.kubeconfig.clone())
            .with_context(config.cluster.context.clone())
            .with_request_timeout(Some(config.timeout()));
        let renderer = KustomizeCommand::kustomize(runner, config.cluster.kustomize.clone());
        Self {
            config,
            profiles,
            cluster: Arc::new(cluster),
            renderer: Arc::new(renderer),
            locks: Arc::new(DirLocks::new()),
            work_root: temp_dir_base(),
            interactive: true,
        }
    }

    #[must_use]
    pub fn with_cluster(mut self, cluster: Arc<dyn Cluster>) -> Self {
        self.cluster = cluster;
        self
    }

    #[must_use]
    pub fn with_renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = renderer;
        self
    }

    /// Directory scratch directories are created in
    #[must_use]
    pub fn with_work_root(mut self, work_root: impl Into<PathBuf>) -> Self {
        self.work_root = work_root.into();
        self
    }

    /// Print progress to the terminal; on by default
    #[must_use]
    pub fn interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    pub fn config(&self) -> &BootstrapConfig {
        &self.config
    }

    fn say(&self, line: &str) {
        if self.interactive {
            println!("{line}");
        }
    }

    /// Install every configured component in order
    pub fn run(&self, cancel: &CancelToken) -> Result<Vec<InstallReport>> {
        self.config.validate(&self.profiles)?;
        self.say(&format!("Running {} ...", style("mpas bootstrap").bold().blue()));

        let repository = ArchiveRepository::new(&self.config.registry);
        let mut reports = Vec::with_capacity(self.config.components.len());
        for component in &self.config.components {
            cancel.check()?;
            reports.push(self.install_component(&repository, component, cancel)?);
        }

        self.say("Bootstrap completed successfully");
        Ok(reports)
    }

    fn profile_for(&self, component: &ComponentConfig) -> Result<InstallProfile> {
        let profile = self
            .profiles
            .get(&component.name)
            .ok_or_else(|| config::unknown_component(&component.name))?
            .clone();
        Ok(match &component.resource {
            Some(resource) => profile.with_resource(resource.clone()),
            None => profile,
        })
    }

    fn commit_settings(&self) -> CommitSettings {
        let repo = &self.config.repository;
        CommitSettings {
            author_name: repo.author_name.clone(),
            author_email: repo.author_email.clone(),
            message_appendix: repo.commit_message_appendix.clone(),
        }
    }

    fn sync_bootstrap(&self) -> SyncBootstrap {
        let repo = &self.config.repository;
        let options = SyncOptions {
            namespace: self.config.sync.namespace.clone(),
            name: self.config.sync.name.clone(),
            url: self.config.sync_url().to_string(),
            branch: repo.branch.clone(),
            target_path: repo.target_path.clone(),
            interval_secs: self.config.interval_secs,
            username: repo.username.clone(),
            password: repo.token.clone(),
        };
        SyncBootstrap::new(self.cluster.clone(), options, self.commit_settings())
    }

    fn installation<'a>(
        &self,
        profile: InstallProfile,
        repository: &'a ArchiveRepository,
    ) -> Installation<'a> {
        let generator = ManifestGenerator::new(
            self.renderer.clone(),
            self.locks.clone(),
            self.config.image_host.clone(),
        )
        .allow_unresolved_localizations(self.config.allow_unresolved_localizations);
        let reconciler = GitReconciler::new(
            self.config.repository.url.clone(),
            self.config.repository.branch.clone(),
        )
        .with_retry_delay(self.config.clone_retry_delay());
        let health = HealthReporter::new(
            self.cluster.clone(),
            self.config.timeout(),
            self.config.poll_interval(),
        );
        let sync = profile.bootstraps_sync.then(|| self.sync_bootstrap());

        Installation::new(
            profile,
            repository,
            generator,
            reconciler,
            self.cluster.clone(),
            health,
        )
        .with_sync(sync)
        .with_sync_object(&self.config.sync.namespace, &self.config.sync.name)
        .with_target_path(self.config.repository.target_path.clone())
        .with_commit_settings(self.commit_settings())
    }

    fn install_component(
        &self,
        repository: &ArchiveRepository,
        component: &ComponentConfig,
        cancel: &CancelToken,
    ) -> Result<InstallReport> {
        let profile = self.profile_for(component)?;
        let work_dir = create_work_dir(&self.work_root, &profile.work_dir_prefix())?;
        let installation = self.installation(profile, repository);

        let resolved = installation.resolve(&component.component, &component.version)?;
        self.say(&format!(
            "Installing {} with version {}",
            style(&component.name).bold().blue(),
            style(&resolved.version).bold().blue()
        ));

        let repo = &self.config.repository;
        let credentials = repo
            .token
            .as_ref()
            .map(|token| GitCredentials::new(repo.username.clone(), token.clone()));
        let mut wc =
            Git2WorkingCopy::new(work_dir.path().join("repo")).with_credentials(credentials);

        let progress =
            InstallProgress::start(&format!("Installing {}", component.name), self.interactive);
        let result = installation.install_resolved(
            resolved,
            &work_dir.path().join("render"),
            &mut wc,
            cancel,
        );
        match &result {
            Ok(report) => {
                progress.finish();
                info!(
                    component = %component.name,
                    version = %report.version,
                    commit = ?report.reconcile.commit,
                    "installed"
                );
            }
            Err(_) => progress.abandon(),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BootstrapError;

    fn config(yaml: &str) -> BootstrapConfig {
        BootstrapConfig::from_yaml(yaml).unwrap()
    }

    #[test]
    fn test_run_validates_first() {
        let bootstrap = Bootstrap::new(
            config("repository:\n  url: https://git.example.com/mgmt.git\n"),
            ProfileRegistry::with_defaults(),
        )
        .interactive(false);
        let err = bootstrap.run(&CancelToken::new()).unwrap_err();
        assert!(matches!(err, BootstrapError::ConfigInvalid { .. }));
    }

    #[test]
    fn test_resource_override() {
        let bootstrap =
            Bootstrap::new(BootstrapConfig::default(), ProfileRegistry::with_defaults());
        let component = ComponentConfig {
            name: "ocm-controller".to_string(),
            component: "ocm.software/mpas/ocm-controller".to_string(),
            version: "v0.x".to_string(),
            resource: Some("ocm-contoller-file".to_string()),
        };
        let profile = bootstrap.profile_for(&component).unwrap();
        assert_eq!(profile.resource, "ocm-contoller-file");
        assert_eq!(profile.namespace, "ocm-system");
    }
}
