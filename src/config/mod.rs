//! Bootstrap configuration (`mpas.yaml`)
//!
//! ```yaml
//! registry: ./components
//! repository:
//!   url: https://git.example.com/platform/management.git
//!   branch: main
//!   target_path: clusters/prod
//! components:
//!   - name: flux
//!     component: ocm.software/mpas/flux
//!     version: ">=2.0.0"
//!   - name: ocm-controller
//!     component: ocm.software/mpas/ocm-controller
//!     version: v0.x
//! ```
//!
//! Omitted fields are filled by [`BootstrapConfig::with_defaults`].

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::bootstrap::ProfileRegistry;
use crate::error::{Result, config};
use crate::git::{UrlTransport, url_transport};

pub const DEFAULT_BRANCH: &str = "main";
pub const DEFAULT_USERNAME: &str = "git";
pub const DEFAULT_AUTHOR_NAME: &str = "Flux";
pub const DEFAULT_AUTHOR_EMAIL: &str = "flux@users.noreply.local";
pub const DEFAULT_KUBECTL: &str = "kubectl";
pub const DEFAULT_KUSTOMIZE: &str = "kustomize";
pub const DEFAULT_SYNC_NAMESPACE: &str = "flux-system";
pub const DEFAULT_SYNC_NAME: &str = "flux-system";
pub const DEFAULT_IMAGE_HOST: &str = "ghcr.io/fluxcd";
pub const DEFAULT_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 2;
pub const DEFAULT_CLONE_RETRY_DELAY_SECS: u64 = 2;

/// Transport used to talk to the management repository
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GitTransport {
    #[default]
    Https,
    Http,
    Ssh,
}

/// Everything a bootstrap run needs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    /// Root of the component archive
    pub registry: PathBuf,
    pub repository: RepositoryConfig,
    pub cluster: ClusterConfig,
    pub sync: SyncConfig,
    /// Reconcile interval written to the sync manifests
    pub interval_secs: u64,
    /// Bound on each health check
    pub timeout_secs: u64,
    pub poll_interval_secs: u64,
    pub clone_retry_delay_secs: u64,
    /// Registry host the upstream manifests reference images on
    pub image_host: String,
    /// Skip localization rules without a matching image instead of failing
    pub allow_unresolved_localizations: bool,
    /// Installed in this order
    pub components: Vec<ComponentConfig>,
}

/// Management repository settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    pub url: String,
    pub branch: String,
    /// Directory inside the repository the manifests go under
    pub target_path: String,
    pub transport: GitTransport,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// URL written to the sync manifests when the cluster reaches the
    /// repository under a different address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_message_appendix: Option<String>,
    pub author_name: String,
    pub author_email: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub kubectl: String,
    pub kustomize: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kubeconfig: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

/// Sync object the health checks and apply decision look at
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub namespace: String,
    pub name: String,
}

/// One component to install
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentConfig {
    /// Profile name, e.g. `flux`
    pub name: String,
    /// Component name in the archive
    pub component: String,
    /// Version constraint
    pub version: String,
    /// Overrides the profile's primary resource name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
}

fn fill(value: &mut String, default: &str) {
    if value.trim().is_empty() {
        *value = default.to_string();
    }
}

fn fill_secs(value: &mut u64, default: u64) {
    if *value == 0 {
        *value = default;
    }
}

impl BootstrapConfig {
    /// Read, parse and default a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(config::not_found(path.display().to_string()));
        }
        let content = fs::read_to_string(path)
            .map_err(|e| config::parse_failed(path.display().to_string(), e.to_string()))?;
        let parsed: Self = serde_yaml::from_str(&content)
            .map_err(|e| config::parse_failed(path.display().to_string(), e.to_string()))?;
        Ok(parsed.with_defaults())
    }

    /// Parse configuration from a YAML string and fill defaults
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let parsed: Self = serde_yaml::from_str(yaml)
            .map_err(|e| config::parse_failed("<inline>", e.to_string()))?;
        Ok(parsed.with_defaults())
    }

    /// Replace every unset field with its default
    #[must_use]
    pub fn with_defaults(mut self) -> Self {
        let repo = &mut self.repository;
        fill(&mut repo.branch, DEFAULT_BRANCH);
        fill(&mut repo.username, DEFAULT_USERNAME);
        fill(&mut repo.author_name, DEFAULT_AUTHOR_NAME);
        fill(&mut repo.author_email, DEFAULT_AUTHOR_EMAIL);
        repo.target_path = repo.target_path.trim().trim_end_matches('/').to_string();
        if repo.token.as_deref().is_some_and(str::is_empty) {
            repo.token = None;
        }

        fill(&mut self.cluster.kubectl, DEFAULT_KUBECTL);
        fill(&mut self.cluster.kustomize, DEFAULT_KUSTOMIZE);
        fill(&mut self.sync.namespace, DEFAULT_SYNC_NAMESPACE);
        fill(&mut self.sync.name, DEFAULT_SYNC_NAME);
        fill(&mut self.image_host, DEFAULT_IMAGE_HOST);

        fill_secs(&mut self.interval_secs, DEFAULT_INTERVAL_SECS);
        fill_secs(&mut self.timeout_secs, DEFAULT_TIMEOUT_SECS);
        fill_secs(&mut self.poll_interval_secs, DEFAULT_POLL_INTERVAL_SECS);
        fill_secs(&mut self.clone_retry_delay_secs, DEFAULT_CLONE_RETRY_DELAY_SECS);
        self
    }

    /// Check required fields, the repository URL and component names
    pub fn validate(&self, profiles: &ProfileRegistry) -> Result<()> {
        if self.registry.as_os_str().is_empty() {
            return Err(config::invalid("'registry' is required"));
        }
        self.validate_repository()?;

        if self.components.is_empty() {
            return Err(config::invalid("at least one component must be configured"));
        }
        let mut seen = Vec::new();
        for component in &self.components {
            if !profiles.contains(&component.name) {
                return Err(config::unknown_component(&component.name));
            }
            if seen.contains(&component.name.as_str()) {
                return Err(config::invalid(format!(
                    "component '{}' is configured more than once",
                    component.name
                )));
            }
            seen.push(component.name.as_str());
            if component.component.trim().is_empty() {
                return Err(config::invalid(format!(
                    "component '{}' has no 'component' name",
                    component.name
                )));
            }
            if component.version.trim().is_empty() {
                return Err(config::invalid(format!(
                    "component '{}' has no 'version' constraint",
                    component.name
                )));
            }
        }
        Ok(())
    }

    fn validate_repository(&self) -> Result<()> {
        let repo = &self.repository;
        if repo.url.trim().is_empty() {
            return Err(config::invalid("'repository.url' is required"));
        }
        if repo.transport == GitTransport::Ssh {
            return Err(config::invalid("SSH transport is not supported"));
        }

        match (repo.transport, url_transport(&repo.url)) {
            (_, UrlTransport::Local)
            | (GitTransport::Https, UrlTransport::Https)
            | (GitTransport::Http, UrlTransport::Http) => Ok(()),
            (_, UrlTransport::Ssh) => Err(config::invalid(format!(
                "SSH repository URLs are not supported: {}",
                repo.url
            ))),
            (_, UrlTransport::Unknown) => Err(config::invalid(format!(
                "unsupported repository URL: {}",
                repo.url
            ))),
            (transport, _) => Err(config::invalid(format!(
                "repository URL {} does not match transport '{}'",
                repo.url,
                transport.as_str()
            ))),
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn clone_retry_delay(&self) -> Duration {
        Duration::from_secs(self.clone_retry_delay_secs)
    }

    /// URL the sync agent pulls from
    pub fn sync_url(&self) -> &str {
        self.repository
            .sync_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .unwrap_or(&self.repository.url)
    }
}

impl GitTransport {
    pub fn as_str(self) -> &'static str {
        match self {
            GitTransport::Https => "https",
            GitTransport::Http => "http",
            GitTransport::Ssh => "ssh",
        }
    }
}
