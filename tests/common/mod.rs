//! Common test utilities for mpas integration tests

#![allow(dead_code)]

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use flate2::Compression;
use flate2::write::GzEncoder;
use mpas_bootstrap::Result;
use mpas_bootstrap::cluster::{ApplyTarget, Cluster, SyncStatus, WorkloadStatus};
use mpas_bootstrap::component::descriptor::{
    AccessSpec, BLOBS_DIR, ComponentDescriptor, ComponentSpec, DESCRIPTOR_FILE, ResourceSpec,
};
use mpas_bootstrap::manifest::{COMPONENTS_FILE, KUSTOMIZATION_FILE, Renderer};
use mpas_bootstrap::sync::SYNC_FILE;
use tempfile::TempDir;

pub const FLUX_COMPONENT: &str = "ocm.software/mpas/flux";
pub const OCM_CONTROLLER_COMPONENT: &str = "ocm.software/mpas/ocm-controller";

pub const FLUX_CONFIG: &str = r"apiVersion: config.ocm.software/v1alpha1
kind: ConfigData
localization:
  - name: source-controller
    file: gotk-components.yaml
    image: spec.template.spec.containers[0].image
    resource:
      name: source-controller
  - name: kustomize-controller
    file: gotk-components.yaml
    image: spec.template.spec.containers[0].image
    resource:
      name: kustomize-controller
";

pub const OCM_CONTROLLER_CONFIG: &str = r"apiVersion: config.ocm.software/v1alpha1
kind: ConfigData
localization:
  - name: ocm-controller
    file: gotk-components.yaml
    resource:
      name: ocm-controller
";

/// A resource written into a fixture component version
pub enum FixtureResource {
    /// Local blob, gzip-compressed when `gzip` is set
    Blob {
        name: String,
        data: Vec<u8>,
        gzip: bool,
    },
    Inline { name: String, data: String },
    Image { name: String, reference: String },
}

impl FixtureResource {
    pub fn blob(name: &str, data: &str) -> Self {
        Self::Blob {
            name: name.to_string(),
            data: data.as_bytes().to_vec(),
            gzip: false,
        }
    }

    pub fn gzip_blob(name: &str, data: &str) -> Self {
        Self::Blob {
            name: name.to_string(),
            data: data.as_bytes().to_vec(),
            gzip: true,
        }
    }

    pub fn inline(name: &str, data: &str) -> Self {
        Self::Inline {
            name: name.to_string(),
            data: data.to_string(),
        }
    }

    pub fn image(name: &str, reference: &str) -> Self {
        Self::Image {
            name: name.to_string(),
            reference: reference.to_string(),
        }
    }
}

/// A component archive on disk
pub struct ArchiveFixture {
    pub temp: TempDir,
    pub path: PathBuf,
}

impl ArchiveFixture {
    pub fn new() -> Self {
        let temp = TempDir::new().expect("Failed to create temp directory");
        let path = temp.path().join("archive");
        fs::create_dir_all(&path).expect("Failed to create archive directory");
        Self { temp, path }
    }

    /// Write `<component>/<version>/` with a descriptor and its blobs
    pub fn add_version(&self, component: &str, version: &str, resources: Vec<FixtureResource>) {
        let version_dir = self.path.join(component).join(version);
        let blobs = version_dir.join(BLOBS_DIR);
        fs::create_dir_all(&blobs).expect("Failed to create blobs directory");

        let specs = resources
            .into_iter()
            .map(|resource| match resource {
                FixtureResource::Blob { name, data, gzip } => {
                    let reference = if gzip {
                        let file = format!("{name}.yaml.gz");
                        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
                        encoder.write_all(&data).expect("Failed to compress blob");
                        let compressed = encoder.finish().expect("Failed to finish gzip stream");
                        fs::write(blobs.join(&file), compressed).expect("Failed to write blob");
                        file
                    } else {
                        let file = format!("{name}.yaml");
                        fs::write(blobs.join(&file), data).expect("Failed to write blob");
                        file
                    };
                    ResourceSpec {
                        name,
                        resource_type: "file".to_string(),
                        version: None,
                        access: AccessSpec::LocalBlob {
                            local_reference: reference,
                        },
                    }
                }
                FixtureResource::Inline { name, data } => ResourceSpec {
                    name,
                    resource_type: "file".to_string(),
                    version: None,
                    access: AccessSpec::Inline { data },
                },
                FixtureResource::Image { name, reference } => ResourceSpec {
                    name,
                    resource_type: "ociImage".to_string(),
                    version: None,
                    access: AccessSpec::OciArtifact {
                        image_reference: reference,
                    },
                },
            })
            .collect();

        let descriptor = ComponentDescriptor {
            component: ComponentSpec {
                name: component.to_string(),
                version: version.to_string(),
                resources: specs,
            },
        };
        let yaml = serde_yaml::to_string(&descriptor).expect("Failed to serialize descriptor");
        fs::write(version_dir.join(DESCRIPTOR_FILE), yaml).expect("Failed to write descriptor");
    }

    /// A flux bundle with a gzip manifest and two controller images
    pub fn add_flux(&self, version: &str) {
        self.add_version(
            FLUX_COMPONENT,
            version,
            vec![
                FixtureResource::gzip_blob(
                    "flux",
                    &deployments(&["source-controller", "kustomize-controller"]),
                ),
                FixtureResource::inline("ocm-config", FLUX_CONFIG),
                FixtureResource::image(
                    "source-controller",
                    "registry.local/fluxcd/source-controller:v1.1.0",
                ),
                FixtureResource::image(
                    "kustomize-controller",
                    "registry.local/fluxcd/kustomize-controller:v1.1.0",
                ),
            ],
        );
    }

    /// An ocm-controller bundle whose manifest resource is `resource`
    pub fn add_ocm_controller(&self, version: &str, resource: &str) {
        self.add_version(
            OCM_CONTROLLER_COMPONENT,
            version,
            vec![
                FixtureResource::blob(resource, &deployments(&["ocm-controller"])),
                FixtureResource::blob("ocm-config", OCM_CONTROLLER_CONFIG),
                FixtureResource::image(
                    "ocm-controller",
                    "registry.local/open-component-model/ocm-controller:v0.14.0",
                ),
            ],
        );
    }
}

/// One deployment document per name
pub fn deployments(names: &[&str]) -> String {
    names
        .iter()
        .map(|name| {
            format!(
                "---\napiVersion: apps/v1\nkind: Deployment\nmetadata:\n  name: {name}\nspec:\n  template:\n    spec:\n      containers:\n        - name: manager\n          image: ghcr.io/fluxcd/{name}:latest\n"
            )
        })
        .collect()
}

/// A bare repository standing in for the management repository
pub struct BareRemote {
    pub temp: TempDir,
    pub path: PathBuf,
}

impl BareRemote {
    /// An empty bare repository
    pub fn new() -> Self {
        let temp = TempDir::new().expect("Failed to create temp directory");
        let path = temp.path().join("mgmt.git");
        git2::Repository::init_bare(&path).expect("Failed to init bare repository");
        Self { temp, path }
    }

    pub fn url(&self) -> String {
        self.path.to_string_lossy().to_string()
    }

    /// Commit id of `branch`, `None` while it does not exist
    pub fn head(&self, branch: &str) -> Option<String> {
        remote_head(&self.path, branch)
    }

    /// Commit messages on `branch`, newest first
    pub fn commit_messages(&self, branch: &str) -> Vec<String> {
        let repo = git2::Repository::open_bare(&self.path).expect("Failed to open bare repository");
        let Ok(head) = repo.refname_to_id(&format!("refs/heads/{branch}")) else {
            return Vec::new();
        };
        let mut walk = repo.revwalk().expect("Failed to walk history");
        walk.push(head).expect("Failed to push head");
        walk.map(|oid| {
            let commit = repo
                .find_commit(oid.expect("Failed to read oid"))
                .expect("Failed to find commit");
            commit.message().unwrap_or_default().to_string()
        })
        .collect()
    }

    /// Content of `path` at the tip of `branch`
    pub fn read_file(&self, branch: &str, path: &str) -> Option<String> {
        let repo = git2::Repository::open_bare(&self.path).expect("Failed to open bare repository");
        let head = repo.refname_to_id(&format!("refs/heads/{branch}")).ok()?;
        let tree = repo.find_commit(head).ok()?.tree().ok()?;
        let entry = tree.get_path(Path::new(path)).ok()?;
        let blob = repo.find_blob(entry.id()).ok()?;
        Some(String::from_utf8_lossy(blob.content()).to_string())
    }
}

fn remote_head(path: &Path, branch: &str) -> Option<String> {
    let repo = git2::Repository::open_bare(path).ok()?;
    repo.refname_to_id(&format!("refs/heads/{branch}"))
        .ok()
        .map(|oid| oid.to_string())
}

/// Cluster whose sync agent follows a [`BareRemote`]
///
/// The sync object appears once a kustomization holding the sync manifests
/// has been applied, and from then on reports the remote's branch tip as its
/// last applied revision. Workloads are ready unless built with
/// [`FakeCluster::unhealthy`].
pub struct FakeCluster {
    remote: PathBuf,
    branch: String,
    healthy: bool,
    synced: AtomicBool,
    pub applied: Mutex<Vec<ApplyTarget>>,
    pub manifests: Mutex<Vec<String>>,
}

impl FakeCluster {
    pub fn new(remote: &BareRemote, branch: &str) -> Self {
        Self {
            remote: remote.path.clone(),
            branch: branch.to_string(),
            healthy: true,
            synced: AtomicBool::new(false),
            applied: Mutex::new(Vec::new()),
            manifests: Mutex::new(Vec::new()),
        }
    }

    /// Sync object never ready, workloads missing
    pub fn unhealthy(remote: &BareRemote, branch: &str) -> Self {
        Self {
            healthy: false,
            ..Self::new(remote, branch)
        }
    }

    /// Sync object already present and following the remote
    pub fn synced(remote: &BareRemote, branch: &str) -> Self {
        let cluster = Self::new(remote, branch);
        cluster.synced.store(true, Ordering::SeqCst);
        cluster
    }

    pub fn applied(&self) -> Vec<ApplyTarget> {
        self.applied.lock().unwrap().clone()
    }

    pub fn manifests(&self) -> Vec<String> {
        self.manifests.lock().unwrap().clone()
    }
}

impl Cluster for FakeCluster {
    fn apply(&self, target: &ApplyTarget) -> Result<()> {
        if let ApplyTarget::Kustomization(dir) = target {
            if dir.join(SYNC_FILE).is_file() {
                self.synced.store(true, Ordering::SeqCst);
            }
        }
        self.applied.lock().unwrap().push(target.clone());
        Ok(())
    }

    fn apply_manifest(&self, manifest: &[u8]) -> Result<()> {
        self.manifests
            .lock()
            .unwrap()
            .push(String::from_utf8_lossy(manifest).to_string());
        Ok(())
    }

    fn sync_status(&self, _namespace: &str, _name: &str) -> Result<Option<SyncStatus>> {
        if !self.synced.load(Ordering::SeqCst) {
            return Ok(None);
        }
        Ok(Some(SyncStatus {
            ready: self.healthy,
            message: (!self.healthy).then(|| "reconciliation in progress".to_string()),
            last_applied_revision: remote_head(&self.remote, &self.branch),
        }))
    }

    fn workload_status(&self, _namespace: &str, _name: &str) -> Result<Option<WorkloadStatus>> {
        if !self.healthy {
            return Ok(None);
        }
        Ok(Some(WorkloadStatus {
            desired_replicas: 1,
            ready_replicas: 1,
            updated_replicas: 1,
            generation: 1,
            observed_generation: 1,
        }))
    }
}

/// Renders by concatenating the components file and the kustomization
pub struct FakeRenderer;

impl Renderer for FakeRenderer {
    fn render(&self, dir: &Path) -> Result<Vec<u8>> {
        let mut out = fs::read(dir.join(COMPONENTS_FILE))?;
        out.extend(fs::read(dir.join(KUSTOMIZATION_FILE))?);
        Ok(out)
    }
}

/// Configuration installing `components` from `archive` into `remote`
pub fn config_yaml(archive: &ArchiveFixture, remote: &BareRemote, components: &str) -> String {
    format!(
        "registry: {registry}\nrepository:\n  url: {url}\n  branch: main\n  target_path: clusters/dev/\n  commit_message_appendix: \"Signed-off-by: ci\"\ntimeout_secs: 5\npoll_interval_secs: 1\nclone_retry_delay_secs: 1\nimage_host: ghcr.io/fluxcd\ncomponents:\n{components}",
        registry = archive.path.display(),
        url = remote.url(),
    )
}

/// Get the mpas binary
#[allow(deprecated)]
pub fn mpas_cmd() -> assert_cmd::Command {
    let mut cmd = assert_cmd::Command::cargo_bin("mpas").unwrap();
    cmd.env_remove("MPAS_GIT_TOKEN");
    cmd.env_remove("RUST_LOG");
    cmd
}
