//! On-disk component descriptor format
//!
//! ```yaml
//! component:
//!   name: ocm.software/mpas/flux
//!   version: v2.1.0
//!   resources:
//!     - name: flux
//!       type: file
//!       access:
//!         type: localBlob
//!         localReference: flux.yaml.gz
//!     - name: source-controller
//!       type: ociImage
//!       access:
//!         type: ociArtifact
//!         imageReference: ghcr.io/fluxcd/source-controller:v1.1.0
//! ```

use std::path::{Component as PathComponent, Path};

use serde::{Deserialize, Serialize};

use super::{ComponentVersion, Resource, ResourceAccess};
use crate::error::{BootstrapError, Result};

/// File name of the descriptor inside a version directory
pub const DESCRIPTOR_FILE: &str = "component-descriptor.yaml";

/// Directory holding local blobs next to the descriptor
pub const BLOBS_DIR: &str = "blobs";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentDescriptor {
    pub component: ComponentSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentSpec {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub resources: Vec<ResourceSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub access: AccessSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AccessSpec {
    #[serde(rename = "localBlob")]
    LocalBlob {
        #[serde(rename = "localReference")]
        local_reference: String,
    },
    #[serde(rename = "ociArtifact")]
    OciArtifact {
        #[serde(rename = "imageReference")]
        image_reference: String,
    },
    #[serde(rename = "inline")]
    Inline { data: String },
}

/// Reject names that would escape the directory they are joined to
pub(super) fn is_safe_relative(name: &str) -> bool {
    !name.is_empty()
        && Path::new(name)
            .components()
            .all(|c| matches!(c, PathComponent::Normal(_)))
}

impl ComponentDescriptor {
    /// Build the component version, resolving local blobs under `version_dir`
    ///
    /// Fails if a local reference is not a plain path inside the blobs directory.
    pub fn into_component_version(self, version_dir: &Path) -> Result<ComponentVersion> {
        let blobs = version_dir.join(BLOBS_DIR);
        let resources = self
            .component
            .resources
            .into_iter()
            .map(|spec| {
                let access = match spec.access {
                    AccessSpec::LocalBlob { local_reference } => {
                        if !is_safe_relative(&local_reference) {
                            return Err(BootstrapError::DescriptorParseFailed {
                                path: version_dir.join(DESCRIPTOR_FILE).display().to_string(),
                                reason: format!(
                                    "resource '{}' references blob '{local_reference}' \
                                     outside {BLOBS_DIR}/",
                                    spec.name
                                ),
                            });
                        }
                        ResourceAccess::LocalBlob {
                            path: blobs.join(local_reference),
                        }
                    }
                    AccessSpec::OciArtifact { image_reference } => {
                        ResourceAccess::OciArtifact { image_reference }
                    }
                    AccessSpec::Inline { data } => ResourceAccess::Inline {
                        data: data.into_bytes().into(),
                    },
                };
                Ok(Resource::new(spec.name, spec.resource_type, access))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(ComponentVersion {
            name: self.component.name,
            version: self.component.version,
            resources,
        })
    }
}
