//! Component versions and the resources they bundle
//!
//! A [`ComponentVersion`] is fetched read-only from a
//! [`ComponentRepository`](repository::ComponentRepository) and never mutated
//! afterwards. Each [`Resource`] carries an access method that yields its bytes.

pub mod descriptor;
pub mod repository;

use std::fmt;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{Result, component};

pub use repository::{ArchiveRepository, ComponentAccess, ComponentRepository, MemoryRepository};

/// Resource type tag of OCI image references
pub const RESOURCE_TYPE_OCI_IMAGE: &str = "ociImage";

/// Resource type tag of plain files
pub const RESOURCE_TYPE_FILE: &str = "file";

/// Name of the resource holding localization rules
pub const OCM_CONFIG_RESOURCE: &str = "ocm-config";

/// How the bytes of a resource are reached
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceAccess {
    /// Blob stored next to the component descriptor
    LocalBlob { path: PathBuf },
    /// Data embedded in the descriptor or built in memory
    Inline { data: Arc<[u8]> },
    /// Reference to an image in an OCI registry; only the reference is consumed
    OciArtifact { image_reference: String },
}

impl ResourceAccess {
    pub fn type_name(&self) -> &'static str {
        match self {
            ResourceAccess::LocalBlob { .. } => "localBlob",
            ResourceAccess::Inline { .. } => "inline",
            ResourceAccess::OciArtifact { .. } => "ociArtifact",
        }
    }
}

/// One entry of a component version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub name: String,
    pub resource_type: String,
    pub access: ResourceAccess,
}

impl Resource {
    pub fn new(
        name: impl Into<String>,
        resource_type: impl Into<String>,
        access: ResourceAccess,
    ) -> Self {
        Self {
            name: name.into(),
            resource_type: resource_type.into(),
            access,
        }
    }

    /// A file resource whose bytes live in memory
    pub fn inline(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        let data: Vec<u8> = data.into();
        Self::new(
            name,
            RESOURCE_TYPE_FILE,
            ResourceAccess::Inline { data: data.into() },
        )
    }

    /// An OCI image resource pointing at `image_reference`
    pub fn oci_image(name: impl Into<String>, image_reference: impl Into<String>) -> Self {
        Self::new(
            name,
            RESOURCE_TYPE_OCI_IMAGE,
            ResourceAccess::OciArtifact {
                image_reference: image_reference.into(),
            },
        )
    }

    pub fn is_image(&self) -> bool {
        self.resource_type == RESOURCE_TYPE_OCI_IMAGE
    }

    /// Image reference of OCI artifact resources
    pub fn image_reference(&self) -> Option<&str> {
        match &self.access {
            ResourceAccess::OciArtifact { image_reference } => Some(image_reference),
            _ => None,
        }
    }

    /// Open the raw (possibly compressed) byte stream of this resource
    pub fn open(&self) -> Result<Box<dyn Read + Send>> {
        match &self.access {
            ResourceAccess::LocalBlob { path } => {
                let file = File::open(path).map_err(|e| {
                    component::access_failed(&self.name, format!("{}: {}", path.display(), e))
                })?;
                Ok(Box::new(file))
            }
            ResourceAccess::Inline { data } => Ok(Box::new(Cursor::new(Arc::clone(data)))),
            ResourceAccess::OciArtifact { .. } => Err(component::access_failed(
                &self.name,
                "content of OCI artifacts is not fetched, only the image reference is used",
            )),
        }
    }
}

/// Immutable bundle identified by component name and version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentVersion {
    pub name: String,
    pub version: String,
    pub resources: Vec<Resource>,
}

impl ComponentVersion {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            resources: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_resource(mut self, resource: Resource) -> Self {
        self.resources.push(resource);
        self
    }

    pub fn resource(&self, name: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.name == name)
    }
}

/// Image name and tag parsed from an OCI image reference
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageCoordinate {
    pub name: String,
    pub tag: String,
}

impl ImageCoordinate {
    /// Split `reference` on its last `:` into name and tag
    ///
    /// The tag segment must be present: a colon that only separates a registry
    /// port (`host:5000/name`) does not count. Digest references are rejected.
    pub fn parse(reference: &str) -> Result<Self> {
        if reference.contains('@') {
            return Err(component::malformed_image_reference(
                reference,
                "digest references have no tag",
            ));
        }
        let Some((name, tag)) = reference.rsplit_once(':') else {
            return Err(component::malformed_image_reference(
                reference,
                "missing ':<tag>' segment",
            ));
        };
        if tag.is_empty() || tag.contains('/') {
            return Err(component::malformed_image_reference(
                reference,
                "missing ':<tag>' segment",
            ));
        }
        if name.is_empty() {
            return Err(component::malformed_image_reference(
                reference,
                "missing image name",
            ));
        }
        Ok(Self {
            name: name.to_string(),
            tag: tag.to_string(),
        })
    }
}

impl fmt::Display for ImageCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.tag)
    }
}
