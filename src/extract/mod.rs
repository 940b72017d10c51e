//! Resource extraction from a resolved component version
//!
//! This module handles:
//! - Reading the primary manifest resource and the `ocm-config` document
//! - Collecting image coordinates of every `ociImage` resource
//! - Decompressing blobs ([`decompress`])
//!
//! Resources are visited once, in bundle order, and dispatched by name:
//! the requested resource name wins, then `ocm-config`, then the type tag.

pub mod decompress;

use std::collections::HashMap;

use tracing::debug;

use crate::component::{ComponentVersion, ImageCoordinate, OCM_CONFIG_RESOURCE, Resource};
use crate::error::{Result, component};

/// Everything an installation needs from a component version
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedResources {
    /// Decompressed bytes of the primary manifest resource
    pub primary_manifest: Vec<u8>,
    /// Decompressed bytes of the `ocm-config` resource
    pub config_doc: Vec<u8>,
    /// Image coordinates keyed by resource name
    pub images: HashMap<String, ImageCoordinate>,
    /// Names of the image resources, in bundle order
    pub component_names: Vec<String>,
}

/// Read and decompress the bytes of `resource`
pub fn read_resource(resource: &Resource) -> Result<Vec<u8>> {
    let reader = resource.open()?;
    decompress::read_all(reader)
        .map_err(|e| component::access_failed(&resource.name, e.to_string()))
}

/// Extract the resources needed to install `resource_name` from `cv`
///
/// Fails with `MissingRequiredResource` when the primary manifest or the
/// config document is absent or empty.
pub fn extract(cv: &ComponentVersion, resource_name: &str) -> Result<ExtractedResources> {
    let mut extracted = ExtractedResources::default();

    for resource in &cv.resources {
        if resource.name == resource_name {
            extracted.primary_manifest = read_resource(resource)?;
        } else if resource.name == OCM_CONFIG_RESOURCE {
            extracted.config_doc = read_resource(resource)?;
        } else if resource.is_image() {
            let reference = resource.image_reference().ok_or_else(|| {
                component::access_failed(
                    &resource.name,
                    format!(
                        "image resource uses '{}' access, expected an image reference",
                        resource.access.type_name()
                    ),
                )
            })?;
            let coordinate = ImageCoordinate::parse(reference)?;
            extracted.images.insert(resource.name.clone(), coordinate);
            extracted.component_names.push(resource.name.clone());
        }
    }

    let mut missing = Vec::new();
    if extracted.primary_manifest.is_empty() {
        missing.push(resource_name);
    }
    if extracted.config_doc.is_empty() {
        missing.push(OCM_CONFIG_RESOURCE);
    }
    if !missing.is_empty() {
        return Err(component::missing_required(
            &cv.name,
            &cv.version,
            missing.join(", "),
        ));
    }

    debug!(
        component = %cv.name,
        version = %cv.version,
        manifest_bytes = extracted.primary_manifest.len(),
        images = extracted.images.len(),
        "extracted resources"
    );
    Ok(extracted)
}
