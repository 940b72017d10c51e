//! Manifest generation
//!
//! This module handles:
//! - Decoding the `ocm-config` localization rules ([`kustomization`])
//! - Rewriting upstream image references to the ones shipped with the component
//! - Rendering the result through kustomize ([`render`])
//! - Serializing concurrent renders of one directory ([`lock`])
//!
//! ## Render directory layout
//!
//! ```text
//! <work_dir>/
//! ├── gotk-components.yaml   # primary manifest, as extracted
//! └── kustomization.yaml     # resources + image overrides
//! ```

pub mod kustomization;
pub mod lock;
pub mod render;

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::component::ImageCoordinate;
use crate::error::{Result, manifest};
use crate::extract::ExtractedResources;

pub use kustomization::{ConfigData, Image, Kustomization, LocalizationRule};
pub use lock::DirLocks;
pub use render::{KustomizeCommand, Renderer};

/// File the primary manifest is written to and committed as
pub const COMPONENTS_FILE: &str = "gotk-components.yaml";

/// File name kustomize looks for in a directory
pub const KUSTOMIZATION_FILE: &str = "kustomization.yaml";

/// Rendered, deployable manifest set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestBundle {
    bytes: Arc<[u8]>,
}

impl ManifestBundle {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        let bytes: Vec<u8> = bytes.into();
        Self {
            bytes: bytes.into(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Generates manifest bundles from extracted resources
#[derive(Clone)]
pub struct ManifestGenerator {
    renderer: Arc<dyn Renderer>,
    locks: Arc<DirLocks>,
    image_host: String,
    allow_unresolved: bool,
}

impl ManifestGenerator {
    /// `image_host` prefixes the upstream image names the overrides match on
    pub fn new(
        renderer: Arc<dyn Renderer>,
        locks: Arc<DirLocks>,
        image_host: impl Into<String>,
    ) -> Self {
        Self {
            renderer,
            locks,
            image_host: image_host.into().trim_end_matches('/').to_string(),
            allow_unresolved: false,
        }
    }

    /// Skip localization rules with no matching image instead of failing
    #[must_use]
    pub fn allow_unresolved_localizations(mut self, allow: bool) -> Self {
        self.allow_unresolved = allow;
        self
    }

    /// Build the kustomization overriding every localized image
    pub fn build_kustomization(
        &self,
        rules: &[LocalizationRule],
        images: &HashMap<String, ImageCoordinate>,
    ) -> Result<Kustomization> {
        let mut kustomization = Kustomization::with_resources([format!("./{COMPONENTS_FILE}")]);

        for rule in rules {
            let resource = &rule.resource.name;
            let Some(image) = images.get(resource) else {
                if self.allow_unresolved {
                    warn!(
                        resource = %resource,
                        "skipping localization rule without image resource"
                    );
                    continue;
                }
                return Err(manifest::unresolved_localization(resource));
            };
            kustomization.images.push(Image {
                name: format!("{}/{}", self.image_host, resource),
                new_name: image.name.clone(),
                new_tag: image.tag.clone(),
            });
        }
        Ok(kustomization)
    }

    /// Write the render directory and build it
    ///
    /// Writing and rendering happen under the lock of `work_dir`, so
    /// concurrent calls for one directory never interleave.
    pub fn generate(
        &self,
        work_dir: &Path,
        extracted: &ExtractedResources,
    ) -> Result<ManifestBundle> {
        let config = ConfigData::parse(&extracted.config_doc)?;
        let kustomization = self.build_kustomization(&config.localization, &extracted.images)?;
        let kustomization_yaml = kustomization.to_yaml()?;

        // Must exist before locking: the lock key is its canonical path
        fs::create_dir_all(work_dir)
            .map_err(|e| manifest::write_failed(work_dir.display().to_string(), e.to_string()))?;
        let rendered = self.locks.with_lock(work_dir, || -> Result<Vec<u8>> {
            write_file(&work_dir.join(COMPONENTS_FILE), &extracted.primary_manifest)?;
            write_file(
                &work_dir.join(KUSTOMIZATION_FILE),
                kustomization_yaml.as_bytes(),
            )?;
            self.renderer.render(work_dir)
        })?;

        debug!(
            dir = %work_dir.display(),
            images = kustomization.images.len(),
            bytes = rendered.len(),
            "generated manifests"
        );
        Ok(ManifestBundle::new(rendered))
    }
}

fn write_file(path: &Path, content: &[u8]) -> Result<()> {
    fs::write(path, content)
        .map_err(|e| manifest::write_failed(path.display().to_string(), e.to_string()))
}
