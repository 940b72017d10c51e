//! Component repositories
//!
//! [`ComponentRepository`] is the read-only content store the resolver consumes.
//! Two implementations ship with the crate:
//! - [`ArchiveRepository`]: a directory tree of component descriptors and blobs
//! - [`MemoryRepository`]: components assembled in memory

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::ComponentVersion;
use super::descriptor::{ComponentDescriptor, DESCRIPTOR_FILE, is_safe_relative};
use crate::error::{BootstrapError, Result, component};

/// Store of versioned components
pub trait ComponentRepository {
    /// Look up a component by name
    fn lookup_component(&self, name: &str) -> Result<Box<dyn ComponentAccess + '_>>;
}

/// Handle on one component of a repository
pub trait ComponentAccess {
    fn name(&self) -> &str;

    /// Version identifiers in the repository's listing order
    fn list_versions(&self) -> Result<Vec<String>>;

    /// Fetch one version by its exact identifier
    fn lookup_version(&self, version: &str) -> Result<ComponentVersion>;
}

/// Component archive on disk
///
/// ```text
/// <root>/
/// └── <component name, '/' separated>/
///     └── <version>/
///         ├── component-descriptor.yaml
///         └── blobs/
/// ```
///
/// Versions are listed in lexical order of their directory names.
#[derive(Debug, Clone)]
pub struct ArchiveRepository {
    root: PathBuf,
}

impl ArchiveRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ComponentRepository for ArchiveRepository {
    fn lookup_component(&self, name: &str) -> Result<Box<dyn ComponentAccess + '_>> {
        if !is_safe_relative(name) {
            return Err(component::not_found(name));
        }
        let dir = self.root.join(name);
        if !dir.is_dir() {
            return Err(component::not_found(name));
        }
        Ok(Box::new(ArchiveComponent {
            name: name.to_string(),
            dir,
        }))
    }
}

struct ArchiveComponent {
    name: String,
    dir: PathBuf,
}

impl ComponentAccess for ArchiveComponent {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_versions(&self) -> Result<Vec<String>> {
        let entries = fs::read_dir(&self.dir).map_err(|e| {
            component::repository_read_failed(self.dir.display().to_string(), e.to_string())
        })?;

        let mut versions = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                component::repository_read_failed(self.dir.display().to_string(), e.to_string())
            })?;
            let path = entry.path();
            if path.join(DESCRIPTOR_FILE).is_file() {
                versions.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        versions.sort();
        debug!(component = %self.name, ?versions, "listed component versions");
        Ok(versions)
    }

    fn lookup_version(&self, version: &str) -> Result<ComponentVersion> {
        if !is_safe_relative(version) || version.contains('/') {
            return Err(component::version_not_found(&self.name, version));
        }
        let version_dir = self.dir.join(version);
        let descriptor_path = version_dir.join(DESCRIPTOR_FILE);
        if !descriptor_path.is_file() {
            return Err(component::version_not_found(&self.name, version));
        }

        let content = fs::read_to_string(&descriptor_path).map_err(|e| {
            component::repository_read_failed(descriptor_path.display().to_string(), e.to_string())
        })?;
        let descriptor: ComponentDescriptor =
            serde_yaml::from_str(&content).map_err(|e| BootstrapError::DescriptorParseFailed {
                path: descriptor_path.display().to_string(),
                reason: e.to_string(),
            })?;

        if descriptor.component.name != self.name {
            return Err(BootstrapError::DescriptorParseFailed {
                path: descriptor_path.display().to_string(),
                reason: format!(
                    "descriptor names component '{}', expected '{}'",
                    descriptor.component.name, self.name
                ),
            });
        }

        descriptor.into_component_version(&version_dir)
    }
}

/// Repository held entirely in memory, listing versions in insertion order
#[derive(Debug, Clone, Default)]
pub struct MemoryRepository {
    components: Vec<(String, Vec<ComponentVersion>)>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a component version, appending to its component's listing
    pub fn add(&mut self, version: ComponentVersion) {
        match self
            .components
            .iter_mut()
            .find(|(name, _)| *name == version.name)
        {
            Some((_, versions)) => versions.push(version),
            None => self.components.push((version.name.clone(), vec![version])),
        }
    }

    #[must_use]
    pub fn with(mut self, version: ComponentVersion) -> Self {
        self.add(version);
        self
    }
}

impl ComponentRepository for MemoryRepository {
    fn lookup_component(&self, name: &str) -> Result<Box<dyn ComponentAccess + '_>> {
        self.components
            .iter()
            .find(|(component_name, _)| component_name == name)
            .map(|(component_name, versions)| {
                Box::new(MemoryComponent {
                    name: component_name,
                    versions,
                }) as Box<dyn ComponentAccess + '_>
            })
            .ok_or_else(|| component::not_found(name))
    }
}

struct MemoryComponent<'a> {
    name: &'a str,
    versions: &'a [ComponentVersion],
}

impl ComponentAccess for MemoryComponent<'_> {
    fn name(&self) -> &str {
        self.name
    }

    fn list_versions(&self) -> Result<Vec<String>> {
        Ok(self.versions.iter().map(|v| v.version.clone()).collect())
    }

    fn lookup_version(&self, version: &str) -> Result<ComponentVersion> {
        self.versions
            .iter()
            .find(|v| v.version == version)
            .cloned()
            .ok_or_else(|| component::version_not_found(self.name, version))
    }
}
