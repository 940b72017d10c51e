//! Install profiles
//!
//! A profile holds everything that differs between the bootstrap components:
//! where they are installed, which resource carries their manifests and
//! whether they bring the sync agent along.

use std::collections::BTreeMap;

use crate::component::ComponentVersion;

/// Per-component install settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallProfile {
    /// Logical name used in the configuration, e.g. `flux`
    pub name: String,
    /// Name used in commit messages
    pub display_name: String,
    /// Namespace the component is installed into
    pub namespace: String,
    /// Resource holding the primary manifest
    pub resource: String,
    /// Other names published bundles use for the same resource
    pub resource_aliases: Vec<String>,
    /// Whether installing this component also bootstraps the sync agent
    pub bootstraps_sync: bool,
}

impl InstallProfile {
    pub fn new(
        name: impl Into<String>,
        display_name: impl Into<String>,
        namespace: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            display_name: display_name.into(),
            namespace: namespace.into(),
            resource: resource.into(),
            resource_aliases: Vec::new(),
            bootstraps_sync: false,
        }
    }

    #[must_use]
    pub fn with_sync(mut self) -> Self {
        self.bootstraps_sync = true;
        self
    }

    /// Replace the primary resource; an explicit name drops the aliases
    #[must_use]
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = resource.into();
        self.resource_aliases.clear();
        self
    }

    #[must_use]
    pub fn with_resource_alias(mut self, alias: impl Into<String>) -> Self {
        self.resource_aliases.push(alias.into());
        self
    }

    /// Name of the primary manifest resource in `cv`
    ///
    /// Falls back to the first alias `cv` carries, then to the primary name so
    /// a missing resource is reported under it.
    pub fn resource_for(&self, cv: &ComponentVersion) -> &str {
        std::iter::once(&self.resource)
            .chain(&self.resource_aliases)
            .find(|name| cv.resource(name).is_some())
            .unwrap_or(&self.resource)
    }

    /// Prefix of the scratch directory an install of this profile runs in
    pub fn work_dir_prefix(&self) -> String {
        format!("{}-install", self.name)
    }
}

/// Name to profile mapping, built once at startup
#[derive(Debug, Clone, Default)]
pub struct ProfileRegistry {
    profiles: BTreeMap<String, InstallProfile>,
}

impl ProfileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the `flux` and `ocm-controller` profiles
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(InstallProfile::new("flux", "Flux", "flux-system", "flux").with_sync());
        registry.register(
            InstallProfile::new(
                "ocm-controller",
                "OCM controller",
                "ocm-system",
                "ocm-controller-file",
            )
            // published ocm-controller components misspell the resource
            .with_resource_alias("ocm-contoller-file"),
        );
        registry
    }

    /// Add a profile, replacing any registered under the same name
    pub fn register(&mut self, profile: InstallProfile) {
        self.profiles.insert(profile.name.clone(), profile);
    }

    pub fn get(&self, name: &str) -> Option<&InstallProfile> {
        self.profiles.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.profiles.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        self.profiles.keys().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Resource;

    #[test]
    fn test_default_profiles() {
        let registry = ProfileRegistry::with_defaults();
        assert_eq!(registry.names(), vec!["flux", "ocm-controller"]);

        let flux = registry.get("flux").unwrap();
        assert_eq!(flux.namespace, "flux-system");
        assert_eq!(flux.resource, "flux");
        assert!(flux.bootstraps_sync);

        let ocm = registry.get("ocm-controller").unwrap();
        assert_eq!(ocm.namespace, "ocm-system");
        assert!(!ocm.bootstraps_sync);
        assert_eq!(ocm.work_dir_prefix(), "ocm-controller-install");
    }

    #[test]
    fn test_resource_for_falls_back_to_alias() {
        let registry = ProfileRegistry::with_defaults();
        let ocm = registry.get("ocm-controller").unwrap();

        let published = ComponentVersion::new("ocm-controller", "v0.14.0")
            .with_resource(Resource::inline("ocm-contoller-file", "kind: List\n"));
        assert_eq!(ocm.resource_for(&published), "ocm-contoller-file");

        let both = published
            .clone()
            .with_resource(Resource::inline("ocm-controller-file", "kind: List\n"));
        assert_eq!(ocm.resource_for(&both), "ocm-controller-file");

        let neither = ComponentVersion::new("ocm-controller", "v0.14.0");
        assert_eq!(ocm.resource_for(&neither), "ocm-controller-file");
    }

    #[test]
    fn test_explicit_resource_drops_aliases() {
        let registry = ProfileRegistry::with_defaults();
        let ocm = registry.get("ocm-controller").unwrap().clone().with_resource("manifests");
        let cv = ComponentVersion::new("ocm-controller", "v0.14.0")
            .with_resource(Resource::inline("ocm-contoller-file", "kind: List\n"));
        assert!(ocm.resource_aliases.is_empty());
        assert_eq!(ocm.resource_for(&cv), "manifests");
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = ProfileRegistry::with_defaults();
        registry.register(InstallProfile::new("flux", "Flux", "gitops", "flux"));
        assert_eq!(registry.get("flux").unwrap().namespace, "gitops");
        assert!(!registry.contains("unknown"));
    }
}
