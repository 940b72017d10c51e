//! Kustomization descriptor and `ConfigData` localization rules

use serde::{Deserialize, Serialize};

use crate::error::{Result, manifest};

pub const KUSTOMIZATION_API_VERSION: &str = "kustomize.config.k8s.io/v1beta1";
pub const KUSTOMIZATION_KIND: &str = "Kustomization";

/// Minimal `kustomization.yaml` document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Kustomization {
    pub api_version: String,
    pub kind: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<Image>,
}

impl Kustomization {
    pub fn with_resources<I, S>(resources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            api_version: KUSTOMIZATION_API_VERSION.to_string(),
            kind: KUSTOMIZATION_KIND.to_string(),
            resources: resources.into_iter().map(Into::into).collect(),
            images: Vec::new(),
        }
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| manifest::serialization_failed("kustomization", e.to_string()))
    }
}

/// Image override of a kustomization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub new_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub new_tag: String,
}

/// The `ocm-config` document shipped with a component
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigData {
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub localization: Vec<LocalizationRule>,
}

impl ConfigData {
    /// Decode a YAML or JSON `ConfigData` document
    pub fn parse(data: &[u8]) -> Result<Self> {
        serde_yaml::from_slice(data).map_err(|e| manifest::config_data_invalid(e.to_string()))
    }
}

/// Maps an image resource of the component onto a field of a manifest
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LocalizationRule {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub file: String,
    #[serde(default)]
    pub image: String,
    pub resource: ResourceRef,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ResourceRef {
    pub name: String,
}
